// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_code() -> MemoryRange {
    MemoryRange {
        base: 0x0000_0000,
        size: "64KiB".to_string(),
    }
}

fn default_sram() -> MemoryRange {
    MemoryRange {
        base: 0x2000_0000,
        size: "64KiB".to_string(),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MemoryRange {
    pub base: u32,
    pub size: String, // e.g. "64KiB"
}

impl MemoryRange {
    pub fn size_bytes(&self) -> Result<u32> {
        let bytes = parse_size(&self.size)?;
        u32::try_from(bytes)
            .with_context(|| format!("Region size '{}' does not fit the 32-bit bus", self.size))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: String, // "stub"
    pub base_address: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

/// Address map of the simulated core: the two fixed memory regions plus
/// the peripherals registered before the first run.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryMap {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_code")]
    pub code: MemoryRange,
    #[serde(default = "default_sram")]
    pub sram: MemoryRange,
    #[serde(default)]
    pub peripherals: Vec<PeripheralConfig>,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: "default".to_string(),
            code: default_code(),
            sram: default_sram(),
            peripherals: Vec::new(),
        }
    }
}

impl MemoryMap {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read memory map {:?}", path))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse memory map {:?}", path))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let map: Self = serde_yaml::from_str(yaml)?;
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!("Unsupported schema_version '{}'", self.schema_version);
        }
        let code = self.code.size_bytes().context("Invalid code region")?;
        let sram = self.sram.size_bytes().context("Invalid sram region")?;
        if code == 0 || sram == 0 {
            anyhow::bail!("Memory regions must not be empty");
        }
        let code_end = self.code.base as u64 + code as u64;
        let sram_end = self.sram.base as u64 + sram as u64;
        if code_end > 1 << 32 || sram_end > 1 << 32 {
            anyhow::bail!("Memory regions must end inside the 32-bit address space");
        }
        if (self.code.base as u64) < sram_end && (self.sram.base as u64) < code_end {
            anyhow::bail!(
                "Code region {:#x}+{} overlaps sram region {:#x}+{}",
                self.code.base,
                self.code.size,
                self.sram.base,
                self.sram.size
            );
        }
        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("256B").unwrap(), 256);
        assert_eq!(parse_size("64KiB").unwrap(), 65_536);
        assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_default_map_is_valid() {
        let map = MemoryMap::default();
        map.validate().unwrap();
        assert_eq!(map.code.base, 0);
        assert_eq!(map.sram.base, 0x2000_0000);
        assert!(map.peripherals.is_empty());
    }

    #[test]
    fn test_overlapping_regions_rejected() {
        let yaml = r#"
code:
  base: 0x0
  size: "64KiB"
sram:
  base: 0x8000
  size: "64KiB"
"#;
        let err = MemoryMap::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("overlaps"));
    }

    #[test]
    fn test_unknown_schema_rejected() {
        let yaml = r#"
schema_version: "2.0"
"#;
        assert!(MemoryMap::from_yaml(yaml).is_err());
    }
}
