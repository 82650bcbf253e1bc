// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::memory::MemoryRegion;
use crate::peripherals::stub::StubPeripheral;
use crate::Peripheral;
use anyhow::Context;
use std::fmt;
use thumbsim_config::{parse_size, MemoryMap};

pub const DEFAULT_CODE_BASE: u32 = 0x0000_0000;
pub const DEFAULT_SRAM_BASE: u32 = 0x2000_0000;
pub const DEFAULT_REGION_SIZE: u32 = 64 * 1024;

/// Default window for configured peripherals without an explicit size.
const DEFAULT_PERIPHERAL_SIZE: u64 = 0x1000;

/// Half-open `[start, end)` window on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u32,
    /// Exclusive; may be `1 << 32` for a window ending at the top of memory.
    pub end: u64,
}

impl AddressRange {
    pub fn new(start: u32, size: u32) -> Self {
        Self {
            start,
            end: start as u64 + size as u64,
        }
    }

    pub fn contains(&self, addr: u32) -> bool {
        (addr as u64) >= self.start as u64 && (addr as u64) < self.end
    }

    /// True when either range's start lies inside the other.
    pub fn intersects(&self, other: &AddressRange) -> bool {
        self.contains(other.start) || other.contains(self.start)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}, {:#010x})", self.start, self.end)
    }
}

/// Registration refused because the new window intersects a peripheral that
/// is already mapped. The registry is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Peripheral '{new}' at {new_range} conflicts with '{existing}' at {existing_range}")]
pub struct ConflictError {
    pub new: String,
    pub new_range: AddressRange,
    pub existing: String,
    pub existing_range: AddressRange,
}

pub struct PeripheralEntry {
    pub name: String,
    pub range: AddressRange,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    pub fn new(name: impl Into<String>, base: u32, size: u32, dev: Box<dyn Peripheral>) -> Self {
        Self {
            name: name.into(),
            range: AddressRange::new(base, size),
            dev,
        }
    }

    fn offset(&self, addr: u32) -> u32 {
        addr - self.range.start
    }
}

impl fmt::Debug for PeripheralEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeripheralEntry")
            .field("name", &self.name)
            .field("range", &self.range)
            .finish()
    }
}

enum Target {
    Code,
    Sram,
    Peripheral(usize),
    Unmapped,
}

/// Routes byte/halfword/word accesses to the code region, the SRAM region or
/// a registered peripheral, tried in that order.
///
/// Unmapped reads return zero and unmapped writes are dropped. A multi-byte
/// access is routed by the address of its first byte: inside a memory region
/// the bytes past the region end are truncated, while a peripheral receives
/// the whole access through its width-specific method.
#[derive(Debug)]
pub struct Mmu {
    pub code: MemoryRegion,
    pub sram: MemoryRegion,
    peripherals: Vec<PeripheralEntry>,
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}

impl Mmu {
    pub fn new() -> Self {
        Self::with_regions(
            DEFAULT_CODE_BASE,
            DEFAULT_REGION_SIZE,
            DEFAULT_SRAM_BASE,
            DEFAULT_REGION_SIZE,
        )
    }

    pub fn with_regions(code_base: u32, code_size: u32, sram_base: u32, sram_size: u32) -> Self {
        Self {
            code: MemoryRegion::new("code", code_base, code_size),
            sram: MemoryRegion::new("sram", sram_base, sram_size),
            peripherals: Vec::new(),
        }
    }

    pub fn from_config(map: &MemoryMap) -> anyhow::Result<Self> {
        map.validate()?;
        let code_size = map.code.size_bytes()?;
        let sram_size = map.sram.size_bytes()?;
        let mut mmu = Self::with_regions(map.code.base, code_size, map.sram.base, sram_size);

        for p_cfg in &map.peripherals {
            let dev: Box<dyn Peripheral> = match p_cfg.r#type.as_str() {
                "stub" => {
                    let value = p_cfg
                        .config
                        .get("value")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0);
                    Box::new(StubPeripheral::new(value as u32))
                }
                other => {
                    tracing::warn!(
                        "Unsupported peripheral type '{}' for id '{}'; skipping",
                        other,
                        p_cfg.id
                    );
                    continue;
                }
            };

            let size = if let Some(size) = &p_cfg.size {
                parse_size(size)?
            } else {
                DEFAULT_PERIPHERAL_SIZE
            };
            let size = u32::try_from(size)
                .with_context(|| format!("Peripheral '{}' window is too large", p_cfg.id))?;

            mmu.register(PeripheralEntry::new(
                p_cfg.id.clone(),
                p_cfg.base_address,
                size,
                dev,
            ))
            .with_context(|| format!("Failed to map peripheral '{}'", p_cfg.id))?;
        }

        Ok(mmu)
    }

    /// Maps a peripheral. Fails without touching the registry when its window
    /// intersects one that is already registered.
    pub fn register(&mut self, entry: PeripheralEntry) -> Result<(), ConflictError> {
        if let Some(existing) = self
            .peripherals
            .iter()
            .find(|p| p.range.intersects(&entry.range))
        {
            return Err(ConflictError {
                new: entry.name,
                new_range: entry.range,
                existing: existing.name.clone(),
                existing_range: existing.range,
            });
        }

        tracing::debug!("Mapped peripheral '{}' at {}", entry.name, entry.range);
        self.peripherals.push(entry);
        Ok(())
    }

    pub fn peripherals(&self) -> &[PeripheralEntry] {
        &self.peripherals
    }

    fn resolve(&self, addr: u32) -> Target {
        if self.code.contains(addr) {
            return Target::Code;
        }
        if self.sram.contains(addr) {
            return Target::Sram;
        }
        match self.peripherals.iter().position(|p| p.range.contains(addr)) {
            Some(idx) => Target::Peripheral(idx),
            None => Target::Unmapped,
        }
    }

    pub fn read8(&self, addr: u32) -> u8 {
        match self.resolve(addr) {
            Target::Code => self.code.read(addr, 1) as u8,
            Target::Sram => self.sram.read(addr, 1) as u8,
            Target::Peripheral(idx) => {
                let p = &self.peripherals[idx];
                p.dev.read_u8(p.offset(addr))
            }
            Target::Unmapped => {
                tracing::trace!("Unmapped read8 at {:#010x}", addr);
                0
            }
        }
    }

    pub fn read16(&self, addr: u32) -> u16 {
        match self.resolve(addr) {
            Target::Code => self.code.read(addr, 2) as u16,
            Target::Sram => self.sram.read(addr, 2) as u16,
            Target::Peripheral(idx) => {
                let p = &self.peripherals[idx];
                p.dev.read_u16(p.offset(addr))
            }
            Target::Unmapped => {
                tracing::trace!("Unmapped read16 at {:#010x}", addr);
                0
            }
        }
    }

    pub fn read32(&self, addr: u32) -> u32 {
        match self.resolve(addr) {
            Target::Code => self.code.read(addr, 4),
            Target::Sram => self.sram.read(addr, 4),
            Target::Peripheral(idx) => {
                let p = &self.peripherals[idx];
                p.dev.read_u32(p.offset(addr))
            }
            Target::Unmapped => {
                tracing::trace!("Unmapped read32 at {:#010x}", addr);
                0
            }
        }
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        match self.resolve(addr) {
            Target::Code => self.code.write(addr, 1, value as u32),
            Target::Sram => self.sram.write(addr, 1, value as u32),
            Target::Peripheral(idx) => {
                let p = &mut self.peripherals[idx];
                let offset = p.offset(addr);
                p.dev.write_u8(offset, value);
            }
            Target::Unmapped => {
                tracing::trace!("Dropped write8 {:#04x} at {:#010x}", value, addr);
            }
        }
    }

    pub fn write16(&mut self, addr: u32, value: u16) {
        match self.resolve(addr) {
            Target::Code => self.code.write(addr, 2, value as u32),
            Target::Sram => self.sram.write(addr, 2, value as u32),
            Target::Peripheral(idx) => {
                let p = &mut self.peripherals[idx];
                let offset = p.offset(addr);
                p.dev.write_u16(offset, value);
            }
            Target::Unmapped => {
                tracing::trace!("Dropped write16 {:#06x} at {:#010x}", value, addr);
            }
        }
    }

    pub fn write32(&mut self, addr: u32, value: u32) {
        match self.resolve(addr) {
            Target::Code => self.code.write(addr, 4, value),
            Target::Sram => self.sram.write(addr, 4, value),
            Target::Peripheral(idx) => {
                let p = &mut self.peripherals[idx];
                let offset = p.offset(addr);
                p.dev.write_u32(offset, value);
            }
            Target::Unmapped => {
                tracing::trace!("Dropped write32 {:#010x} at {:#010x}", value, addr);
            }
        }
    }

    /// Copies a raw image byte by byte through the normal write path.
    pub fn load_bytes(&mut self, addr: u32, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write8(addr.wrapping_add(i as u32), *byte);
        }
    }
}
