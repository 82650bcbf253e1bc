// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::cpu::registers::Psr;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MachineSnapshot {
    pub cpu: CpuSnapshot,
    pub peripherals: HashMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CpuSnapshot {
    /// R0-R15, with R15 as the pipeline-visible PC.
    pub registers: Vec<u32>,
    /// Address of the next instruction.
    pub pc: u32,
    pub xpsr: u32,
}

impl CpuSnapshot {
    fn psr(&self) -> Psr {
        Psr::from_bits_truncate(self.xpsr)
    }

    pub fn n(&self) -> bool {
        self.psr().contains(Psr::N)
    }

    pub fn z(&self) -> bool {
        self.psr().contains(Psr::Z)
    }

    pub fn c(&self) -> bool {
        self.psr().contains(Psr::C)
    }

    pub fn v(&self) -> bool {
        self.psr().contains(Psr::V)
    }

    pub fn t(&self) -> bool {
        self.psr().contains(Psr::T)
    }
}

impl fmt::Display for CpuSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.registers.iter().enumerate() {
            let name = match i {
                13 => "SP".to_string(),
                14 => "LR".to_string(),
                15 => "R15".to_string(),
                _ => format!("R{}", i),
            };
            write!(f, "{:>3}={:#010x}", name, value)?;
            if i % 4 == 3 {
                writeln!(f)?;
            } else {
                f.write_str("  ")?;
            }
        }
        let flag = |on: bool, c: char| if on { c } else { '-' };
        write!(
            f,
            " PC={:#010x}  flags={}{}{}{}  T={}",
            self.pc,
            flag(self.n(), 'N'),
            flag(self.z(), 'Z'),
            flag(self.c(), 'C'),
            flag(self.v(), 'V'),
            self.t() as u8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_registers_and_flags() {
        let mut registers = vec![0u32; 16];
        registers[0] = 13;
        registers[15] = 0x60;
        let snap = CpuSnapshot {
            registers,
            pc: 0x5E,
            xpsr: (Psr::Z | Psr::T).bits(),
        };
        let text = snap.to_string();
        assert!(text.contains(" R0=0x0000000d"));
        assert!(text.contains("R15=0x00000060"));
        assert!(text.contains("PC=0x0000005e"));
        assert!(text.contains("flags=-Z--"));
        assert!(text.contains("T=1"));
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let snap = CpuSnapshot {
            registers: vec![1; 16],
            pc: 0x100,
            xpsr: Psr::T.bits(),
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["pc"], 0x100);
        assert_eq!(json["registers"].as_array().unwrap().len(), 16);
        let back: CpuSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snap);
    }
}
