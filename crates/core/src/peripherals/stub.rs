// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::collections::HashMap;

/// A word-register block that reads back the last value written to each
/// word, or a fixed default for words never written.
#[derive(Debug, serde::Serialize)]
pub struct StubPeripheral {
    pub values: HashMap<u32, u32>, // word offset -> value
    pub default_val: u32,
}

impl StubPeripheral {
    pub fn new(default_val: u32) -> Self {
        Self {
            values: HashMap::new(),
            default_val,
        }
    }

    fn word(&self, offset: u32) -> u32 {
        self.values
            .get(&(offset & !3))
            .copied()
            .unwrap_or(self.default_val)
    }
}

impl crate::Peripheral for StubPeripheral {
    fn read_u8(&self, offset: u32) -> u8 {
        let shift = (offset & 3) * 8;
        (self.word(offset) >> shift) as u8
    }

    fn write_u8(&mut self, offset: u32, value: u8) {
        let shift = (offset & 3) * 8;
        let word = (self.word(offset) & !(0xFF << shift)) | ((value as u32) << shift);
        self.values.insert(offset & !3, word);
    }

    fn read_u32(&self, offset: u32) -> u32 {
        if offset & 3 == 0 {
            self.word(offset)
        } else {
            let b = |i: u32| self.read_u8(offset.wrapping_add(i)) as u32;
            b(0) | (b(1) << 8) | (b(2) << 16) | (b(3) << 24)
        }
    }

    fn write_u32(&mut self, offset: u32, value: u32) {
        if offset & 3 == 0 {
            self.values.insert(offset, value);
        } else {
            for i in 0..4 {
                self.write_u8(offset.wrapping_add(i), (value >> (8 * i)) as u8);
            }
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    #[test]
    fn test_stub_default_and_latch() {
        let mut stub = StubPeripheral::new(0x42);
        assert_eq!(stub.read_u32(0x10), 0x42);
        assert_eq!(stub.read_u8(0x10), 0x42);
        assert_eq!(stub.read_u8(0x11), 0x00);

        stub.write_u32(0x10, 0xDEAD_BEEF);
        assert_eq!(stub.read_u32(0x10), 0xDEAD_BEEF);
        assert_eq!(stub.read_u16(0x12), 0xDEAD);

        stub.write_u8(0x13, 0x11);
        assert_eq!(stub.read_u32(0x10), 0x11AD_BEEF);
        // Neighbouring words keep the default
        assert_eq!(stub.read_u32(0x14), 0x42);
    }
}
