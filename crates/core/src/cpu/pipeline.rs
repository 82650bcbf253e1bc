// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::mmu::Mmu;

/// Two-deep prefetch queue of raw halfwords.
///
/// Between instructions `slots == [mem16(pc), mem16(pc + 2)]` for the fetch
/// pointer held by the register file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pipeline {
    slots: [u16; 2],
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards both slots and refetches from `pc`.
    pub fn fill(&mut self, mmu: &Mmu, pc: u32) {
        self.slots = [mmu.read16(pc), mmu.read16(pc.wrapping_add(2))];
    }

    /// Hands out the oldest slot and refills the tail from `refill_addr`.
    pub fn advance(&mut self, mmu: &Mmu, refill_addr: u32) -> u16 {
        let retiring = self.slots[0];
        self.slots = [self.slots[1], mmu.read16(refill_addr)];
        retiring
    }

    pub fn peek(&self) -> u16 {
        self.slots[0]
    }

    pub fn slots(&self) -> [u16; 2] {
        self.slots
    }
}
