// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use bitflags::bitflags;

pub const SP: u8 = 13;
pub const LR: u8 = 14;
pub const PC: u8 = 15;

bitflags! {
    /// Condition and state bits, laid out as in the xPSR.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Psr: u32 {
        const N = 1 << 31;
        const Z = 1 << 30;
        const C = 1 << 29;
        const V = 1 << 28;
        const T = 1 << 24;
    }
}

/// R0-R15 plus flags.
///
/// `pc` is the address of the next halfword to retire; `r[15]` is the value
/// an instruction sees when it reads the PC, which runs two halfwords ahead
/// of the retiring instruction. Between instructions `r[15] == pc + 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterFile {
    r: [u32; 16],
    pub pc: u32,
    pub psr: Psr,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            r: [0; 16],
            pc: 0,
            psr: Psr::T,
        }
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn read(&self, n: u8) -> u32 {
        self.r[(n & 0xF) as usize]
    }

    /// Raw register write. Writes to R15 go through the CPU's branch path so
    /// the pipeline is re-seeded; this only stores the value.
    #[inline(always)]
    pub fn write(&mut self, n: u8, val: u32) {
        self.r[(n & 0xF) as usize] = val;
    }

    pub fn sp(&self) -> u32 {
        self.r[SP as usize]
    }

    pub fn set_sp(&mut self, val: u32) {
        self.r[SP as usize] = val;
    }

    pub fn lr(&self) -> u32 {
        self.r[LR as usize]
    }

    pub fn set_lr(&mut self, val: u32) {
        self.r[LR as usize] = val;
    }

    /// Pipeline-visible PC (R15).
    pub fn visible_pc(&self) -> u32 {
        self.r[PC as usize]
    }

    pub fn all(&self) -> &[u32; 16] {
        &self.r
    }

    /// Points the fetch pointer at `addr` and re-establishes the R15 offset.
    pub fn set_fetch_address(&mut self, addr: u32) {
        self.pc = addr;
        self.r[PC as usize] = addr.wrapping_add(2);
    }

    /// Retires one halfword: both PC views move forward in lockstep.
    pub fn advance(&mut self) {
        self.set_fetch_address(self.pc.wrapping_add(2));
    }

    pub fn n(&self) -> bool {
        self.psr.contains(Psr::N)
    }

    pub fn z(&self) -> bool {
        self.psr.contains(Psr::Z)
    }

    pub fn c(&self) -> bool {
        self.psr.contains(Psr::C)
    }

    pub fn v(&self) -> bool {
        self.psr.contains(Psr::V)
    }

    pub fn t(&self) -> bool {
        self.psr.contains(Psr::T)
    }

    pub fn set_n(&mut self, on: bool) {
        self.psr.set(Psr::N, on);
    }

    pub fn set_z(&mut self, on: bool) {
        self.psr.set(Psr::Z, on);
    }

    pub fn set_c(&mut self, on: bool) {
        self.psr.set(Psr::C, on);
    }

    pub fn set_v(&mut self, on: bool) {
        self.psr.set(Psr::V, on);
    }

    pub fn set_t(&mut self, on: bool) {
        self.psr.set(Psr::T, on);
    }

    pub fn update_nz(&mut self, result: u32) {
        self.set_n(result & 0x8000_0000 != 0);
        self.set_z(result == 0);
    }

    pub fn update_nzc(&mut self, result: u32, carry: bool) {
        self.update_nz(result);
        self.set_c(carry);
    }

    pub fn update_nzcv(&mut self, result: u32, carry: bool, overflow: bool) {
        self.update_nz(result);
        self.set_c(carry);
        self.set_v(overflow);
    }

    /// Evaluates a 4-bit condition code against the current flags.
    /// `0xE` (AL) is always true; `0xF` is never true.
    #[inline(always)]
    pub fn check_condition(&self, cond: u8) -> bool {
        let n = self.n();
        let z = self.z();
        let c = self.c();
        let v = self.v();

        match cond {
            0x0 => z,              // EQ (Equal)
            0x1 => !z,             // NE (Not Equal)
            0x2 => c,              // CS/HS (Carry Set)
            0x3 => !c,             // CC/LO (Carry Clear)
            0x4 => n,              // MI (Minus)
            0x5 => !n,             // PL (Plus)
            0x6 => v,              // VS (Overflow)
            0x7 => !v,             // VC (No Overflow)
            0x8 => c && !z,        // HI (Unsigned Higher)
            0x9 => !c || z,        // LS (Unsigned Lower or Same)
            0xA => n == v,         // GE (Signed Greater or Equal)
            0xB => n != v,         // LT (Signed Less Than)
            0xC => !z && (n == v), // GT (Signed Greater Than)
            0xD => z || (n != v),  // LE (Signed Less or Equal)
            0xE => true,           // AL
            _ => false,
        }
    }
}
