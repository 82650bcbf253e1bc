// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Carry/overflow identities and barrel-shifter helpers.
//!
//! The flag primitives only look at the sign bits of the operands `a`, `b`
//! and the result `c`. They hold for ADC/SBC as well, since the carry-in only
//! shows up through the result's sign bit.

#[inline(always)]
pub fn neg(x: u32) -> bool {
    x & 0x8000_0000 != 0
}

#[inline(always)]
pub fn pos(x: u32) -> bool {
    !neg(x)
}

pub fn add_carry(a: u32, b: u32, c: u32) -> bool {
    (neg(a) && neg(b)) || (neg(a) && pos(c)) || (neg(b) && pos(c))
}

pub fn add_overflow(a: u32, b: u32, c: u32) -> bool {
    (neg(a) && neg(b) && pos(c)) || (pos(a) && pos(b) && neg(c))
}

pub fn sub_carry(a: u32, b: u32, c: u32) -> bool {
    (neg(a) && pos(b)) || (neg(a) && pos(c)) || (pos(b) && pos(c))
}

pub fn sub_overflow(a: u32, b: u32, c: u32) -> bool {
    (neg(a) && pos(b) && pos(c)) || (pos(a) && neg(b) && neg(c))
}

/// Result and flags of an add/subtract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddResult {
    pub value: u32,
    pub carry: bool,
    pub overflow: bool,
}

/// `a + b + carry_in`.
pub fn add_with_carry(a: u32, b: u32, carry_in: bool) -> AddResult {
    let value = a.wrapping_add(b).wrapping_add(carry_in as u32);
    AddResult {
        value,
        carry: add_carry(a, b, value),
        overflow: add_overflow(a, b, value),
    }
}

/// `a - b - !carry_in`. With `carry_in == true` this is a plain subtraction.
pub fn sub_with_carry(a: u32, b: u32, carry_in: bool) -> AddResult {
    let value = a.wrapping_sub(b).wrapping_sub((!carry_in) as u32);
    AddResult {
        value,
        carry: sub_carry(a, b, value),
        overflow: sub_overflow(a, b, value),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

/// Shift by a register amount (`Rs[7:0]`).
///
/// An amount of zero leaves both the value and the carry untouched. Amounts
/// of 32 and above follow the architectural results: LSL/LSR yield zero with
/// the last bit shifted out (or 0 past 32), ASR fills with the sign bit, and
/// ROR reduces modulo 32.
pub fn shift_by_register(op: ShiftOp, value: u32, amount: u32, carry_in: bool) -> (u32, bool) {
    let amount = amount & 0xFF;
    if amount == 0 {
        return (value, carry_in);
    }
    match op {
        ShiftOp::Lsl => match amount {
            1..=31 => (value << amount, (value >> (32 - amount)) & 1 != 0),
            32 => (0, value & 1 != 0),
            _ => (0, false),
        },
        ShiftOp::Lsr => match amount {
            1..=31 => (value >> amount, (value >> (amount - 1)) & 1 != 0),
            32 => (0, neg(value)),
            _ => (0, false),
        },
        ShiftOp::Asr => match amount {
            1..=31 => (
                ((value as i32) >> amount) as u32,
                (value >> (amount - 1)) & 1 != 0,
            ),
            _ => (((value as i32) >> 31) as u32, neg(value)),
        },
        ShiftOp::Ror => {
            let rot = amount & 31;
            let result = value.rotate_right(rot);
            (result, neg(result))
        }
    }
}

/// Shift by a 5-bit immediate as encoded by the shifted-register format.
///
/// `imm5 == 0` means LSL #0 (carry preserved) or LSR/ASR #32.
pub fn shift_by_immediate(op: ShiftOp, value: u32, imm5: u8, carry_in: bool) -> (u32, bool) {
    match (op, imm5) {
        (ShiftOp::Lsl, 0) => (value, carry_in),
        (ShiftOp::Lsr, 0) | (ShiftOp::Asr, 0) => shift_by_register(op, value, 32, carry_in),
        _ => shift_by_register(op, value, imm5 as u32 & 0x1F, carry_in),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(b: bool) -> u32 {
        if b {
            0x8000_0000
        } else {
            0
        }
    }

    /// Reference carry/overflow computed with 64-bit precision.
    fn wide_add(a: u32, b: u32) -> (bool, bool) {
        let wide = a as u64 + b as u64;
        let signed = a as i32 as i64 + b as i32 as i64;
        (wide > u32::MAX as u64, signed != signed as i32 as i64)
    }

    fn wide_sub(a: u32, b: u32) -> (bool, bool) {
        let signed = a as i32 as i64 - b as i32 as i64;
        (a >= b, signed != signed as i32 as i64)
    }

    #[test]
    fn test_primitives_match_wide_arithmetic_on_sign_combinations() {
        // Every sign combination of a and b, with low bits chosen so that the
        // result's sign varies too.
        let lows = [0u32, 1, 0x7FFF_FFFF, 0x4000_0000, 0x3FFF_FFFF];
        for sa in [false, true] {
            for sb in [false, true] {
                for &la in &lows {
                    for &lb in &lows {
                        let a = sign(sa) | (la & 0x7FFF_FFFF);
                        let b = sign(sb) | (lb & 0x7FFF_FFFF);

                        let sum = a.wrapping_add(b);
                        assert_eq!(
                            (add_carry(a, b, sum), add_overflow(a, b, sum)),
                            wide_add(a, b),
                            "add {:#x} {:#x}",
                            a,
                            b
                        );

                        let diff = a.wrapping_sub(b);
                        assert_eq!(
                            (sub_carry(a, b, diff), sub_overflow(a, b, diff)),
                            wide_sub(a, b),
                            "sub {:#x} {:#x}",
                            a,
                            b
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_primitives_spot_checks() {
        let cases = [
            (0u32, 0u32),
            (1, 1),
            (0xFFFF_FFFF, 1),
            (0x7FFF_FFFF, 1),
            (0x8000_0000, 0x8000_0000),
            (0x8000_0000, 1),
            (12, 1),
            (0x1234_5678, 0x9ABC_DEF0),
            (0xDEAD_BEEF, 0xDEAD_BEEF),
        ];
        for (a, b) in cases {
            let sum = a.wrapping_add(b);
            assert_eq!((add_carry(a, b, sum), add_overflow(a, b, sum)), wide_add(a, b));
            let diff = a.wrapping_sub(b);
            assert_eq!((sub_carry(a, b, diff), sub_overflow(a, b, diff)), wide_sub(a, b));
        }
    }

    #[test]
    fn test_add_with_carry_in() {
        let r = add_with_carry(0xFFFF_FFFF, 0, true);
        assert_eq!(r.value, 0);
        assert!(r.carry);
        assert!(!r.overflow);

        let r = add_with_carry(0x7FFF_FFFF, 0, true);
        assert_eq!(r.value, 0x8000_0000);
        assert!(!r.carry);
        assert!(r.overflow);
    }

    #[test]
    fn test_sub_with_borrow() {
        // 5 - 3 with carry clear borrows one more
        let r = sub_with_carry(5, 3, false);
        assert_eq!(r.value, 1);
        assert!(r.carry);

        let r = sub_with_carry(0, 0, false);
        assert_eq!(r.value, 0xFFFF_FFFF);
        assert!(!r.carry);
        assert!(!r.overflow);

        let r = sub_with_carry(0x8000_0000, 1, true);
        assert_eq!(r.value, 0x7FFF_FFFF);
        assert!(r.carry);
        assert!(r.overflow);
    }

    #[test]
    fn test_register_shift_edge_amounts() {
        let v = 0x8000_0001;
        assert_eq!(shift_by_register(ShiftOp::Lsl, v, 0, true), (v, true));
        assert_eq!(shift_by_register(ShiftOp::Lsl, v, 1, false), (0x2, true));
        assert_eq!(shift_by_register(ShiftOp::Lsl, v, 32, false), (0, true));
        assert_eq!(shift_by_register(ShiftOp::Lsl, v, 33, true), (0, false));

        assert_eq!(shift_by_register(ShiftOp::Lsr, v, 1, false), (0x4000_0000, true));
        assert_eq!(shift_by_register(ShiftOp::Lsr, v, 32, false), (0, true));
        assert_eq!(shift_by_register(ShiftOp::Lsr, v, 40, true), (0, false));

        assert_eq!(shift_by_register(ShiftOp::Asr, v, 1, false), (0xC000_0000, true));
        assert_eq!(shift_by_register(ShiftOp::Asr, v, 32, false), (0xFFFF_FFFF, true));
        assert_eq!(shift_by_register(ShiftOp::Asr, 0x7000_0000, 200, true), (0, false));

        assert_eq!(shift_by_register(ShiftOp::Ror, v, 1, false), (0xC000_0000, true));
        assert_eq!(shift_by_register(ShiftOp::Ror, v, 32, false), (v, true));
        assert_eq!(shift_by_register(ShiftOp::Ror, 0x10, 36, true), (0x1, false));
    }

    #[test]
    fn test_only_low_byte_of_amount_counts() {
        assert_eq!(shift_by_register(ShiftOp::Lsl, 1, 0x100, false), (1, false));
        assert_eq!(shift_by_register(ShiftOp::Lsl, 1, 0x104, false), (0x10, false));
    }

    #[test]
    fn test_immediate_shift_zero_encodings() {
        assert_eq!(shift_by_immediate(ShiftOp::Lsl, 0xF0, 0, true), (0xF0, true));
        assert_eq!(
            shift_by_immediate(ShiftOp::Lsr, 0x8000_0000, 0, false),
            (0, true)
        );
        assert_eq!(
            shift_by_immediate(ShiftOp::Asr, 0x8000_0000, 0, false),
            (0xFFFF_FFFF, true)
        );
        assert_eq!(shift_by_immediate(ShiftOp::Lsr, 0x3, 1, false), (0x1, true));
    }
}
