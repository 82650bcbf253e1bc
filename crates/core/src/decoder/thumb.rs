// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::alu::ShiftOp;
use crate::{SimResult, SimulationError};
use std::fmt;

/// Encoding class a halfword falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Nop,
    ChangeProcessorState,
    WaitFor,
    SendEvent,
    Barrier,
    SupervisorCall,
    Breakpoint,
    Extend,
    AddOffsetToSp,
    PushPop,
    AluOperation,
    HiRegisterOps,
    PcRelativeLoad,
    LoadStoreRegisterOffset,
    LoadStoreSignExtended,
    AddSubtract,
    UnconditionalBranch,
    LongBranchWithLink,
    LoadStoreHalfword,
    SpRelativeLoadStore,
    LoadAddress,
    MultipleLoadStore,
    ConditionalBranch,
    MoveCompareAddSubImm,
    MoveShiftedRegister,
    LoadStoreImmediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeEntry {
    pub mask: u16,
    pub bits: u16,
    pub format: Format,
}

const fn entry(mask: u16, bits: u16, format: Format) -> DecodeEntry {
    DecodeEntry { mask, bits, format }
}

/// Tested top to bottom, first match wins. Literal encodings come first,
/// then progressively wider masks. Several later entries would also match
/// the encodings claimed above them (SVC inside the conditional branch
/// space, the barrier prefix inside BL, ADD/SUB inside the shift space).
pub const DECODE_TABLE: &[DecodeEntry] = &[
    entry(0xFFFF, 0xBF00, Format::Nop),
    entry(0xFFEF, 0xB662, Format::ChangeProcessorState), // CPSIE i / CPSID i
    entry(0xFFEF, 0xBF20, Format::WaitFor),              // WFE / WFI
    entry(0xFFFF, 0xBF40, Format::SendEvent),
    entry(0xFFFF, 0xF3BF, Format::Barrier), // DMB/DSB/ISB first halfword
    entry(0xFF00, 0xDF00, Format::SupervisorCall),
    entry(0xFF00, 0xBE00, Format::Breakpoint),
    entry(0xFF00, 0xB200, Format::Extend),
    entry(0xFF00, 0xB000, Format::AddOffsetToSp),
    entry(0xF600, 0xB400, Format::PushPop),
    entry(0xFC00, 0x4000, Format::AluOperation),
    entry(0xFC00, 0x4400, Format::HiRegisterOps),
    entry(0xF800, 0x4800, Format::PcRelativeLoad),
    entry(0xF200, 0x5000, Format::LoadStoreRegisterOffset),
    entry(0xF200, 0x5200, Format::LoadStoreSignExtended),
    entry(0xF800, 0x1800, Format::AddSubtract),
    entry(0xF800, 0xE000, Format::UnconditionalBranch),
    entry(0xF800, 0xF000, Format::LongBranchWithLink),
    entry(0xF000, 0x8000, Format::LoadStoreHalfword),
    entry(0xF000, 0x9000, Format::SpRelativeLoadStore),
    entry(0xF000, 0xA000, Format::LoadAddress),
    entry(0xF000, 0xC000, Format::MultipleLoadStore),
    entry(0xF000, 0xD000, Format::ConditionalBranch),
    entry(0xE000, 0x2000, Format::MoveCompareAddSubImm),
    entry(0xE000, 0x0000, Format::MoveShiftedRegister),
    entry(0xE000, 0x6000, Format::LoadStoreImmediate),
];

pub fn classify(raw: u16) -> Option<Format> {
    DECODE_TABLE
        .iter()
        .find(|e| raw & e.mask == e.bits)
        .map(|e| e.format)
}

/// Recognised encodings the core deliberately does not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Nop,
    ChangeProcessorState,
    WaitForEvent,
    WaitForInterrupt,
    SendEvent,
    Barrier,
    SupervisorCall,
    Breakpoint,
    SignZeroExtend,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::Nop => "NOP",
            Feature::ChangeProcessorState => "CPSIE/CPSID",
            Feature::WaitForEvent => "WFE",
            Feature::WaitForInterrupt => "WFI",
            Feature::SendEvent => "SEV",
            Feature::Barrier => "DMB/DSB/ISB",
            Feature::SupervisorCall => "SVC",
            Feature::Breakpoint => "BKPT",
            Feature::SignZeroExtend => "SXTH/SXTB/UXTH/UXTB",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmOp {
    Mov,
    Cmp,
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    And,
    Eor,
    Lsl,
    Lsr,
    Asr,
    Adc,
    Sbc,
    Ror,
    Tst,
    Neg,
    Cmp,
    Cmn,
    Orr,
    Mul,
    Bic,
    Mvn,
}

impl AluOp {
    const ALL: [AluOp; 16] = [
        AluOp::And,
        AluOp::Eor,
        AluOp::Lsl,
        AluOp::Lsr,
        AluOp::Asr,
        AluOp::Adc,
        AluOp::Sbc,
        AluOp::Ror,
        AluOp::Tst,
        AluOp::Neg,
        AluOp::Cmp,
        AluOp::Cmn,
        AluOp::Orr,
        AluOp::Mul,
        AluOp::Bic,
        AluOp::Mvn,
    ];

    pub fn from_bits(bits: u16) -> Self {
        Self::ALL[(bits & 0xF) as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiOp {
    Add,
    Cmp,
    Mov,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemOp {
    Str,
    Strb,
    Strh,
    Ldr,
    Ldrb,
    Ldrh,
    Ldrsb,
    Ldrsh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(u8),
    Imm(u32),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    Unimplemented(Feature),

    ShiftImm {
        op: ShiftOp,
        rd: u8,
        rm: u8,
        imm5: u8,
    }, // LSL/LSR/ASR Rd, Rm, #imm5
    AddSub {
        sub: bool,
        rd: u8,
        rn: u8,
        operand: Operand,
    }, // ADD/SUB Rd, Rn, Rm|#imm3
    ImmOp {
        op: ImmOp,
        rd: u8,
        imm: u8,
    }, // MOV/CMP/ADD/SUB Rd, #imm8
    Alu {
        op: AluOp,
        rd: u8,
        rm: u8,
    }, // <op> Rd, Rm
    HiReg {
        op: HiOp,
        rd: u8,
        rm: u8,
    }, // ADD/CMP/MOV across R0-R15
    BranchExchange {
        rm: u8,
        link: bool,
    }, // BX/BLX Rm
    LdrLiteral {
        rt: u8,
        imm: u32,
    }, // LDR Rt, [PC, #imm]
    LoadStore {
        op: MemOp,
        rt: u8,
        rn: u8,
        offset: Operand,
    }, // <op> Rt, [Rn, Rm|#imm]
    LoadAddress {
        rd: u8,
        from_sp: bool,
        imm: u32,
    }, // ADR Rd / ADD Rd, SP, #imm
    AdjustSp {
        sub: bool,
        imm: u32,
    }, // ADD/SUB SP, SP, #imm
    Push {
        registers: u8,
        lr: bool,
    },
    Pop {
        registers: u8,
        pc: bool,
    },
    Stm {
        rn: u8,
        registers: u8,
    }, // STMIA Rn!, {list}
    Ldm {
        rn: u8,
        registers: u8,
    }, // LDMIA Rn{!}, {list}
    BranchCond {
        cond: u8,
        offset: i32,
    }, // Bcc <label>
    Branch {
        offset: i32,
    }, // B <label>
    BlPrefix {
        high: u16,
    }, // first half of BL; the second half is taken from the prefetch queue
}

fn low_reg(raw: u16, shift: u32) -> u8 {
    ((raw >> shift) & 0x7) as u8
}

/// Decodes one halfword through the ordered dispatch table.
pub fn decode_thumb_16(raw: u16) -> SimResult<Instruction> {
    let format = classify(raw).ok_or(SimulationError::UnknownInstruction { raw })?;

    let instruction = match format {
        Format::Nop => Instruction::Unimplemented(Feature::Nop),
        Format::ChangeProcessorState => Instruction::Unimplemented(Feature::ChangeProcessorState),
        Format::WaitFor => {
            if raw & 0x0010 == 0 {
                Instruction::Unimplemented(Feature::WaitForEvent)
            } else {
                Instruction::Unimplemented(Feature::WaitForInterrupt)
            }
        }
        Format::SendEvent => Instruction::Unimplemented(Feature::SendEvent),
        Format::Barrier => Instruction::Unimplemented(Feature::Barrier),
        Format::SupervisorCall => Instruction::Unimplemented(Feature::SupervisorCall),
        Format::Breakpoint => Instruction::Unimplemented(Feature::Breakpoint),
        Format::Extend => Instruction::Unimplemented(Feature::SignZeroExtend),

        // 1011 0000 S iiiiiii
        Format::AddOffsetToSp => Instruction::AdjustSp {
            sub: raw & 0x0080 != 0,
            imm: ((raw & 0x7F) as u32) << 2,
        },

        // 1011 L10R llllllll
        Format::PushPop => {
            let registers = (raw & 0xFF) as u8;
            let extra = raw & 0x0100 != 0;
            if raw & 0x0800 != 0 {
                Instruction::Pop {
                    registers,
                    pc: extra,
                }
            } else {
                Instruction::Push {
                    registers,
                    lr: extra,
                }
            }
        }

        // 0100 00 oooo sss ddd
        Format::AluOperation => Instruction::Alu {
            op: AluOp::from_bits(raw >> 6),
            rd: low_reg(raw, 0),
            rm: low_reg(raw, 3),
        },

        // 0100 01 oo H1 H2 sss ddd
        Format::HiRegisterOps => {
            let rm = ((raw >> 3) & 0xF) as u8;
            let h1 = (raw >> 7) & 1;
            let rd = ((h1 << 3) as u8) | low_reg(raw, 0);
            match (raw >> 8) & 0x3 {
                0 => Instruction::HiReg {
                    op: HiOp::Add,
                    rd,
                    rm,
                },
                1 => Instruction::HiReg {
                    op: HiOp::Cmp,
                    rd,
                    rm,
                },
                2 => Instruction::HiReg {
                    op: HiOp::Mov,
                    rd,
                    rm,
                },
                _ => Instruction::BranchExchange { rm, link: h1 == 1 },
            }
        }

        // 0100 1 ddd iiiiiiii
        Format::PcRelativeLoad => Instruction::LdrLiteral {
            rt: low_reg(raw, 8),
            imm: ((raw & 0xFF) as u32) << 2,
        },

        // 0101 LB0 ooo bbb ddd
        Format::LoadStoreRegisterOffset => {
            let op = match (raw >> 10) & 0x3 {
                0 => MemOp::Str,
                1 => MemOp::Strb,
                2 => MemOp::Ldr,
                _ => MemOp::Ldrb,
            };
            Instruction::LoadStore {
                op,
                rt: low_reg(raw, 0),
                rn: low_reg(raw, 3),
                offset: Operand::Reg(low_reg(raw, 6)),
            }
        }

        // 0101 HS1 ooo bbb ddd
        Format::LoadStoreSignExtended => {
            let op = match (raw >> 10) & 0x3 {
                0 => MemOp::Strh,
                1 => MemOp::Ldrsb,
                2 => MemOp::Ldrh,
                _ => MemOp::Ldrsh,
            };
            Instruction::LoadStore {
                op,
                rt: low_reg(raw, 0),
                rn: low_reg(raw, 3),
                offset: Operand::Reg(low_reg(raw, 6)),
            }
        }

        // 0001 1 I S nnn sss ddd
        Format::AddSubtract => {
            let field = low_reg(raw, 6);
            let operand = if raw & 0x0400 != 0 {
                Operand::Imm(field as u32)
            } else {
                Operand::Reg(field)
            };
            Instruction::AddSub {
                sub: raw & 0x0200 != 0,
                rd: low_reg(raw, 0),
                rn: low_reg(raw, 3),
                operand,
            }
        }

        // 1110 0 iiiiiiiiiii
        Format::UnconditionalBranch => Instruction::Branch {
            offset: ((((raw & 0x7FF) as u32) << 21) as i32) >> 20,
        },

        // 1111 0 S iiiiiiiiii
        Format::LongBranchWithLink => Instruction::BlPrefix { high: raw },

        // 1000 L iiiii bbb ddd
        Format::LoadStoreHalfword => Instruction::LoadStore {
            op: if raw & 0x0800 != 0 {
                MemOp::Ldrh
            } else {
                MemOp::Strh
            },
            rt: low_reg(raw, 0),
            rn: low_reg(raw, 3),
            offset: Operand::Imm((((raw >> 6) & 0x1F) as u32) << 1),
        },

        // 1001 L ddd iiiiiiii
        Format::SpRelativeLoadStore => Instruction::LoadStore {
            op: if raw & 0x0800 != 0 {
                MemOp::Ldr
            } else {
                MemOp::Str
            },
            rt: low_reg(raw, 8),
            rn: crate::cpu::registers::SP,
            offset: Operand::Imm(((raw & 0xFF) as u32) << 2),
        },

        // 1010 S ddd iiiiiiii
        Format::LoadAddress => Instruction::LoadAddress {
            rd: low_reg(raw, 8),
            from_sp: raw & 0x0800 != 0,
            imm: ((raw & 0xFF) as u32) << 2,
        },

        // 1100 L bbb llllllll
        Format::MultipleLoadStore => {
            let rn = low_reg(raw, 8);
            let registers = (raw & 0xFF) as u8;
            if raw & 0x0800 != 0 {
                Instruction::Ldm { rn, registers }
            } else {
                Instruction::Stm { rn, registers }
            }
        }

        // 1101 cccc iiiiiiii
        Format::ConditionalBranch => {
            let cond = ((raw >> 8) & 0xF) as u8;
            if cond == 0xE {
                // Permanently undefined (UDF); 0xF is claimed by SVC above
                return Err(SimulationError::UnsupportedSubOperation { format, raw });
            }
            Instruction::BranchCond {
                cond,
                offset: ((((raw & 0xFF) as u32) << 24) as i32) >> 23,
            }
        }

        // 001 oo ddd iiiiiiii
        Format::MoveCompareAddSubImm => {
            let op = match (raw >> 11) & 0x3 {
                0 => ImmOp::Mov,
                1 => ImmOp::Cmp,
                2 => ImmOp::Add,
                _ => ImmOp::Sub,
            };
            Instruction::ImmOp {
                op,
                rd: low_reg(raw, 8),
                imm: (raw & 0xFF) as u8,
            }
        }

        // 000 oo iiiii sss ddd
        Format::MoveShiftedRegister => {
            let op = match (raw >> 11) & 0x3 {
                0 => ShiftOp::Lsl,
                1 => ShiftOp::Lsr,
                2 => ShiftOp::Asr,
                // op == 3 is the add/subtract space, matched earlier
                _ => return Err(SimulationError::UnsupportedSubOperation { format, raw }),
            };
            Instruction::ShiftImm {
                op,
                rd: low_reg(raw, 0),
                rm: low_reg(raw, 3),
                imm5: ((raw >> 6) & 0x1F) as u8,
            }
        }

        // 011 BL iiiii bbb ddd
        Format::LoadStoreImmediate => {
            let imm5 = ((raw >> 6) & 0x1F) as u32;
            let (op, offset) = match (raw >> 11) & 0x3 {
                0 => (MemOp::Str, imm5 << 2),
                1 => (MemOp::Ldr, imm5 << 2),
                2 => (MemOp::Strb, imm5),
                _ => (MemOp::Ldrb, imm5),
            };
            Instruction::LoadStore {
                op,
                rt: low_reg(raw, 0),
                rn: low_reg(raw, 3),
                offset: Operand::Imm(offset),
            }
        }
    };

    Ok(instruction)
}

/// True for the second halfword of a BL pair (`11x1 ...`). DMB/DSB/ISB
/// suffixes (`0x8F5x`) do not match.
pub fn is_bl_suffix(low: u16) -> bool {
    low & 0xD000 == 0xD000
}

/// Branch offset of a BL pair, relative to the BL address + 4.
///
/// `low` must be a BL suffix (`11x1 ...`).
pub fn decode_bl_offset(high: u16, low: u16) -> SimResult<i32> {
    if !is_bl_suffix(low) {
        return Err(SimulationError::UnsupportedSubOperation {
            format: Format::LongBranchWithLink,
            raw: low,
        });
    }

    let s = ((high >> 10) & 1) as u32;
    let imm10 = (high & 0x3FF) as u32;
    let j1 = ((low >> 13) & 1) as u32;
    let j2 = ((low >> 11) & 1) as u32;
    let imm11 = (low & 0x7FF) as u32;
    let i1 = !(j1 ^ s) & 1;
    let i2 = !(j2 ^ s) & 1;

    let imm25 = (s << 24) | (i1 << 23) | (i2 << 22) | (imm10 << 12) | (imm11 << 1);
    Ok(((imm25 << 7) as i32) >> 7)
}
