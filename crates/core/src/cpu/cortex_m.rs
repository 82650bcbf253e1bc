// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::alu::{self, ShiftOp};
use crate::cpu::pipeline::Pipeline;
use crate::cpu::registers::{RegisterFile, PC};
use crate::decoder::thumb::{
    decode_bl_offset, decode_thumb_16, is_bl_suffix, AluOp, Feature, HiOp, ImmOp, Instruction,
    MemOp, Operand,
};
use crate::mmu::Mmu;
use crate::snapshot::CpuSnapshot;
use crate::{SimResult, SimulationError, SimulationObserver};
use std::sync::Arc;

/// Vector table slot holding the initial main stack pointer.
pub const VECTOR_INITIAL_SP: u32 = 0x0000_0000;
/// Vector table slot holding the reset entry point.
pub const VECTOR_RESET: u32 = 0x0000_0004;

#[derive(Debug, Default, Clone)]
pub struct CortexM {
    pub regs: RegisterFile,
    pub pipeline: Pipeline,
}

impl CortexM {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads SP and the entry point from the vector table and primes the
    /// prefetch queue. Bit 0 of the entry (the Thumb marker) is dropped.
    pub fn reset(&mut self, mmu: &Mmu) {
        let sp = mmu.read32(VECTOR_INITIAL_SP);
        let entry = mmu.read32(VECTOR_RESET);

        self.regs.set_t(true);
        self.regs.set_sp(sp);
        self.regs.set_fetch_address(entry & !1);
        self.pipeline.fill(mmu, self.regs.pc);

        tracing::debug!("Reset: SP={:#010x}, PC={:#010x}", sp, self.regs.pc);
    }

    /// Next instruction address (the fetch pointer).
    pub fn pc(&self) -> u32 {
        self.regs.pc
    }

    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            registers: self.regs.all().to_vec(),
            pc: self.regs.pc,
            xpsr: self.regs.psr.bits(),
        }
    }

    /// Pops the retiring halfword and moves both PC views forward.
    fn fetch(&mut self, mmu: &Mmu) -> u16 {
        let raw = self
            .pipeline
            .advance(mmu, self.regs.pc.wrapping_add(4));
        self.regs.advance();
        raw
    }

    /// Redirects execution to `target & !1` and refetches.
    fn branch_to(&mut self, mmu: &Mmu, target: u32) {
        let dest = target & !1;
        self.regs.set_fetch_address(dest);
        self.pipeline.fill(mmu, dest);
    }

    /// BX-style PC write: only Thumb targets (bit 0 set) are legal.
    fn bx_write_pc(&mut self, mmu: &Mmu, target: u32) -> SimResult<()> {
        if target & 1 == 0 {
            return Err(SimulationError::IllegalStateTransition { target });
        }
        self.branch_to(mmu, target);
        Ok(())
    }

    /// Register write where R15 means a branch.
    fn write_reg_or_branch(&mut self, mmu: &Mmu, rd: u8, value: u32) {
        if rd == PC {
            self.branch_to(mmu, value);
        } else {
            self.regs.write(rd, value);
        }
    }

    pub fn step(
        &mut self,
        mmu: &mut Mmu,
        observers: &[Arc<dyn SimulationObserver>],
    ) -> SimResult<()> {
        let pc = self.regs.pc;
        let raw = self.fetch(mmu);

        let mut instruction = decode_thumb_16(raw)?;
        // F3BF is also a BL prefix with S=0, imm10=0x3BF
        if instruction == Instruction::Unimplemented(Feature::Barrier)
            && is_bl_suffix(self.pipeline.peek())
        {
            instruction = Instruction::BlPrefix { high: raw };
        }

        for observer in observers {
            observer.on_step_start(pc, raw as u32);
        }

        tracing::debug!(
            "PC={:#010x}, Opcode={:#06x}, Instr={:?}",
            pc,
            raw,
            instruction
        );

        self.execute(mmu, instruction, raw)?;

        for observer in observers {
            observer.on_step_end(1);
        }
        Ok(())
    }

    fn execute(&mut self, mmu: &mut Mmu, instruction: Instruction, raw: u16) -> SimResult<()> {
        match instruction {
            Instruction::Unimplemented(feature) => {
                return Err(SimulationError::NotImplemented { feature, raw });
            }
            Instruction::ShiftImm { op, rd, rm, imm5 } => {
                let (result, carry) =
                    alu::shift_by_immediate(op, self.regs.read(rm), imm5, self.regs.c());
                self.regs.write(rd, result);
                self.regs.update_nzc(result, carry);
            }
            Instruction::AddSub {
                sub,
                rd,
                rn,
                operand,
            } => {
                let a = self.regs.read(rn);
                let b = self.operand_value(operand);
                let r = if sub {
                    alu::sub_with_carry(a, b, true)
                } else {
                    alu::add_with_carry(a, b, false)
                };
                self.regs.write(rd, r.value);
                self.regs.update_nzcv(r.value, r.carry, r.overflow);
            }
            Instruction::ImmOp { op, rd, imm } => {
                let imm = imm as u32;
                match op {
                    ImmOp::Mov => {
                        self.regs.write(rd, imm);
                        self.regs.update_nz(imm);
                    }
                    ImmOp::Cmp => {
                        let r = alu::sub_with_carry(self.regs.read(rd), imm, true);
                        self.regs.update_nzcv(r.value, r.carry, r.overflow);
                    }
                    ImmOp::Add => {
                        let r = alu::add_with_carry(self.regs.read(rd), imm, false);
                        self.regs.write(rd, r.value);
                        self.regs.update_nzcv(r.value, r.carry, r.overflow);
                    }
                    ImmOp::Sub => {
                        let r = alu::sub_with_carry(self.regs.read(rd), imm, true);
                        self.regs.write(rd, r.value);
                        self.regs.update_nzcv(r.value, r.carry, r.overflow);
                    }
                }
            }
            Instruction::Alu { op, rd, rm } => self.execute_alu(op, rd, rm),
            Instruction::HiReg { op, rd, rm } => {
                let a = self.regs.read(rd);
                let b = self.regs.read(rm);
                match op {
                    HiOp::Add => self.write_reg_or_branch(mmu, rd, a.wrapping_add(b)),
                    HiOp::Cmp => {
                        let r = alu::sub_with_carry(a, b, true);
                        self.regs.update_nzcv(r.value, r.carry, r.overflow);
                    }
                    HiOp::Mov => self.write_reg_or_branch(mmu, rd, b),
                }
            }
            Instruction::BranchExchange { rm, link } => {
                let target = self.regs.read(rm);
                // Halfword after this BLX
                let ret = self.regs.pc;
                self.bx_write_pc(mmu, target)?;
                if link {
                    self.regs.set_lr(ret | 1);
                }
            }
            Instruction::LdrLiteral { rt, imm } => {
                let addr = (self.regs.visible_pc() & !3).wrapping_add(imm);
                self.regs.write(rt, mmu.read32(addr));
            }
            Instruction::LoadStore {
                op,
                rt,
                rn,
                offset,
            } => {
                let addr = self.regs.read(rn).wrapping_add(self.operand_value(offset));
                self.execute_load_store(mmu, op, rt, addr);
            }
            Instruction::LoadAddress { rd, from_sp, imm } => {
                let base = if from_sp {
                    self.regs.sp()
                } else {
                    self.regs.visible_pc() & !3
                };
                self.regs.write(rd, base.wrapping_add(imm));
            }
            Instruction::AdjustSp { sub, imm } => {
                let sp = self.regs.sp();
                let sp = if sub {
                    sp.wrapping_sub(imm)
                } else {
                    sp.wrapping_add(imm)
                };
                self.regs.set_sp(sp);
            }
            Instruction::Push { registers, lr } => {
                let count = registers.count_ones() + lr as u32;
                let base = self.regs.sp().wrapping_sub(4 * count);
                let mut addr = base;
                for i in 0..8u8 {
                    if registers & (1 << i) != 0 {
                        mmu.write32(addr, self.regs.read(i));
                        addr = addr.wrapping_add(4);
                    }
                }
                if lr {
                    mmu.write32(addr, self.regs.lr());
                }
                self.regs.set_sp(base);
            }
            Instruction::Pop { registers, pc } => {
                let mut addr = self.regs.sp();
                for i in 0..8u8 {
                    if registers & (1 << i) != 0 {
                        self.regs.write(i, mmu.read32(addr));
                        addr = addr.wrapping_add(4);
                    }
                }
                let target = if pc {
                    let value = mmu.read32(addr);
                    addr = addr.wrapping_add(4);
                    Some(value)
                } else {
                    None
                };
                self.regs.set_sp(addr);
                if let Some(target) = target {
                    self.branch_to(mmu, target);
                }
            }
            Instruction::Stm { rn, registers } => {
                let mut addr = self.regs.read(rn);
                for i in 0..8u8 {
                    if registers & (1 << i) != 0 {
                        mmu.write32(addr, self.regs.read(i));
                        addr = addr.wrapping_add(4);
                    }
                }
                self.regs.write(rn, addr);
            }
            Instruction::Ldm { rn, registers } => {
                let mut addr = self.regs.read(rn);
                for i in 0..8u8 {
                    if registers & (1 << i) != 0 {
                        self.regs.write(i, mmu.read32(addr));
                        addr = addr.wrapping_add(4);
                    }
                }
                // Loaded base wins over write-back
                if registers & (1 << rn) == 0 {
                    self.regs.write(rn, addr);
                }
            }
            Instruction::BranchCond { cond, offset } => {
                if self.regs.check_condition(cond) {
                    let target = self.regs.visible_pc().wrapping_add(offset as u32);
                    self.branch_to(mmu, target);
                }
            }
            Instruction::Branch { offset } => {
                let target = self.regs.visible_pc().wrapping_add(offset as u32);
                self.branch_to(mmu, target);
            }
            Instruction::BlPrefix { high } => {
                // The suffix is already sitting in the prefetch queue
                let low = self.fetch(mmu);
                let offset = decode_bl_offset(high, low)?;
                let ret = self.regs.pc;
                self.regs.set_lr(ret | 1);
                self.branch_to(mmu, ret.wrapping_add(offset as u32));
            }
        }
        Ok(())
    }

    fn operand_value(&self, operand: Operand) -> u32 {
        match operand {
            Operand::Reg(r) => self.regs.read(r),
            Operand::Imm(v) => v,
        }
    }

    fn execute_alu(&mut self, op: AluOp, rd: u8, rm: u8) {
        let a = self.regs.read(rd);
        let b = self.regs.read(rm);
        let carry_in = self.regs.c();

        let shift = |shift_op: ShiftOp| alu::shift_by_register(shift_op, a, b, carry_in);

        match op {
            AluOp::And | AluOp::Eor | AluOp::Orr | AluOp::Bic | AluOp::Mvn | AluOp::Mul => {
                let result = match op {
                    AluOp::And => a & b,
                    AluOp::Eor => a ^ b,
                    AluOp::Orr => a | b,
                    AluOp::Bic => a & !b,
                    AluOp::Mvn => !b,
                    _ => a.wrapping_mul(b),
                };
                self.regs.write(rd, result);
                self.regs.update_nz(result);
            }
            AluOp::Tst => self.regs.update_nz(a & b),
            AluOp::Lsl | AluOp::Lsr | AluOp::Asr | AluOp::Ror => {
                let (result, carry) = match op {
                    AluOp::Lsl => shift(ShiftOp::Lsl),
                    AluOp::Lsr => shift(ShiftOp::Lsr),
                    AluOp::Asr => shift(ShiftOp::Asr),
                    _ => shift(ShiftOp::Ror),
                };
                self.regs.write(rd, result);
                self.regs.update_nzc(result, carry);
            }
            AluOp::Adc | AluOp::Sbc | AluOp::Neg => {
                let r = match op {
                    AluOp::Adc => alu::add_with_carry(a, b, carry_in),
                    AluOp::Sbc => alu::sub_with_carry(a, b, carry_in),
                    _ => alu::sub_with_carry(0, b, true),
                };
                self.regs.write(rd, r.value);
                self.regs.update_nzcv(r.value, r.carry, r.overflow);
            }
            AluOp::Cmp => {
                let r = alu::sub_with_carry(a, b, true);
                self.regs.update_nzcv(r.value, r.carry, r.overflow);
            }
            AluOp::Cmn => {
                let r = alu::add_with_carry(a, b, false);
                self.regs.update_nzcv(r.value, r.carry, r.overflow);
            }
        }
    }

    fn execute_load_store(&mut self, mmu: &mut Mmu, op: MemOp, rt: u8, addr: u32) {
        match op {
            MemOp::Str => mmu.write32(addr, self.regs.read(rt)),
            MemOp::Strb => mmu.write8(addr, self.regs.read(rt) as u8),
            MemOp::Strh => mmu.write16(addr, self.regs.read(rt) as u16),
            MemOp::Ldr => self.regs.write(rt, mmu.read32(addr)),
            MemOp::Ldrb => self.regs.write(rt, mmu.read8(addr) as u32),
            MemOp::Ldrh => self.regs.write(rt, mmu.read16(addr) as u32),
            MemOp::Ldrsb => self.regs.write(rt, mmu.read8(addr) as i8 as i32 as u32),
            MemOp::Ldrsh => self.regs.write(rt, mmu.read16(addr) as i16 as i32 as u32),
        }
    }
}
