// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod alu;
pub mod cpu;
pub mod decoder;
pub mod memory;
pub mod metrics;
pub mod mmu;
pub mod peripherals;
pub mod snapshot;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpu::CortexM;
use decoder::thumb::{Feature, Format};
use mmu::{ConflictError, Mmu, PeripheralEntry};

mod tests;

/// Fatal conditions raised while executing. None of them is retried; the run
/// loop stops and reports the final state.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Unknown instruction {raw:#06x}")]
    UnknownInstruction { raw: u16 },
    #[error("Unsupported sub-operation in {format:?} instruction {raw:#06x}")]
    UnsupportedSubOperation { format: Format, raw: u16 },
    #[error("{feature} is not implemented (instruction {raw:#06x})")]
    NotImplemented { feature: Feature, raw: u16 },
    #[error("Illegal switch to ARM state (branch target {target:#010x})")]
    IllegalStateTransition { target: u32 },
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_step_start(&self, _pc: u32, _opcode: u32) {}
    fn on_step_end(&self, _cycles: u32) {}
}

/// Trait representing a memory-mapped peripheral.
///
/// Offsets are relative to the start of the peripheral's window. Wider
/// accesses default to little-endian compositions of the byte accessors.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read_u8(&self, offset: u32) -> u8;
    fn write_u8(&mut self, offset: u32, value: u8);

    fn read_u16(&self, offset: u32) -> u16 {
        let b0 = self.read_u8(offset) as u16;
        let b1 = self.read_u8(offset.wrapping_add(1)) as u16;
        b0 | (b1 << 8)
    }

    fn read_u32(&self, offset: u32) -> u32 {
        let b0 = self.read_u8(offset) as u32;
        let b1 = self.read_u8(offset.wrapping_add(1)) as u32;
        let b2 = self.read_u8(offset.wrapping_add(2)) as u32;
        let b3 = self.read_u8(offset.wrapping_add(3)) as u32;
        b0 | (b1 << 8) | (b2 << 16) | (b3 << 24)
    }

    fn write_u16(&mut self, offset: u32, value: u16) {
        self.write_u8(offset, (value & 0xFF) as u8);
        self.write_u8(offset.wrapping_add(1), (value >> 8) as u8);
    }

    fn write_u32(&mut self, offset: u32, value: u32) {
        for i in 0..4 {
            self.write_u8(offset.wrapping_add(i), (value >> (8 * i)) as u8);
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Shared halt flag. The run loop checks it once per instruction, so an
/// instruction in flight always completes.
#[derive(Debug, Clone, Default)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_halt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    ManualStop,
    MaxStepsReached,
}

pub struct Machine {
    pub cpu: CortexM,
    pub mmu: Mmu,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    halt: HaltHandle,
    pub total_steps: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(Mmu::new())
    }
}

impl Machine {
    pub fn new(mmu: Mmu) -> Self {
        Self {
            cpu: CortexM::new(),
            mmu,
            observers: Vec::new(),
            halt: HaltHandle::new(),
            total_steps: 0,
        }
    }

    pub fn from_config(map: &thumbsim_config::MemoryMap) -> anyhow::Result<Self> {
        Ok(Self::new(Mmu::from_config(map)?))
    }

    pub fn register_peripheral(
        &mut self,
        name: &str,
        base: u32,
        size: u32,
        dev: Box<dyn Peripheral>,
    ) -> Result<(), ConflictError> {
        self.mmu.register(PeripheralEntry::new(name, base, size, dev))
    }

    pub fn write_memory(&mut self, addr: u32, data: &[u8]) {
        self.mmu.load_bytes(addr, data);
    }

    pub fn read_memory(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.mmu.read8(addr.wrapping_add(i as u32)))
            .collect()
    }

    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    pub fn reset(&mut self) {
        self.cpu.reset(&self.mmu);
        self.total_steps = 0;
    }

    pub fn step(&mut self) -> SimResult<()> {
        self.cpu.step(&mut self.mmu, &self.observers)?;
        self.total_steps += 1;
        Ok(())
    }

    /// Runs until the halt flag is raised or a fatal error occurs.
    pub fn run(&mut self) -> SimResult<StopReason> {
        self.run_loop(None, false)
    }

    /// Runs at most `steps` instructions.
    pub fn run_for(&mut self, steps: u64) -> SimResult<StopReason> {
        self.run_loop(Some(steps), false)
    }

    /// Like `run`/`run_for`, additionally logging each instruction's raw
    /// encoding and fetch address.
    pub fn run_verbose(&mut self, max_steps: Option<u64>) -> SimResult<StopReason> {
        self.run_loop(max_steps, true)
    }

    fn run_loop(&mut self, budget: Option<u64>, verbose: bool) -> SimResult<StopReason> {
        for observer in &self.observers {
            observer.on_simulation_start();
        }

        let mut remaining = budget;
        let result = loop {
            if self.halt.is_halted() {
                break Ok(StopReason::ManualStop);
            }
            if remaining == Some(0) {
                break Ok(StopReason::MaxStepsReached);
            }

            if verbose {
                tracing::info!(
                    "[{:>6}] PC={:#010x} raw={:#06x}",
                    self.total_steps,
                    self.cpu.pc(),
                    self.cpu.pipeline.peek()
                );
            }

            if let Err(e) = self.step() {
                tracing::error!("Simulation aborted at PC={:#010x}: {}", self.cpu.pc(), e);
                break Err(e);
            }

            if let Some(n) = remaining.as_mut() {
                *n -= 1;
            }
        };

        for observer in &self.observers {
            observer.on_simulation_stop();
        }

        tracing::info!(
            "Stopped after {} instructions ({:?})\n{}",
            self.total_steps,
            result.as_ref().ok(),
            self.cpu.snapshot()
        );
        result
    }

    pub fn snapshot(&self) -> snapshot::MachineSnapshot {
        snapshot::MachineSnapshot {
            cpu: self.cpu.snapshot(),
            peripherals: self
                .mmu
                .peripherals()
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect(),
        }
    }

    pub fn peek_peripheral(&self, name: &str) -> Option<serde_json::Value> {
        self.mmu
            .peripherals()
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.dev.snapshot())
    }
}
