// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#[cfg(test)]
mod integration_tests {
    use crate::cpu::cortex_m::{VECTOR_INITIAL_SP, VECTOR_RESET};
    use crate::decoder::thumb::Feature;
    use crate::metrics::PerformanceMetrics;
    use crate::{Machine, Peripheral, SimulationError, SimulationObserver, StopReason};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const LOAD: u32 = 0x58;
    const STACK_TOP: u32 = 0x2001_0000;

    /// Machine on the default memory map with `program` at `LOAD`, reset.
    fn create_machine(program: &[u16]) -> Machine {
        let mut machine = Machine::default();
        machine.mmu.write32(VECTOR_INITIAL_SP, STACK_TOP);
        machine.mmu.write32(VECTOR_RESET, LOAD | 1);
        for (i, hw) in program.iter().enumerate() {
            machine.mmu.write16(LOAD + 2 * i as u32, *hw);
        }
        machine.reset();
        machine
    }

    #[derive(Debug, Default)]
    struct RecordingPeripheral {
        regs: [u8; 16],
        writes: Arc<Mutex<Vec<(u32, u8)>>>,
    }

    impl Peripheral for RecordingPeripheral {
        fn read_u8(&self, offset: u32) -> u8 {
            self.regs.get(offset as usize).copied().unwrap_or(0)
        }

        fn write_u8(&mut self, offset: u32, value: u8) {
            if let Ok(mut w) = self.writes.lock() {
                w.push((offset, value));
            }
            if let Some(byte) = self.regs.get_mut(offset as usize) {
                *byte = value;
            }
        }
    }

    #[derive(Debug, Default)]
    struct StepCounter {
        started: AtomicUsize,
        stopped: AtomicUsize,
        pcs: Mutex<Vec<u32>>,
    }

    impl SimulationObserver for StepCounter {
        fn on_simulation_start(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_simulation_stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_step_start(&self, pc: u32, _opcode: u32) {
            if let Ok(mut p) = self.pcs.lock() {
                p.push(pc);
            }
        }
    }

    #[test]
    fn test_mov_mov_add_demo() {
        // MOVS R0, #12 ; MOVS R1, #1 ; ADDS R0, R0, R1
        let mut machine = create_machine(&[0x200C, 0x2101, 0x1840]);
        assert_eq!(machine.run_for(3).unwrap(), StopReason::MaxStepsReached);

        let snap = machine.cpu.snapshot();
        assert_eq!(snap.registers[0], 13);
        assert_eq!(snap.registers[1], 1);
        assert!(!snap.n() && !snap.z() && !snap.c() && !snap.v());
        assert!(snap.t());
        assert_eq!(machine.cpu.pc(), LOAD + 6);
        assert_eq!(machine.total_steps, 3);
    }

    #[test]
    fn test_store_through_peripheral_window_sees_offset() {
        // STR R0, [R1, #4]
        let mut machine = create_machine(&[0x6048]);
        let dev = RecordingPeripheral::default();
        let writes = dev.writes.clone();
        machine
            .register_peripheral("rec", 0x4000_0000, 0x10, Box::new(dev))
            .unwrap();
        machine.cpu.regs.write(0, 0xA1B2_C3D4);
        machine.cpu.regs.write(1, 0x4000_0000);

        machine.step().unwrap();

        let w = writes.lock().unwrap();
        assert_eq!(*w, vec![(4, 0xD4), (5, 0xC3), (6, 0xB2), (7, 0xA1)]);
        drop(w);
        assert_eq!(machine.mmu.read32(0x4000_0004), 0xA1B2_C3D4);
    }

    #[test]
    fn test_conflicting_registration_keeps_session_usable() {
        let mut machine = create_machine(&[0x2007]);
        machine
            .register_peripheral("a", 0x4000_0000, 0x100, Box::new(RecordingPeripheral::default()))
            .unwrap();
        let err = machine
            .register_peripheral("b", 0x4000_0080, 0x100, Box::new(RecordingPeripheral::default()))
            .unwrap_err();
        assert_eq!(err.existing, "a");
        assert_eq!(machine.mmu.peripherals().len(), 1);

        machine
            .register_peripheral("b", 0x4000_0100, 0x100, Box::new(RecordingPeripheral::default()))
            .unwrap();
        machine.step().unwrap();
        assert_eq!(machine.cpu.regs.read(0), 7);
    }

    #[test]
    fn test_observers_see_each_step() {
        let mut machine = create_machine(&[0x200C, 0x2101, 0x1840]);
        let counter = Arc::new(StepCounter::default());
        let metrics = Arc::new(PerformanceMetrics::new());
        machine.observers.push(counter.clone());
        machine.observers.push(metrics.clone());

        machine.run_for(3).unwrap();

        assert_eq!(counter.started.load(Ordering::SeqCst), 1);
        assert_eq!(counter.stopped.load(Ordering::SeqCst), 1);
        assert_eq!(*counter.pcs.lock().unwrap(), vec![LOAD, LOAD + 2, LOAD + 4]);
        assert_eq!(metrics.get_instructions(), 3);
    }

    #[test]
    fn test_halt_flag_stops_before_next_instruction() {
        let mut machine = create_machine(&[0x2001, 0x2002]);
        let halt = machine.halt_handle();
        halt.request_halt();
        assert_eq!(machine.run().unwrap(), StopReason::ManualStop);
        assert_eq!(machine.total_steps, 0);

        halt.resume();
        assert_eq!(machine.run_for(1).unwrap(), StopReason::MaxStepsReached);
        assert_eq!(machine.cpu.regs.read(0), 1);
    }

    #[derive(Debug)]
    struct HaltAfter {
        halt: crate::HaltHandle,
        addr: u32,
    }

    impl SimulationObserver for HaltAfter {
        fn on_step_start(&self, pc: u32, _opcode: u32) {
            if pc == self.addr {
                self.halt.request_halt();
            }
        }
    }

    #[test]
    fn test_unbounded_run_stops_on_observer_halt() {
        // B . at LOAD + 2 would spin forever
        let mut machine = create_machine(&[0x2005, 0xE7FE]);
        let observer = HaltAfter {
            halt: machine.halt_handle(),
            addr: LOAD + 2,
        };
        machine.observers.push(Arc::new(observer));
        assert_eq!(machine.run().unwrap(), StopReason::ManualStop);
        assert_eq!(machine.total_steps, 2);
        assert_eq!(machine.cpu.pc(), LOAD + 2);
    }

    #[test]
    fn test_fatal_error_stops_run() {
        // MOVS R0, #1 ; BKPT #0 ; MOVS R0, #2
        let mut machine = create_machine(&[0x2001, 0xBE00, 0x2002]);
        match machine.run() {
            Err(SimulationError::NotImplemented { feature, .. }) => {
                assert_eq!(feature, Feature::Breakpoint)
            }
            other => panic!("{:?}", other),
        }
        assert_eq!(machine.cpu.regs.read(0), 1);
        assert_eq!(machine.total_steps, 1);
    }

    #[test]
    fn test_undecodable_halfword_is_not_counted() {
        let mut machine = create_machine(&[0xE800]);
        let metrics = Arc::new(PerformanceMetrics::new());
        let counter = Arc::new(StepCounter::default());
        machine.observers.push(metrics.clone());
        machine.observers.push(counter.clone());

        assert!(machine.run_for(1).is_err());
        assert_eq!(machine.total_steps, 0);
        assert_eq!(metrics.get_instructions(), 0);
        assert!(counter.pcs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_verbose_run_matches_plain_run() {
        let program = [0x200C, 0x2101, 0x1840, 0x4148];
        let mut plain = create_machine(&program);
        let mut verbose = create_machine(&program);
        plain.run_for(4).unwrap();
        verbose.run_verbose(Some(4)).unwrap();
        assert_eq!(plain.cpu.snapshot(), verbose.cpu.snapshot());
    }

    #[test]
    fn test_machine_snapshot_includes_peripherals() {
        let mut machine = create_machine(&[]);
        machine
            .register_peripheral(
                "stub0",
                0x4000_0000,
                0x100,
                Box::new(crate::peripherals::stub::StubPeripheral::new(7)),
            )
            .unwrap();
        let snap = machine.snapshot();
        assert!(snap.peripherals.contains_key("stub0"));
        assert_eq!(snap.cpu.pc, LOAD);
        assert!(machine.peek_peripheral("missing").is_none());
    }

    #[test]
    fn test_read_write_memory_bytes() {
        let mut machine = Machine::default();
        machine.write_memory(0x2000_0100, &[1, 2, 3, 4]);
        assert_eq!(machine.read_memory(0x2000_0100, 4), vec![1, 2, 3, 4]);
        assert_eq!(machine.mmu.read32(0x2000_0100), 0x0403_0201);
    }
}
