// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::decoder::thumb::{classify, Format};
use crate::SimulationObserver;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug)]
pub struct PerformanceMetrics {
    instruction_count: AtomicU64,
    cycle_count: AtomicU64,
    format_counts: Mutex<HashMap<Format, u64>>,
    start_time: Mutex<Instant>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            instruction_count: AtomicU64::new(0),
            cycle_count: AtomicU64::new(0),
            format_counts: Mutex::new(HashMap::new()),
            start_time: Mutex::new(Instant::now()),
        }
    }

    pub fn reset(&self) {
        self.instruction_count.store(0, Ordering::SeqCst);
        self.cycle_count.store(0, Ordering::SeqCst);
        if let Ok(mut m) = self.format_counts.lock() {
            m.clear();
        }
        if let Ok(mut t) = self.start_time.lock() {
            *t = Instant::now();
        }
    }

    pub fn get_instructions(&self) -> u64 {
        self.instruction_count.load(Ordering::SeqCst)
    }

    pub fn get_cycles(&self) -> u64 {
        self.cycle_count.load(Ordering::SeqCst)
    }

    /// Instructions retired per encoding class.
    pub fn get_format_count(&self, format: Format) -> u64 {
        self.format_counts
            .lock()
            .ok()
            .and_then(|m| m.get(&format).copied())
            .unwrap_or(0)
    }

    pub fn get_ips(&self) -> f64 {
        let elapsed = self
            .start_time
            .lock()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        if elapsed > 0.0 {
            self.get_instructions() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl SimulationObserver for PerformanceMetrics {
    fn on_step_start(&self, _pc: u32, opcode: u32) {
        self.instruction_count.fetch_add(1, Ordering::SeqCst);
        if let Some(format) = classify(opcode as u16) {
            if let Ok(mut m) = self.format_counts.lock() {
                *m.entry(format).or_insert(0) += 1;
            }
        }
    }

    fn on_step_end(&self, cycles: u32) {
        self.cycle_count.fetch_add(cycles as u64, Ordering::SeqCst);
    }
}
