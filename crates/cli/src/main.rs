// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

use thumbsim_config::MemoryMap;
use thumbsim_core::cpu::cortex_m::{VECTOR_INITIAL_SP, VECTOR_RESET};
use thumbsim_core::decoder::thumb::is_bl_suffix;
use thumbsim_core::metrics::PerformanceMetrics;
use thumbsim_core::{HaltHandle, Machine, SimulationObserver};

const EXIT_PASS: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

/// Initial SP and reset entry occupy `0x0..0x8`.
const VECTOR_TABLE_END: u64 = 0x8;

fn parse_u32_addr(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

fn parse_halfword(s: &str) -> Result<u16, String> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u16::from_str_radix(digits, 16).map_err(|e| format!("Invalid halfword '{}': {}", s, e))
}

#[derive(Parser, Debug)]
#[command(author, version, about = "ThumbSim Thumb-16 core simulator", long_about = None)]
struct Cli {
    /// Path to the memory map (YAML). Defaults to 64KiB code at 0x0 and 64KiB SRAM at 0x20000000.
    #[arg(short, long)]
    system: Option<PathBuf>,

    /// Comma-separated Thumb halfwords in hex (default: MOVS R0,#12; MOVS R1,#1; ADDS R0,R0,R1)
    #[arg(
        short,
        long,
        value_delimiter = ',',
        value_parser = parse_halfword,
        default_values = ["0x200C", "0x2101", "0x1840"]
    )]
    program: Vec<u16>,

    /// Address the program is written to; also the reset entry point
    #[arg(long, value_parser = parse_u32_addr, default_value = "0x58")]
    load_address: u32,

    /// Stop after this many instructions (default: run until halted)
    #[arg(long)]
    max_steps: Option<u64>,

    /// Halt after the instruction at this address retires. Without this or
    /// --max-steps, the last program halfword is used.
    #[arg(long, value_parser = parse_u32_addr)]
    halt_at: Option<u32>,

    /// Report every instruction's raw encoding and fetch address
    #[arg(short, long)]
    verbose: bool,

    /// Enable instruction-level execution tracing
    #[arg(short, long)]
    trace: bool,

    /// Write the final machine snapshot (JSON)
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// Raises the halt flag once the watched address is fetched.
#[derive(Debug)]
struct HaltAtObserver {
    addr: u32,
    halt: HaltHandle,
}

impl SimulationObserver for HaltAtObserver {
    fn on_step_start(&self, pc: u32, _opcode: u32) {
        if pc == self.addr {
            self.halt.request_halt();
        }
    }
}

/// Halfword index where the program's last instruction starts. A BL pair
/// is one instruction.
fn last_instruction_index(program: &[u16]) -> usize {
    let mut i = 0;
    let mut last = 0;
    while i < program.len() {
        last = i;
        let is_bl_pair = program[i] & 0xF800 == 0xF000
            && program.get(i + 1).is_some_and(|&low| is_bl_suffix(low));
        i += if is_bl_pair { 2 } else { 1 };
    }
    last
}

fn build_machine(cli: &Cli) -> anyhow::Result<Machine> {
    let map = match &cli.system {
        Some(path) => MemoryMap::from_file(path)?,
        None => MemoryMap::default(),
    };
    let mut machine = Machine::from_config(&map)?;

    if cli.program.is_empty() {
        return Err(anyhow!("Program is empty"));
    }
    let program_end = cli.load_address as u64 + 2 * cli.program.len() as u64;
    // A range running past the top of memory wraps onto the vectors too
    if (cli.load_address as u64) < VECTOR_TABLE_END || program_end > 1 << 32 {
        return Err(anyhow!(
            "Program at {:#010x}..{:#010x} overlaps the vector table",
            cli.load_address,
            program_end
        ));
    }
    if !machine.mmu.code.contains(cli.load_address)
        && !machine.mmu.sram.contains(cli.load_address)
    {
        return Err(anyhow!(
            "Load address {:#010x} is outside the code and SRAM regions",
            cli.load_address
        ));
    }

    // Vector table: full-descending stack from the top of SRAM, Thumb entry
    let stack_top = machine.mmu.sram.end().wrapping_add(1);
    machine.mmu.write32(VECTOR_INITIAL_SP, stack_top);
    machine.mmu.write32(VECTOR_RESET, cli.load_address | 1);

    for (i, hw) in cli.program.iter().enumerate() {
        machine
            .mmu
            .write16(cli.load_address.wrapping_add(2 * i as u32), *hw);
    }
    info!(
        "Loaded {} halfwords at {:#010x}",
        cli.program.len(),
        cli.load_address
    );

    machine.reset();
    Ok(machine)
}

fn write_snapshot(machine: &Machine, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create snapshot parent dir {:?}", parent))?;
        }
    }
    let f = std::fs::File::create(path)
        .with_context(|| format!("Failed to create snapshot {:?}", path))?;
    serde_json::to_writer_pretty(f, &machine.snapshot())
        .with_context(|| format!("Failed to write snapshot {:?}", path))?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    info!("Starting ThumbSim");

    let mut machine = match build_machine(&cli) {
        Ok(machine) => machine,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(PerformanceMetrics::new());
    machine.observers.push(metrics.clone());
    let halt_at = match (cli.halt_at, cli.max_steps) {
        (Some(addr), _) => Some(addr),
        (None, None) => {
            let last = cli
                .load_address
                .wrapping_add(2 * last_instruction_index(&cli.program) as u32);
            info!("No --max-steps or --halt-at given; halting at {:#010x}", last);
            Some(last)
        }
        (None, Some(_)) => None,
    };
    if let Some(addr) = halt_at {
        machine.observers.push(Arc::new(HaltAtObserver {
            addr,
            halt: machine.halt_handle(),
        }));
    }

    let result = if cli.verbose {
        machine.run_verbose(cli.max_steps)
    } else {
        match cli.max_steps {
            Some(n) => machine.run_for(n),
            None => machine.run(),
        }
    };

    println!("{}", machine.cpu.snapshot());
    info!(
        "Executed {} instructions ({:.0} IPS)",
        metrics.get_instructions(),
        metrics.get_ips()
    );

    if let Some(path) = &cli.snapshot {
        if let Err(e) = write_snapshot(&machine, path) {
            error!("{:#}", e);
        }
    }

    match result {
        Ok(reason) => {
            info!("Stop reason: {:?}", reason);
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
