//! zpu: command-line host for the ZPU emulator core.
//!
//! Builds a single flat RAM segment, loads a raw program image into it,
//! resets the CPU and runs until a breakpoint or illegal opcode. Faults are
//! logged; device emulation beyond the console syscalls is left to embedders
//! of the library.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, error, info};
use zpu_core::{attr, load_image, Console, Control, Cpu, Hooks, MemMap, Segment};

#[derive(Parser)]
#[command(name = "zpu")]
#[command(version = "0.1.0")]
#[command(about = "Run a raw ZPU binary image", long_about = None)]
struct Args {
    /// Path to the raw program image
    image: PathBuf,

    /// RAM segment size in bytes
    #[arg(long, default_value_t = 0x20000)]
    mem_size: u32,

    /// Initial stack pointer (defaults to 8 bytes below the end of RAM)
    #[arg(long)]
    stack_top: Option<u32>,

    /// Stop after this many cycles even if no breakpoint was hit
    #[arg(long)]
    max_steps: Option<u64>,

    /// Log every executed cycle (overrides RUST_LOG)
    #[arg(long)]
    trace: bool,

    /// Write the final machine state as JSON to this path on halt
    #[arg(long, value_name = "PATH")]
    dump_state: Option<PathBuf>,
}

/// Hooks for interactive runs: log faults, stop on breakpoint, illegal
/// opcode or divide by zero.
struct HostHooks;

impl Hooks for HostHooks {
    fn breakpoint(&mut self, cpu: &Cpu) -> Control {
        info!(
            pc = format_args!("{:#010x}", cpu.pc),
            sp = format_args!("{:#010x}", cpu.sp),
            tos = format_args!("{:#010x}", cpu.tos),
            "breakpoint"
        );
        Control::Halt
    }

    fn illegal_opcode(&mut self, cpu: &Cpu) -> Control {
        error!(
            pc = format_args!("{:#010x}", cpu.pc),
            op = format_args!("{:#04x}", cpu.instruction),
            "illegal instruction"
        );
        Control::Halt
    }

    fn divide_by_zero(&mut self, cpu: &Cpu) -> Control {
        error!(pc = format_args!("{:#010x}", cpu.pc), "divide by zero");
        Control::Halt
    }

    fn config(&mut self, token: u32) {
        info!(token, "CONFIG set cpu type");
    }

    fn segv(&mut self, va: u32) {
        debug!(va = format_args!("{va:#010x}"), "segv");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = if args.trace {
        tracing_subscriber::EnvFilter::new("trace")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let image = fs::read(&args.image)?;
    let mut memory = MemMap::new();
    memory.add_segment(Segment::new(
        "ram",
        vec![0; args.mem_size as usize],
        0,
        attr::RD | attr::WR | attr::EX,
    ));

    let mut hooks = HostHooks;
    load_image(&mut memory, &mut hooks, &image)?;

    let mut cpu = Cpu::new(memory);
    let stack_top = args.stack_top.unwrap_or(args.mem_size.saturating_sub(8));
    cpu.reset(stack_top);

    let mut console = Console;
    match args.max_steps {
        Some(limit) => {
            let mut steps = 0;
            while steps < limit && cpu.step(&mut hooks, &mut console) == Control::Continue {
                steps += 1;
            }
            if steps == limit {
                info!(steps, "step limit reached");
            }
        }
        None => cpu.execute(&mut hooks, &mut console),
    }

    if let Some(path) = args.dump_state {
        fs::write(&path, serde_json::to_vec_pretty(&cpu)?)?;
        info!(path = %path.display(), "machine state written");
    }
    Ok(())
}
