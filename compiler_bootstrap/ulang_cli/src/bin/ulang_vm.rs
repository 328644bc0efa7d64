//! VM runner: loads a bytecode container and executes it to completion.

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use std::fs;
use std::path::PathBuf;
use ulang_bytecode::Container;
use ulang_vm::Machine;

#[derive(ClapParser, Debug)]
#[command(name = "ulang-vm", about = "Run a ulang bytecode container")]
struct Args {
    #[arg(long)]
    file: PathBuf,

    #[arg(long)]
    verbose: bool,

    /// Initial heap size, in KiB.
    #[arg(long, default_value_t = 256)]
    heapsize_start: u32,

    /// Heap ceiling, in KiB; 0 means unbounded.
    #[arg(long, default_value_t = 0)]
    heapsize_limit: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let bytes = fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let container = Container::deserialize(&bytes).context("decoding bytecode container")?;
    log::debug!("loaded {} instructions", container.code.len());

    let mut machine = Machine::init(args.heapsize_start, args.heapsize_limit);
    match machine.run(&container.code) {
        Ok(()) => {
            log::info!("program halted, FNR = {}", machine.register(ulang_bytecode::registers::FNR));
            Ok(())
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
