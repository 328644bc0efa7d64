//! Dumper: prints a bytecode container's header and metadata tables.

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use std::fs;
use std::path::PathBuf;
use ulang_bytecode::{dump_metadata, Container};

#[derive(ClapParser, Debug)]
#[command(name = "ulang-dump", about = "Dump a ulang bytecode container's header and metadata")]
struct Args {
    #[arg(long)]
    file: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let bytes = fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let container = Container::deserialize(&bytes).context("decoding bytecode container")?;
    print!("{}", dump_metadata(&container));
    Ok(())
}
