//! Disassembler: bytecode container -> one line of text per instruction.

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use std::fs;
use std::path::PathBuf;
use ulang_bytecode::{disassemble, Container, HeaderFlags, Instruction, INSTRUCTION_SIZE};

#[derive(ClapParser, Debug)]
#[command(name = "ulang-disasm", about = "Disassemble a ulang bytecode container")]
struct Args {
    #[arg(long)]
    file: PathBuf,

    /// Disassemble a bare instruction stream instead of a full container.
    #[arg(long)]
    bin: bool,

    /// Resolve heap references to the symbol declared at that offset.
    #[arg(long)]
    symbols: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let bytes = fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;

    let container = if args.bin {
        let mut code = Vec::with_capacity(bytes.len() / INSTRUCTION_SIZE);
        for chunk in bytes.chunks_exact(INSTRUCTION_SIZE) {
            let arr: [u8; INSTRUCTION_SIZE] = chunk.try_into().unwrap();
            code.push(Instruction::decode(&arr).context("malformed instruction in raw stream")?);
        }
        Container { code, types: Vec::new(), symbols: Vec::new(), entry_offset: 0, flags: HeaderFlags::empty() }
    } else {
        Container::deserialize(&bytes).context("decoding bytecode container")?
    };

    print!("{}", disassemble(&container, args.symbols));
    Ok(())
}
