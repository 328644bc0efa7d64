//! Compiler front end: source file -> bytecode container.

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;
use std::fs;
use std::path::PathBuf;
use ulang_bytecode::{Container, Emitter};
use ulang_lexer::Lexer;
use ulang_parser::Parser;

#[derive(ClapParser, Debug)]
#[command(name = "ulangc", about = "Compile a ulang source file to a bytecode container")]
struct Args {
    /// Source file to compile.
    #[arg(long)]
    file: PathBuf,

    /// Output container path.
    #[arg(long, default_value = "a.out")]
    output: PathBuf,

    #[arg(long)]
    verbose: bool,

    /// Render diagnostics as JSON lines instead of human-readable text.
    #[arg(long)]
    json_diagnostics: bool,
}

fn print_diag(diag: &ulang_common::Diagnostic, source_line: Option<&str>, json: bool) {
    if json {
        eprintln!("{}", diag.render_json());
    } else {
        eprintln!("{}", diag.render_human(source_line));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let source = fs::read_to_string(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let file_name = args.file.display().to_string();

    log::debug!("lexing {file_name}");
    let tokens = match Lexer::new(&source, file_name.clone()).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    log::debug!("parsing {} tokens", tokens.len());
    let mut output = match Parser::new(tokens).parse() {
        Ok(output) => output,
        Err(e) => {
            print_diag(&e.0, None, args.json_diagnostics);
            std::process::exit(1);
        }
    };

    let source_lines: Vec<&str> = source.lines().collect();
    for diag in output.diagnostics.iter() {
        let line = source_lines.get(diag.loc.line.saturating_sub(1) as usize).copied();
        print_diag(diag, line, args.json_diagnostics);
    }
    if output.diagnostics.has_errors() {
        bail!("compilation failed with {} error(s)", output.diagnostics.iter().filter(|d| d.is_fatal()).count());
    }

    log::debug!("emitting bytecode");
    let code = Emitter::new(&output.ast, &mut output.symbols).emit().context("emitting bytecode")?;
    let container = Container::from_compilation(code, &output.symbols);

    fs::write(&args.output, container.serialize()).with_context(|| format!("writing {}", args.output.display()))?;
    log::info!("wrote {}", args.output.display());
    Ok(())
}
