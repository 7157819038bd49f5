mod repl;

use anyhow::Context;
use clap::Parser;
use macvm::machine::{Machine, DEFAULT_STACK_LIMIT};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "macvm", version, about = "a small stack-based virtual machine")]
struct Cli {
    /// Program file to run; starts an interactive session when omitted
    file: Option<PathBuf>,

    /// Maximum number of values the execution stack may hold
    #[arg(short = 's', long, default_value_t = DEFAULT_STACK_LIMIT)]
    stack_limit: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut vm = Machine::new(cli.stack_limit);

    match cli.file {
        Some(path) => {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("could not read {}", path.display()))?;

            for (line, error) in vm.load(&source) {
                eprintln!("line {}: {}", line, error);
            }

            vm.run().context("program failed")
        }
        None => repl::run(vm),
    }
}
