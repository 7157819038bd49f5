//! Interactive session: reads one line at a time, decodes it, and runs one
//! machine cycle per accepted instruction.

use macvm::machine::Machine;
use std::io::{self, BufRead, Write};

const HELP: &str = "\
instructions (one per line):
  PSH n      push n on top of the stack
  POP        pop the top value and print it
  ADD        pop two values, push their sum
  SUB        pop two values, push their difference (first pushed on the left)
  MUL        pop two values, push their product
  DIV        pop two values, push their quotient (divisor of zero is fatal)
  JMP a      continue execution at address a
  MOV d s    copy register s into register d
  LDR r      push the current value of register r
  STR r      write the stack top (without popping) into register r
  HLT        stop the machine
  NOP        do nothing

registers: A B C D E F

commands:
  help       show this message
  stack n    show the top n+1 stack values (-1 for all)
  regs       show the register file
  exit       end the session";

const STACK_USAGE: &str = "usage: stack <n> (-1 for all)";

/// What an input line asks the session to do. Anything that is not a
/// recognized command is handed to the assembler as an instruction line.
#[derive(Debug, Eq, PartialEq)]
enum Command<'a> {
    Blank,
    Exit,
    Help,
    Regs,
    /// `stack <n>`: dump the top `n + 1` values, `-1` for all.
    Stack(i64),
    /// A `stack` command with a missing, unparsable, or out-of-range depth.
    StackUsage,
    Instruction(&'a str),
}

/// Classify one trimmed input line.
fn parse_command(line: &str) -> Command<'_> {
    match line {
        "" => Command::Blank,
        "exit" => Command::Exit,
        "help" => Command::Help,
        "regs" => Command::Regs,
        _ if line.split_whitespace().next() == Some("stack") => {
            match line.split_whitespace().nth(1).map(|n| n.parse::<i64>()) {
                Some(Ok(depth)) if depth >= -1 => Command::Stack(depth),
                _ => Command::StackUsage,
            }
        }
        _ => Command::Instruction(line),
    }
}

/// How many values a `stack <depth>` dump shows out of `total`: the top
/// `depth + 1`, capped at `total`; a depth of `-1` shows everything.
fn dump_count(total: usize, depth: i64) -> usize {
    if depth < 0 {
        total
    } else {
        total.min((depth as usize).saturating_add(1))
    }
}

pub fn run(mut vm: Machine) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();

    loop {
        print!("> ");
        stdout.flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        match parse_command(input.trim()) {
            Command::Blank => {}
            Command::Exit => break,
            Command::Help => println!("{}", HELP),
            Command::Regs => print!("{}", vm.registers()),
            Command::Stack(depth) => dump_stack(&vm, depth),
            Command::StackUsage => eprintln!("{}", STACK_USAGE),
            Command::Instruction(line) => {
                for error in vm.push_line(line) {
                    eprintln!("{}", error);
                }

                if vm.is_running() {
                    if let Err(error) = vm.step() {
                        eprintln!("{}", error);
                    }
                }
            }
        }
    }

    Ok(())
}

fn dump_stack(vm: &Machine, depth: i64) {
    let values = vm.stack().to_vec();
    let count = dump_count(values.len(), depth);

    println!("stack ({} values):", values.len());
    for (offset, value) in values.iter().take(count).enumerate() {
        println!("  {}: {}", offset, value);
    }
}
