//! Text-to-instruction assembler
//!
//! One source line becomes one [`Instruction`]. Decoding is permissive:
//! a malformed line never aborts the assembly. Unknown mnemonics decode as
//! [`Instruction::Nop`], unknown register names decode as a `None` operand
//! that the machine rejects at evaluation time, and unparsable numbers
//! default to zero. Every problem is still reported as a [`DecodeError`]
//! alongside the best-effort instruction.

use crate::register::Register;
use thiserror::Error;

/// A decoded instruction. Operand count and meaning are opcode-specific;
/// instructions are immutable once decoded.
///
/// Register operands are `Option<Register>`: `None` marks a register name
/// that failed to resolve and makes evaluation fail instead of silently
/// defaulting to the first register.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Instruction {
    /// `PSH n` ; push `n` onto the stack
    Psh(i64),
    /// `POP` ; pop the top value and print it
    Pop,
    /// `ADD` ; pop two values, push their sum
    Add,
    /// `SUB` ; pop two values, push `lower - top`
    Sub,
    /// `MUL` ; pop two values, push their product
    Mul,
    /// `DIV` ; pop two values, push `lower / top`; a zero divisor is fatal
    Div,
    /// `JMP a` ; continue execution at address `a`
    Jmp(i64),
    /// `MOV d s` ; copy register `s` into register `d`, `s` unchanged
    Mov {
        dst: Option<Register>,
        src: Option<Register>,
    },
    /// `LDR r` ; push the current value of register `r`
    Ldr(Option<Register>),
    /// `STR r` ; write the stack top (without popping) into register `r`
    Str(Option<Register>),
    /// `HLT` ; stop the machine
    Hlt,
    /// No effect. Also the decode of blank lines and unknown mnemonics.
    Nop,
}

/// Recoverable decode-time problems. Reported, never fatal: the offending
/// instruction carries a best-effort or invalid-marker payload and decoding
/// continues with the next line.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum DecodeError {
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),
    #[error("unknown register '{0}'")]
    UnknownRegister(String),
    #[error("{mnemonic} expects a number, got '{token}'")]
    BadOperand {
        mnemonic: &'static str,
        token: String,
    },
    #[error("{0} is missing an operand")]
    MissingOperand(&'static str),
}

/// Decode one line of source text.
///
/// Returns the instruction together with any problems found on the line.
/// Tokens beyond what the mnemonic consumes are ignored.
pub fn decode(line: &str) -> (Instruction, Vec<DecodeError>) {
    let mut errors = Vec::new();
    let mut tokens = line.split_whitespace();

    let mnemonic = match tokens.next() {
        Some(mnemonic) => mnemonic,
        None => return (Instruction::Nop, errors),
    };

    let instruction = match mnemonic {
        "PSH" => Instruction::Psh(number_operand("PSH", tokens.next(), &mut errors)),
        "POP" => Instruction::Pop,
        "ADD" => Instruction::Add,
        "SUB" => Instruction::Sub,
        "MUL" => Instruction::Mul,
        "DIV" => Instruction::Div,
        "JMP" => Instruction::Jmp(number_operand("JMP", tokens.next(), &mut errors)),
        "MOV" => Instruction::Mov {
            dst: register_operand("MOV", tokens.next(), &mut errors),
            src: register_operand("MOV", tokens.next(), &mut errors),
        },
        "LDR" => Instruction::Ldr(register_operand("LDR", tokens.next(), &mut errors)),
        "STR" => Instruction::Str(register_operand("STR", tokens.next(), &mut errors)),
        "HLT" => Instruction::Hlt,
        "NOP" => Instruction::Nop,
        unknown => {
            errors.push(DecodeError::UnknownMnemonic(unknown.to_string()));
            Instruction::Nop
        }
    };

    (instruction, errors)
}

/// Parse a signed-integer operand. Missing or unparsable tokens are
/// reported and decode to zero.
fn number_operand(
    mnemonic: &'static str,
    token: Option<&str>,
    errors: &mut Vec<DecodeError>,
) -> i64 {
    match token {
        Some(token) => match token.parse() {
            Ok(value) => value,
            Err(_) => {
                errors.push(DecodeError::BadOperand {
                    mnemonic,
                    token: token.to_string(),
                });
                0
            }
        },
        None => {
            errors.push(DecodeError::MissingOperand(mnemonic));
            0
        }
    }
}

/// Resolve a register-name operand. Unknown names are reported and decode
/// to the `None` marker.
fn register_operand(
    mnemonic: &'static str,
    token: Option<&str>,
    errors: &mut Vec<DecodeError>,
) -> Option<Register> {
    match token {
        Some(token) => match Register::from_name(token) {
            Some(register) => Some(register),
            None => {
                errors.push(DecodeError::UnknownRegister(token.to_string()));
                None
            }
        },
        None => {
            errors.push(DecodeError::MissingOperand(mnemonic));
            None
        }
    }
}
