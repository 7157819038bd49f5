//! MacVM is a small stack-based virtual machine.
//!
//! Programs are plain text, one instruction per line. Each line is decoded
//! into an [`asm::Instruction`] and executed against an explicit execution
//! stack and a bank of six general-purpose registers.
//!
//! # Example
//!
//! ```text
//! PSH 5
//! PSH 6
//! ADD
//! POP
//! HLT
//! ```
//!
//! Running this program prints `popped 11`.
//!
//! # Instructions
//!
//! | Instruction | Usage     | Brief |
//! |-------------|-----------|-------|
//! | Psh         | PSH _n_   | Push `n` on top of the stack. |
//! | Pop         | POP       | Pop the top value and print it. |
//! | Add         | ADD       | Pop two values and push their sum. |
//! | Sub         | SUB       | Pop two values and push their difference. The value pushed first is the left operand. |
//! | Mul         | MUL       | Pop two values and push their product. |
//! | Div         | DIV       | Pop two values and push their quotient. Dividing by zero halts the machine. |
//! | Jmp         | JMP _a_   | Continue execution at address `a` (an instruction index). |
//! | Mov         | MOV _d s_ | Copy register `s` into register `d`. `s` is unchanged. |
//! | Ldr         | LDR _r_   | Push the current value of register `r`. |
//! | Str         | STR _r_   | Write the stack top (without popping) into register `r`. |
//! | Hlt         | HLT       | Stop the machine. |
//! | Nop         | NOP       | Do nothing. Unknown mnemonics also evaluate as nops. |
//!
//! # Important notes
//!
//! - Mnemonics and register names (`A` through `F`) are upper-case,
//!   exact-match.
//! - The stack grows without a hard capacity, but the machine halts with an
//!   overflow error once its length exceeds the configured limit.
//! - A program that never halts and never runs past its last instruction
//!   loops forever. Running past the end without a `HLT` is a fatal error.

pub mod asm;
pub mod machine;
pub mod register;
pub mod stack;
