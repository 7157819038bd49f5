//! The fetch/eval loop

use crate::asm::{self, DecodeError, Instruction};
use crate::register::RegisterFile;
use crate::stack::Stack;
use std::io::{self, Write};
use thiserror::Error;

/// Default overflow limit for the execution stack.
pub const DEFAULT_STACK_LIMIT: usize = 256;

/// Fatal execution errors. Any of these halts the machine; the triggering
/// instruction's effect is not completed.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("pop from an empty stack")]
    EmptyStack,
    #[error("stack overflow: {len} values exceeds the limit of {limit}")]
    StackOverflow { len: usize, limit: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("program counter {pc} out of range, program has {len} instructions")]
    PcOutOfRange { pc: i64, len: usize },
    #[error("invalid register operand")]
    InvalidRegister,
    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

/// The virtual machine: a decoded program, a program counter, the register
/// file and the execution stack.
///
/// `W` is the sink for observable output (the `popped N` lines); it is
/// stdout for the binary and a buffer in tests.
pub struct Machine<W = io::Stdout> {
    program: Vec<Instruction>,
    pc: usize,
    running: bool,
    // Set by JMP to suppress the default pc increment for one cycle.
    jumped: bool,
    stack: Stack,
    registers: RegisterFile,
    stack_limit: usize,
    out: W,
}

impl Machine<io::Stdout> {
    /// A machine that prints observable output to stdout.
    pub fn new(stack_limit: usize) -> Self {
        Machine::with_output(stack_limit, io::stdout())
    }
}

impl<W: Write> Machine<W> {
    pub fn with_output(stack_limit: usize, out: W) -> Self {
        Machine {
            program: Vec::new(),
            pc: 0,
            running: true,
            jumped: false,
            stack: Stack::new(),
            registers: RegisterFile::new(),
            stack_limit,
            out,
        }
    }

    /// Decode a whole source text and append it to the program, one
    /// instruction per line. Returns the decode diagnostics paired with
    /// their 1-based line numbers; malformed lines still produce a
    /// best-effort instruction, so the program stays line-addressable.
    pub fn load(&mut self, source: &str) -> Vec<(usize, DecodeError)> {
        let mut diagnostics = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let errors = self.push_line(line);
            diagnostics.extend(errors.into_iter().map(|error| (index + 1, error)));
        }
        diagnostics
    }

    /// Decode one line and append the instruction to the program.
    pub fn push_line(&mut self, line: &str) -> Vec<DecodeError> {
        let (instruction, errors) = asm::decode(line);
        self.program.push(instruction);
        errors
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn program_len(&self) -> usize {
        self.program.len()
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    /// Run until the machine halts or an error stops it.
    pub fn run(&mut self) -> Result<(), VmError> {
        while self.running {
            self.step()?;
        }
        Ok(())
    }

    /// One fetch/eval cycle: fetch at `pc`, check the overflow limit,
    /// evaluate, then advance `pc` unless a jump redirected it.
    pub fn step(&mut self) -> Result<(), VmError> {
        if !self.running {
            return Ok(());
        }

        let instruction = match self.program.get(self.pc) {
            Some(instruction) => instruction.clone(),
            None => {
                // Ran past the end without a HLT, or a jump landed outside
                // the program.
                self.running = false;
                return Err(VmError::PcOutOfRange {
                    pc: self.pc as i64,
                    len: self.program.len(),
                });
            }
        };

        self.jumped = false;

        if self.stack.len() > self.stack_limit {
            self.running = false;
            return Err(VmError::StackOverflow {
                len: self.stack.len(),
                limit: self.stack_limit,
            });
        }

        if let Err(error) = self.eval(&instruction) {
            self.running = false;
            return Err(error);
        }

        if !self.jumped {
            self.pc += 1;
        }

        Ok(())
    }

    fn eval(&mut self, instruction: &Instruction) -> Result<(), VmError> {
        match *instruction {
            Instruction::Hlt => self.running = false,
            Instruction::Psh(value) => self.stack.push(value),
            Instruction::Pop => {
                let value = self.pop()?;
                writeln!(self.out, "popped {}", value)?;
            }
            Instruction::Add => self.binary_op(|lhs, rhs| Ok(lhs.wrapping_add(rhs)))?,
            Instruction::Sub => self.binary_op(|lhs, rhs| Ok(lhs.wrapping_sub(rhs)))?,
            Instruction::Mul => self.binary_op(|lhs, rhs| Ok(lhs.wrapping_mul(rhs)))?,
            Instruction::Div => self.binary_op(|lhs, rhs| {
                if rhs == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(lhs.wrapping_div(rhs))
                }
            })?,
            Instruction::Jmp(address) => {
                let target = usize::try_from(address).map_err(|_| VmError::PcOutOfRange {
                    pc: address,
                    len: self.program.len(),
                })?;
                self.pc = target;
                self.jumped = true;
            }
            Instruction::Mov { dst, src } => {
                let dst = dst.ok_or(VmError::InvalidRegister)?;
                let src = src.ok_or(VmError::InvalidRegister)?;
                // Pure copy, the source keeps its value.
                self.registers.set(dst, self.registers.get(src));
            }
            Instruction::Ldr(register) => {
                let register = register.ok_or(VmError::InvalidRegister)?;
                self.stack.push(self.registers.get(register));
            }
            Instruction::Str(register) => {
                let register = register.ok_or(VmError::InvalidRegister)?;
                let value = self.stack.top().ok_or(VmError::EmptyStack)?;
                self.registers.set(register, value);
            }
            Instruction::Nop => {}
        }

        Ok(())
    }

    /// Pop two operands and push `op(lower, top)`: the value pushed first
    /// is the left operand, so `PSH 6; PSH 5; SUB` pushes `6 - 5`.
    fn binary_op(&mut self, op: impl Fn(i64, i64) -> Result<i64, VmError>) -> Result<(), VmError> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        self.stack.push(op(lhs, rhs)?);
        Ok(())
    }

    fn pop(&mut self) -> Result<i64, VmError> {
        self.stack.pop().ok_or(VmError::EmptyStack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::Register;

    fn machine() -> Machine<Vec<u8>> {
        Machine::with_output(DEFAULT_STACK_LIMIT, Vec::new())
    }

    fn run_source(source: &str) -> (Machine<Vec<u8>>, Result<(), VmError>) {
        let mut vm = machine();
        let diagnostics = vm.load(source);
        assert!(diagnostics.is_empty(), "decode errors: {:?}", diagnostics);
        let result = vm.run();
        (vm, result)
    }

    fn output(vm: &Machine<Vec<u8>>) -> String {
        String::from_utf8(vm.out.clone()).unwrap()
    }

    #[test]
    fn add_program_prints_sum() {
        let (vm, result) = run_source("PSH 5\nPSH 6\nADD\nPOP\nHLT");

        result.unwrap();
        assert_eq!(output(&vm), "popped 11\n");
        assert!(!vm.is_running());
        assert_eq!(vm.stack().len(), 0);
    }

    #[test]
    fn mul_program_prints_product() {
        let (vm, result) = run_source("PSH 1\nPSH 2\nMUL\nPOP\nHLT");

        result.unwrap();
        assert_eq!(output(&vm), "popped 2\n");
        assert!(!vm.is_running());
    }

    #[test]
    fn sub_uses_push_order() {
        // The value pushed first is the left operand: 6 - 5.
        let (vm, result) = run_source("PSH 6\nPSH 5\nSUB\nPOP\nHLT");

        result.unwrap();
        assert_eq!(output(&vm), "popped 1\n");
    }

    #[test]
    fn div_uses_push_order() {
        let (vm, result) = run_source("PSH 12\nPSH 4\nDIV\nPOP\nHLT");

        result.unwrap();
        assert_eq!(output(&vm), "popped 3\n");
    }

    #[test]
    fn div_by_zero_is_fatal() {
        let (vm, result) = run_source("PSH 4\nPSH 0\nDIV\nHLT");

        assert!(matches!(result, Err(VmError::DivisionByZero)));
        assert!(!vm.is_running());
        // The failing DIV produced no pop output.
        assert_eq!(output(&vm), "");
    }

    #[test]
    fn add_and_mul_are_commutative() {
        let (forward, _) = run_source("PSH 3\nPSH 7\nADD\nHLT");
        let (backward, _) = run_source("PSH 7\nPSH 3\nADD\nHLT");
        assert_eq!(forward.stack().top(), backward.stack().top());

        let (forward, _) = run_source("PSH 3\nPSH 7\nMUL\nHLT");
        let (backward, _) = run_source("PSH 7\nPSH 3\nMUL\nHLT");
        assert_eq!(forward.stack().top(), backward.stack().top());
    }

    #[test]
    fn pop_on_empty_stack_is_fatal() {
        let (vm, result) = run_source("POP\nHLT");

        assert!(matches!(result, Err(VmError::EmptyStack)));
        assert!(!vm.is_running());
    }

    #[test]
    fn running_past_the_end_is_fatal() {
        let (vm, result) = run_source("PSH 1\nPSH 2\nADD");

        assert!(matches!(
            result,
            Err(VmError::PcOutOfRange { pc: 3, len: 3 })
        ));
        assert!(!vm.is_running());
    }

    #[test]
    fn jump_sets_pc_and_suppresses_increment() {
        let mut vm = machine();
        vm.load("NOP\nNOP\nJMP 0\nHLT");

        vm.step().unwrap();
        vm.step().unwrap();
        assert_eq!(vm.pc(), 2);

        // The jump lands exactly on the target, no +1 afterwards.
        vm.step().unwrap();
        assert_eq!(vm.pc(), 0);
        assert!(vm.is_running());
    }

    #[test]
    fn jump_forward_skips_instructions() {
        let (vm, result) = run_source("JMP 3\nPSH 1\nPSH 2\nHLT");

        result.unwrap();
        assert_eq!(vm.stack().len(), 0);
        assert!(!vm.is_running());
    }

    #[test]
    fn negative_jump_target_is_fatal() {
        let mut vm = machine();
        vm.load("JMP -1\nHLT");

        let result = vm.run();
        assert!(matches!(
            result,
            Err(VmError::PcOutOfRange { pc: -1, .. })
        ));
        assert!(!vm.is_running());
    }

    #[test]
    fn stack_overflow_halts_without_growing() {
        let mut vm = Machine::with_output(4, Vec::new());
        // Backward jump keeps pushing forever; the limit check stops it.
        vm.load("PSH 1\nJMP 0\nHLT");

        let result = vm.run();
        assert!(matches!(
            result,
            Err(VmError::StackOverflow { len: 5, limit: 4 })
        ));
        assert!(!vm.is_running());
        assert_eq!(vm.stack().len(), 5);
    }

    #[test]
    fn overflow_check_runs_before_the_instruction() {
        let mut vm = Machine::with_output(2, Vec::new());
        vm.load("PSH 1\nPSH 2\nPSH 3\nPOP\nHLT");

        // Lengths 1..3 are fine; the cycle after the third push sees
        // len > limit and must not evaluate the POP.
        let result = vm.run();
        assert!(matches!(result, Err(VmError::StackOverflow { .. })));
        assert_eq!(output(&vm), "");
        assert_eq!(vm.stack().len(), 3);
    }

    #[test]
    fn mov_copies_without_zeroing_source() {
        let mut vm = machine();
        vm.load("PSH 9\nSTR A\nMOV B A\nHLT");
        vm.run().unwrap();

        assert_eq!(vm.registers().get(Register::A), 9);
        assert_eq!(vm.registers().get(Register::B), 9);
    }

    #[test]
    fn ldr_pushes_register_value() {
        let mut vm = machine();
        vm.registers.set(Register::D, 21);
        vm.load("LDR D\nLDR D\nADD\nPOP\nHLT");
        vm.run().unwrap();

        assert_eq!(output(&vm), "popped 42\n");
        assert_eq!(vm.registers().get(Register::D), 21);
    }

    #[test]
    fn str_reads_top_without_popping() {
        let mut vm = machine();
        vm.load("PSH 7\nSTR E\nHLT");
        vm.run().unwrap();

        assert_eq!(vm.registers().get(Register::E), 7);
        assert_eq!(vm.stack().len(), 1);
        assert_eq!(vm.stack().top(), Some(7));
    }

    #[test]
    fn str_on_empty_stack_is_fatal() {
        let (vm, result) = run_source("STR A\nHLT");

        assert!(matches!(result, Err(VmError::EmptyStack)));
        assert!(!vm.is_running());
    }

    #[test]
    fn invalid_register_marker_is_rejected_at_eval() {
        let mut vm = machine();
        let errors = vm.push_line("MOV A Q");
        assert_eq!(errors.len(), 1);
        vm.push_line("HLT");

        let result = vm.run();
        assert!(matches!(result, Err(VmError::InvalidRegister)));
        assert!(!vm.is_running());
        assert_eq!(vm.registers().get(Register::A), 0);
    }

    #[test]
    fn unknown_mnemonic_evaluates_as_nop() {
        let mut vm = machine();
        vm.push_line("PSH 1");
        let errors = vm.push_line("BOGUS");
        assert_eq!(errors.len(), 1);
        vm.push_line("HLT");

        vm.run().unwrap();
        assert_eq!(vm.stack().len(), 1);
        assert_eq!(vm.stack().top(), Some(1));
        for register in Register::ALL {
            assert_eq!(vm.registers().get(register), 0);
        }
    }

    #[test]
    fn load_reports_line_numbers() {
        let mut vm = machine();
        let diagnostics = vm.load("PSH 1\nBOGUS\nPSH oops\nHLT");

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].0, 2);
        assert_eq!(
            diagnostics[0].1,
            DecodeError::UnknownMnemonic("BOGUS".to_string())
        );
        assert_eq!(diagnostics[1].0, 3);
        // Decoding continued past the malformed lines.
        assert_eq!(vm.program_len(), 4);
    }

    #[test]
    fn interactive_append_and_step() {
        let mut vm = machine();

        for line in ["PSH 2", "PSH 3", "ADD", "POP"] {
            let errors = vm.push_line(line);
            assert!(errors.is_empty());
            assert!(vm.is_running());
            vm.step().unwrap();
        }
        assert_eq!(output(&vm), "popped 5\n");

        vm.push_line("HLT");
        vm.step().unwrap();
        assert!(!vm.is_running());

        // Lines appended after the halt are kept but no longer evaluated.
        vm.push_line("PSH 9");
        vm.step().unwrap();
        assert_eq!(vm.stack().len(), 0);
    }

    #[test]
    fn lifo_survives_a_full_program() {
        let (vm, result) = run_source("PSH 1\nPSH 2\nPSH 3\nHLT");

        result.unwrap();
        assert_eq!(vm.stack().to_vec(), vec![3, 2, 1]);
    }
}
