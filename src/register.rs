//! The register file

use std::fmt;

/// The six general-purpose registers.
///
/// The program counter and stack pointer are plain fields on the machine
/// rather than registers, so register-transfer instructions cannot touch
/// control state.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Register {
    A,
    B,
    C,
    D,
    E,
    F,
}

pub const NUM_REGISTERS: usize = 6;

impl Register {
    pub const ALL: [Register; NUM_REGISTERS] = [
        Register::A,
        Register::B,
        Register::C,
        Register::D,
        Register::E,
        Register::F,
    ];

    /// Resolve a register name. Names are exact-match, upper-case.
    pub fn from_name(name: &str) -> Option<Register> {
        match name {
            "A" => Some(Register::A),
            "B" => Some(Register::B),
            "C" => Some(Register::C),
            "D" => Some(Register::D),
            "E" => Some(Register::E),
            "F" => Some(Register::F),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::D => "D",
            Register::E => "E",
            Register::F => "F",
        }
    }
}

/// Fixed bank of general-purpose registers, all zero at startup.
#[derive(Debug, Default)]
pub struct RegisterFile {
    values: [i64; NUM_REGISTERS],
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile::default()
    }

    pub fn get(&self, register: Register) -> i64 {
        self.values[register as usize]
    }

    pub fn set(&mut self, register: Register, value: i64) {
        self.values[register as usize] = value;
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for register in Register::ALL {
            writeln!(f, "{} = {}", register.name(), self.get(register))?;
        }
        Ok(())
    }
}
