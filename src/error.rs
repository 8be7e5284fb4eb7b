//! Runtime error implementation for the machine.

use crate::types::Word;

use std::{fmt, io};

use thiserror::Error;

/// Execution fault representation for the dispatch loop.
///
/// Faults are well-formed: the machine stops at the offending instruction
/// and reports what it was asked to do. They are not recoverable from
/// bytecode; programs observe host failures through `-1` return words
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Attempt to access a word outside the linear memory.
    MemoryOverflow {
        /// The offending word address.
        addr: Word,
    },
    /// The fetched word doesn't map to any opcode.
    InvalidOpcode {
        /// The fetched word.
        word: Word,
        /// Address it was fetched from.
        pc: Word,
    },
    /// An operand named a register outside the file.
    InvalidRegister {
        /// The operand value.
        index: Word,
    },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryOverflow { addr } => {
                write!(f, "memory access out of bounds at {addr:#x}")
            }
            Self::InvalidOpcode { word, pc } => {
                write!(f, "invalid opcode {word:#x} at {pc:#x}")
            }
            Self::InvalidRegister { index } => {
                write!(f, "register index {index} out of range")
            }
        }
    }
}

impl std::error::Error for Fault {}

/// Errors [`execute`](crate::interpreter::Machine::execute) surfaces to the
/// embedder.
#[derive(Debug, Error)]
pub enum VmError {
    /// The dispatch loop hit a well-formed fault.
    #[error("execution fault: {0}")]
    Fault(#[from] Fault),
    /// I/O and OS related errors.
    #[error("unrecoverable error: {0}")]
    Io(#[from] io::Error),
}

impl VmError {
    /// Return the fault that stopped execution, if applicable.
    pub const fn fault(&self) -> Option<Fault> {
        match self {
            Self::Fault(fault) => Some(*fault),
            Self::Io(_) => None,
        }
    }
}
