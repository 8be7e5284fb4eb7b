//! A register machine over a 64-bit-word address space.
//!
//! The addressable unit of the machine is a 64-bit word, interpreted per
//! operation as unsigned, signed, double, codepoint or host function
//! pointer. Programs are raw word images executed by
//! [`interpreter::Machine::execute`]; they reach the host (formatted
//! output, file I/O) through the `CALL` instruction and the pointer table
//! published in the memory header.

pub mod bitcast;
pub mod consts;
pub mod error;
pub mod host;
pub mod interpreter;
pub mod memory;
pub mod opcode;
pub mod utf64;

mod types;

pub use types::{RegisterId, Word};

pub mod prelude {
    //! Reexport of the types most embedders need.

    pub use crate::consts::*;
    pub use crate::error::{Fault, VmError};
    pub use crate::host::{self, HostFn, HOST_ERR};
    pub use crate::interpreter::Machine;
    pub use crate::memory::GuardedMemory;
    pub use crate::opcode::Opcode;
    pub use crate::types::{RegisterId, Word};
    pub use crate::utf64;
}
