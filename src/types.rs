//! Atomic types of the machine.

/// Register ID type
pub type RegisterId = usize;

/// Word type
pub type Word = u64;
