//! VM parameters

use crate::types::Word;

use std::mem;

/* REGISTER FILE */

/// Register count of the unsigned/integer file.
pub const VM_REGISTER_COUNT: usize = 8;

/// Register count of the float file.
pub const VM_FLOAT_REGISTER_COUNT: usize = 8;

/// The program counter. Word address of the next instruction.
pub const REG_PC: usize = 0;

/// Caller-defined frame base. Anchors variadic overflow arguments.
pub const REG_BASE: usize = 1;

/// Caller-defined frame pointer.
pub const REG_FRAME: usize = 2;

/// High word of multiplication; remainder of division.
pub const REG_OVERFLOW: usize = 3;

/// Last comparison result. Zero is false, anything else is true.
pub const REG_COND: usize = 4;

/* END */

/* MEMORY TYPES */

/// Length of a word, in bytes
pub const WORD_SIZE: usize = mem::size_of::<Word>();

/// Word address the program image is copied to, and the initial `$pc`.
///
/// Words below this address form the scratch/header region.
pub const VM_LOAD_ADDR: Word = 1024;

/// Default linear memory size, in words.
pub const VM_DEFAULT_MEM_WORDS: Word = 64 * 1024 * 1024;

/// Word address of the first published host service pointer.
pub const HOST_TABLE_ADDR: Word = 8;

/* END */

/// Capacity of the host file descriptor table.
pub const FD_COUNT: usize = 2048;

/// Scratch buffer size for the codec and formatter paths, in bytes.
pub const IO_BUF_SIZE: usize = 8192;
