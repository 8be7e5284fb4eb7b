//! Exposed constructors API for the [`Machine`]

use super::Machine;
use crate::consts::*;
use crate::host;
use crate::memory::GuardedMemory;
use crate::types::Word;

use std::io;

use tracing::debug;

impl Machine {
    /// Create a machine with `mem_words` words of guarded linear memory.
    ///
    /// Memory starts zeroed and the host service table is published in the
    /// header region, so loaded images can reach the host through the
    /// well-known addresses.
    pub fn new(mem_words: Word) -> io::Result<Self> {
        let memory = GuardedMemory::new(mem_words)?;
        let mut vm = Self {
            uregs: [0; VM_REGISTER_COUNT],
            fregs: [0.0; VM_FLOAT_REGISTER_COUNT],
            memory,
            imglen: 0,
        };
        host::install(&mut vm);
        Ok(vm)
    }

    /// Create a machine with the default memory size.
    pub fn with_default_memory() -> io::Result<Self> {
        Self::new(VM_DEFAULT_MEM_WORDS)
    }

    /// Copy a program image to the load address and point `$pc` at it.
    pub fn load_image(&mut self, image: &[Word]) -> io::Result<()> {
        let start = VM_LOAD_ADDR as usize;
        let mem = self.memory.words_mut();
        if mem.len() < start || mem.len() - start < image.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "address space is full",
            ));
        }
        mem[start..start + image.len()].copy_from_slice(image);
        self.imglen = image.len() as Word;
        self.uregs[REG_PC] = VM_LOAD_ADDR;
        debug!(words = image.len(), "image loaded");
        Ok(())
    }
}
