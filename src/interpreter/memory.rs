//! Bounds-checked access into the machine's linear memory.
//!
//! Every address coming out of bytecode passes through here. Out-of-range
//! addresses surface as [`Fault::MemoryOverflow`]; the guard pages behind
//! the arena stay as the hard backstop for raw access.

use super::Machine;
use crate::error::Fault;
use crate::types::Word;
use crate::utf64;

impl Machine {
    /// Load the word at `addr`.
    pub fn word(&self, addr: Word) -> Result<Word, Fault> {
        self.memory
            .words()
            .get(addr as usize)
            .copied()
            .ok_or(Fault::MemoryOverflow { addr })
    }

    /// Store `value` at `addr`.
    pub fn set_word(&mut self, addr: Word, value: Word) -> Result<(), Fault> {
        match self.memory.words_mut().get_mut(addr as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Fault::MemoryOverflow { addr }),
        }
    }

    /// The `len` words starting at `addr`.
    pub fn words_at(&self, addr: Word, len: Word) -> Result<&[Word], Fault> {
        let start = addr as usize;
        start
            .checked_add(len as usize)
            .and_then(|end| self.memory.words().get(start..end))
            .ok_or(Fault::MemoryOverflow { addr })
    }

    /// Mutable view of the `len` words starting at `addr`.
    pub fn words_at_mut(&mut self, addr: Word, len: Word) -> Result<&mut [Word], Fault> {
        let start = addr as usize;
        start
            .checked_add(len as usize)
            .and_then(|end| self.memory.words_mut().get_mut(start..end))
            .ok_or(Fault::MemoryOverflow { addr })
    }

    /// Copy `words` into memory starting at `addr`.
    pub fn set_words(&mut self, addr: Word, words: &[Word]) -> Result<(), Fault> {
        self.words_at_mut(addr, words.len() as Word)?
            .copy_from_slice(words);
        Ok(())
    }

    /// The NUL-terminated word string starting at `addr`, terminator
    /// excluded. A string that runs to the end of memory unterminated is
    /// returned in full.
    pub fn str_words(&self, addr: Word) -> Result<&[Word], Fault> {
        let tail = self
            .memory
            .words()
            .get(addr as usize..)
            .ok_or(Fault::MemoryOverflow { addr })?;
        Ok(&tail[..utf64::str_len(tail)])
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Machine;
    use crate::error::Fault;

    #[test]
    fn out_of_range_addresses_fault() {
        let mut vm = Machine::new(64).expect("allocate");
        assert_eq!(vm.word(64), Err(Fault::MemoryOverflow { addr: 64 }));
        assert_eq!(
            vm.set_word(u64::MAX, 1),
            Err(Fault::MemoryOverflow { addr: u64::MAX })
        );
        assert!(vm.words_at(60, 5).is_err());
        assert!(vm.words_at(60, 4).is_ok());
    }

    #[test]
    fn word_strings_stop_at_the_terminator() {
        let mut vm = Machine::new(64).expect("allocate");
        vm.set_words(20, &[0x48, 0x69, 0x00]).expect("store");
        assert_eq!(vm.str_words(20).expect("read"), &[0x48, 0x69]);
    }
}
