//! Guarded linear memory arena.
//!
//! The arena is a page-aligned anonymous mapping flanked by two `PROT_NONE`
//! guard pages, so any raw access past either end of the usable region
//! faults deterministically. Checked access goes through the word slices
//! returned by [`GuardedMemory::words`] and [`GuardedMemory::words_mut`];
//! nothing else in the crate touches the mapping directly.

use crate::consts::WORD_SIZE;
use crate::types::Word;

use std::{io, ptr, slice};

/// Word arena with inaccessible guard pages on both flanks.
#[derive(Debug)]
pub struct GuardedMemory {
    base: *mut u8,
    map_len: usize,
    words: *mut Word,
    len: usize,
}

// The arena is single-owner; the raw pointers never alias another owner.
unsafe impl Send for GuardedMemory {}

impl GuardedMemory {
    /// Allocate an arena of `len` words.
    ///
    /// The usable byte length is rounded up to a whole page. On failure the
    /// OS error is returned and nothing stays mapped.
    pub fn new(len: Word) -> io::Result<Self> {
        let page = page_size();
        let bytes = (len as usize)
            .checked_mul(WORD_SIZE)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "memory size overflow"))?;
        let usable = match bytes % page {
            0 => bytes,
            rem => bytes + (page - rem),
        };
        let map_len = usable + 2 * page;

        // Safety: anonymous private mapping, no fd, result checked below.
        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let base = base.cast::<u8>();

        // Safety: both guard pages lie inside the mapping created above.
        let protected = unsafe {
            let head = libc::mprotect(base.cast(), page, libc::PROT_NONE);
            let tail = libc::mprotect(base.add(page + usable).cast(), page, libc::PROT_NONE);
            head == 0 && tail == 0
        };
        if !protected {
            let err = io::Error::last_os_error();
            // Safety: unmaps exactly the mapping created above.
            unsafe { libc::munmap(base.cast(), map_len) };
            return Err(err);
        }

        // Safety: the usable region starts one page in and stays word aligned.
        let words = unsafe { base.add(page) }.cast::<Word>();

        Ok(Self {
            base,
            map_len,
            words,
            len: len as usize,
        })
    }

    /// Usable length, in words.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no words at all.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The usable region as a word slice.
    pub fn words(&self) -> &[Word] {
        // Safety: `words` points at `len` mapped words, zero-initialized by
        // the anonymous mapping.
        unsafe { slice::from_raw_parts(self.words, self.len) }
    }

    /// The usable region as a mutable word slice.
    pub fn words_mut(&mut self) -> &mut [Word] {
        // Safety: as in `words`, and `&mut self` guarantees uniqueness.
        unsafe { slice::from_raw_parts_mut(self.words, self.len) }
    }
}

impl Drop for GuardedMemory {
    fn drop(&mut self) {
        // Safety: releases the exact mapping created in `new`, guards
        // included.
        unsafe { libc::munmap(self.base.cast(), self.map_len) };
    }
}

fn page_size() -> usize {
    // Safety: sysconf reads a static configuration value.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as usize
    }
}
