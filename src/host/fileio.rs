//! File I/O services over the UTF-64 string convention.
//!
//! The descriptor table is process-wide and holds 2048 slots; 0, 1 and 2
//! are bound to the standard streams, the rest are claimed by `open`. The
//! descriptor handed to bytecode is the slot index. Callers must keep at
//! most one machine active while these services run.

use crate::bitcast;
use crate::consts::{FD_COUNT, IO_BUF_SIZE, WORD_SIZE};
use crate::host::{HOST_ERR, REG_ARG0, REG_ARG1, REG_ARG2};
use crate::interpreter::Machine;
use crate::types::Word;
use crate::utf64;

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

enum Channel {
    Stdin,
    Stdout,
    Stderr,
    File(BufReader<File>),
}

impl Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stdin => io::stdin().lock().read(buf),
            Self::File(f) => f.read(buf),
            _ => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout => io::stdout().lock().write(buf),
            Self::Stderr => io::stderr().lock().write(buf),
            // Reads and writes on one descriptor must be separated by a
            // seek; the read buffer is not rewound here.
            Self::File(f) => f.get_mut().write(buf),
            Self::Stdin => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(f) => f.seek(pos),
            _ => Err(io::Error::from(io::ErrorKind::Unsupported)),
        }
    }

    /// One byte, honoring EOF as `None`.
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn write_all_bytes(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

struct FdTable {
    slots: Vec<Option<Channel>>,
}

impl FdTable {
    fn new() -> Self {
        let mut table = Self { slots: Vec::new() };
        table.reset();
        table
    }

    /// Clear every slot, then bind the standard streams.
    fn reset(&mut self) {
        self.slots.clear();
        self.slots.resize_with(FD_COUNT, || None);
        self.slots[0] = Some(Channel::Stdin);
        self.slots[1] = Some(Channel::Stdout);
        self.slots[2] = Some(Channel::Stderr);
    }

    fn get(&mut self, fd: usize) -> Option<&mut Channel> {
        self.slots.get_mut(fd)?.as_mut()
    }

    /// Bind `file` to the first free slot at or above 3.
    fn claim(&mut self, file: File) -> Option<usize> {
        for (fd, slot) in self.slots.iter_mut().enumerate().skip(3) {
            if slot.is_none() {
                *slot = Some(Channel::File(BufReader::new(file)));
                return Some(fd);
            }
        }
        // Table full; `file` drops and the handle closes.
        None
    }

    fn release(&mut self, fd: usize) -> Option<Channel> {
        self.slots.get_mut(fd)?.take()
    }
}

fn table() -> MutexGuard<'static, FdTable> {
    static TABLE: OnceLock<Mutex<FdTable>> = OnceLock::new();
    TABLE
        .get_or_init(|| Mutex::new(FdTable::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Re-initialize the descriptor table: zero every slot, then bind the
/// standard streams. Open descriptors are dropped.
pub fn init() {
    table().reset();
}

/// Read the UTF-64 string at `addr` out of machine memory as host UTF-8.
fn host_string(vm: &Machine, addr: Word) -> io::Result<String> {
    let words = vm
        .str_words(addr)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut bytes = Vec::with_capacity(words.len());
    for &code in words {
        let mut mb = [0u8; 4];
        let len = utf64::encode_char(&mut mb, code)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            .unwrap_or(0);
        bytes.extend_from_slice(&mb[..len]);
    }
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Map a C-style `fopen` mode string onto open options. `b` is accepted
/// and ignored.
fn open_options(mode: &str) -> Option<OpenOptions> {
    let mut opts = OpenOptions::new();
    let stripped: String = mode.chars().filter(|&c| c != 'b').collect();
    let plus = stripped.contains('+');
    match stripped.chars().next()? {
        'r' => {
            opts.read(true);
            if plus {
                opts.write(true);
            }
        }
        'w' => {
            opts.write(true).create(true).truncate(true);
            if plus {
                opts.read(true);
            }
        }
        'a' => {
            opts.append(true).create(true);
            if plus {
                opts.read(true);
            }
        }
        _ => return None,
    }
    Some(opts)
}

fn try_open(vm: &Machine) -> io::Result<usize> {
    let name = host_string(vm, vm.uregs()[REG_ARG0])?;
    let mode = host_string(vm, vm.uregs()[REG_ARG1])?;
    let opts = open_options(&mode)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bad open mode"))?;
    let file = opts.open(&name)?;
    let fd = table()
        .claim(file)
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "descriptor table full"))?;
    debug!(fd, name = name.as_str(), mode = mode.as_str(), "opened");
    Ok(fd)
}

/// `open(name_ptr, mode_ptr)`: returns a fresh descriptor, or `-1`.
pub fn open(vm: &mut Machine) -> Word {
    match try_open(vm) {
        Ok(fd) => fd as Word,
        Err(err) => {
            debug!("open failed: {err}");
            HOST_ERR
        }
    }
}

/// `close(fd)`: release a descriptor. Closing a free slot returns `-1`.
pub fn close(vm: &mut Machine) -> Word {
    let fd = vm.uregs()[REG_ARG0] as usize;
    match table().release(fd) {
        Some(channel) => {
            drop(channel);
            debug!(fd, "closed");
            0
        }
        None => HOST_ERR,
    }
}

/// `seek(fd, offset, whence)`: whence 0/1/2 map to set/cur/end.
pub fn seek(vm: &mut Machine) -> Word {
    let fd = vm.uregs()[REG_ARG0] as usize;
    let offset = bitcast::i64_from_word(vm.uregs()[REG_ARG1]);
    let pos = match vm.uregs()[REG_ARG2] {
        0 if offset >= 0 => SeekFrom::Start(offset as u64),
        0 => return HOST_ERR,
        1 => SeekFrom::Current(offset),
        2 => SeekFrom::End(offset),
        _ => return HOST_ERR,
    };
    let mut fds = table();
    match fds.get(fd).map(|channel| channel.seek(pos)) {
        Some(Ok(_)) => 0,
        _ => HOST_ERR,
    }
}

/// `writetxt(fd, ptr, count)`: encode `count` codepoints from memory and
/// write them out.
///
/// Returns the number of codepoints that reached the descriptor. On a
/// short write that is the count of complete characters in the written
/// prefix, a trailing truncated sequence excluded. `-1` only on encode
/// error.
pub fn write_text(vm: &mut Machine) -> Word {
    let fd = vm.uregs()[REG_ARG0] as usize;
    let ptr = vm.uregs()[REG_ARG1];
    let count = vm.uregs()[REG_ARG2];

    let mut fds = table();
    let channel = match fds.get(fd) {
        Some(channel) => channel,
        None => return 0,
    };

    let mut buf = [0u8; IO_BUF_SIZE];
    let mut written: Word = 0;
    while written < count {
        let words = match vm.words_at(ptr.wrapping_add(written), count - written) {
            Ok(words) => words,
            Err(_) => return HOST_ERR,
        };
        let enc = match utf64::encode_counted(&mut buf, words) {
            Ok(enc) => enc,
            Err(_) => return HOST_ERR,
        };

        let mut sent = 0;
        while sent < enc.bytes {
            match channel.write(&buf[sent..enc.bytes]) {
                Ok(n) if n > 0 => sent += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                // Short write: count the complete characters that landed.
                _ => {
                    let chars = utf64::complete_chars(&buf[..sent]).unwrap_or(0);
                    return written + chars as Word;
                }
            }
        }
        written += enc.chars as Word;
    }
    written
}

/// `writebytes(fd, ptr, count)`: write `count` raw words, native-endian.
pub fn write_bytes(vm: &mut Machine) -> Word {
    let fd = vm.uregs()[REG_ARG0] as usize;
    let ptr = vm.uregs()[REG_ARG1];
    let count = vm.uregs()[REG_ARG2];

    let mut fds = table();
    let channel = match fds.get(fd) {
        Some(channel) => channel,
        None => return HOST_ERR,
    };

    let mut buf = [0u8; IO_BUF_SIZE];
    let chunk_words = (IO_BUF_SIZE / WORD_SIZE) as Word;
    let mut done: Word = 0;
    while done < count {
        let take = chunk_words.min(count - done);
        let words = match vm.words_at(ptr.wrapping_add(done), take) {
            Ok(words) => words,
            Err(_) => return HOST_ERR,
        };
        for (chunk, word) in buf.chunks_exact_mut(WORD_SIZE).zip(words) {
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
        if channel
            .write_all_bytes(&buf[..take as usize * WORD_SIZE])
            .is_err()
        {
            return done;
        }
        done += take;
    }
    done
}

/// `readbytes(fd, ptr, count)`: read up to `count` raw words. A partial
/// trailing word at end of stream is consumed but not stored.
pub fn read_bytes(vm: &mut Machine) -> Word {
    let fd = vm.uregs()[REG_ARG0] as usize;
    let ptr = vm.uregs()[REG_ARG1];
    let count = vm.uregs()[REG_ARG2];

    let mut fds = table();
    let channel = match fds.get(fd) {
        Some(channel) => channel,
        None => return HOST_ERR,
    };

    let mut buf = [0u8; IO_BUF_SIZE];
    let mut done: Word = 0;
    while done < count {
        let want = (IO_BUF_SIZE as Word).min((count - done).saturating_mul(WORD_SIZE as Word)) as usize;
        let mut got = 0;
        let mut eof = false;
        while got < want {
            match channel.read(&mut buf[got..want]) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => return done,
            }
        }

        let words = (got / WORD_SIZE) as Word;
        let dst = match vm.words_at_mut(ptr.wrapping_add(done), words) {
            Ok(dst) => dst,
            Err(_) => return HOST_ERR,
        };
        for (word, chunk) in dst.iter_mut().zip(buf.chunks_exact(WORD_SIZE)) {
            let mut raw = [0u8; WORD_SIZE];
            raw.copy_from_slice(chunk);
            *word = Word::from_ne_bytes(raw);
        }
        done += words;
        if eof {
            break;
        }
    }
    done
}

/// `readtxt(fd, ptr, count)`: decode up to `count` codepoints.
///
/// Malformed bytes before a character are skipped; a byte that fails the
/// continuation check discards the accumulated sequence and restarts the
/// character at the next byte.
pub fn read_text(vm: &mut Machine) -> Word {
    let fd = vm.uregs()[REG_ARG0] as usize;
    let ptr = vm.uregs()[REG_ARG1];
    let count = vm.uregs()[REG_ARG2];

    let mut fds = table();
    let channel = match fds.get(fd) {
        Some(channel) => channel,
        None => return HOST_ERR,
    };

    let mut stored: Word = 0;
    'chars: while stored < count {
        // Hunt for a valid lead byte.
        let (lead, len) = loop {
            match channel.read_byte() {
                Ok(Some(byte)) => {
                    if let Ok(len) = utf64::mblen(byte) {
                        break (byte, len);
                    }
                }
                Ok(None) => return stored,
                Err(_) => return HOST_ERR,
            }
        };

        let mut seq = [0u8; 8];
        seq[0] = lead;
        for slot in seq.iter_mut().take(len).skip(1) {
            match channel.read_byte() {
                Ok(Some(byte)) if byte >> 6 == 0b10 => *slot = byte,
                // Bad continuation; drop the sequence and start over.
                Ok(Some(_)) => continue 'chars,
                Ok(None) => return stored,
                Err(_) => return HOST_ERR,
            }
        }

        if let Ok(Some((code, _))) = utf64::decode_char(&seq[..len]) {
            if vm.set_word(ptr.wrapping_add(stored), code).is_err() {
                return HOST_ERR;
            }
            stored += 1;
        }
    }
    stored
}
