//! `printf`-style formatted output driven by the host calling convention.

use crate::bitcast;
use crate::consts::{IO_BUF_SIZE, REG_BASE};
use crate::host::{HOST_ERR, REG_ARG0};
use crate::interpreter::Machine;
use crate::types::Word;
use crate::utf64;

use std::io::{self, Write};

use tracing::debug;

fn mem_word(vm: &Machine, addr: Word) -> io::Result<Word> {
    vm.word(addr)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Variadic cursor over the calling convention: integer-class arguments
/// ride `U[3..=7]`, float-class `F[0..=4]`, and everything beyond spills
/// to the overflow slots below `$base`.
struct VarArgs {
    nth_int: usize,
    nth_flo: usize,
    nth_arg: Word,
}

impl VarArgs {
    fn new() -> Self {
        // The format pointer already consumed `U[3]`.
        Self {
            nth_int: 4,
            nth_flo: 0,
            nth_arg: 1,
        }
    }

    fn take_int(&mut self, vm: &Machine) -> io::Result<Word> {
        let value = if self.nth_int <= 7 {
            vm.uregs()[self.nth_int]
        } else {
            let base = vm.uregs()[REG_BASE];
            mem_word(vm, base.wrapping_sub(self.nth_arg).wrapping_add(3))?
        };
        self.nth_int += 1;
        self.nth_arg += 1;
        Ok(value)
    }

    fn take_float(&mut self, vm: &Machine) -> io::Result<f64> {
        let value = if self.nth_flo <= 4 {
            vm.fregs()[self.nth_flo]
        } else {
            let base = vm.uregs()[REG_BASE];
            bitcast::f64_from_word(mem_word(
                vm,
                base.wrapping_sub(self.nth_arg).wrapping_add(8),
            )?)
        };
        self.nth_flo += 1;
        self.nth_arg += 1;
        Ok(value)
    }
}

/// Line buffer between the codec and the sink, flushed when full and at
/// the end of formatting. Tracks codepoints, not bytes.
struct LineBuf<'a, W: Write> {
    out: &'a mut W,
    buf: [u8; IO_BUF_SIZE],
    len: usize,
    chars: u64,
}

impl<'a, W: Write> LineBuf<'a, W> {
    fn new(out: &'a mut W) -> Self {
        Self {
            out,
            buf: [0; IO_BUF_SIZE],
            len: 0,
            chars: 0,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.write_all(&self.buf[..self.len])?;
        self.len = 0;
        Ok(())
    }

    fn put_char(&mut self, code: Word) -> io::Result<()> {
        let mut mb = [0u8; 4];
        let len = utf64::encode_char(&mut mb, code)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
            .unwrap_or(0);
        if self.len + len > self.buf.len() {
            self.flush()?;
        }
        self.buf[self.len..self.len + len].copy_from_slice(&mb[..len]);
        self.len += len;
        self.chars += 1;
        Ok(())
    }

    /// ASCII-only digits and signs out of the numeric formatters.
    fn put_ascii(&mut self, text: &str) -> io::Result<()> {
        for byte in text.bytes() {
            if self.len >= self.buf.len() {
                self.flush()?;
            }
            self.buf[self.len] = byte;
            self.len += 1;
            self.chars += 1;
        }
        Ok(())
    }
}

/// Format the string at `U[3]` into `out`, returning codepoints written.
///
/// This is the formatter behind the `printf` service, split out so the
/// sink can be anything that writes.
pub fn format_into<W: Write>(vm: &Machine, out: &mut W) -> io::Result<u64> {
    let mut args = VarArgs::new();
    let mut line = LineBuf::new(out);
    let mut at = vm.uregs()[REG_ARG0];

    'fmt: loop {
        let ch = mem_word(vm, at)?;
        at = at.wrapping_add(1);
        if ch == 0 {
            break;
        }
        if ch != Word::from(b'%') {
            line.put_char(ch)?;
            continue;
        }

        let directive = mem_word(vm, at)?;
        at = at.wrapping_add(1);
        match u8::try_from(directive).ok() {
            Some(0) => break 'fmt,
            Some(b'%') => line.put_char(Word::from(b'%'))?,
            Some(b's') => {
                let mut ptr = args.take_int(vm)?;
                loop {
                    let code = mem_word(vm, ptr)?;
                    if code == 0 {
                        break;
                    }
                    line.put_char(code)?;
                    ptr = ptr.wrapping_add(1);
                }
            }
            Some(b'd') => {
                let value = bitcast::i64_from_word(args.take_int(vm)?);
                line.put_ascii(&value.to_string())?;
            }
            Some(b'u') => {
                let value = args.take_int(vm)?;
                line.put_ascii(&value.to_string())?;
            }
            Some(b'x') => {
                let value = args.take_int(vm)?;
                line.put_ascii(&format!("{value:x}"))?;
            }
            Some(b'c') => {
                let code = args.take_int(vm)?;
                line.put_char(code)?;
            }
            Some(b'f') => {
                let value = args.take_float(vm)?;
                line.put_ascii(&format!("{value:.6}"))?;
            }
            // Unknown directives echo the character itself.
            _ => line.put_char(directive)?,
        }
    }

    line.flush()?;
    Ok(line.chars)
}

/// `printf(fmt_ptr)` host service bound to standard output. Returns the
/// number of codepoints written, or `-1`.
pub fn printf(vm: &mut Machine) -> Word {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format_into(vm, &mut out) {
        Ok(chars) => chars,
        Err(err) => {
            debug!("printf failed: {err}");
            HOST_ERR
        }
    }
}
