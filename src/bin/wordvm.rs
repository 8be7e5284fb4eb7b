//! Bytecode image launcher.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wordvm::consts::{VM_DEFAULT_MEM_WORDS, WORD_SIZE};
use wordvm::error::VmError;
use wordvm::interpreter::Machine;
use wordvm::Word;

/// Run a bytecode image on the word machine.
#[derive(Debug, Parser)]
#[command(name = "wordvm", version, about)]
struct Args {
    /// Memory size, in 64-bit words.
    #[arg(short = 'b', long = "bytes", default_value_t = VM_DEFAULT_MEM_WORDS)]
    bytes: Word,

    /// Bytecode image; `-` reads standard input.
    file: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("wordvm: {err}");
            let errno = match &err {
                VmError::Io(io) => io.raw_os_error().unwrap_or(1),
                VmError::Fault(_) => 1,
            };
            ExitCode::from(errno.clamp(1, 255) as u8)
        }
    }
}

fn run(args: &Args) -> Result<u8, VmError> {
    let raw = read_image(&args.file)?;
    let image = to_words(&raw);

    let mut vm = Machine::new(args.bytes)?;
    vm.load_image(&image)?;

    let ret = vm.execute()?;
    Ok(ret as u8)
}

fn read_image(path: &Path) -> io::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut raw = Vec::new();
        io::stdin().lock().read_to_end(&mut raw)?;
        Ok(raw)
    } else {
        fs::read(path)
    }
}

/// Native-endian words out of the raw image; a ragged tail is
/// zero-padded into the last word.
fn to_words(raw: &[u8]) -> Vec<Word> {
    raw.chunks(WORD_SIZE)
        .map(|chunk| {
            let mut word = [0u8; WORD_SIZE];
            word[..chunk.len()].copy_from_slice(chunk);
            Word::from_ne_bytes(word)
        })
        .collect()
}
