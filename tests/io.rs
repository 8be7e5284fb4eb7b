use wordvm::host::fileio;
use wordvm::prelude::*;

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::TempDir;

const MEM: Word = 16 * 1024;

/// The descriptor table is process-wide; keep these tests serial so slot
/// accounting stays deterministic.
fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

const NAME_ADDR: Word = 100;
const MODE_ADDR: Word = 300;
const DATA_ADDR: Word = 400;

fn machine() -> Machine {
    Machine::new(MEM).expect("failed to allocate machine")
}

fn poke_str(vm: &mut Machine, addr: Word, text: &str) {
    let mut words: Vec<Word> = text.chars().map(|c| c as Word).collect();
    words.push(0);
    vm.set_words(addr, &words).expect("failed to store string");
}

/// Call the open service for `path` with a C-style `mode`.
fn open_fd(vm: &mut Machine, path: &Path, mode: &str) -> Word {
    poke_str(vm, NAME_ADDR, path.to_str().expect("utf-8 path"));
    poke_str(vm, MODE_ADDR, mode);
    vm.uregs_mut()[3] = NAME_ADDR;
    vm.uregs_mut()[4] = MODE_ADDR;
    fileio::open(vm)
}

fn close_fd(vm: &mut Machine, fd: Word) -> Word {
    vm.uregs_mut()[3] = fd;
    fileio::close(vm)
}

#[test]
fn text_roundtrip_through_a_file() {
    let _guard = serial();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("roundtrip.txt");
    let mut vm = machine();

    let fd = open_fd(&mut vm, &path, "w");
    assert!(fd >= 3 && fd != HOST_ERR, "open returned {fd}");

    // "aéZ", three codepoints, one of them two UTF-8 bytes.
    vm.set_words(DATA_ADDR, &[0x61, 0xe9, 0x5a]).expect("store");
    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = DATA_ADDR;
    vm.uregs_mut()[5] = 3;
    assert_eq!(fileio::write_text(&mut vm), 3);
    assert_eq!(close_fd(&mut vm, fd), 0);

    // The on-disk form is plain UTF-8.
    assert_eq!(fs::read(&path).expect("read back"), "aéZ".as_bytes());

    let fd = open_fd(&mut vm, &path, "r");
    assert!(fd >= 3 && fd != HOST_ERR);
    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = DATA_ADDR + 10;
    vm.uregs_mut()[5] = 3;
    assert_eq!(fileio::read_text(&mut vm), 3);
    assert_eq!(
        vm.words_at(DATA_ADDR + 10, 3).expect("read words"),
        &[0x61, 0xe9, 0x5a]
    );
    assert_eq!(close_fd(&mut vm, fd), 0);
}

#[test]
fn descriptor_slots_are_reused_after_close() {
    let _guard = serial();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("slots.txt");
    let mut vm = machine();

    let first = open_fd(&mut vm, &path, "w");
    assert!(first >= 3 && first != HOST_ERR);
    let second = open_fd(&mut vm, &path, "w");
    assert!(second >= 3 && second != HOST_ERR);
    assert_ne!(first, second);

    assert_eq!(close_fd(&mut vm, first), 0);
    // Double close reports failure.
    assert_eq!(close_fd(&mut vm, first), HOST_ERR);

    // First-free allocation hands the slot back.
    let third = open_fd(&mut vm, &path, "w");
    assert_eq!(third, first);
    assert_eq!(close_fd(&mut vm, second), 0);
    assert_eq!(close_fd(&mut vm, third), 0);
}

#[test]
fn open_failures_report_minus_one() {
    let _guard = serial();
    let dir = TempDir::new().expect("tempdir");
    let mut vm = machine();

    let missing = dir.path().join("does-not-exist.txt");
    assert_eq!(open_fd(&mut vm, &missing, "r"), HOST_ERR);
    assert_eq!(open_fd(&mut vm, &missing, "q"), HOST_ERR);
}

#[test]
fn close_rejects_wild_descriptors() {
    let _guard = serial();
    let mut vm = machine();
    assert_eq!(close_fd(&mut vm, 9999), HOST_ERR);
    assert_eq!(close_fd(&mut vm, Word::MAX), HOST_ERR);
    // Free slot inside the table.
    assert_eq!(close_fd(&mut vm, 2047), HOST_ERR);
}

#[test]
fn seek_moves_the_read_cursor() {
    let _guard = serial();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("seek.txt");
    fs::write(&path, b"abcdef").expect("seed file");
    let mut vm = machine();

    let fd = open_fd(&mut vm, &path, "r");
    assert!(fd >= 3 && fd != HOST_ERR);

    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = 4;
    vm.uregs_mut()[5] = 0; // absolute
    assert_eq!(fileio::seek(&mut vm), 0);

    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = DATA_ADDR;
    vm.uregs_mut()[5] = 2;
    assert_eq!(fileio::read_text(&mut vm), 2);
    assert_eq!(
        vm.words_at(DATA_ADDR, 2).expect("read words"),
        &[b'e' as Word, b'f' as Word]
    );

    // Unknown whence values are rejected.
    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = 0;
    vm.uregs_mut()[5] = 3;
    assert_eq!(fileio::seek(&mut vm), HOST_ERR);

    assert_eq!(close_fd(&mut vm, fd), 0);
}

#[test]
fn raw_words_roundtrip_natively() {
    let _guard = serial();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("raw.bin");
    let mut vm = machine();
    let payload = [Word::MAX, 0, 0x0102_0304_0506_0708];

    let fd = open_fd(&mut vm, &path, "w");
    vm.set_words(DATA_ADDR, &payload).expect("store");
    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = DATA_ADDR;
    vm.uregs_mut()[5] = payload.len() as Word;
    assert_eq!(fileio::write_bytes(&mut vm), 3);
    assert_eq!(close_fd(&mut vm, fd), 0);
    assert_eq!(fs::metadata(&path).expect("metadata").len(), 24);

    let fd = open_fd(&mut vm, &path, "r");
    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = DATA_ADDR + 20;
    vm.uregs_mut()[5] = 8; // ask for more than the file holds
    assert_eq!(fileio::read_bytes(&mut vm), 3);
    assert_eq!(
        vm.words_at(DATA_ADDR + 20, 3).expect("read words"),
        &payload
    );
    assert_eq!(close_fd(&mut vm, fd), 0);
}

#[test]
fn text_reader_skips_malformed_bytes() {
    let _guard = serial();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("mangled.txt");
    // Stray continuation byte, then 'A', then a two-byte é cut short by a
    // fresh ASCII byte, then a complete é.
    fs::write(&path, [0x80, b'A', 0xc3, b'B', 0xc3, 0xa9]).expect("seed file");
    let mut vm = machine();

    let fd = open_fd(&mut vm, &path, "r");
    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = DATA_ADDR;
    vm.uregs_mut()[5] = 8;
    assert_eq!(fileio::read_text(&mut vm), 2);
    assert_eq!(
        vm.words_at(DATA_ADDR, 2).expect("read words"),
        &[b'A' as Word, 0xe9]
    );
    assert_eq!(close_fd(&mut vm, fd), 0);
}

#[test]
fn text_reader_stops_at_a_truncated_tail() {
    let _guard = serial();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("truncated.txt");
    fs::write(&path, [b'x', 0xc3]).expect("seed file");
    let mut vm = machine();

    let fd = open_fd(&mut vm, &path, "r");
    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = DATA_ADDR;
    vm.uregs_mut()[5] = 8;
    assert_eq!(fileio::read_text(&mut vm), 1);
    assert_eq!(close_fd(&mut vm, fd), 0);
}

#[test]
fn standard_streams_are_bound_at_startup() {
    let _guard = serial();
    let mut vm = machine();
    // Writing to descriptor 1 goes to stdout and reports the codepoints.
    vm.set_words(DATA_ADDR, &[b'o' as Word, b'k' as Word, b'\n' as Word])
        .expect("store");
    vm.uregs_mut()[3] = 1;
    vm.uregs_mut()[4] = DATA_ADDR;
    vm.uregs_mut()[5] = 3;
    assert_eq!(fileio::write_text(&mut vm), 3);

    // Descriptor 0 refuses writes.
    vm.uregs_mut()[3] = 0;
    assert_eq!(fileio::write_text(&mut vm), 0);
}

#[test]
fn reinit_clears_claimed_slots_and_rebinds_the_streams() {
    let _guard = serial();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("reinit.txt");
    let mut vm = machine();

    let fd = open_fd(&mut vm, &path, "w");
    assert!(fd >= 3 && fd != HOST_ERR);

    fileio::init();

    // The claimed slot is gone...
    assert_eq!(close_fd(&mut vm, fd), HOST_ERR);
    // ...and the standard streams came back after the wipe.
    vm.set_words(DATA_ADDR, &[b'.' as Word]).expect("store");
    vm.uregs_mut()[3] = 1;
    vm.uregs_mut()[4] = DATA_ADDR;
    vm.uregs_mut()[5] = 1;
    assert_eq!(fileio::write_text(&mut vm), 1);
}

#[test]
fn write_text_rejects_out_of_range_codepoints() {
    let _guard = serial();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("bad.txt");
    let mut vm = machine();

    let fd = open_fd(&mut vm, &path, "w");
    vm.set_words(DATA_ADDR, &[0x41, 0x11_0000]).expect("store");
    vm.uregs_mut()[3] = fd;
    vm.uregs_mut()[4] = DATA_ADDR;
    vm.uregs_mut()[5] = 2;
    assert_eq!(fileio::write_text(&mut vm), HOST_ERR);
    assert_eq!(close_fd(&mut vm, fd), 0);
}
