//! Byte-addressable memory: text/data/heap/stack/MMIO regions, the label
//! table, and the open-file table.
//!
//! The generic `load<T: Addressable>`/`store<T: Addressable>` pattern below
//! is the same one `Ram`/`ScratchPad` use elsewhere in this codebase; the
//! difference is that program memory here is sparse (a MIPS program only
//! ever touches a tiny fraction of its 32-bit address space) so it is backed
//! by a byte map rather than a fixed array.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};

use crate::error::{ExecError, ExecResult};
use crate::ir::Instr;
use crate::numerics;
use crate::settings::Settings;

/// A type that can be loaded/stored through the generic memory accessors,
/// indicating its width in bytes and its required alignment.
pub trait Addressable {
    fn width() -> u32;
    fn align() -> u32 {
        Self::width()
    }
}

pub struct Byte;
pub struct HalfWord;
pub struct Word;
pub struct Float;
pub struct Double;

impl Addressable for Byte {
    fn width() -> u32 {
        1
    }
}
impl Addressable for HalfWord {
    fn width() -> u32 {
        2
    }
}
impl Addressable for Word {
    fn width() -> u32 {
        4
    }
}
impl Addressable for Float {
    fn width() -> u32 {
        4
    }
}
impl Addressable for Double {
    fn width() -> u32 {
        8
    }
}

/// The byte-addressed store backing the data, heap, stack and MMIO regions.
///
/// `text` is a disjoint map of 4-byte-aligned instruction slots; it is
/// immutable once assembly finishes.
pub struct Memory {
    text: HashMap<u32, TextCell>,
    data: HashMap<u32, u8>,
    labels: HashMap<String, u32>,
    file_table: HashMap<i32, OpenFile>,

    pub text_ptr: u32,
    pub data_ptr: u32,
    pub heap_ptr: u32,

    garbage: bool,
}

#[derive(Clone, Debug)]
enum TextCell {
    Instr(Box<Instr>),
    Sentinel,
}

pub enum OpenFile {
    Stdin,
    Stdout,
    Stderr,
    File(File, String),
}

impl OpenFile {
    /// The name shown by the `file_dump` syscall: the standard stream name,
    /// or the path a file was opened with.
    pub fn display_name(&self) -> String {
        match self {
            OpenFile::Stdin => "stdin".to_string(),
            OpenFile::Stdout => "stdout".to_string(),
            OpenFile::Stderr => "stderr".to_string(),
            OpenFile::File(_, path) => path.clone(),
        }
    }
}

impl Memory {
    pub fn new(settings: &Settings) -> Memory {
        let mut file_table = HashMap::new();
        file_table.insert(0, OpenFile::Stdin);
        file_table.insert(1, OpenFile::Stdout);
        file_table.insert(2, OpenFile::Stderr);

        Memory {
            text: HashMap::new(),
            data: HashMap::new(),
            labels: HashMap::new(),
            file_table,
            text_ptr: settings.initial_pc,
            data_ptr: settings.data_min,
            heap_ptr: crate::settings::HEAP_START,
            garbage: settings.garbage_memory,
        }
    }

    fn check_bounds(&self, addr: u32, data_min: u32, data_max: u32) -> ExecResult<()> {
        if addr < data_min || addr > data_max {
            return Err(ExecError::MemoryOutOfBounds { address: addr });
        }
        Ok(())
    }

    /// Appends an instruction to `text[text_ptr]` and advances `text_ptr`
    /// by 4.
    pub fn add_text(&mut self, instr: Instr) {
        self.text.insert(self.text_ptr, TextCell::Instr(Box::new(instr)));
        self.text_ptr += 4;
    }

    /// Appends the `TERMINATE_EXECUTION` sentinel.
    pub fn add_sentinel(&mut self) {
        self.text.insert(self.text_ptr, TextCell::Sentinel);
        self.text_ptr += 4;
    }

    pub fn fetch(&self, pc: u32) -> ExecResult<Option<&Instr>> {
        match self.text.get(&pc) {
            Some(TextCell::Instr(instr)) => Ok(Some(instr)),
            Some(TextCell::Sentinel) => Ok(None),
            None => Err(ExecError::MemoryOutOfBounds { address: pc }),
        }
    }

    pub fn add_label(&mut self, name: &str, addr: u32) -> ExecResult<()> {
        if self.labels.contains_key(name) {
            return Err(ExecError::InvalidRegister { name: name.to_string() });
        }
        self.labels.insert(name.to_string(), addr);
        Ok(())
    }

    pub fn get_label(&self, name: &str) -> Option<u32> {
        self.labels.get(name).copied()
    }

    pub fn labels(&self) -> &HashMap<String, u32> {
        &self.labels
    }

    fn set_byte(&mut self, addr: u32, val: u8, data_min: u32, data_max: u32) -> ExecResult<()> {
        self.check_bounds(addr, data_min, data_max)?;
        self.data.insert(addr, val);
        Ok(())
    }

    /// The raw byte currently stored at `addr`, without the zero/garbage
    /// fill `get_byte` applies to an unread cell. Used by the debugger's
    /// undo journal to snapshot a byte before a store overwrites it.
    pub fn peek_byte(&self, addr: u32) -> Option<u8> {
        self.data.get(&addr).copied()
    }

    /// Restores a byte to what `peek_byte` reported before a store, undoing
    /// that store. `None` means the cell was unwritten at snapshot time.
    pub fn restore_byte(&mut self, addr: u32, old: Option<u8>) {
        match old {
            Some(b) => {
                self.data.insert(addr, b);
            }
            None => {
                self.data.remove(&addr);
            }
        }
    }

    pub fn add_byte(&mut self, addr: u32, val: i32, data_min: u32, data_max: u32) -> ExecResult<()> {
        self.set_byte(addr, (val & 0xFF) as u8, data_min, data_max)
    }

    pub fn add_hword(&mut self, addr: u32, val: i32, data_min: u32, data_max: u32) -> ExecResult<()> {
        if addr % HalfWord::align() != 0 {
            return Err(ExecError::MemoryAlignment { address: addr, width: 2 });
        }
        for i in 0..2 {
            self.set_byte(addr + i, ((val as u32) >> (8 * i)) as u8, data_min, data_max)?;
        }
        Ok(())
    }

    pub fn add_word(&mut self, addr: u32, val: i32, data_min: u32, data_max: u32) -> ExecResult<()> {
        if addr % Word::align() != 0 {
            return Err(ExecError::MemoryAlignment { address: addr, width: 4 });
        }
        for i in 0..4 {
            self.set_byte(addr + i, ((val as u32) >> (8 * i)) as u8, data_min, data_max)?;
        }
        Ok(())
    }

    pub fn add_float(&mut self, addr: u32, val: f32, data_min: u32, data_max: u32) -> ExecResult<()> {
        self.add_word(addr, numerics::pack_f32(val) as i32, data_min, data_max)
    }

    pub fn add_double(&mut self, addr: u32, val: f64, data_min: u32, data_max: u32) -> ExecResult<()> {
        if addr % Double::align() != 0 {
            return Err(ExecError::MemoryAlignment { address: addr, width: 8 });
        }
        let bits = numerics::pack_f64(val);
        for i in 0..8 {
            self.set_byte(addr + i, (bits >> (8 * i)) as u8, data_min, data_max)?;
        }
        Ok(())
    }

    pub fn add_ascii(&mut self, s: &str, addr: u32, null_terminate: bool, data_min: u32, data_max: u32) -> ExecResult<()> {
        let mut a = addr;
        for byte in s.bytes() {
            self.set_byte(a, byte, data_min, data_max)?;
            a += 1;
        }
        if null_terminate {
            self.set_byte(a, 0, data_min, data_max)?;
        }
        Ok(())
    }

    /// Reads one byte. Uninitialized cells are zero-filled or
    /// garbage-filled (then remembered), per `garbage_memory` mode; either
    /// way a warning is logged when `warnings` is enabled.
    pub fn get_byte(&mut self, addr: u32, signed: bool, warnings: bool, data_min: u32, data_max: u32) -> ExecResult<i32> {
        self.check_bounds(addr, data_min, data_max)?;

        let raw = match self.data.get(&addr) {
            Some(&b) => b,
            None => {
                if warnings {
                    log::warn!("reading from uninitialized byte 0x{:08x}", addr);
                }
                let b = if self.garbage { rand::random::<u8>() } else { 0 };
                self.data.insert(addr, b);
                b
            }
        };

        if signed {
            Ok(numerics::sign_extend(raw as u32, 8))
        } else {
            Ok(raw as i32)
        }
    }

    pub fn get_hword(&mut self, addr: u32, signed: bool, warnings: bool, data_min: u32, data_max: u32) -> ExecResult<i32> {
        if addr % HalfWord::align() != 0 {
            return Err(ExecError::MemoryAlignment { address: addr, width: 2 });
        }
        let mut acc: u32 = 0;
        for i in (0..2).rev() {
            let b = self.get_byte(addr + i, false, warnings, data_min, data_max)? as u32;
            acc = (acc << 8) | b;
        }
        if signed {
            Ok(numerics::sign_extend(acc, 16))
        } else {
            Ok(acc as i32)
        }
    }

    pub fn get_word(&mut self, addr: u32, warnings: bool, data_min: u32, data_max: u32) -> ExecResult<i32> {
        if addr % Word::align() != 0 {
            return Err(ExecError::MemoryAlignment { address: addr, width: 4 });
        }
        let mut acc: u32 = 0;
        for i in (0..4).rev() {
            let b = self.get_byte(addr + i, false, warnings, data_min, data_max)? as u32;
            acc = (acc << 8) | b;
        }
        Ok(numerics::as_signed(acc))
    }

    pub fn get_float(&mut self, addr: u32, warnings: bool, data_min: u32, data_max: u32) -> ExecResult<f32> {
        let bits = self.get_word(addr, warnings, data_min, data_max)? as u32;
        Ok(numerics::unpack_f32(bits))
    }

    pub fn get_double(&mut self, addr: u32, warnings: bool, data_min: u32, data_max: u32) -> ExecResult<f64> {
        if addr % Double::align() != 0 {
            return Err(ExecError::MemoryAlignment { address: addr, width: 8 });
        }
        let mut bits: u64 = 0;
        for i in (0..8).rev() {
            let b = self.get_byte(addr + i, false, warnings, data_min, data_max)? as u64;
            bits = (bits << 8) | b;
        }
        Ok(numerics::unpack_f64(bits))
    }

    /// Reads a null-terminated string, stopping early after `max` chars if
    /// given, for debugger `print <label> s` display.
    pub fn get_string(&mut self, addr: u32, max: usize, data_min: u32, data_max: u32) -> ExecResult<String> {
        let mut out = String::new();
        let mut a = addr;
        let mut count = 0;
        loop {
            if count >= max {
                break;
            }
            let c = self.get_byte(a, false, false, data_min, data_max)?;
            if c == 0 {
                break;
            }
            match c {
                9 => out.push_str("\\t"),
                10 => out.push_str("\\n"),
                32..=126 => out.push(c as u8 as char),
                _ => out.push('.'),
            }
            a += 1;
            count += 1;
        }
        Ok(out)
    }

    // -- file table -----------------------------------------------------

    pub fn lowest_free_fd(&self) -> i32 {
        let mut fd = 0;
        while self.file_table.contains_key(&fd) {
            fd += 1;
        }
        fd
    }

    pub fn open_file(&mut self, fd: i32, file: File, path: &str) {
        self.file_table.insert(fd, OpenFile::File(file, path.to_string()));
    }

    pub fn read_file(&mut self, fd: i32, n: usize) -> Option<Vec<u8>> {
        match self.file_table.get_mut(&fd) {
            Some(OpenFile::File(f, _)) => {
                let mut buf = vec![0u8; n];
                let read = f.read(&mut buf).unwrap_or(0);
                buf.truncate(read);
                Some(buf)
            }
            Some(OpenFile::Stdin) => {
                let mut buf = vec![0u8; n];
                let read = std::io::stdin().read(&mut buf).unwrap_or(0);
                buf.truncate(read);
                Some(buf)
            }
            _ => None,
        }
    }

    pub fn write_file(&mut self, fd: i32, bytes: &[u8]) -> Option<usize> {
        match self.file_table.get_mut(&fd) {
            Some(OpenFile::File(f, _)) => f.write(bytes).ok(),
            Some(OpenFile::Stdout) => std::io::stdout().write(bytes).ok(),
            Some(OpenFile::Stderr) => std::io::stderr().write(bytes).ok(),
            _ => None,
        }
    }

    pub fn close_file(&mut self, fd: i32) {
        if fd >= 3 {
            self.file_table.remove(&fd);
        }
    }

    pub fn file_table(&self) -> &HashMap<i32, OpenFile> {
        &self.file_table
    }

    pub fn close_all_opened(&mut self) {
        let opened: Vec<i32> = self.file_table.keys().filter(|&&fd| fd >= 3).copied().collect();
        for fd in opened {
            self.file_table.remove(&fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;

    #[test]
    fn word_round_trips_through_get_and_add() {
        let settings = Settings::new();
        let mut mem = Memory::new(&settings);
        mem.add_word(settings.data_min, -123456, settings.data_min, settings.data_max).unwrap();
        assert_eq!(mem.get_word(settings.data_min, false, settings.data_min, settings.data_max).unwrap(), -123456);
    }

    #[test]
    fn half_word_overlay_matches_the_ram_byte_layout() {
        let settings = Settings::new();
        let mut mem = Memory::new(&settings);
        let base = settings.data_min;
        mem.add_word(base, 0x1234_5678u32 as i32, settings.data_min, settings.data_max).unwrap();
        mem.add_hword(base, 0xabcdu32 as i32, settings.data_min, settings.data_max).unwrap();
        assert_eq!(mem.get_word(base, false, settings.data_min, settings.data_max).unwrap(), 0x1234abcdu32 as i32);
    }

    #[test]
    fn misaligned_word_access_is_an_error() {
        let settings = Settings::new();
        let mut mem = Memory::new(&settings);
        let err = mem.add_word(settings.data_min + 1, 0, settings.data_min, settings.data_max);
        assert!(matches!(err, Err(ExecError::MemoryAlignment { .. })));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let settings = Settings::new();
        let mut mem = Memory::new(&settings);
        mem.add_label("main", 0x400000).unwrap();
        assert!(mem.add_label("main", 0x400004).is_err());
    }
}
