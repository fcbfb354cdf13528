//! Syscall ABI: selects on `$v0`, reading/writing the usual `$a0..$a3`
//! argument registers and `$v0`/`$v1` for return values, the same
//! convention the reference interpreter's `syscalls` table follows.

use std::io::Write as IoWrite;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ExecError, ExecResult};
use crate::memory::Memory;
use crate::numerics;
use crate::settings::Settings;

pub const V0: usize = 2;
pub const V1: usize = 3;
pub const A0: usize = 4;
pub const A1: usize = 5;
pub const A2: usize = 6;
pub const A3: usize = 7;

pub enum Outcome {
    Continue,
    Exit(i32),
}

/// Per-run syscall state that must survive across calls: the `rand`
/// seed/stream for `40`/`41`.
pub struct SyscallState {
    rng: StdRng,
}

impl SyscallState {
    pub fn new() -> SyscallState {
        SyscallState { rng: StdRng::from_entropy() }
    }

    fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}

impl Default for SyscallState {
    fn default() -> SyscallState {
        SyscallState::new()
    }
}

/// Dispatches the syscall named by `$v0`. `fregs` holds raw `$f0..$f31` bits
/// (a float in the low word, a double across `$f0`/`$f1`).
pub fn dispatch(
    regs: &mut [i32; 32],
    fregs: &mut [u32; 32],
    memory: &mut Memory,
    settings: &Settings,
    state: &mut SyscallState,
) -> ExecResult<Outcome> {
    let code = regs[V0];
    if !settings.enabled_syscalls.contains(&code) {
        return Err(ExecError::InvalidSyscall { code });
    }

    match code {
        1 => {
            print!("{}", regs[A0]);
            let _ = std::io::stdout().flush();
        }
        2 => {
            print!("{}", f32::from_bits(fregs[0]));
            let _ = std::io::stdout().flush();
        }
        3 => {
            let bits = (fregs[1] as u64) << 32 | fregs[0] as u64;
            print!("{}", f64::from_bits(bits));
            let _ = std::io::stdout().flush();
        }
        4 => {
            let addr = regs[A0] as u32;
            let s = memory.get_string(addr, usize::MAX, settings.data_min, settings.data_max)?;
            print!("{}", s);
            let _ = std::io::stdout().flush();
        }
        5 => {
            regs[V0] = read_line().trim().parse::<i64>().map(numerics::wrap32).map_err(|_| ExecError::InvalidInput { text: "expected an integer".into() })?;
        }
        6 => {
            let data_min = settings.data_min;
            let data_max = settings.data_max;
            let mut addr = regs[A0] as u32;
            let mut sign: i64 = 1;
            let mut c = memory.get_byte(addr, false, false, data_min, data_max)?;
            if c == '-' as i32 {
                sign = -1;
                addr += 1;
                c = memory.get_byte(addr, false, false, data_min, data_max)?;
            }
            if c == 0 {
                return Err(ExecError::InvalidCharacter { code: 0 });
            }
            let mut result: i64 = 0;
            while c != 0 {
                if !('0' as i32..='9' as i32).contains(&c) {
                    return Err(ExecError::InvalidCharacter { code: c });
                }
                result = result * 10 + (c - '0' as i32) as i64;
                addr += 1;
                c = memory.get_byte(addr, false, false, data_min, data_max)?;
            }
            regs[V0] = numerics::wrap32(result * sign);
        }
        7 => {
            let v: f64 = read_line().trim().parse().map_err(|_| ExecError::InvalidInput { text: "expected a double".into() })?;
            let bits = numerics::pack_f64(v);
            fregs[0] = bits as u32;
            fregs[1] = (bits >> 32) as u32;
        }
        8 => {
            let addr = regs[A0] as u32;
            let max = regs[A1] as usize;
            let line = read_line();
            let truncated: String = line.chars().take(max.saturating_sub(1)).collect();
            memory.add_ascii(&truncated, addr, true, settings.data_min, settings.data_max)?;
            regs[V0] = truncated.len() as i32;
        }
        9 => {
            if memory.heap_ptr > settings.initial_sp {
                return Err(ExecError::MemoryOutOfBounds { address: memory.heap_ptr });
            }
            if regs[A0] < 0 {
                return Err(ExecError::InvalidArgument { message: "$a0 must be a non-negative number".into() });
            }
            let addr = memory.heap_ptr;
            memory.heap_ptr += regs[A0] as u32;
            if memory.heap_ptr % 4 != 0 {
                memory.heap_ptr += 4 - (memory.heap_ptr % 4);
            }
            regs[V0] = addr as i32;
        }
        10 => return Ok(Outcome::Exit(0)),
        11 => {
            let code = regs[A0];
            let ch = char::from_u32(code as u32).ok_or(ExecError::InvalidCharacter { code })?;
            print!("{}", ch);
            let _ = std::io::stdout().flush();
        }
        12 => {
            let line = read_line();
            let ch = line.chars().next().unwrap_or('\0');
            regs[V0] = ch as i32;
        }
        13 => {
            let path = memory.get_string(regs[A0] as u32, usize::MAX, settings.data_min, settings.data_max)?;
            let flags = regs[A1];
            let fd = memory.lowest_free_fd();
            let opened = open_with_flags(&path, flags);
            match opened {
                Ok(f) => {
                    memory.open_file(fd, f, &path);
                    regs[V0] = fd;
                }
                Err(_) => regs[V0] = -1,
            }
        }
        14 => {
            let fd = regs[A0];
            let addr = regs[A1] as u32;
            let n = regs[A2].max(0) as usize;
            match memory.read_file(fd, n) {
                Some(bytes) => {
                    for (i, b) in bytes.iter().enumerate() {
                        memory.add_byte(addr + i as u32, *b as i32, settings.data_min, settings.data_max)?;
                    }
                    regs[V0] = bytes.len() as i32;
                }
                None => regs[V0] = -1,
            }
        }
        15 => {
            let fd = regs[A0];
            let addr = regs[A1] as u32;
            let n = regs[A2].max(0) as usize;
            let mut bytes = Vec::with_capacity(n);
            for i in 0..n as u32 {
                bytes.push(memory.get_byte(addr + i, false, settings.warnings, settings.data_min, settings.data_max)? as u8);
            }
            regs[V0] = memory.write_file(fd, &bytes).map(|n| n as i32).unwrap_or(-1);
        }
        16 => {
            memory.close_file(regs[A0]);
        }
        17 => return Ok(Outcome::Exit(regs[A0])),
        30 => {
            let data_min = settings.data_min;
            let data_max = settings.data_max;
            let mut low = regs[A0] as u32;
            let mut high = regs[A1] as u32;
            if low % 4 != 0 {
                low -= low % 4;
            }
            if high % 4 != 0 {
                high += 4 - (high % 4);
            }
            print!("{:<12}{:<16}{:<12}\n", "addr", "hex", "ascii");
            let mut i = low;
            while i < high {
                print!("{:#x}  ", i);
                for step in (0..4u32).rev() {
                    let w = memory.get_byte(i + step, false, settings.warnings, data_min, data_max)? as u8;
                    print!("{:02x}  ", w);
                }
                for step in (0..4u32).rev() {
                    let c = memory.get_byte(i + step, false, settings.warnings, data_min, data_max)? as u8;
                    match c {
                        0 => print!("\\0 "),
                        9 => print!("\\t "),
                        10 => print!("\\n "),
                        32..=126 => print!("{}  ", c as char),
                        _ => print!(".  "),
                    }
                }
                print!("\n");
                i += 4;
            }
            let _ = std::io::stdout().flush();
        }
        31 => {
            print!("{:<4} {:<10} {}\n", "reg", "hex", "dec");
            for (i, name) in crate::lexer::GPR_NAMES.iter().enumerate() {
                print!("{:<4} {} {}\n", name, numerics::format_hex(regs[i], 4), regs[i]);
            }
            let _ = std::io::stdout().flush();
        }
        32 => {
            for (fd, file) in memory.file_table() {
                print!("{}\t{}\n", fd, file.display_name());
            }
            let _ = std::io::stdout().flush();
        }
        34 => {
            print!("{}", numerics::format_hex(regs[A0], 4));
            let _ = std::io::stdout().flush();
        }
        35 => {
            print!("{}", numerics::format_bin(regs[A0], 4));
            let _ = std::io::stdout().flush();
        }
        36 => {
            print!("{}", numerics::format_unsigned(regs[A0]));
            let _ = std::io::stdout().flush();
        }
        40 => state.set_seed(regs[A0] as u32 as u64),
        41 => {
            let upper = regs[A0];
            if upper < 0 {
                return Err(ExecError::InvalidArgument { message: "upper value for rand_int must be nonnegative".into() });
            }
            regs[V0] = state.rng.gen_range(0..=upper);
        }
        other => return Err(ExecError::InvalidSyscall { code: other }),
    }

    Ok(Outcome::Continue)
}

fn read_line() -> String {
    let mut buf = String::new();
    let _ = std::io::stdin().read_line(&mut buf);
    buf
}

fn open_with_flags(path: &str, flags: i32) -> std::io::Result<std::fs::File> {
    use std::fs::OpenOptions;
    let mut opts = OpenOptions::new();
    match flags {
        0 => opts.read(true),
        1 => opts.write(true).create(true).truncate(true),
        9 => opts.write(true).create(true).append(true),
        _ => opts.read(true),
    };
    opts.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sbrk_advances_the_heap_pointer_and_returns_the_old_one() {
        let settings = Settings::new();
        let mut memory = Memory::new(&settings);
        let mut regs = [0i32; 32];
        let mut fregs = [0u32; 32];
        let mut state = SyscallState::new();
        regs[V0] = 9;
        regs[A0] = 64;
        let before = memory.heap_ptr;
        dispatch(&mut regs, &mut fregs, &mut memory, &settings, &mut state).unwrap();
        assert_eq!(regs[V0] as u32, before);
        assert_eq!(memory.heap_ptr, before + 64);
    }

    #[test]
    fn disabled_syscall_is_rejected() {
        let mut settings = Settings::new();
        settings.enabled_syscalls.remove(&1);
        let mut memory = Memory::new(&settings);
        let mut regs = [0i32; 32];
        let mut fregs = [0u32; 32];
        let mut state = SyscallState::new();
        regs[V0] = 1;
        assert!(matches!(dispatch(&mut regs, &mut fregs, &mut memory, &settings, &mut state), Err(ExecError::InvalidSyscall { code: 1 })));
    }

    #[test]
    fn exit2_carries_its_status_code() {
        let settings = Settings::new();
        let mut memory = Memory::new(&settings);
        let mut regs = [0i32; 32];
        let mut fregs = [0u32; 32];
        let mut state = SyscallState::new();
        regs[V0] = 17;
        regs[A0] = 7;
        match dispatch(&mut regs, &mut fregs, &mut memory, &settings, &mut state).unwrap() {
            Outcome::Exit(code) => assert_eq!(code, 7),
            _ => panic!("expected Exit"),
        }
    }
}
