//! Fetch/decode/dispatch loop.
//!
//! Mirrors the reference interpreter's `interpret`/`execute_instr` split:
//! `step` fetches and dispatches exactly one [`Instr`], `run` drives `step`
//! in a loop until the sentinel, an error, or the instruction ceiling is
//! hit. Unlike the reference CPU this is delay-slot free: branches and
//! jumps take effect on the instruction immediately following them.

use crate::error::{ExecError, ExecResult};
use crate::instructions;
use crate::ir::{Declaration, FileTag, Instr, InstrKind, JumpTarget, SourceLine};
use crate::memory::Memory;
use crate::numerics;
use crate::settings::Settings;
use crate::syscalls::{self, SyscallState};

/// One reversible mutation, recorded before it is applied so the debugger
/// can undo it later. Mirrors the reference `Debug` class's per-step
/// change log, one variant per state category it tracks.
#[derive(Clone, Debug)]
pub enum Change {
    Reg { index: usize, old: i32 },
    FReg { index: usize, old: u32 },
    Hi(i32),
    Lo(i32),
    Pc(u32),
    Mem { addr: u32, old: u8, was_present: bool },
}

pub enum StepOutcome {
    Continue,
    Exited(i32),
}

/// Indices of the registers the spec treats as always-initialized:
/// `$zero`, `$at`, `$k0`, `$k1`, `$gp`, `$sp`, `$fp`, `$ra`. `garbage_registers`
/// never randomizes these, and reading them never warns.
const CONSTANT_REGS: [usize; 8] = [0, 1, 26, 27, 28, 29, 30, 31];

pub struct Interpreter {
    pub memory: Memory,
    pub settings: Settings,
    pub regs: [i32; 32],
    pub fregs: [u32; 32],
    pub hi: i32,
    pub lo: i32,
    pub pc: u32,
    pub fcc: [bool; 8],
    pub instr_count: u64,

    /// Tracks which GPRs have been explicitly written, so an uninitialized
    /// read of `$v*/$a*/$t*/$s*` can warn, mirroring `memory`'s
    /// uninitialized-byte warning.
    written: [bool; 32],
    syscall_state: SyscallState,
    /// Present only while a debug session is recording undo history.
    pub journal: Option<Vec<Vec<Change>>>,
}

impl Interpreter {
    pub fn new(settings: Settings) -> Interpreter {
        let memory = Memory::new(&settings);
        let mut regs = [0i32; 32];
        regs[28] = settings.initial_gp as i32;
        regs[29] = settings.initial_sp as i32;
        regs[30] = settings.initial_fp as i32;
        regs[31] = settings.initial_ra as i32;

        if settings.garbage_registers {
            for i in 0..32 {
                if !CONSTANT_REGS.contains(&i) {
                    regs[i] = rand::random::<i32>();
                }
            }
        }

        let mut written = [false; 32];
        for i in CONSTANT_REGS {
            written[i] = true;
        }

        let pc = settings.initial_pc;
        let debug = settings.debug;
        let hi = settings.initial_hi;
        let lo = settings.initial_lo;

        Interpreter {
            memory,
            settings,
            regs,
            fregs: [0u32; 32],
            hi,
            lo,
            pc,
            fcc: [false; 8],
            instr_count: 0,
            written,
            syscall_state: SyscallState::new(),
            journal: if debug { Some(Vec::new()) } else { None },
        }
    }

    /// Populates `text`/`data`/labels from a parsed program, matching the
    /// reference `initialize_memory`: declarations are laid out in source
    /// order, then every [`Instr`] (and a trailing sentinel) is appended to
    /// `text`.
    pub fn load(&mut self, lines: Vec<SourceLine>) -> ExecResult<()> {
        let data_min = self.settings.data_min;
        let data_max = self.settings.data_max;

        for line in lines {
            match line {
                SourceLine::Label(label) => {
                    let addr = if label.in_data { self.memory.data_ptr } else { self.memory.text_ptr };
                    self.memory.add_label(&label.name, addr).map_err(|_| ExecError::InvalidRegister { name: label.name.clone() })?;
                }
                SourceLine::Declaration { decl, label, .. } => {
                    if let Some(label) = label {
                        self.memory.add_label(&label.name, self.memory.data_ptr).map_err(|_| ExecError::InvalidRegister { name: label.name })?;
                    }
                    self.lay_out(decl, data_min, data_max)?;
                }
                SourceLine::Instr(instr) => {
                    self.memory.add_text(instr);
                }
            }
        }
        self.memory.add_sentinel();
        Ok(())
    }

    fn lay_out(&mut self, decl: Declaration, data_min: u32, data_max: u32) -> ExecResult<()> {
        match decl {
            Declaration::Ascii { data } => {
                let addr = self.memory.data_ptr;
                self.memory.add_ascii(&data, addr, false, data_min, data_max)?;
                self.memory.data_ptr += data.len() as u32;
            }
            Declaration::Asciiz { data } => {
                let addr = self.memory.data_ptr;
                self.memory.add_ascii(&data, addr, true, data_min, data_max)?;
                self.memory.data_ptr += data.len() as u32 + 1;
            }
            Declaration::Byte { data } => {
                for v in data {
                    self.memory.add_byte(self.memory.data_ptr, v, data_min, data_max)?;
                    self.memory.data_ptr += 1;
                }
            }
            Declaration::Half { data } => {
                for v in data {
                    self.align_data_ptr(2);
                    self.memory.add_hword(self.memory.data_ptr, v, data_min, data_max)?;
                    self.memory.data_ptr += 2;
                }
            }
            Declaration::Word { data } => {
                for v in data {
                    self.align_data_ptr(4);
                    self.memory.add_word(self.memory.data_ptr, v, data_min, data_max)?;
                    self.memory.data_ptr += 4;
                }
            }
            Declaration::Float { data } => {
                for v in data {
                    self.align_data_ptr(4);
                    self.memory.add_float(self.memory.data_ptr, v, data_min, data_max)?;
                    self.memory.data_ptr += 4;
                }
            }
            Declaration::Double { data } => {
                for v in data {
                    self.align_data_ptr(8);
                    self.memory.add_double(self.memory.data_ptr, v, data_min, data_max)?;
                    self.memory.data_ptr += 8;
                }
            }
            Declaration::Space { data } => {
                for n in data {
                    self.memory.data_ptr += n;
                }
            }
            Declaration::Align { bits } => {
                self.align_data_ptr(1 << bits);
            }
        }
        Ok(())
    }

    fn align_data_ptr(&mut self, n: u32) {
        let rem = self.memory.data_ptr % n;
        if rem != 0 {
            self.memory.data_ptr += n - rem;
        }
    }

    /// Places `argc`/`argv` on the emulated stack, below `initial_$sp`, and
    /// points `$sp`/`$a0`/`$a1` at them: a word `argc`, then `argc` pointers
    /// to null-terminated strings packed downward from `data_max - 3`.
    pub fn set_program_args(&mut self, args: &[String]) -> ExecResult<()> {
        let data_min = self.settings.data_min;
        let data_max = self.settings.data_max;
        let argc = args.len() as u32;

        let mut str_addr = data_max - 3;
        let mut ptrs = Vec::with_capacity(args.len());
        for a in args.iter().rev() {
            str_addr -= a.len() as u32 + 1;
            self.memory.add_ascii(a, str_addr, true, data_min, data_max)?;
            ptrs.push(str_addr);
        }
        ptrs.reverse();

        let sp = self.settings.initial_sp - 4 - 4 * argc;
        self.memory.add_word(sp, argc as i32, data_min, data_max)?;
        for (i, p) in ptrs.iter().enumerate() {
            self.memory.add_word(sp + 4 + 4 * i as u32, *p as i32, data_min, data_max)?;
        }

        self.regs[29] = sp as i32;
        self.regs[4] = argc as i32;
        self.regs[5] = (sp + 4) as i32;
        Ok(())
    }

    /// Runs until the sentinel, an error, or `max_instructions` is hit.
    pub fn run(&mut self) -> ExecResult<i32> {
        loop {
            match self.step()? {
                StepOutcome::Continue => {}
                StepOutcome::Exited(code) => return Ok(code),
            }
        }
    }

    /// Fetches and executes exactly one instruction, advancing `pc`.
    pub fn step(&mut self) -> ExecResult<StepOutcome> {
        if self.instr_count >= self.settings.max_instructions {
            return Err(ExecError::InstrCountExceed { max: self.settings.max_instructions });
        }

        let pc = self.pc;
        let instr = match self.memory.fetch(pc)? {
            Some(instr) => instr.clone(),
            None => return Ok(StepOutcome::Exited(0)),
        };

        if self.journal.is_some() {
            self.journal.as_mut().unwrap().push(Vec::new());
        }

        self.instr_count += 1;
        let tag = instr.tag.clone();
        let outcome = self.execute(&instr.kind, &tag);
        match outcome {
            Ok(StepOutcome::Continue) => {
                if self.pc == pc {
                    self.set_pc(pc + 4);
                }
                Ok(StepOutcome::Continue)
            }
            other => other.map_err(|e| e),
        }
        .map_err(|e: ExecError| e)
    }

    fn set_reg(&mut self, r: crate::ir::Reg, value: i32) -> ExecResult<()> {
        if r.0 == 0 {
            return Err(ExecError::WritingToZeroRegister);
        }
        self.record(Change::Reg { index: r.0 as usize, old: self.regs[r.0 as usize] });
        self.regs[r.0 as usize] = value;
        self.written[r.0 as usize] = true;
        Ok(())
    }

    fn reg(&self, r: crate::ir::Reg) -> i32 {
        let i = r.0 as usize;
        if self.settings.warnings && !self.written[i] {
            log::warn!("reading from uninitialized register {}", crate::lexer::GPR_NAMES[i]);
        }
        self.regs[i]
    }

    fn set_freg(&mut self, f: crate::ir::FReg, bits: u32) {
        self.record(Change::FReg { index: f.0 as usize, old: self.fregs[f.0 as usize] });
        self.fregs[f.0 as usize] = bits;
    }

    fn freg(&self, f: crate::ir::FReg) -> u32 {
        self.fregs[f.0 as usize]
    }

    fn set_pc(&mut self, pc: u32) {
        self.record(Change::Pc(self.pc));
        self.pc = pc;
    }

    /// Snapshots `len` bytes starting at `addr` into the journal before a
    /// store overwrites them, so `reverse` can restore each one.
    fn record_mem_range(&mut self, addr: u32, len: u32) {
        if self.journal.is_none() {
            return;
        }
        for i in 0..len {
            let a = addr + i;
            let old = self.memory.peek_byte(a);
            self.record(Change::Mem { addr: a, old: old.unwrap_or(0), was_present: old.is_some() });
        }
    }

    fn record(&mut self, change: Change) {
        if let Some(journal) = self.journal.as_mut() {
            if let Some(last) = journal.last_mut() {
                last.push(change);
            }
        }
    }

    fn resolve_label(&self, name: &str) -> ExecResult<u32> {
        self.memory.get_label(name).ok_or(ExecError::InvalidRegister { name: name.to_string() })
    }

    fn execute(&mut self, kind: &InstrKind, tag: &FileTag) -> ExecResult<StepOutcome> {
        match kind {
            InstrKind::R3 { op, rd, rs, rt } => {
                match op.as_str() {
                    "movn" => {
                        if self.reg(*rt) != 0 {
                            self.set_reg(*rd, self.reg(*rs))?;
                        }
                    }
                    "movz" => {
                        if self.reg(*rt) == 0 {
                            self.set_reg(*rd, self.reg(*rs))?;
                        }
                    }
                    _ => {
                        let v = instructions::r3(op, self.reg(*rs), self.reg(*rt))?;
                        self.set_reg(*rd, v)?;
                    }
                }
                Ok(StepOutcome::Continue)
            }
            InstrKind::R2 { op, r1, r2, shamt } => {
                match (op.as_str(), shamt) {
                    ("sll", Some(s)) | ("srl", Some(s)) | ("sra", Some(s)) => {
                        let v = instructions::shift(op, self.reg(*r2), *s);
                        self.set_reg(*r1, v)?;
                    }
                    ("mult", _) | ("multu", _) => {
                        let (hi, lo) = instructions::mult(op, self.reg(*r1), self.reg(*r2));
                        self.record(Change::Hi(self.hi));
                        self.hi = hi;
                        self.record(Change::Lo(self.lo));
                        self.lo = lo;
                    }
                    ("madd", _) | ("maddu", _) | ("msub", _) | ("msubu", _) => {
                        let (hi, lo) = instructions::madd(op, self.reg(*r1), self.reg(*r2), self.hi, self.lo);
                        self.record(Change::Hi(self.hi));
                        self.hi = hi;
                        self.record(Change::Lo(self.lo));
                        self.lo = lo;
                    }
                    ("div", _) | ("divu", _) => {
                        let (rem, quot) = instructions::div(op, self.reg(*r1), self.reg(*r2))?;
                        self.record(Change::Hi(self.hi));
                        self.hi = rem;
                        self.record(Change::Lo(self.lo));
                        self.lo = quot;
                    }
                    _ => return Err(ExecError::InvalidRegister { name: format!("unhandled R2 op {}", op) }),
                }
                Ok(StepOutcome::Continue)
            }
            InstrKind::I { op, rt, rs, imm } => {
                let v = instructions::itype(op, self.reg(*rs), *imm)?;
                self.set_reg(*rt, v)?;
                Ok(StepOutcome::Continue)
            }
            InstrKind::LoadImm { reg, imm } => {
                self.set_reg(*reg, ((*imm as u32) << 16) as i32)?;
                Ok(StepOutcome::Continue)
            }
            InstrKind::Move { op, reg } => {
                match op.as_str() {
                    "mfhi" => self.set_reg(*reg, self.hi)?,
                    "mflo" => self.set_reg(*reg, self.lo)?,
                    "mthi" => {
                        self.record(Change::Hi(self.hi));
                        self.hi = self.reg(*reg);
                    }
                    "mtlo" => {
                        self.record(Change::Lo(self.lo));
                        self.lo = self.reg(*reg);
                    }
                    other => return Err(ExecError::InvalidRegister { name: other.to_string() }),
                }
                Ok(StepOutcome::Continue)
            }
            InstrKind::MoveFloat { op, greg, freg } => {
                match op.as_str() {
                    "mfc1" => self.set_reg(*greg, self.freg(*freg) as i32)?,
                    "mtc1" => self.set_freg(*freg, self.reg(*greg) as u32),
                    other => return Err(ExecError::InvalidRegister { name: other.to_string() }),
                }
                Ok(StepOutcome::Continue)
            }
            InstrKind::MoveCond { op, cond, dest, src, .. } => {
                let take = match op.as_str() {
                    "movn" | "movn.s" | "movn.d" => self.regs[cond.0 as usize] != 0,
                    "movz" | "movz.s" | "movz.d" => self.regs[cond.0 as usize] == 0,
                    "movt" | "movt.s" | "movt.d" => self.fcc[0],
                    "movf" | "movf.s" | "movf.d" => !self.fcc[0],
                    _ => false,
                };
                if take {
                    let v = self.fregs[src.0 as usize];
                    self.set_freg(crate::ir::FReg(dest.0), v);
                }
                Ok(StepOutcome::Continue)
            }
            InstrKind::LoadMem { op, reg, base, imm } => self.execute_load_store(op, *reg, *base, *imm),
            InstrKind::J { op, target, link } => {
                if let Some(link_reg) = link {
                    self.set_reg(*link_reg, (self.pc + 4) as i32)?;
                }
                let dest = match target {
                    JumpTarget::Label(name) => self.resolve_label(name)?,
                    JumpTarget::Register(r) => self.reg(*r) as u32,
                };
                let _ = op;
                self.set_pc(dest);
                Ok(StepOutcome::Continue)
            }
            InstrKind::Branch { op, rs, rt, label } => {
                let taken = match op.as_str() {
                    "beq" => self.reg(*rs) == self.reg(*rt),
                    "bne" => self.reg(*rs) != self.reg(*rt),
                    "blez" => self.reg(*rs) <= 0,
                    "bgtz" => self.reg(*rs) > 0,
                    "bltz" => self.reg(*rs) < 0,
                    "bgez" => self.reg(*rs) >= 0,
                    "blezal" => self.reg(*rs) <= 0,
                    "bgtzal" => self.reg(*rs) > 0,
                    "bltzal" => self.reg(*rs) < 0,
                    "bgezal" => self.reg(*rs) >= 0,
                    other => return Err(ExecError::InvalidRegister { name: other.to_string() }),
                };
                if op.ends_with("al") {
                    self.set_reg(crate::ir::Reg(31), (self.pc + 4) as i32)?;
                }
                if taken {
                    let dest = self.resolve_label(label)?;
                    self.set_pc(dest);
                }
                Ok(StepOutcome::Continue)
            }
            InstrKind::BranchFloat { taken_on, flag, label } => {
                if self.fcc[*flag as usize] == *taken_on {
                    let dest = self.resolve_label(label)?;
                    self.set_pc(dest);
                }
                Ok(StepOutcome::Continue)
            }
            InstrKind::Compare { fmt, fs, ft, flag, .. } => {
                let (a, b) = self.fp_pair(*fmt, *fs, *ft);
                let op = if let InstrKind::Compare { op, .. } = kind { op.as_str() } else { unreachable!() };
                let result = match op {
                    "c.eq" => a == b,
                    "c.le" => a <= b,
                    "c.lt" => a < b,
                    other => return Err(ExecError::InvalidRegister { name: other.to_string() }),
                };
                self.fcc[*flag as usize] = result;
                Ok(StepOutcome::Continue)
            }
            InstrKind::FloatOp { op, fmt, fd, fs, ft } => self.execute_float_op(op, *fmt, *fd, *fs, *ft),
            InstrKind::Convert { from_fmt, to_fmt, src, dst } => self.execute_convert(*from_fmt, *to_fmt, *src, *dst),
            InstrKind::Syscall => {
                match syscalls::dispatch(&mut self.regs, &mut self.fregs, &mut self.memory, &self.settings, &mut self.syscall_state)? {
                    syscalls::Outcome::Continue => Ok(StepOutcome::Continue),
                    syscalls::Outcome::Exit(code) => Ok(StepOutcome::Exited(code)),
                }
            }
            InstrKind::Nop => Ok(StepOutcome::Continue),
            InstrKind::Break { code } => Err(ExecError::BreakpointException { code: *code }),
            InstrKind::PseudoInstr { instrs, label, .. } => self.execute_pseudo(instrs, label.as_deref(), tag),
        }
    }

    fn execute_pseudo(&mut self, instrs: &[Instr], label: Option<&str>, tag: &FileTag) -> ExecResult<StepOutcome> {
        if let Some(label) = label {
            let addr = self.resolve_label(label)?;
            let hi = ((addr >> 16) & 0xFFFF) as i32;
            let lo = (addr & 0xFFFF) as i32;
            let mut first = instrs[0].clone();
            if let InstrKind::LoadImm { imm, .. } = &mut first.kind {
                *imm = hi;
            }
            self.execute(&first.kind, tag)?;
            if instrs.len() > 1 {
                let mut second = instrs[1].clone();
                match &mut second.kind {
                    InstrKind::I { imm, .. } => *imm = lo,
                    InstrKind::LoadMem { imm, .. } => *imm = lo,
                    _ => {}
                }
                self.execute(&second.kind, tag)?;
            }
            for rest in &instrs[instrs.len().min(2)..] {
                self.execute(&rest.kind, tag)?;
            }
        } else {
            for inner in instrs {
                self.execute(&inner.kind, tag)?;
            }
        }
        Ok(StepOutcome::Continue)
    }

    fn execute_load_store(&mut self, op: &str, reg: crate::ir::Reg, base: crate::ir::Reg, imm: i32) -> ExecResult<StepOutcome> {
        let addr = (self.reg(base) as u32).wrapping_add(imm as u32);
        let data_min = self.settings.data_min;
        let data_max = self.settings.data_max;
        let warnings = self.settings.warnings;

        match op {
            "lb" => {
                let v = self.memory.get_byte(addr, true, warnings, data_min, data_max)?;
                self.set_reg(reg, v)?;
            }
            "lbu" => {
                let v = self.memory.get_byte(addr, false, warnings, data_min, data_max)?;
                self.set_reg(reg, v)?;
            }
            "lh" => {
                let v = self.memory.get_hword(addr, true, warnings, data_min, data_max)?;
                self.set_reg(reg, v)?;
            }
            "lhu" => {
                let v = self.memory.get_hword(addr, false, warnings, data_min, data_max)?;
                self.set_reg(reg, v)?;
            }
            "lw" => {
                let v = self.memory.get_word(addr, warnings, data_min, data_max)?;
                self.set_reg(reg, v)?;
            }
            "sb" => {
                self.record_mem_range(addr, 1);
                self.memory.add_byte(addr, self.reg(reg), data_min, data_max)?
            }
            "sh" => {
                self.record_mem_range(addr, 2);
                self.memory.add_hword(addr, self.reg(reg), data_min, data_max)?
            }
            "sw" => {
                self.record_mem_range(addr, 4);
                self.memory.add_word(addr, self.reg(reg), data_min, data_max)?
            }
            "l.s" => {
                let v = self.memory.get_float(addr, warnings, data_min, data_max)?;
                self.set_freg(crate::ir::FReg(reg.0), numerics::pack_f32(v));
            }
            "l.d" => {
                let v = self.memory.get_double(addr, warnings, data_min, data_max)?;
                let bits = numerics::pack_f64(v);
                self.set_freg(crate::ir::FReg(reg.0), bits as u32);
                self.set_freg(crate::ir::FReg(reg.0 + 1), (bits >> 32) as u32);
            }
            "s.s" => {
                let v = numerics::unpack_f32(self.freg(crate::ir::FReg(reg.0)));
                self.record_mem_range(addr, 4);
                self.memory.add_float(addr, v, data_min, data_max)?;
            }
            "s.d" => {
                let lo = self.freg(crate::ir::FReg(reg.0)) as u64;
                let hi = self.freg(crate::ir::FReg(reg.0 + 1)) as u64;
                let v = numerics::unpack_f64(lo | (hi << 32));
                self.record_mem_range(addr, 8);
                self.memory.add_double(addr, v, data_min, data_max)?;
            }
            "lwl" | "lwr" | "swl" | "swr" => {
                let word_addr = addr & !3;
                let byte_offset = addr & 3;
                let mem_word = self.memory.get_word(word_addr, warnings, data_min, data_max)? as u32;
                match op {
                    "lwl" => {
                        let v = instructions::lwl(self.reg(reg), mem_word, byte_offset);
                        self.set_reg(reg, v)?;
                    }
                    "lwr" => {
                        let v = instructions::lwr(self.reg(reg), mem_word, byte_offset);
                        self.set_reg(reg, v)?;
                    }
                    "swl" => {
                        let merged = instructions::swl(self.reg(reg), mem_word, byte_offset);
                        self.record_mem_range(word_addr, 4);
                        self.memory.add_word(word_addr, merged as i32, data_min, data_max)?;
                    }
                    "swr" => {
                        let merged = instructions::swr(self.reg(reg), mem_word, byte_offset);
                        self.record_mem_range(word_addr, 4);
                        self.memory.add_word(word_addr, merged as i32, data_min, data_max)?;
                    }
                    _ => unreachable!(),
                }
            }
            other => return Err(ExecError::InvalidRegister { name: other.to_string() }),
        }
        Ok(StepOutcome::Continue)
    }

    fn fp_pair(&self, fmt: char, fs: crate::ir::FReg, ft: crate::ir::FReg) -> (f64, f64) {
        if fmt == 's' {
            (numerics::unpack_f32(self.freg(fs)) as f64, numerics::unpack_f32(self.freg(ft)) as f64)
        } else {
            let a = self.freg(fs) as u64 | ((self.freg(crate::ir::FReg(fs.0 + 1)) as u64) << 32);
            let b = self.freg(ft) as u64 | ((self.freg(crate::ir::FReg(ft.0 + 1)) as u64) << 32);
            (numerics::unpack_f64(a), numerics::unpack_f64(b))
        }
    }

    fn execute_float_op(&mut self, op: &str, fmt: char, fd: crate::ir::FReg, fs: crate::ir::FReg, ft: Option<crate::ir::FReg>) -> ExecResult<StepOutcome> {
        let a = self.read_fp(fmt, fs);
        let b = ft.map(|r| self.read_fp(fmt, r));
        let result = match op {
            "add" => a + b.unwrap(),
            "sub" => a - b.unwrap(),
            "mul" => a * b.unwrap(),
            "div" => a / b.unwrap(),
            "abs" => a.abs(),
            "neg" => -a,
            "sqrt" => a.sqrt(),
            "mov" => a,
            other => return Err(ExecError::InvalidRegister { name: other.to_string() }),
        };
        self.write_fp(fmt, fd, result);
        Ok(StepOutcome::Continue)
    }

    fn read_fp(&self, fmt: char, r: crate::ir::FReg) -> f64 {
        if fmt == 's' {
            numerics::unpack_f32(self.freg(r)) as f64
        } else {
            let bits = self.freg(r) as u64 | ((self.freg(crate::ir::FReg(r.0 + 1)) as u64) << 32);
            numerics::unpack_f64(bits)
        }
    }

    fn write_fp(&mut self, fmt: char, r: crate::ir::FReg, v: f64) {
        if fmt == 's' {
            self.set_freg(r, numerics::pack_f32(v as f32));
        } else {
            let bits = numerics::pack_f64(v);
            self.set_freg(r, bits as u32);
            self.set_freg(crate::ir::FReg(r.0 + 1), (bits >> 32) as u32);
        }
    }

    fn execute_convert(&mut self, from_fmt: char, to_fmt: char, src: crate::ir::FReg, dst: crate::ir::FReg) -> ExecResult<StepOutcome> {
        let value: f64 = match from_fmt {
            'w' => self.freg(src) as i32 as f64,
            's' => numerics::unpack_f32(self.freg(src)) as f64,
            'd' => self.read_fp('d', src),
            _ => return Err(ExecError::InvalidRegister { name: "bad cvt source format".into() }),
        };
        match to_fmt {
            'w' => self.set_freg(dst, value as i32 as u32),
            's' => self.set_freg(dst, numerics::pack_f32(value as f32)),
            'd' => self.write_fp('d', dst, value),
            _ => return Err(ExecError::InvalidRegister { name: "bad cvt target format".into() }),
        }
        Ok(StepOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FileTag, Reg};

    fn tag() -> FileTag {
        FileTag { file_name: "t.asm".into(), line_no: 1 }
    }

    #[test]
    fn addu_writes_the_destination_register() {
        let mut interp = Interpreter::new(Settings::new());
        interp.regs[9] = 5;
        interp.regs[10] = 7;
        let kind = InstrKind::R3 { op: "addu".into(), rd: Reg(8), rs: Reg(9), rt: Reg(10) };
        interp.execute(&kind, &tag()).unwrap();
        assert_eq!(interp.regs[8], 12);
    }

    #[test]
    fn writing_to_zero_register_is_rejected() {
        let mut interp = Interpreter::new(Settings::new());
        let kind = InstrKind::I { op: "addi".into(), rt: Reg(0), rs: Reg(0), imm: 1 };
        assert!(matches!(interp.execute(&kind, &tag()), Err(ExecError::WritingToZeroRegister)));
    }

    #[test]
    fn beq_taken_jumps_to_the_resolved_label() {
        let mut interp = Interpreter::new(Settings::new());
        interp.memory.add_label("loop", 0x0040_0010).unwrap();
        let kind = InstrKind::Branch { op: "beq".into(), rs: Reg(0), rt: Reg(0), label: "loop".into() };
        interp.execute(&kind, &tag()).unwrap();
        assert_eq!(interp.pc, 0x0040_0010);
    }

    #[test]
    fn journal_records_register_writes_when_debugging() {
        let mut settings = Settings::new();
        settings.debug = true;
        let mut interp = Interpreter::new(settings);
        interp.journal.as_mut().unwrap().push(Vec::new());
        let kind = InstrKind::I { op: "addi".into(), rt: Reg(8), rs: Reg(0), imm: 3 };
        interp.execute(&kind, &tag()).unwrap();
        let last = interp.journal.as_ref().unwrap().last().unwrap();
        assert!(matches!(last[0], Change::Reg { index: 8, old: 0 }));
    }
}
