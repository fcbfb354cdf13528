//! Reversible, breakpoint-aware wrapper around [`Interpreter`].
//!
//! Grounded on the reference `Debug` class: a `continueFlag` that
//! distinguishes single-stepping from free-running, a breakpoint set keyed
//! by `(file, line)`, and an undo journal that lets `reverse` walk state
//! backwards one step at a time.

use std::collections::HashSet;

use crate::error::{ExecError, ExecResult};
use crate::interpreter::{Change, Interpreter, StepOutcome};
use crate::ir::FileTag;

pub struct Debugger {
    pub interp: Interpreter,
    breakpoints: HashSet<(String, u32)>,
    /// `false` while stepping one instruction at a time, `true` once
    /// `cont` has been issued (cleared again when a breakpoint is hit).
    pub continue_flag: bool,
    pub done: bool,
    pub exit_code: i32,
    /// History of fetched tags, parallel to the interpreter's journal, so
    /// `reverse` can also report which line execution rewound to.
    history: Vec<FileTag>,
}

impl Debugger {
    pub fn new(interp: Interpreter) -> Debugger {
        Debugger { interp, breakpoints: HashSet::new(), continue_flag: false, done: false, exit_code: 0, history: Vec::new() }
    }

    pub fn add_breakpoint(&mut self, file: &str, line: u32) {
        self.breakpoints.insert((file.to_string(), line));
    }

    pub fn remove_breakpoint(&mut self, file: &str, line: u32) {
        self.breakpoints.remove(&(file.to_string(), line));
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = &(String, u32)> {
        self.breakpoints.iter()
    }

    fn at_breakpoint(&self, tag: &FileTag) -> bool {
        self.breakpoints.contains(&(tag.file_name.clone(), tag.line_no))
    }

    /// Executes exactly one instruction, recording its tag for display and
    /// `reverse`.
    pub fn step_once(&mut self) -> ExecResult<()> {
        if self.done {
            return Ok(());
        }
        let tag = match self.interp.memory.fetch(self.interp.pc)? {
            Some(instr) => instr.tag.clone(),
            None => {
                self.done = true;
                return Ok(());
            }
        };
        self.history.push(tag);

        match self.interp.step() {
            Ok(StepOutcome::Continue) => Ok(()),
            Ok(StepOutcome::Exited(code)) => {
                self.done = true;
                self.exit_code = code;
                Ok(())
            }
            Err(ExecError::BreakpointException { .. }) => {
                self.continue_flag = false;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Runs until a breakpoint, the sentinel, or an error, honoring
    /// `continue_flag`.
    pub fn run_until_stop(&mut self) -> ExecResult<()> {
        self.continue_flag = true;
        while self.continue_flag && !self.done {
            self.step_once()?;
            if let Some(tag) = self.history.last() {
                if self.at_breakpoint(tag) {
                    self.continue_flag = false;
                }
            }
        }
        Ok(())
    }

    /// Undoes the last executed instruction by replaying its journal
    /// entry in reverse.
    pub fn reverse(&mut self) -> bool {
        let journal = match self.interp.journal.as_mut() {
            Some(j) => j,
            None => return false,
        };
        let changes = match journal.pop() {
            Some(c) => c,
            None => return false,
        };
        for change in changes.into_iter().rev() {
            match change {
                Change::Reg { index, old } => self.interp.regs[index] = old,
                Change::FReg { index, old } => self.interp.fregs[index] = old,
                Change::Hi(old) => self.interp.hi = old,
                Change::Lo(old) => self.interp.lo = old,
                Change::Pc(old) => self.interp.pc = old,
                Change::Mem { addr, old, was_present } => {
                    self.interp.memory.restore_byte(addr, was_present.then_some(old));
                }
            }
        }
        self.history.pop();
        self.interp.instr_count = self.interp.instr_count.saturating_sub(1);
        self.done = false;
        true
    }

    pub fn current_tag(&self) -> Option<&FileTag> {
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instr, InstrKind, Reg};
    use crate::settings::Settings;

    fn make_debugger() -> Debugger {
        let mut settings = Settings::new();
        settings.debug = true;
        let mut interp = Interpreter::new(settings);
        let tag = FileTag { file_name: "t.asm".into(), line_no: 1 };
        interp.memory.add_text(Instr::new(InstrKind::I { op: "addi".into(), rt: Reg(8), rs: Reg(0), imm: 9 }, tag, "addi $t0, $zero, 9".into()));
        Debugger::new(interp)
    }

    #[test]
    fn step_then_reverse_restores_the_register() {
        let mut dbg = make_debugger();
        dbg.step_once().unwrap();
        assert_eq!(dbg.interp.regs[8], 9);
        assert!(dbg.reverse());
        assert_eq!(dbg.interp.regs[8], 0);
    }

    #[test]
    fn step_then_reverse_restores_a_store_to_memory() {
        let mut settings = Settings::new();
        settings.debug = true;
        let data_min = settings.data_min;
        let mut interp = Interpreter::new(settings);
        let tag = FileTag { file_name: "t.asm".into(), line_no: 1 };
        interp.memory.add_text(Instr::new(
            crate::ir::InstrKind::LoadMem { op: "sw".into(), reg: Reg(0), base: Reg(0), imm: data_min as i32 },
            tag,
            "sw $zero, 0($zero)".into(),
        ));
        let mut dbg = Debugger::new(interp);
        let before = dbg.interp.memory.peek_byte(data_min);
        dbg.step_once().unwrap();
        assert!(dbg.interp.memory.peek_byte(data_min).is_some());
        assert!(dbg.reverse());
        assert_eq!(dbg.interp.memory.peek_byte(data_min), before);
    }

    #[test]
    fn breakpoint_stops_free_running_execution() {
        let mut dbg = make_debugger();
        dbg.add_breakpoint("t.asm", 1);
        dbg.run_until_stop().unwrap();
        assert!(!dbg.continue_flag);
    }
}
