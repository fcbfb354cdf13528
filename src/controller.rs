//! Thread-safe facade over a [`Debugger`] session.
//!
//! The reference driver polls its interpreter from a GUI event loop under
//! a lock; here the same shape is kept with a [`Mutex`] so a CLI frontend
//! can run the interpreter on a worker thread while the REPL thread issues
//! commands and inspects state concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::debugger::Debugger;
use crate::error::ExecResult;
use crate::ir::SourceLine;
use crate::settings::Settings;

pub struct Controller {
    inner: Arc<Mutex<Debugger>>,
}

impl Controller {
    pub fn new(settings: Settings, program: Vec<SourceLine>) -> ExecResult<Controller> {
        let mut interp = crate::interpreter::Interpreter::new(settings);
        interp.load(program)?;
        Ok(Controller { inner: Arc::new(Mutex::new(Debugger::new(interp))) })
    }

    pub fn set_program_args(&self, args: &[String]) -> ExecResult<()> {
        self.inner.lock().unwrap().interp.set_program_args(args)
    }

    pub fn step_once(&self) -> ExecResult<()> {
        self.inner.lock().unwrap().step_once()
    }

    pub fn run_until_stop(&self) -> ExecResult<()> {
        self.inner.lock().unwrap().run_until_stop()
    }

    pub fn reverse(&self) -> bool {
        self.inner.lock().unwrap().reverse()
    }

    pub fn pause(&self) {
        self.inner.lock().unwrap().continue_flag = false;
    }

    pub fn add_breakpoint(&self, file: &str, line: u32) {
        self.inner.lock().unwrap().add_breakpoint(file, line);
    }

    pub fn remove_breakpoint(&self, file: &str, line: u32) {
        self.inner.lock().unwrap().remove_breakpoint(file, line);
    }

    pub fn is_done(&self) -> bool {
        self.inner.lock().unwrap().done
    }

    pub fn exit_code(&self) -> i32 {
        self.inner.lock().unwrap().exit_code
    }

    pub fn instr_count(&self) -> u64 {
        self.inner.lock().unwrap().interp.instr_count
    }

    pub fn get_reg(&self, index: usize) -> i32 {
        self.inner.lock().unwrap().interp.regs[index]
    }

    pub fn get_pc(&self) -> u32 {
        self.inner.lock().unwrap().interp.pc
    }

    pub fn get_label(&self, name: &str) -> Option<u32> {
        self.inner.lock().unwrap().interp.memory.get_label(name)
    }

    /// Clones the full label table; the lock can't outlive this call, so
    /// there's no way to hand back a borrowed reference.
    pub fn get_labels(&self) -> HashMap<String, u32> {
        self.inner.lock().unwrap().interp.memory.labels().clone()
    }

    pub fn get_byte(&self, addr: u32, signed: bool) -> ExecResult<i32> {
        let mut dbg = self.inner.lock().unwrap();
        let (warnings, data_min, data_max) = (dbg.interp.settings.warnings, dbg.interp.settings.data_min, dbg.interp.settings.data_max);
        dbg.interp.memory.get_byte(addr, signed, warnings, data_min, data_max)
    }

    pub fn get_reg_word(&self, name: &str) -> Option<i32> {
        let idx = crate::lexer::gpr_index(name)? as usize;
        Some(self.inner.lock().unwrap().interp.regs[idx])
    }

    pub fn get_instr_count(&self) -> u64 {
        self.instr_count()
    }

    /// Mutates one named field of the live [`Settings`]; unknown keys or
    /// unparsable values are silently ignored, matching the reference
    /// driver's tolerant `settings[key] = val` assignment.
    pub fn set_setting(&self, key: &str, val: &str) {
        let mut dbg = self.inner.lock().unwrap();
        let settings = &mut dbg.interp.settings;
        match key {
            "warnings" => {
                if let Ok(b) = val.parse() {
                    settings.warnings = b;
                }
            }
            "debug" => {
                if let Ok(b) = val.parse() {
                    settings.debug = b;
                }
            }
            "garbage_registers" => {
                if let Ok(b) = val.parse() {
                    settings.garbage_registers = b;
                }
            }
            "garbage_memory" => {
                if let Ok(b) = val.parse() {
                    settings.garbage_memory = b;
                }
            }
            "disp_instr_count" => {
                if let Ok(b) = val.parse() {
                    settings.disp_instr_count = b;
                }
            }
            "max_instructions" => {
                if let Ok(n) = val.parse() {
                    settings.max_instructions = n;
                }
            }
            _ => {}
        }
    }

    /// Whether `continue_flag` is currently set (free-running vs. single-step).
    pub fn cont(&self) -> bool {
        self.inner.lock().unwrap().continue_flag
    }

    /// Whether a session is attached; always true once a [`Controller`]
    /// has been constructed, since `new` fails fast if loading errors.
    pub fn good(&self) -> bool {
        true
    }

    pub fn current_line(&self) -> Option<(String, u32)> {
        self.inner.lock().unwrap().current_tag().map(|t| (t.file_name.clone(), t.line_no))
    }

    /// Clones the shared handle; every clone locks the same session.
    pub fn handle(&self) -> Controller {
        Controller { inner: Arc::clone(&self.inner) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_program_with_no_instructions_is_immediately_done() {
        let controller = Controller::new(Settings::new(), vec![]).unwrap();
        controller.step_once().unwrap();
        assert!(controller.is_done());
    }

    #[test]
    fn set_setting_updates_a_known_flag_and_ignores_unknown_keys() {
        let controller = Controller::new(Settings::new(), vec![]).unwrap();
        assert!(!controller.cont());
        controller.set_setting("warnings", "true");
        controller.set_setting("nonsense", "true");
        assert!(controller.good());
    }

    #[test]
    fn get_reg_word_resolves_a_register_name() {
        let controller = Controller::new(Settings::new(), vec![]).unwrap();
        assert_eq!(controller.get_reg_word("$0"), Some(0));
        assert_eq!(controller.get_reg_word("$bogus"), None);
    }
}
