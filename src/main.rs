// Rustation - a PlayStation emulator
// Copyright (C) 2015 Lionel Flandrin
//
// This program is free software; you can redistribute it and/or
// modify it under the terms of the GNU General Public License
// as published by the Free Software Foundation; either version 2
// of the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA.

extern crate clap;
extern crate env_logger;

use std::io::Write as IoWrite;
use std::path::Path;

use clap::{App, Arg};

use mipsim::controller::Controller;
use mipsim::error::Error;
use mipsim::settings::Settings;
use mipsim::{parser, preprocess};

fn main() {
    env_logger::init();

    let matches = App::new("mipsim")
        .version(mipsim::VERSION)
        .about("An educational MIPS32 assembler and interactive interpreter")
        .arg(Arg::with_name("FILENAME").required(true).help("source file to assemble and run"))
        .arg(Arg::with_name("assemble").short("a").long("assemble").help("assemble only; report errors and exit without running"))
        .arg(Arg::with_name("debug").short("d").long("debug").help("start suspended, in the interactive debugger"))
        .arg(Arg::with_name("garbage").short("g").long("garbage").help("randomize uninitialized registers and memory"))
        .arg(
            Arg::with_name("max_instructions")
                .short("n")
                .long("max_instructions")
                .takes_value(true)
                .help("maximum number of instructions to execute before aborting"),
        )
        .arg(Arg::with_name("disp_instr_count").short("i").long("disp_instr_count").help("print the executed instruction count on exit"))
        .arg(Arg::with_name("warnings").short("w").long("warnings").help("warn on reads of uninitialized registers/memory"))
        .arg(Arg::with_name("program_args").long("pa").multiple(true).takes_value(true).help("arguments forwarded to the assembled program"))
        .get_matches();

    let path = Path::new(matches.value_of("FILENAME").unwrap());

    let mut settings = Settings::new();
    settings.garbage_registers = matches.is_present("garbage");
    settings.garbage_memory = matches.is_present("garbage");
    settings.warnings = matches.is_present("warnings");
    settings.debug = matches.is_present("debug");
    settings.disp_instr_count = matches.is_present("disp_instr_count");
    if let Some(n) = matches.value_of("max_instructions") {
        match n.parse() {
            Ok(n) => settings.max_instructions = n,
            Err(_) => {
                eprintln!("invalid value for --max_instructions: {}", n);
                std::process::exit(2);
            }
        }
    }

    let program_args: Vec<String> = matches.values_of("program_args").map(|v| v.map(str::to_string).collect()).unwrap_or_default();

    match run(path, settings, matches.is_present("assemble"), &program_args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

fn run(path: &Path, settings: Settings, assemble_only: bool, program_args: &[String]) -> Result<i32, Error> {
    let preprocessed = preprocess::preprocess(path)?;
    let program = parser::parse(&preprocessed.text)?;
    parser::check_main_label(&program)?;

    if assemble_only {
        println!("{}: assembled with no errors", path.display());
        return Ok(0);
    }

    let controller = Controller::new(settings.clone(), program)?;
    controller.set_program_args(program_args)?;

    if settings.debug {
        repl(&controller)?;
    } else {
        controller.run_until_stop()?;
    }

    if settings.disp_instr_count {
        println!("executed {} instructions", controller.instr_count());
    }

    Ok(controller.exit_code())
}

/// A line-oriented debugger REPL: `break FILE LINE`, `delete FILE LINE`,
/// `next`, `continue`, `reverse`, `print <reg|label> <format...>`, `kill`.
fn repl(controller: &Controller) -> Result<(), Error> {
    let stdin = std::io::stdin();
    loop {
        if controller.is_done() {
            println!("program exited with code {}", controller.exit_code());
            return Ok(());
        }

        if let Some((file, line)) = controller.current_line() {
            println!("stopped at {}:{}", file, line);
        }
        print!("(mipsim) ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            return Ok(());
        }
        let mut words = line.trim().split_whitespace();
        match words.next() {
            Some("next") | Some("n") => {
                controller.step_once()?;
            }
            Some("continue") | Some("c") => {
                controller.run_until_stop()?;
            }
            Some("reverse") | Some("r") => {
                if !controller.reverse() {
                    println!("nothing to reverse");
                }
            }
            Some("break") | Some("b") => {
                if let (Some(file), Some(ln)) = (words.next(), words.next().and_then(|s| s.parse().ok())) {
                    controller.add_breakpoint(file, ln);
                }
            }
            Some("delete") => {
                if let (Some(file), Some(ln)) = (words.next(), words.next().and_then(|s| s.parse().ok())) {
                    controller.remove_breakpoint(file, ln);
                }
            }
            Some("print") | Some("p") => {
                let rest: Vec<&str> = words.collect();
                if let Some(&target) = rest.first() {
                    print_target(controller, target, &rest[1..]);
                }
            }
            Some("kill") | Some("quit") | Some("q") => return Ok(()),
            Some(other) => println!("unrecognized command: {}", other),
            None => {}
        }
    }
}

/// Handles `print|p <reg|label> <format...>`: a bare register prints its
/// signed value, `<reg> d|u|h|b` reformats it, and a label accepts `s`
/// (string), `c N` (N characters) or `{w|h|b} N {d|u|h|b}` (an array of
/// N integers of the given width, each rendered in the given format).
fn print_target(controller: &Controller, target: &str, format: &[&str]) {
    if let Some(idx) = mipsim::lexer::gpr_index(target) {
        let value = controller.get_reg(idx as usize);
        match format.first().copied() {
            None | Some("d") => println!("{} = {}", target, value),
            Some("u") => println!("{} = {}", target, mipsim::numerics::format_unsigned(value)),
            Some("h") => println!("{} = {}", target, mipsim::numerics::format_hex(value, 4)),
            Some("b") => println!("{} = {}", target, mipsim::numerics::format_bin(value, 4)),
            Some(other) => println!("unknown register format: {}", other),
        }
        return;
    }

    let addr = match controller.get_label(target) {
        Some(a) => a,
        None => {
            println!("unknown register or label: {}", target);
            return;
        }
    };

    match format.first().copied() {
        Some("s") => println!("{} = \"{}\"", target, read_string(controller, addr)),
        Some("c") => {
            let n = format.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
            println!("{} = \"{}\"", target, read_string_n(controller, addr, n));
        }
        Some(width @ ("w" | "h" | "b")) => {
            let n: u32 = format.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
            let fmt = format.get(2).copied().unwrap_or("d");
            let values = read_array(controller, addr, width, n);
            let rendered: Vec<String> = values.into_iter().map(|v| render_value(v, fmt)).collect();
            println!("{} = [{}]", target, rendered.join(", "));
        }
        _ => println!("{} = {:#010x}", target, addr),
    }
}

fn render_value(value: i32, fmt: &str) -> String {
    match fmt {
        "u" => mipsim::numerics::format_unsigned(value),
        "h" => mipsim::numerics::format_hex(value, 4),
        "b" => mipsim::numerics::format_bin(value, 4),
        _ => value.to_string(),
    }
}

fn read_string(controller: &Controller, addr: u32) -> String {
    read_string_n(controller, addr, usize::MAX)
}

fn read_string_n(controller: &Controller, addr: u32, max: usize) -> String {
    let mut out = String::new();
    let mut a = addr;
    let mut count = 0;
    while count < max {
        let c = match controller.get_byte(a, false) {
            Ok(c) => c,
            Err(_) => break,
        };
        if c == 0 {
            break;
        }
        out.push(c as u8 as char);
        a += 1;
        count += 1;
    }
    out
}

/// Composes an array of `w`/`h`/`b`-wide integers from successive byte
/// reads, little-endian, the same order `Memory::get_word`/`get_hword`
/// assemble bytes internally.
fn read_array(controller: &Controller, addr: u32, width: &str, n: u32) -> Vec<i32> {
    let size: u32 = match width {
        "w" => 4,
        "h" => 2,
        _ => 1,
    };
    let mut out = Vec::with_capacity(n as usize);
    for i in 0..n {
        let base = addr + i * size;
        let mut acc: u32 = 0;
        for step in (0..size).rev() {
            let b = controller.get_byte(base + step, false).unwrap_or(0) as u32;
            acc = (acc << 8) | (b & 0xff);
        }
        out.push(acc as i32);
    }
    out
}
