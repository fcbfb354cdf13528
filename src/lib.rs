pub mod controller;
pub mod debugger;
pub mod error;
pub mod instructions;
pub mod interpreter;
pub mod ir;
pub mod lexer;
pub mod memory;
pub mod numerics;
pub mod parser;
pub mod preprocess;
pub mod settings;
pub mod syscalls;

include!(concat!(env!("OUT_DIR"), "/version.rs"));
