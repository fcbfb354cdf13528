//! Error taxonomy for the assembler and interpreter.
//!
//! Two leaf enums cover assembly-time and execution-time failures; both are
//! folded into a top-level [`Error`] via `From`, the same layering the
//! assembler/debugger stack uses elsewhere in this crate.

use std::fmt;

use crate::ir::FileTag;

/// Failures raised while preprocessing, lexing or parsing a source tree.
#[derive(Clone, Debug, PartialEq)]
pub enum AssembleError {
    InvalidEqv { name: String },
    FileAlreadyIncluded { file: String },
    FileNotFound { path: String },
    InvalidLabel { name: String },
    InvalidImmediate { message: String },
    InvalidArgument { message: String },
    NoMainLabel,
    Syntax { message: String },
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AssembleError::InvalidEqv { ref name } => {
                write!(f, "InvalidEQV: {} is a restricted word and cannot be replaced using eqv", name)
            }
            AssembleError::FileAlreadyIncluded { ref file } => {
                write!(f, "FileAlreadyIncluded: {} already included", file)
            }
            AssembleError::FileNotFound { ref path } => write!(f, "FileNotFound: {}", path),
            AssembleError::InvalidLabel { ref name } => {
                write!(f, "InvalidLabel: {} is not a valid label", name)
            }
            AssembleError::InvalidImmediate { ref message } => {
                write!(f, "InvalidImmediate: {}", message)
            }
            AssembleError::InvalidArgument { ref message } => {
                write!(f, "InvalidArgument: {}", message)
            }
            AssembleError::NoMainLabel => write!(f, "NoMainLabel: could not find main label"),
            AssembleError::Syntax { ref message } => write!(f, "SyntaxError: {}", message),
        }
    }
}

impl std::error::Error for AssembleError {}

/// Failures raised while executing an assembled program.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecError {
    MemoryOutOfBounds { address: u32 },
    MemoryAlignment { address: u32, width: u32 },
    InvalidCharacter { code: i32 },
    InvalidSyscall { code: i32 },
    WritingToZeroRegister,
    ArithmeticOverflow,
    DivisionByZero,
    InvalidInput { text: String },
    InstrCountExceed { max: u64 },
    BreakpointException { code: u32 },
    InvalidRegister { name: String },
    InvalidArgument { message: String },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ExecError::MemoryOutOfBounds { address } => {
                write!(f, "MemoryOutOfBounds: 0x{:08x} is not within the data section or heap/stack", address)
            }
            ExecError::MemoryAlignment { address, width } => {
                write!(f, "MemoryAlignment: 0x{:08x} is not {}-byte aligned", address, width)
            }
            ExecError::InvalidCharacter { code } => {
                write!(f, "InvalidCharacter: character with ASCII code {} can't be printed", code)
            }
            ExecError::InvalidSyscall { code } => write!(f, "InvalidSyscall: {} is not a valid syscall code", code),
            ExecError::WritingToZeroRegister => write!(f, "WritingToZeroRegister: cannot write to $zero"),
            ExecError::ArithmeticOverflow => write!(f, "ArithmeticOverflow: result does not fit in 32 bits"),
            ExecError::DivisionByZero => write!(f, "DivisionByZero: division by zero"),
            ExecError::InvalidInput { ref text } => write!(f, "InvalidInput: {}", text),
            ExecError::InstrCountExceed { max } => {
                write!(f, "InstrCountExceed: exceeded maximum instruction count: {}", max)
            }
            ExecError::BreakpointException { code } => write!(f, "BreakpointException: code = {}", code),
            ExecError::InvalidRegister { ref name } => write!(f, "InvalidRegister: {}", name),
            ExecError::InvalidArgument { ref message } => write!(f, "InvalidArgument: {}", message),
        }
    }
}

impl std::error::Error for ExecError {}

/// Top-level error returned by the assemble and interpret pipelines.
///
/// Execution errors are tagged with the `(file, line)` they occurred at, as
/// required by the "TypeName: message (file, line)" user-visible format.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    Assemble(AssembleError),
    Exec { error: ExecError, tag: Option<FileTag> },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Assemble(ref e) => write!(f, "{}", e),
            Error::Exec { ref error, tag: Some(ref tag) } => {
                write!(f, "{} ({}, {})", error, tag.file_name, tag.line_no)
            }
            Error::Exec { ref error, tag: None } => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for Error {}

impl From<AssembleError> for Error {
    fn from(err: AssembleError) -> Error {
        Error::Assemble(err)
    }
}

impl From<ExecError> for Error {
    fn from(err: ExecError) -> Error {
        Error::Exec { error: err, tag: None }
    }
}

impl Error {
    /// Attaches a [`FileTag`] to an execution error, matching `interpret`'s
    /// habit of augmenting the exception with `self.line_info` once it
    /// crosses the loop boundary. A no-op on assembly errors.
    pub fn with_tag(self, tag: FileTag) -> Error {
        match self {
            Error::Exec { error, tag: None } => Error::Exec { error, tag: Some(tag) },
            other => other,
        }
    }
}

pub type AssembleResult<T> = Result<T, AssembleError>;
pub type ExecResult<T> = Result<T, ExecError>;
pub type Result<T> = std::result::Result<T, Error>;
