//! Tokenizer over the preprocessor's marker-annotated text.
//!
//! Pseudo-op and basic-op regexes are generated once, at startup, from a
//! static category table — mirroring the reference implementation's
//! per-category regex construction, but built with [`once_cell`] instead of
//! re-derived on every call.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AssembleError;
use crate::ir::FileTag;

/// `U+0081 U+0082`: marks every non-first significant line of an included
/// file, followed by `"path" lineno`.
pub const LINE_MARKER: &str = "\u{0081}\u{0082}";
/// `U+0081 U+0083`: marks the first significant line of a file.
pub const FILE_MARKER: &str = "\u{0081}\u{0083}";

/// Pseudo-op categories, keyed the way the restricted-`.eqv`-name check and
/// the parser's expansion table both consult them.
pub static PSEUDO_OP_CATEGORIES: &[(&str, &[&str])] = &[
    ("R_FUNCT3", &["seq", "sne", "sge", "sgeu", "sgt", "sgtu", "sle", "sleu", "rolv", "rorv"]),
    ("R_FUNCT2", &["move", "neg", "not", "abs"]),
    ("I_TYPE", &["rol", "ror"]),
    ("LOADS_I", &["li"]),
    ("PS_LOADS_A", &["la"]),
    ("BRANCH", &["bge", "bgeu", "bgt", "bgtu", "ble", "bleu", "blt", "bltu", "b"]),
    ("ZERO_BRANCH", &["beqz", "bnez"]),
];

pub static BASIC_OPS: &[&str] = &[
    "add", "addu", "addi", "addiu", "sub", "subu", "and", "andi", "or", "ori", "xor", "xori",
    "nor", "slt", "sltu", "slti", "sltiu", "sll", "srl", "sra", "sllv", "srlv", "srav", "mult",
    "multu", "div", "divu", "madd", "maddu", "msub", "msubu", "mfhi", "mflo", "mthi", "mtlo",
    "movn", "movz", "lui", "lw", "lh", "lhu", "lb", "lbu", "lwl", "lwr", "sw", "sh", "sb", "swl",
    "swr", "j", "jal", "jr", "jalr", "beq", "bne", "blez", "bgtz", "bltz", "bgez", "blezal",
    "bgtzal", "bltzal", "bgezal", "syscall", "nop", "break", "mfc1", "mtc1", "l.s", "l.d", "s.s",
    "s.d", "add.s", "add.d", "sub.s", "sub.d", "mul.s", "mul.d", "div.s", "div.d", "abs.s",
    "abs.d", "neg.s", "neg.d", "sqrt.s", "sqrt.d", "mov.s", "mov.d", "c.eq.s", "c.eq.d", "c.le.s",
    "c.le.d", "c.lt.s", "c.lt.d", "bc1t", "bc1f", "cvt.w.s", "cvt.w.d", "cvt.s.w", "cvt.s.d",
    "cvt.d.w", "cvt.d.s", "movn.s", "movn.d", "movz.s", "movz.d", "movt.s", "movt.d", "movf.s",
    "movf.d",
];

pub static DIRECTIVES: &[&str] = &[
    ".text", ".data", ".word", ".half", ".byte", ".float", ".double", ".ascii", ".asciiz",
    ".space", ".align", ".eqv", ".globl", ".include",
];

/// Every word the `.eqv` substitution is forbidden from overriding.
static RESTRICTED_WORDS: Lazy<Vec<String>> = Lazy::new(|| {
    let mut words: Vec<String> = BASIC_OPS.iter().map(|s| s.to_string()).collect();
    for &(_, ops) in PSEUDO_OP_CATEGORIES {
        words.extend(ops.iter().map(|s| s.to_string()));
    }
    words.extend(DIRECTIVES.iter().map(|s| s.to_string()));
    words
});

/// One compiled word-bounded regex per restricted word, used both to reject
/// restricted `.eqv` names and (indirectly) to recognize mnemonics.
pub static RESTRICTED_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    RESTRICTED_WORDS
        .iter()
        .map(|w| Regex::new(&format!(r"\b{}\b", regex::escape(w))).expect("restricted word regex"))
        .collect()
});

/// Matches a pseudo-load whose resolved address must be back-patched into
/// its first two expanded instructions (`la`, sign/zero-extending loads and
/// stores by label, FP loads/stores by label).
pub static LOAD_BY_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(lbu?|lhu?|lw[lr]?|la|s[bhw]|sw[lr]|l\.[sd]|s\.[sd])$").expect("load-by-label regex")
});

pub fn is_restricted(name: &str) -> bool {
    RESTRICTED_REGEXES.iter().any(|re| re.is_match(name))
}

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Directive(String),
    LabelDef(String),
    Register(u8),
    FReg(u8),
    IntLit(i64),
    FloatLit(f64),
    CharLit(i32),
    StringLit(String),
    Comma,
    LParen,
    RParen,
    Word(String),
}

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?x)
        (?P<ws>\s+)
        |(?P<comment>\#.*)
        |(?P<string>"(?:[^"\\]|\\.)*")
        |(?P<char>'(?:\\.|[^'])')
        |(?P<float>[+-]?\d+\.\d+)
        |(?P<hex>0[xX][0-9a-fA-F]+)
        |(?P<int>[+-]?\d+)
        |(?P<fpreg>\$f\d{1,2})
        |(?P<reg>\$[A-Za-z0-9]+)
        |(?P<label>[A-Za-z_.][A-Za-z0-9_.]*:)
        |(?P<comma>,)
        |(?P<lparen>\()
        |(?P<rparen>\))
        |(?P<word>[A-Za-z_.][A-Za-z0-9_.]*)
        "#
    ))
    .expect("token regex")
});

/// The canonical GPR name order (index = register number).
pub static GPR_NAMES: &[&str] = &[
    "$0", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3", "$t4",
    "$t5", "$t6", "$t7", "$t8", "$t9", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7",
    "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

pub fn gpr_index(name: &str) -> Option<u8> {
    if let Some(rest) = name.strip_prefix('$') {
        if let Ok(n) = rest.parse::<u8>() {
            if (n as usize) < GPR_NAMES.len() {
                return Some(n);
            }
        }
    }
    GPR_NAMES.iter().position(|&n| n == name).map(|i| i as u8)
}

pub fn freg_index(name: &str) -> Option<u8> {
    name.strip_prefix("$f").and_then(|n| n.parse::<u8>().ok())
}

/// Tokenizes one line of already-marker-stripped, comment-stripped source.
/// Markers themselves are handled by the caller ([`crate::parser`]) before
/// the remaining text reaches this function.
pub fn tokenize_line(line: &str) -> Result<Vec<Token>, AssembleError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < line.len() {
        let rest = &line[pos..];
        let caps = match TOKEN_RE.captures(rest) {
            Some(c) if c.get(0).map_or(false, |m| m.start() == 0) => c,
            _ => {
                return Err(AssembleError::Syntax { message: format!("unrecognized token near '{}'", rest) });
            }
        };
        let whole = caps.get(0).unwrap();
        pos += whole.end();

        if caps.name("ws").is_some() || caps.name("comment").is_some() {
            continue;
        } else if let Some(m) = caps.name("string") {
            let raw = m.as_str();
            tokens.push(Token::StringLit(crate::numerics::handle_escapes(&raw[1..raw.len() - 1])));
        } else if let Some(m) = caps.name("char") {
            let raw = m.as_str();
            let inner = crate::numerics::handle_escapes(&raw[1..raw.len() - 1]);
            let code = inner.chars().next().map(|c| c as i32).unwrap_or(0);
            tokens.push(Token::CharLit(code));
        } else if let Some(m) = caps.name("float") {
            tokens.push(Token::FloatLit(m.as_str().parse().unwrap_or(0.0)));
        } else if let Some(m) = caps.name("hex") {
            let v = i64::from_str_radix(&m.as_str()[2..], 16).unwrap_or(0);
            tokens.push(Token::IntLit(v));
        } else if let Some(m) = caps.name("int") {
            tokens.push(Token::IntLit(m.as_str().parse().unwrap_or(0)));
        } else if let Some(m) = caps.name("fpreg") {
            tokens.push(Token::FReg(m.as_str()[2..].parse().unwrap_or(0)));
        } else if let Some(m) = caps.name("reg") {
            tokens.push(Token::Register(gpr_index(m.as_str()).unwrap_or(0)));
        } else if let Some(m) = caps.name("label") {
            let s = m.as_str();
            tokens.push(Token::LabelDef(s[..s.len() - 1].to_string()));
        } else if caps.name("comma").is_some() {
            tokens.push(Token::Comma);
        } else if caps.name("lparen").is_some() {
            tokens.push(Token::LParen);
        } else if caps.name("rparen").is_some() {
            tokens.push(Token::RParen);
        } else if let Some(m) = caps.name("word") {
            let w = m.as_str();
            if let Some(d) = DIRECTIVES.iter().find(|&&d| d == w) {
                tokens.push(Token::Directive(d.to_string()));
            } else {
                tokens.push(Token::Word(w.to_string()));
            }
        }
    }

    Ok(tokens)
}

/// Parses a `FILE_MARKER`/`LINE_MARKER` suffix of the shape
/// ` <MARKER> "path" lineno` off the end of an annotated line, returning
/// the remaining instruction text and the tag.
pub fn split_marker(line: &str) -> Option<(&str, FileTag)> {
    let (marker, rest) = if let Some(idx) = line.find(FILE_MARKER) {
        (FILE_MARKER, &line[idx..])
    } else if let Some(idx) = line.find(LINE_MARKER) {
        (LINE_MARKER, &line[idx..])
    } else {
        return None;
    };

    let body = &line[..line.find(marker).unwrap()];
    let tail = &rest[marker.len()..];
    let tail = tail.trim();
    let quote_end = tail[1..].find('"')? + 1;
    let file_name = tail[1..quote_end].to_string();
    let line_no: u32 = tail[quote_end + 1..].trim().parse().ok()?;

    Some((body.trim_end(), FileTag { file_name, line_no }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_registers_numbers_and_punctuation() {
        let tokens = tokenize_line("lw $t0, 4($sp)").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Word("lw".into()),
                Token::Register(gpr_index("$t0").unwrap()),
                Token::Comma,
                Token::IntLit(4),
                Token::LParen,
                Token::Register(gpr_index("$sp").unwrap()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn splits_file_marker_suffix() {
        let line = format!("li $t0, 7 {} \"foo.asm\" 3", FILE_MARKER);
        let (body, tag) = split_marker(&line).unwrap();
        assert_eq!(body, "li $t0, 7");
        assert_eq!(tag.file_name, "foo.asm");
        assert_eq!(tag.line_no, 3);
    }

    #[test]
    fn restricted_words_cover_basic_and_pseudo_ops() {
        assert!(is_restricted("add"));
        assert!(is_restricted("li"));
        assert!(!is_restricted("my_macro"));
    }
}
