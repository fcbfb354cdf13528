//! `.include`/`.eqv` preprocessing pass.
//!
//! Walks the `.include` graph depth-first, concatenating every file's
//! contents in inclusion order and tagging the first line of each file with
//! [`lexer::FILE_MARKER`] and every subsequent significant line with
//! [`lexer::LINE_MARKER`], so the parser (and later the debugger) can map any
//! line of the merged text back to its original `(file, line)`. `.eqv`
//! definitions are captured and substituted in the same pass, the way the
//! reference preprocessor does it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AssembleError, AssembleResult};
use crate::lexer::{self, FILE_MARKER, LINE_MARKER};

static EQV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\.eqv\s+(\S+)\s+(.*\S)\s*$").expect("eqv regex"));
static INCLUDE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\s*\.include\s+"([^"]+)"\s*$"#).expect("include regex"));

/// Matches quoted strings, comments, or an already-emitted marker tail, so
/// `.eqv` substitution skips over them; anything else is a candidate word
/// boundary for the macro name.
fn substitution_regex(name: &str) -> Regex {
    Regex::new(&format!(
        r#"("[^"]*")|(#.*)|(\x81.*)|(\b{}\b)"#,
        regex::escape(name)
    ))
    .expect("eqv substitution regex")
}

/// Output of a successful preprocessing run: the merged, marker-annotated
/// source text, and a map of original (unmodified) lines per file, kept for
/// the debugger's source listing.
pub struct Preprocessed {
    pub text: String,
    pub original_lines: HashMap<String, Vec<String>>,
}

pub fn preprocess(entry_path: &Path) -> AssembleResult<Preprocessed> {
    let mut eqvs: HashMap<String, String> = HashMap::new();
    let mut original_lines = HashMap::new();
    let mut out = String::new();
    let mut seen = Vec::new();

    walk(entry_path, &mut seen, &mut eqvs, &mut original_lines, &mut out, true)?;

    Ok(Preprocessed { text: out, original_lines })
}

fn walk(
    path: &Path,
    seen: &mut Vec<PathBuf>,
    eqvs: &mut HashMap<String, String>,
    original_lines: &mut HashMap<String, Vec<String>>,
    out: &mut String,
    _is_root: bool,
) -> AssembleResult<()> {
    let canon = path.to_path_buf();
    if seen.contains(&canon) {
        return Err(AssembleError::FileAlreadyIncluded { file: display_name(path) });
    }
    seen.push(canon.clone());

    let contents = std::fs::read_to_string(path).map_err(|_| AssembleError::FileNotFound { path: display_name(path) })?;
    let file_name = display_name(path);
    let lines: Vec<String> = contents.lines().map(|s| s.to_string()).collect();
    original_lines.insert(file_name.clone(), lines.clone());

    let mut first_emitted = true;

    for (idx, raw) in lines.iter().enumerate() {
        let line_no = idx as u32 + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            out.push_str(raw);
            out.push('\n');
            continue;
        }

        if let Some(caps) = INCLUDE_RE.captures(trimmed) {
            let rel = &caps[1];
            let child = path.parent().map(|p| p.join(rel)).unwrap_or_else(|| PathBuf::from(rel));
            walk(&child, seen, eqvs, original_lines, out, false)?;
            continue;
        }

        if let Some(caps) = EQV_RE.captures(trimmed) {
            let name = caps[1].to_string();
            let value = caps[2].to_string();
            if lexer::is_restricted(&name) {
                return Err(AssembleError::InvalidEqv { name });
            }
            eqvs.insert(name, value);
            continue;
        }

        let mut substituted = raw.clone();
        for (name, value) in eqvs.iter() {
            substituted = substitute(&substituted, name, value);
        }

        let marker = if first_emitted { FILE_MARKER } else { LINE_MARKER };
        first_emitted = false;
        out.push_str(&format!("{} {} \"{}\" {}\n", substituted, marker, file_name, line_no));
    }

    seen.pop();
    Ok(())
}

/// Replaces whole-word occurrences of `name` with `value`, skipping matches
/// inside string literals, comments, or an existing marker tail.
fn substitute(line: &str, name: &str, value: &str) -> String {
    let re = substitution_regex(name);
    re.replace_all(line, |caps: &regex::Captures| {
        if caps.get(4).is_some() {
            value.to_string()
        } else {
            caps.get(0).unwrap().as_str().to_string()
        }
    })
    .into_owned()
}

fn display_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eqv_substitutes_whole_words_only() {
        let out = substitute("add $t0, $t1, SIZE", "SIZE", "16");
        assert_eq!(out, "add $t0, $t1, 16");
    }

    #[test]
    fn eqv_does_not_touch_string_literals_or_comments() {
        let out = substitute(r#"la $a0, msg # SIZE is free here"#, "SIZE", "16");
        assert_eq!(out, r#"la $a0, msg # SIZE is free here"#);
        let out2 = substitute(r#".ascii "SIZE""#, "SIZE", "16");
        assert_eq!(out2, r#".ascii "SIZE""#);
    }

    #[test]
    fn eqv_rejects_restricted_names() {
        assert!(lexer::is_restricted("li"));
    }
}
