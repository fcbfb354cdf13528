//! Builds the executable [`crate::ir`] from the preprocessor's annotated
//! text: tokenizes each line, resolves labels into the label queue, and
//! expands pseudo-ops into their basic-instruction sequences.

use crate::error::{AssembleError, AssembleResult};
use crate::ir::{Declaration, FileTag, Instr, InstrKind, JumpTarget, Label, Reg, SourceLine};
use crate::lexer::{self, Token};

#[derive(Clone, Debug, PartialEq)]
enum Operand {
    Reg(Reg),
    FReg(u8),
    Imm(i64),
    Float(f64),
    Label(String),
    Str(String),
    MemRef { imm: i64, base: Reg },
}

fn split_operands(tokens: &[Token]) -> AssembleResult<Vec<Operand>> {
    let mut groups: Vec<Vec<&Token>> = vec![vec![]];
    for t in tokens {
        if *t == Token::Comma {
            groups.push(vec![]);
        } else {
            groups.last_mut().unwrap().push(t);
        }
    }

    let mut out = Vec::new();
    for g in groups {
        if g.is_empty() {
            continue;
        }
        let operand = match g.as_slice() {
            [Token::Register(r)] => Operand::Reg(Reg(*r)),
            [Token::FReg(r)] => Operand::FReg(*r),
            [Token::IntLit(v)] => Operand::Imm(*v),
            [Token::FloatLit(v)] => Operand::Float(*v),
            [Token::StringLit(s)] => Operand::Str(s.clone()),
            [Token::Word(w)] => Operand::Label(w.clone()),
            [Token::IntLit(v), Token::LParen, Token::Register(r), Token::RParen] => {
                Operand::MemRef { imm: *v, base: Reg(*r) }
            }
            [Token::LParen, Token::Register(r), Token::RParen] => Operand::MemRef { imm: 0, base: Reg(*r) },
            other => {
                return Err(AssembleError::Syntax { message: format!("unrecognized operand group {:?}", other) });
            }
        };
        out.push(operand);
    }
    Ok(out)
}

fn as_reg(op: &Operand) -> AssembleResult<Reg> {
    match op {
        Operand::Reg(r) => Ok(*r),
        _ => Err(AssembleError::Syntax { message: "expected a register operand".into() }),
    }
}

fn as_freg(op: &Operand) -> AssembleResult<u8> {
    match op {
        Operand::FReg(r) => Ok(*r),
        _ => Err(AssembleError::Syntax { message: "expected a floating point register operand".into() }),
    }
}

fn as_imm(op: &Operand) -> AssembleResult<i32> {
    match op {
        Operand::Imm(v) => Ok(*v as i32),
        _ => Err(AssembleError::Syntax { message: "expected an integer immediate".into() }),
    }
}

fn as_label(op: &Operand) -> AssembleResult<String> {
    match op {
        Operand::Label(s) => Ok(s.clone()),
        _ => Err(AssembleError::Syntax { message: "expected a label".into() }),
    }
}

const ZERO: Reg = Reg(0);
const AT: Reg = Reg(1);

/// Parses the whole preprocessed, marker-annotated source into a flat
/// sequence of [`SourceLine`]s, in source order.
pub fn parse(annotated: &str) -> AssembleResult<Vec<SourceLine>> {
    let mut out = Vec::new();
    let mut section = Section::Text;
    let mut current_tag: Option<FileTag> = None;
    let mut pending_label: Option<String> = None;
    let mut seen_labels: std::collections::HashSet<String> = std::collections::HashSet::new();

    for raw_line in annotated.lines() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (body, tag) = match lexer::split_marker(raw_line) {
            Some((body, tag)) => {
                current_tag = Some(tag.clone());
                (body, tag)
            }
            None => {
                let tag = current_tag.clone().unwrap_or(FileTag { file_name: "<input>".into(), line_no: 0 });
                (trimmed, tag)
            }
        };

        if body.trim().is_empty() {
            continue;
        }

        let tokens = lexer::tokenize_line(body)?;
        let mut tokens = tokens.as_slice();

        if let Some(Token::LabelDef(name)) = tokens.first() {
            let name = name.clone();
            if !seen_labels.insert(name.clone()) {
                return Err(AssembleError::InvalidLabel { name });
            }
            if tokens.len() == 1 {
                out.push(SourceLine::Label(Label { name, in_data: matches!(section, Section::Data) }));
                continue;
            }
            pending_label = Some(name);
            tokens = &tokens[1..];
        }

        match tokens.first() {
            Some(Token::Directive(d)) => match d.as_str() {
                ".text" => section = Section::Text,
                ".data" => section = Section::Data,
                ".globl" | ".eqv" | ".include" => {}
                _ => {
                    let decl = parse_declaration(d, &tokens[1..])?;
                    out.push(SourceLine::Declaration { decl, label: pending_label.take().map(|name| Label { name, in_data: true }), tag });
                }
            },
            Some(_) => {
                if let Some(name) = pending_label.take() {
                    out.push(SourceLine::Label(Label { name, in_data: false }));
                }
                let instr = parse_instruction(tokens, tag.clone())?;
                out.push(SourceLine::Instr(instr));
            }
            None => {}
        }
    }

    Ok(out)
}

enum Section {
    Text,
    Data,
}

/// Every label name declared anywhere in the program: a standalone label,
/// one attached to a declaration, or one attached to an instruction.
fn declared_labels(lines: &[SourceLine]) -> impl Iterator<Item = &str> {
    lines.iter().filter_map(|line| match line {
        SourceLine::Label(l) => Some(l.name.as_str()),
        SourceLine::Declaration { label: Some(l), .. } => Some(l.name.as_str()),
        _ => None,
    })
}

/// Verifies the program has an entry point, the way an assembler checks
/// for `main` before handing the program to the interpreter.
pub fn check_main_label(lines: &[SourceLine]) -> AssembleResult<()> {
    if declared_labels(lines).any(|name| name == "main") {
        Ok(())
    } else {
        Err(AssembleError::NoMainLabel)
    }
}

fn parse_declaration(directive: &str, rest: &[Token]) -> AssembleResult<Declaration> {
    let operands = split_operands(rest)?;
    match directive {
        ".ascii" => {
            let s = match operands.first() {
                Some(Operand::Str(s)) => s.clone(),
                _ => return Err(AssembleError::Syntax { message: ".ascii requires a string literal".into() }),
            };
            Ok(Declaration::Ascii { data: s })
        }
        ".asciiz" => {
            let s = match operands.first() {
                Some(Operand::Str(s)) => s.clone(),
                _ => return Err(AssembleError::Syntax { message: ".asciiz requires a string literal".into() }),
            };
            Ok(Declaration::Asciiz { data: s })
        }
        ".byte" => Ok(Declaration::Byte { data: operands.iter().map(as_imm).collect::<AssembleResult<_>>()? }),
        ".word" => Ok(Declaration::Word { data: operands.iter().map(as_imm).collect::<AssembleResult<_>>()? }),
        ".half" => Ok(Declaration::Half { data: operands.iter().map(as_imm).collect::<AssembleResult<_>>()? }),
        ".float" => Ok(Declaration::Float {
            data: operands
                .iter()
                .map(|o| match o {
                    Operand::Float(f) => Ok(*f as f32),
                    Operand::Imm(v) => Ok(*v as f32),
                    _ => Err(AssembleError::Syntax { message: ".float requires a numeric literal".into() }),
                })
                .collect::<AssembleResult<_>>()?,
        }),
        ".double" => Ok(Declaration::Double {
            data: operands
                .iter()
                .map(|o| match o {
                    Operand::Float(f) => Ok(*f),
                    Operand::Imm(v) => Ok(*v as f64),
                    _ => Err(AssembleError::Syntax { message: ".double requires a numeric literal".into() }),
                })
                .collect::<AssembleResult<_>>()?,
        }),
        ".space" => Ok(Declaration::Space {
            data: operands
                .iter()
                .map(|o| as_imm(o).map(|v| v as u32))
                .collect::<AssembleResult<_>>()?,
        }),
        ".align" => {
            let bits = operands.first().map(as_imm).transpose()?.unwrap_or(0);
            if !(0..=3).contains(&bits) {
                return Err(AssembleError::InvalidImmediate { message: "value for .align is invalid".into() });
            }
            Ok(Declaration::Align { bits: bits as u32 })
        }
        other => Err(AssembleError::Syntax { message: format!("unknown directive {}", other) }),
    }
}

fn basic(kind: InstrKind, tag: FileTag, text: &str) -> Instr {
    Instr::new(kind, tag, text.to_string())
}

fn pseudo(op: &str, instrs: Vec<Instr>, label: Option<String>, tag: FileTag, text: &str) -> Instr {
    let mut i = Instr::new(InstrKind::PseudoInstr { op: op.to_string(), instrs, label }, tag, text.to_string());
    i.is_from_pseudoinstr = true;
    i
}

fn parse_instruction(tokens: &[Token], tag: FileTag) -> AssembleResult<Instr> {
    let mnemonic = match &tokens[0] {
        Token::Word(w) => w.clone(),
        other => return Err(AssembleError::Syntax { message: format!("expected a mnemonic, got {:?}", other) }),
    };
    let text = mnemonic.clone();
    let ops = split_operands(&tokens[1..])?;

    macro_rules! r3 {
        () => {{
            InstrKind::R3 { op: mnemonic.clone(), rd: as_reg(&ops[0])?, rs: as_reg(&ops[1])?, rt: as_reg(&ops[2])? }
        }};
    }
    macro_rules! itype {
        () => {{
            InstrKind::I { op: mnemonic.clone(), rt: as_reg(&ops[0])?, rs: as_reg(&ops[1])?, imm: as_imm(&ops[2])? }
        }};
    }

    let kind = match mnemonic.as_str() {
        "add" | "addu" | "sub" | "subu" | "and" | "or" | "xor" | "nor" | "slt" | "sltu" | "sllv" | "srlv" | "srav"
        | "movn" | "movz" => r3!(),

        "sll" | "srl" | "sra" => {
            InstrKind::R2 { op: mnemonic.clone(), r1: as_reg(&ops[0])?, r2: as_reg(&ops[1])?, shamt: Some(as_imm(&ops[2])? as u32) }
        }

        "mult" | "multu" | "div" | "divu" | "madd" | "maddu" | "msub" | "msubu" => {
            InstrKind::R2 { op: mnemonic.clone(), r1: as_reg(&ops[0])?, r2: as_reg(&ops[1])?, shamt: None }
        }

        "addi" | "addiu" | "andi" | "ori" | "xori" | "slti" | "sltiu" => itype!(),

        "lui" => InstrKind::LoadImm { reg: as_reg(&ops[0])?, imm: as_imm(&ops[1])? },

        "mfhi" | "mflo" | "mthi" | "mtlo" => InstrKind::Move { op: mnemonic.clone(), reg: as_reg(&ops[0])? },

        "mfc1" => InstrKind::MoveFloat { op: mnemonic.clone(), greg: as_reg(&ops[0])?, freg: crate::ir::FReg(as_freg(&ops[1])?) },
        "mtc1" => InstrKind::MoveFloat { op: mnemonic.clone(), greg: as_reg(&ops[0])?, freg: crate::ir::FReg(as_freg(&ops[1])?) },

        "lw" | "lh" | "lhu" | "lb" | "lbu" | "lwl" | "lwr" | "sw" | "sh" | "sb" | "swl" | "swr" | "l.s" | "l.d"
        | "s.s" | "s.d" => {
            let reg = match mnemonic.as_str() {
                "l.s" | "l.d" | "s.s" | "s.d" => Reg(as_freg(&ops[0])?),
                _ => as_reg(&ops[0])?,
            };
            match &ops[1] {
                Operand::MemRef { imm, base } => {
                    InstrKind::LoadMem { op: mnemonic.clone(), reg, base: *base, imm: *imm as i32 }
                }
                Operand::Label(label) => {
                    return Ok(pseudo(
                        &mnemonic,
                        vec![
                            basic(InstrKind::LoadImm { reg: AT, imm: 0 }, tag.clone(), "lui $at, 0"),
                            basic(InstrKind::LoadMem { op: mnemonic.clone(), reg, base: AT, imm: 0 }, tag.clone(), &text),
                        ],
                        Some(label.clone()),
                        tag,
                        &text,
                    ));
                }
                _ => return Err(AssembleError::Syntax { message: "expected imm(reg) or a label".into() }),
            }
        }

        "j" | "jal" => {
            let label = as_label(&ops[0])?;
            InstrKind::J { op: mnemonic.clone(), target: JumpTarget::Label(label), link: if mnemonic == "jal" { Some(Reg(31)) } else { None } }
        }
        "jr" | "jalr" => {
            let r = as_reg(&ops[0])?;
            InstrKind::J { op: mnemonic.clone(), target: JumpTarget::Register(r), link: if mnemonic == "jalr" { Some(Reg(31)) } else { None } }
        }

        "beq" | "bne" => InstrKind::Branch { op: mnemonic.clone(), rs: as_reg(&ops[0])?, rt: as_reg(&ops[1])?, label: as_label(&ops[2])? },
        "blez" | "bgtz" | "bltz" | "bgez" | "blezal" | "bgtzal" | "bltzal" | "bgezal" => {
            InstrKind::Branch { op: mnemonic.clone(), rs: as_reg(&ops[0])?, rt: ZERO, label: as_label(&ops[1])? }
        }

        "add.s" | "add.d" | "sub.s" | "sub.d" | "mul.s" | "mul.d" | "div.s" | "div.d" => {
            let fmt = mnemonic.chars().last().unwrap();
            InstrKind::FloatOp {
                op: mnemonic[..mnemonic.len() - 2].to_string(),
                fmt,
                fd: crate::ir::FReg(as_freg(&ops[0])?),
                fs: crate::ir::FReg(as_freg(&ops[1])?),
                ft: Some(crate::ir::FReg(as_freg(&ops[2])?)),
            }
        }
        "abs.s" | "abs.d" | "neg.s" | "neg.d" | "sqrt.s" | "sqrt.d" | "mov.s" | "mov.d" => {
            let fmt = mnemonic.chars().last().unwrap();
            InstrKind::FloatOp {
                op: mnemonic[..mnemonic.len() - 2].to_string(),
                fmt,
                fd: crate::ir::FReg(as_freg(&ops[0])?),
                fs: crate::ir::FReg(as_freg(&ops[1])?),
                ft: None,
            }
        }

        "c.eq.s" | "c.eq.d" | "c.le.s" | "c.le.d" | "c.lt.s" | "c.lt.d" => {
            let fmt = mnemonic.chars().last().unwrap();
            let (flag, fs_op, ft_op) = if ops.len() == 3 {
                (as_imm(&ops[0])? as u8, &ops[1], &ops[2])
            } else {
                (0u8, &ops[0], &ops[1])
            };
            InstrKind::Compare {
                op: mnemonic[..mnemonic.len() - 2].to_string(),
                fmt,
                fs: crate::ir::FReg(as_freg(fs_op)?),
                ft: crate::ir::FReg(as_freg(ft_op)?),
                flag,
            }
        }

        "bc1t" | "bc1f" => {
            let (flag, label) = if ops.len() == 2 { (as_imm(&ops[0])? as u8, as_label(&ops[1])?) } else { (0u8, as_label(&ops[0])?) };
            InstrKind::BranchFloat { taken_on: mnemonic == "bc1t", flag, label }
        }

        "cvt.w.s" | "cvt.w.d" | "cvt.s.w" | "cvt.s.d" | "cvt.d.w" | "cvt.d.s" => {
            let parts: Vec<char> = mnemonic.split('.').nth(1).unwrap().chars().chain(mnemonic.split('.').nth(2).unwrap().chars()).collect();
            InstrKind::Convert {
                to_fmt: parts[0],
                from_fmt: parts[1],
                src: crate::ir::FReg(as_freg(&ops[1])?),
                dst: crate::ir::FReg(as_freg(&ops[0])?),
            }
        }

        "movn.s" | "movn.d" | "movz.s" | "movz.d" | "movt.s" | "movt.d" | "movf.s" | "movf.d" => {
            let fmt = mnemonic.chars().last().unwrap();
            InstrKind::MoveCond {
                op: mnemonic[..mnemonic.len() - 2].to_string(),
                fmt: Some(fmt),
                dest: Reg(as_freg(&ops[0])?),
                src: Reg(as_freg(&ops[1])?),
                cond: as_reg(&ops[2]).unwrap_or(ZERO),
            }
        }

        "syscall" => InstrKind::Syscall,
        "nop" => InstrKind::Nop,
        "break" => InstrKind::Break { code: ops.first().map(as_imm).transpose()?.unwrap_or(0) as u32 },

        // -- pseudo-ops --------------------------------------------------
        "move" => {
            return Ok(pseudo(
                &mnemonic,
                vec![basic(InstrKind::R3 { op: "addu".into(), rd: as_reg(&ops[0])?, rs: ZERO, rt: as_reg(&ops[1])? }, tag.clone(), &text)],
                None,
                tag,
                &text,
            ))
        }
        "neg" => {
            return Ok(pseudo(
                &mnemonic,
                vec![basic(InstrKind::R3 { op: "sub".into(), rd: as_reg(&ops[0])?, rs: ZERO, rt: as_reg(&ops[1])? }, tag.clone(), &text)],
                None,
                tag,
                &text,
            ))
        }
        "not" => {
            return Ok(pseudo(
                &mnemonic,
                vec![basic(InstrKind::R3 { op: "nor".into(), rd: as_reg(&ops[0])?, rs: as_reg(&ops[1])?, rt: ZERO }, tag.clone(), &text)],
                None,
                tag,
                &text,
            ))
        }
        "abs" => {
            let rd = as_reg(&ops[0])?;
            let rs = as_reg(&ops[1])?;
            return Ok(pseudo(
                &mnemonic,
                vec![
                    basic(InstrKind::R2 { op: "sra".into(), r1: AT, r2: rs, shamt: Some(31) }, tag.clone(), &text),
                    basic(InstrKind::R3 { op: "xor".into(), rd, rs: AT, rt: rs }, tag.clone(), &text),
                    basic(InstrKind::R3 { op: "subu".into(), rd, rs: rd, rt: AT }, tag.clone(), &text),
                ],
                None,
                tag,
                &text,
            ))
        }
        "li" => {
            let rd = as_reg(&ops[0])?;
            let imm = as_imm(&ops[1])?;
            let instrs = if (0..0x10000).contains(&imm) {
                vec![basic(InstrKind::I { op: "ori".into(), rt: rd, rs: ZERO, imm }, tag.clone(), &text)]
            } else {
                let hi = ((imm as u32) >> 16) & 0xFFFF;
                let lo = (imm as u32) & 0xFFFF;
                vec![
                    basic(InstrKind::LoadImm { reg: AT, imm: hi as i32 }, tag.clone(), &text),
                    basic(InstrKind::I { op: "ori".into(), rt: rd, rs: AT, imm: lo as i32 }, tag.clone(), &text),
                ]
            };
            return Ok(pseudo(&mnemonic, instrs, None, tag, &text));
        }
        "la" => {
            let rd = as_reg(&ops[0])?;
            let label = as_label(&ops[1])?;
            return Ok(pseudo(
                &mnemonic,
                vec![
                    basic(InstrKind::LoadImm { reg: AT, imm: 0 }, tag.clone(), &text),
                    basic(InstrKind::I { op: "ori".into(), rt: rd, rs: AT, imm: 0 }, tag.clone(), &text),
                ],
                Some(label),
                tag,
                &text,
            ));
        }
        "seq" | "sne" | "sge" | "sgeu" | "sgt" | "sgtu" | "sle" | "sleu" => {
            return expand_set_compare(&mnemonic, &ops, tag, &text);
        }
        "rol" | "ror" => {
            let rd = as_reg(&ops[0])?;
            let rs = as_reg(&ops[1])?;
            let imm = as_imm(&ops[2])? as u32 & 31;
            let (left, right) = if mnemonic == "rol" { (imm, 32 - imm) } else { (32 - imm, imm) };
            return Ok(pseudo(
                &mnemonic,
                vec![
                    basic(InstrKind::R2 { op: "sll".into(), r1: AT, r2: rs, shamt: Some(left) }, tag.clone(), &text),
                    basic(InstrKind::R2 { op: "srl".into(), r1: rd, r2: rs, shamt: Some(right) }, tag.clone(), &text),
                    basic(InstrKind::R3 { op: "or".into(), rd, rs: rd, rt: AT }, tag.clone(), &text),
                ],
                None,
                tag,
                &text,
            ));
        }
        "rolv" | "rorv" => {
            let rd = as_reg(&ops[0])?;
            let rs = as_reg(&ops[1])?;
            let rt = as_reg(&ops[2])?;
            let (left_op, right_op) = if mnemonic == "rolv" { ("sllv", "srlv") } else { ("srlv", "sllv") };
            return Ok(pseudo(
                &mnemonic,
                vec![
                    basic(InstrKind::R3 { op: "subu".into(), rd: AT, rs: ZERO, rt }, tag.clone(), &text),
                    basic(InstrKind::R3 { op: left_op.into(), rd: AT, rs, rt: AT }, tag.clone(), &text),
                    basic(InstrKind::R3 { op: right_op.into(), rd, rs, rt }, tag.clone(), &text),
                    basic(InstrKind::R3 { op: "or".into(), rd, rs: rd, rt: AT }, tag.clone(), &text),
                ],
                None,
                tag,
                &text,
            ));
        }
        "beqz" | "bnez" => {
            let rs = as_reg(&ops[0])?;
            let label = as_label(&ops[1])?;
            let basic_op = if mnemonic == "beqz" { "beq" } else { "bne" };
            return Ok(pseudo(
                &mnemonic,
                vec![basic(InstrKind::Branch { op: basic_op.into(), rs, rt: ZERO, label }, tag.clone(), &text)],
                None,
                tag,
                &text,
            ));
        }
        "bge" | "bgeu" | "bgt" | "bgtu" | "ble" | "bleu" | "blt" | "bltu" => {
            return expand_pseudo_branch(&mnemonic, &ops, tag, &text);
        }
        "b" => {
            let label = as_label(&ops[0])?;
            return Ok(pseudo(&mnemonic, vec![basic(InstrKind::Branch { op: "beq".into(), rs: ZERO, rt: ZERO, label }, tag.clone(), &text)], None, tag, &text));
        }

        other => return Err(AssembleError::Syntax { message: format!("unknown mnemonic {}", other) }),
    };

    Ok(basic(kind, tag, &text))
}

/// `seq/sne/sge/sgeu/sgt/sgtu/sle/sleu rd, rs, rt`.
fn expand_set_compare(op: &str, ops: &[Operand], tag: FileTag, text: &str) -> AssembleResult<Instr> {
    let rd = as_reg(&ops[0])?;
    let rs = as_reg(&ops[1])?;
    let rt = as_reg(&ops[2])?;

    let instrs = match op {
        "seq" => vec![
            basic(InstrKind::R3 { op: "subu".into(), rd, rs, rt }, tag.clone(), text),
            basic(InstrKind::I { op: "sltiu".into(), rt: rd, rs: rd, imm: 1 }, tag.clone(), text),
        ],
        "sne" => vec![
            basic(InstrKind::R3 { op: "subu".into(), rd, rs, rt }, tag.clone(), text),
            basic(InstrKind::R3 { op: "sltu".into(), rd, rs: ZERO, rt: rd }, tag.clone(), text),
        ],
        "sge" => vec![
            basic(InstrKind::R3 { op: "slt".into(), rd, rs, rt }, tag.clone(), text),
            basic(InstrKind::I { op: "xori".into(), rt: rd, rs: rd, imm: 1 }, tag.clone(), text),
        ],
        "sgeu" => vec![
            basic(InstrKind::R3 { op: "sltu".into(), rd, rs, rt }, tag.clone(), text),
            basic(InstrKind::I { op: "xori".into(), rt: rd, rs: rd, imm: 1 }, tag.clone(), text),
        ],
        "sgt" => vec![basic(InstrKind::R3 { op: "slt".into(), rd, rs: rt, rt: rs }, tag.clone(), text)],
        "sgtu" => vec![basic(InstrKind::R3 { op: "sltu".into(), rd, rs: rt, rt: rs }, tag.clone(), text)],
        "sle" => vec![
            basic(InstrKind::R3 { op: "slt".into(), rd, rs: rt, rt: rs }, tag.clone(), text),
            basic(InstrKind::I { op: "xori".into(), rt: rd, rs: rd, imm: 1 }, tag.clone(), text),
        ],
        "sleu" => vec![
            basic(InstrKind::R3 { op: "sltu".into(), rd, rs: rt, rt: rs }, tag.clone(), text),
            basic(InstrKind::I { op: "xori".into(), rt: rd, rs: rd, imm: 1 }, tag.clone(), text),
        ],
        _ => unreachable!(),
    };

    Ok(pseudo(op, instrs, None, tag, text))
}

/// `bge/bgt/ble/blt[u] rs, rt, label`: `slt[u] $at, ..., ...` then
/// `beq/bne $at, $0, label`, with operand order swapped for the
/// "greater"/"less" sense.
fn expand_pseudo_branch(op: &str, ops: &[Operand], tag: FileTag, text: &str) -> AssembleResult<Instr> {
    let rs = as_reg(&ops[0])?;
    let rt = as_reg(&ops[1])?;
    let label = as_label(&ops[2])?;

    let unsigned = op.ends_with('u');
    let base = if unsigned { &op[..op.len() - 1] } else { op };
    let slt_op = if unsigned { "sltu" } else { "slt" };

    let (slt_rs, slt_rt, branch_op) = match base {
        "bge" => (rs, rt, "beq"),
        "ble" => (rt, rs, "beq"),
        "bgt" => (rt, rs, "bne"),
        "blt" => (rs, rt, "bne"),
        _ => unreachable!(),
    };

    let instrs = vec![
        basic(InstrKind::R3 { op: slt_op.into(), rd: AT, rs: slt_rs, rt: slt_rt }, tag.clone(), text),
        basic(InstrKind::Branch { op: branch_op.into(), rs: AT, rt: ZERO, label }, tag.clone(), text),
    ];

    Ok(pseudo(op, instrs, None, tag, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_label_and_basic_instruction_on_one_line() {
        let src = format!("main: add $t0, $t1, $t2 {} \"t.asm\" 1", lexer::FILE_MARKER);
        let lines = parse(&src).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(matches!(&lines[0], SourceLine::Label(Label { name, .. }) if name == "main"));
        assert!(matches!(lines[1], SourceLine::Instr(_)));
    }

    #[test]
    fn li_below_16_bits_expands_to_a_single_ori() {
        let src = format!("li $t0, 300 {} \"t.asm\" 1", lexer::FILE_MARKER);
        let lines = parse(&src).unwrap();
        match &lines[0] {
            SourceLine::Instr(i) => match &i.kind {
                InstrKind::PseudoInstr { instrs, .. } => assert_eq!(instrs.len(), 1),
                _ => panic!("expected PseudoInstr"),
            },
            _ => panic!("expected Instr"),
        }
    }

    #[test]
    fn li_above_16_bits_expands_to_lui_ori_pair() {
        let src = format!("li $t0, 3000000 {} \"t.asm\" 1", lexer::FILE_MARKER);
        let lines = parse(&src).unwrap();
        match &lines[0] {
            SourceLine::Instr(i) => match &i.kind {
                InstrKind::PseudoInstr { instrs, .. } => assert_eq!(instrs.len(), 2),
                _ => panic!("expected PseudoInstr"),
            },
            _ => panic!("expected Instr"),
        }
    }

    #[test]
    fn la_carries_the_target_label_for_back_patching() {
        let src = format!("la $t0, buf {} \"t.asm\" 1", lexer::FILE_MARKER);
        let lines = parse(&src).unwrap();
        match &lines[0] {
            SourceLine::Instr(i) => match &i.kind {
                InstrKind::PseudoInstr { label, .. } => assert_eq!(label.as_deref(), Some("buf")),
                _ => panic!("expected PseudoInstr"),
            },
            _ => panic!("expected Instr"),
        }
    }
}
