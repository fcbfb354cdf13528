//! Pure arithmetic/logic semantics for every basic opcode.
//!
//! Kept free of register-file and memory access so each operation can be
//! unit tested in isolation; [`crate::interpreter`] wires these into the
//! fetch/decode/execute loop.

use crate::error::{ExecError, ExecResult};
use crate::numerics::{checked_add, checked_sub, wrap32};

/// `add/sub/and/or/xor/nor/slt/sltu/sllv/srlv/srav`.
pub fn r3(op: &str, rs: i32, rt: i32) -> ExecResult<i32> {
    Ok(match op {
        "add" => checked_add(rs, rt).ok_or(ExecError::ArithmeticOverflow)?,
        "addu" => wrap32(rs as i64 + rt as i64),
        "sub" => checked_sub(rs, rt).ok_or(ExecError::ArithmeticOverflow)?,
        "subu" => wrap32(rs as i64 - rt as i64),
        "and" => rs & rt,
        "or" => rs | rt,
        "xor" => rs ^ rt,
        "nor" => !(rs | rt),
        "slt" => (rs < rt) as i32,
        "sltu" => ((rs as u32) < (rt as u32)) as i32,
        "sllv" => ((rs as u32) << (rt as u32 & 31)) as i32,
        "srlv" => ((rs as u32) >> (rt as u32 & 31)) as i32,
        "srav" => rs >> (rt as u32 & 31),
        other => return Err(ExecError::InvalidRegister { name: format!("unhandled r3 op {}", other) }),
    })
}

/// `addi/addiu/andi/ori/xori/slti/sltiu`.
pub fn itype(op: &str, rs: i32, imm: i32) -> ExecResult<i32> {
    Ok(match op {
        "addi" => checked_add(rs, imm).ok_or(ExecError::ArithmeticOverflow)?,
        "addiu" => wrap32(rs as i64 + imm as i64),
        "andi" => rs & (imm & 0xFFFF),
        "ori" => rs | (imm & 0xFFFF),
        "xori" => rs ^ (imm & 0xFFFF),
        "slti" => (rs < imm) as i32,
        "sltiu" => ((rs as u32) < (imm as u32)) as i32,
        other => return Err(ExecError::InvalidRegister { name: format!("unhandled itype op {}", other) }),
    })
}

/// `sll/srl/sra rd, rt, shamt`.
pub fn shift(op: &str, value: i32, shamt: u32) -> i32 {
    let shamt = shamt & 31;
    match op {
        "sll" => ((value as u32) << shamt) as i32,
        "srl" => ((value as u32) >> shamt) as i32,
        "sra" => value >> shamt,
        _ => value,
    }
}

/// `mult/multu`: returns `(hi, lo)`. The signedness convention is resolved
/// by the mnemonic's own spelling: the short, unsuffixed form is signed.
pub fn mult(op: &str, r1: i32, r2: i32) -> (i32, i32) {
    let signed = !op.ends_with('u');
    let product: i64 = if signed { (r1 as i64) * (r2 as i64) } else { (r1 as u32 as i64) * (r2 as u32 as i64) };
    (((product >> 32) as i32), (product as i32))
}

/// `madd/maddu`/`msub/msubu`: accumulates into the existing `(hi, lo)` pair.
pub fn madd(op: &str, r1: i32, r2: i32, hi: i32, lo: i32) -> (i32, i32) {
    let signed = !op.ends_with('u');
    let acc: i64 = ((hi as i64) << 32) | (lo as u32 as i64);
    let product: i64 = if signed { (r1 as i64) * (r2 as i64) } else { (r1 as u32 as i64) * (r2 as u32 as i64) };
    let result = if op.starts_with("madd") { acc.wrapping_add(product) } else { acc.wrapping_sub(product) };
    (((result >> 32) as i32), (result as i32))
}

/// `div/divu`: returns `(hi = remainder, lo = quotient)`.
pub fn div(op: &str, r1: i32, r2: i32) -> ExecResult<(i32, i32)> {
    if r2 == 0 {
        return Err(ExecError::DivisionByZero);
    }
    let signed = !op.ends_with('u');
    if signed {
        Ok((r1.wrapping_rem(r2), r1.wrapping_div(r2)))
    } else {
        let (a, b) = (r1 as u32, r2 as u32);
        Ok(((a % b) as i32, (a / b) as i32))
    }
}

/// `lwl rt, offset(base)`: merges the high-order bytes of the word at the
/// (possibly misaligned) address into `rt`'s low-order bytes, little-endian
/// host semantics — i.e. the classic MIPS I `lwl`/`lwr` pairing where `lwl`
/// supplies the most-significant bytes and `lwr` the least-significant.
pub fn lwl(rt: i32, mem_word: u32, byte_offset: u32) -> i32 {
    let shift = 24 - 8 * (byte_offset & 3);
    let mask = if shift == 0 { 0 } else { !0u32 >> (32 - shift) };
    (((rt as u32) & mask) | (mem_word << shift)) as i32
}

pub fn lwr(rt: i32, mem_word: u32, byte_offset: u32) -> i32 {
    let shift = 8 * (byte_offset & 3);
    let mask = if shift == 0 { 0 } else { !0u32 << (32 - shift) };
    (((rt as u32) & mask) | (mem_word >> shift)) as i32
}

/// Returns the merged word to be written back to memory for `swl`.
pub fn swl(rt: i32, mem_word: u32, byte_offset: u32) -> u32 {
    let shift = 24 - 8 * (byte_offset & 3);
    let mask = if shift == 0 { !0u32 } else { !(!0u32 >> (32 - shift)) };
    (mem_word & mask) | ((rt as u32) >> shift)
}

pub fn swr(rt: i32, mem_word: u32, byte_offset: u32) -> u32 {
    let shift = 8 * (byte_offset & 3);
    let mask = if shift == 0 { !0u32 } else { !(!0u32 << (32 - shift)) };
    (mem_word & mask) | ((rt as u32) << shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_overflow_is_reported_add_unsigned_wraps() {
        assert!(r3("add", i32::MAX, 1).is_err());
        assert_eq!(r3("addu", i32::MAX, 1).unwrap(), i32::MIN);
    }

    #[test]
    fn mult_signedness_follows_mnemonic_suffix() {
        let (hi, lo) = mult("mult", -1, 1);
        assert_eq!((hi, lo), (-1, -1));
        let (hi, lo) = mult("multu", -1, 1);
        assert_eq!(hi, 0);
        assert_eq!(lo as u32, u32::MAX);
    }

    #[test]
    fn div_by_zero_is_an_error() {
        assert!(div("div", 10, 0).is_err());
    }

    #[test]
    fn div_rounds_toward_zero_like_mips() {
        let (rem, quot) = div("div", -7, 2).unwrap();
        assert_eq!(quot, -3);
        assert_eq!(rem, -1);
    }

    #[test]
    fn lwl_and_lwr_reconstruct_an_unaligned_word() {
        let mem = 0x1122_3344u32;
        let reg = 0u32 as i32;
        let merged_high = lwl(reg, mem, 0);
        let merged = lwr(merged_high, mem, 0);
        assert_eq!(merged as u32, mem);
    }
}
