//! Shifts and rotates, both widths. `_alt` variants (from the spec's
//! `op_imm_alt` forms) swap which operand supplies the shift amount; callers
//! pass already-resolved `(value, shift_amount)` pairs so this module stays
//! width-generic. Grounded in the teacher's `shifts*.rs`/`rotations*.rs` family.

use crate::interp::arith::Width;
use crate::interp::operand::sign_extend;

fn bits(width: Width) -> u32 {
    match width {
        Width::W32 => 32,
        Width::W64 => 64,
    }
}

fn truncate(value: u64, width: Width) -> u64 {
    match width {
        Width::W32 => value & 0xffff_ffff,
        Width::W64 => value,
    }
}

fn finish(value: u64, width: Width) -> u64 {
    match width {
        Width::W32 => sign_extend(value & 0xffff_ffff, 4),
        Width::W64 => value,
    }
}

/// Logical shift left.
pub fn shlo_l(value: u64, shift: u64, width: Width) -> u64 {
    let s = (shift % u64::from(bits(width))) as u32;
    finish(truncate(value, width).wrapping_shl(s), width)
}

/// Logical shift right.
pub fn shlo_r(value: u64, shift: u64, width: Width) -> u64 {
    let s = (shift % u64::from(bits(width))) as u32;
    finish(truncate(value, width).wrapping_shr(s), width)
}

/// Arithmetic (sign-preserving) shift right.
pub fn shar_r(value: u64, shift: u64, width: Width) -> u64 {
    let s = (shift % u64::from(bits(width))) as u32;
    match width {
        Width::W32 => finish((((value as u32) as i32) >> s) as u32 as u64, width),
        Width::W64 => ((value as i64) >> s) as u64,
    }
}

pub fn rot_l(value: u64, shift: u64, width: Width) -> u64 {
    let n = bits(width);
    let s = (shift % u64::from(n)) as u32;
    match width {
        Width::W32 => finish((value as u32).rotate_left(s) as u64, width),
        Width::W64 => value.rotate_left(s),
    }
}

pub fn rot_r(value: u64, shift: u64, width: Width) -> u64 {
    let n = bits(width);
    let s = (shift % u64::from(n)) as u32;
    match width {
        Width::W32 => finish((value as u32).rotate_right(s) as u64, width),
        Width::W64 => value.rotate_right(s),
    }
}
