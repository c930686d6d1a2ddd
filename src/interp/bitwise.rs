//! Bitwise ALU ops and the comparison/conditional-move family. Grounded in
//! the teacher's `instructions/bitwise.rs`, `comparison.rs`, `conditional.rs`,
//! `advanced_bitwise.rs`.

pub fn and(a: u64, b: u64) -> u64 {
    a & b
}

pub fn or(a: u64, b: u64) -> u64 {
    a | b
}

pub fn xor(a: u64, b: u64) -> u64 {
    a ^ b
}

pub fn and_inv(a: u64, b: u64) -> u64 {
    a & !b
}

pub fn or_inv(a: u64, b: u64) -> u64 {
    a | !b
}

pub fn xnor(a: u64, b: u64) -> u64 {
    !(a ^ b)
}

pub fn set_lt_u(a: u64, b: u64) -> u64 {
    u64::from(a < b)
}

pub fn set_lt_s(a: u64, b: u64) -> u64 {
    u64::from((a as i64) < (b as i64))
}

pub fn set_gt_u(a: u64, b: u64) -> u64 {
    u64::from(a > b)
}

pub fn set_gt_s(a: u64, b: u64) -> u64 {
    u64::from((a as i64) > (b as i64))
}

/// `cmov_iz rd, ra, rb`: move `ra` into `rd` if `rb == 0`. Returns the new `rd` value.
pub fn cmov_iz(rd: u64, ra: u64, rb: u64) -> u64 {
    if rb == 0 { ra } else { rd }
}

/// `cmov_nz rd, ra, rb`: move `ra` into `rd` if `rb != 0`.
pub fn cmov_nz(rd: u64, ra: u64, rb: u64) -> u64 {
    if rb != 0 { ra } else { rd }
}
