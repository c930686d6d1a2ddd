//! Branch condition predicates. Pure comparisons; `dispatch` resolves operands
//! and the target address, this module only decides taken/not-taken.

#[derive(Clone, Copy, Debug)]
pub enum Cond {
    Eq,
    Ne,
    LtU,
    LeU,
    GeU,
    GtU,
    LtS,
    LeS,
    GeS,
    GtS,
}

pub fn taken(cond: Cond, a: u64, b: u64) -> bool {
    match cond {
        Cond::Eq => a == b,
        Cond::Ne => a != b,
        Cond::LtU => a < b,
        Cond::LeU => a <= b,
        Cond::GeU => a >= b,
        Cond::GtU => a > b,
        Cond::LtS => (a as i64) < (b as i64),
        Cond::LeS => (a as i64) <= (b as i64),
        Cond::GeS => (a as i64) >= (b as i64),
        Cond::GtS => (a as i64) > (b as i64),
    }
}
