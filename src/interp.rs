//! Interpreter core (§4.D): fetch-decode-execute dispatch plus the pure
//! per-class opcode semantics it dispatches into.

pub mod arith;
pub mod bitwise;
pub mod branch;
pub mod dispatch;
pub mod loadstore;
pub mod operand;
pub mod shift;
