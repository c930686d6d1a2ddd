//! Error types for program-blob decoding and host-call memory violations.
//!
//! Per-instruction control flow (Halt/Panic/Fault/OutOfGas/HostYield) is not
//! modeled as `Result` — it is the `Status` enum in [`crate::state`], matched
//! the way the teacher's `next_step_impl` matches `RESULT_CODE_*`. These types
//! cover the setup-time and host-call-argument paths instead.

use thiserror::Error;

/// Failure decoding a program blob (§4.A). The host treats any of these as Panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("blob truncated while reading {field}")]
    Truncated { field: &'static str },

    #[error("declared length of {field} ({declared}) exceeds remaining bytes ({remaining})")]
    LengthExceedsRemaining {
        field: &'static str,
        declared: usize,
        remaining: usize,
    },

    #[error("jump table entry {index} references offset {offset} whose mask bit is not set")]
    JumpTableTargetNotOpcode { index: usize, offset: u32 },

    #[error("varint prefix byte {0:#04x} does not resolve to a valid payload width")]
    InvalidVarintPrefix(u8),

    #[error("varint payload truncated: need {needed} more bytes, {available} available")]
    VarintTruncated { needed: usize, available: usize },
}

/// A host-call argument could not be read from or written to guest memory.
/// Per §4.E/§7 this always escalates the whole invocation to Panic; it is
/// never reported as a sentinel in r7.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HostMemoryError {
    #[error("host call argument at {addr:#x} (len {len}) is not readable")]
    NotReadable { addr: u32, len: u32 },
    #[error("host call argument at {addr:#x} (len {len}) is not writable")]
    NotWritable { addr: u32, len: u32 },
}
