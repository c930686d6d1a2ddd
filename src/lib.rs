//! A 64-bit-register, 32-bit-address sandboxed interpreter for JAM-style
//! work-package execution: blob decoder, page-granular permissioned memory,
//! fetch-decode-execute core, host-call layer and one level of inner-machine
//! nesting.
//!
//! Structure mirrors the teacher's module boundaries (`config`, `codec`,
//! memory/register state, host calls) generalized from a NAPI/WASM-embedder
//! surface to a plain Rust library: the embedder seam is the [`host::HostCalls`]
//! trait rather than `#[napi]` functions over global mutable state.

pub mod codec;
pub mod config;
pub mod error;
pub mod host;
pub mod inner;
pub mod interp;
pub mod memory;
pub mod program;
pub mod pvm;
pub mod state;

pub use error::{DecodeError, HostMemoryError};
pub use host::{HostCalls, HostContext, RefineState, Sentinel};
pub use memory::{Access, MemResult, Memory, NullMemory, PagedMemory};
pub use program::LoadedProgram;
pub use pvm::{decode_program, invoke, EntryPoint, InvocationResult};
pub use state::{ExecutionState, Status};
