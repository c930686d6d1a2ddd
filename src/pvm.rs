//! Top-level invocation entry point (§6 External Interfaces): wires the
//! decoder, memory subsystem, register/status state and interpreter core
//! into the single `invoke` call a host embeds. Suspension at `ecalli`
//! (§5) is handled here by driving [`crate::host::dispatch`] and resuming
//! the fetch loop, matching the "host either resumes... or re-raises
//! another terminal state" contract of §4.D's state machine.
//!
//! Grounded in the teacher's `state_wrapper.rs` (`run_blob_impl`,
//! `next_step_impl` driven to completion) and `lib.rs`'s NAPI `run_program`/
//! `get_result`, generalized from global mutable state mirrored through NAPI
//! getters to an explicit value returned to the caller.

use crate::config;
use crate::error::DecodeError;
use crate::host::{self, HostCalls, HostContext, RefineState};
use crate::memory::{MemResult, Memory, PagedMemory};
use crate::program::LoadedProgram;
use crate::state::{ExecutionState, Status};

/// The four hardcoded entry offsets a work-package invocation may start at
/// (§6): `IsAuthorized`/`Accumulate`/`Refine`/`OnTransfer` at code offsets
/// 0/5/10/15 respectively, each running under its matching host-call context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryPoint {
    IsAuthorized,
    Accumulate,
    Refine,
    OnTransfer,
}

impl EntryPoint {
    pub fn code_offset(self) -> u32 {
        match self {
            EntryPoint::IsAuthorized => 0,
            EntryPoint::Accumulate => 5,
            EntryPoint::Refine => 10,
            EntryPoint::OnTransfer => 15,
        }
    }

    pub fn context(self) -> HostContext {
        match self {
            EntryPoint::IsAuthorized => HostContext::IsAuthorized,
            EntryPoint::Accumulate => HostContext::Accumulate,
            EntryPoint::Refine => HostContext::Refine,
            EntryPoint::OnTransfer => HostContext::OnTransfer,
        }
    }
}

/// The result of running an invocation to completion (§6 "Invocation
/// result"): terminal status, gas consumed, extracted output and the
/// Refine exports list. Output and exports are empty on any non-Halt status.
#[derive(Debug)]
pub struct InvocationResult {
    pub status: Status,
    pub gas_used: u64,
    pub output: Vec<u8>,
    pub exports: Vec<Vec<u8>>,
    /// Set only when `status == Status::Fault`, for host diagnostics.
    pub fault_address: Option<u32>,
}

/// Decode `program_blob`, lay out memory, and run it from `entry` to a
/// terminal status against `gas_budget` and `input` (§6). `host` services
/// every `ecalli` host-call yield via [`crate::host::dispatch`]; nested PVMs
/// created through the `machine` host call are owned and run entirely inside
/// this call (§4.F, §5 "nested-synchronously").
pub fn invoke(
    program_blob: &[u8],
    entry: EntryPoint,
    gas_budget: i64,
    input: &[u8],
    host: &mut dyn HostCalls,
) -> InvocationResult {
    let program = match LoadedProgram::decode(program_blob) {
        Ok(p) => p,
        Err(_) => return panic_at_setup(),
    };

    let mut memory = PagedMemory::new();
    memory.init_layout(&program.layout_view(), input);

    let mut state = ExecutionState::new(entry.code_offset(), gas_budget, input.len() as u32);
    let mut refine = RefineState::default();
    let context = entry.context();

    run_to_completion(&mut state, &program, &mut memory, context, &mut refine, host);

    finish(state, &mut memory, gas_budget, refine)
}

/// Drives the fetch-decode-execute loop (§4.D), servicing `ecalli` yields
/// until a terminal status (Halt/Panic/Fault/OutOfGas) is reached.
fn run_to_completion(
    state: &mut ExecutionState,
    program: &LoadedProgram,
    memory: &mut dyn Memory,
    context: HostContext,
    refine: &mut RefineState,
    host: &mut dyn HostCalls,
) {
    loop {
        if !crate::interp::dispatch::step(state, program, memory) {
            return;
        }
        if state.status == Status::HostYield {
            // `ecalli` leaves `pc` on the yielding instruction (§4.D); resume
            // advances past it by that instruction's own skip distance.
            let yield_pc = state.pc;
            host::dispatch(state, memory, context, refine, host);
            if state.status != Status::Continue {
                return;
            }
            let advance = 1 + u32::from(*program.skip.get(yield_pc as usize).unwrap_or(&0));
            state.pc = yield_pc.wrapping_add(advance);
        }
    }
}

fn panic_at_setup() -> InvocationResult {
    InvocationResult {
        status: Status::Panic,
        gas_used: 0,
        output: Vec::new(),
        exports: Vec::new(),
        fault_address: None,
    }
}

/// Extracts `(gas_used, output, exports)` from a terminated invocation
/// (§6 "Invocation result"): output is `memory[r7, r7+r8)` on Halt only,
/// empty if `r8` exceeds 16 MiB or the range straddles inaccessible memory.
fn finish(state: ExecutionState, memory: &mut dyn Memory, gas_budget: i64, refine: RefineState) -> InvocationResult {
    // `state.gas` itself is allowed to go negative (that's the OutOfGas signal,
    // §4.D); the charge that drove it negative never bought a completed
    // instruction, so it's excluded from the reported total by flooring the
    // final counter at 0 before taking the difference.
    let gas_used = (gas_budget - state.gas.max(0)) as u64;
    let fault_address = (state.status == Status::Fault).then_some(state.fault_address);

    if state.status != Status::Halt {
        return InvocationResult { status: state.status, gas_used, output: Vec::new(), exports: Vec::new(), fault_address };
    }

    let offset = state.registers[7] as u32;
    let length = state.registers[8] as u32;
    let output = if length == 0 {
        Vec::new()
    } else if length > config::INIT_INPUT_SIZE || (offset as u64 + length as u64) > u64::from(u32::MAX) + 1 {
        Vec::new()
    } else {
        match memory.read(offset, length) {
            MemResult::Ok(data) => data,
            MemResult::Fault(_) | MemResult::Panic => Vec::new(),
        }
    };

    InvocationResult { status: state.status, gas_used, output, exports: refine.exports, fault_address }
}

/// Decode-only helper for callers that want to validate/inspect a blob
/// without running it (mirrors the teacher's `prepare_blob_impl`).
pub fn decode_program(program_blob: &[u8]) -> Result<LoadedProgram, DecodeError> {
    LoadedProgram::decode(program_blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_code_blob, CodeBlob};
    use crate::memory::PagedMemory;

    struct NoopHost;
    impl HostCalls for NoopHost {}

    fn blob_from(code_blob: CodeBlob) -> Vec<u8> {
        let encoded_code = encode_code_blob(&code_blob);
        let mut out = vec![0u8; 3 + 3 + 2 + 3];
        out.extend((encoded_code.len() as u32).to_le_bytes());
        out.extend(encoded_code);
        out
    }

    /// S1: `jump_ind r0, 0` at PC 0, `r0` = halt sentinel. Halt, gas_used = 2.
    #[test]
    fn s1_immediate_halt() {
        let code = vec![config::OPCODE_JUMP_IND, 0x00, 0x00];
        let mask = vec![1, 0, 0];
        let blob = blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 });
        let mut host = NoopHost;
        let result = invoke(&blob, EntryPoint::Refine, 1000, &[], &mut host);
        assert_eq!(result.status, Status::Halt);
        assert_eq!(result.gas_used, 2);
        assert!(result.output.is_empty());
        assert!(result.exports.is_empty());
    }

    /// S2: `load_imm r3,30; load_imm r4,12; add_32 r5,r3,r4; jump_ind r0,0`.
    /// The operands land in r3/r4/r5 rather than r0/r1/r2 so the halt sentinel
    /// `ExecutionState::new` puts in r0 (§4.C) survives to the final jump —
    /// loading into r0 itself would clobber it and turn the jump into a Panic
    /// (an empty jump table can't resolve `addr = 30`). Halt; r5 = 42;
    /// gas_used = 4. Driven instruction-by-instruction (rather than through
    /// [`invoke`]) since r5 isn't part of the public [`InvocationResult`].
    #[test]
    fn s2_addition() {
        let code = vec![
            config::OPCODE_LOAD_IMM, 0x03, 30,
            config::OPCODE_LOAD_IMM, 0x04, 12,
            config::OPCODE_ADD_32, 0x43, 0x05,
            config::OPCODE_JUMP_IND, 0x00, 0x00,
        ];
        let mask = vec![1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0];
        let program = LoadedProgram::decode(&blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 })).unwrap();
        let mut memory = PagedMemory::new();
        let mut state = ExecutionState::new(0, 1000, 0);
        while crate::interp::dispatch::step(&mut state, &program, &mut memory) {}
        assert_eq!(state.status, Status::Halt);
        assert_eq!(state.registers[5], 42);
        assert_eq!(1000 - state.gas, 4);
    }

    /// S3: `load_u8 r0, [0x0010]` — forbidden-zone read. Panic, gas_used = 1.
    #[test]
    fn s3_forbidden_zone_access_panics() {
        let code = vec![config::OPCODE_LOAD_U8, 0x00, 0x10, 0x00];
        let mask = vec![1, 0, 0, 0];
        let blob = blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 });
        let mut host = NoopHost;
        let result = invoke(&blob, EntryPoint::Refine, 1000, &[], &mut host);
        assert_eq!(result.status, Status::Panic);
        assert_eq!(result.gas_used, 1);
        assert!(result.output.is_empty());
    }

    /// S4: 10x `fallthrough`, budget 3. OutOfGas, gas_used = 3.
    #[test]
    fn s4_out_of_gas() {
        let code = vec![config::OPCODE_FALLTHROUGH; 10];
        let mask = vec![1; 10];
        let blob = blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 });
        let mut host = NoopHost;
        let result = invoke(&blob, EntryPoint::Refine, 3, &[], &mut host);
        assert_eq!(result.status, Status::OutOfGas);
        assert_eq!(result.gas_used, 3);
    }

    /// S5: `ecalli 0` (gas) then `jump_ind r0, 0`. The `gas` call writes
    /// remaining gas to r7; Halt, gas_used = 1 (ecalli) + 10 (gas) + 1 (jump) = 12.
    #[test]
    fn s5_host_gas_call_then_halt() {
        let code = vec![
            config::OPCODE_ECALLI, 0x00,
            config::OPCODE_JUMP_IND, 0x00, 0x00,
        ];
        let mask = vec![1, 0, 1, 0, 0];
        let blob = blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 });
        let mut host = NoopHost;
        let result = invoke(&blob, EntryPoint::Refine, 1000, &[], &mut host);
        assert_eq!(result.status, Status::Halt);
        assert_eq!(result.gas_used, 12);
    }

    /// S6: `r0 = 3`; `jump_ind r0, 0` — odd/unaligned indirect jump target. Panic.
    #[test]
    fn s6_unaligned_indirect_jump_panics() {
        let code = vec![
            config::OPCODE_LOAD_IMM, 0x00, 0x03,
            config::OPCODE_JUMP_IND, 0x00, 0x00,
        ];
        let mask = vec![1, 0, 0, 1, 0, 0];
        let blob = blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 });
        let mut host = NoopHost;
        let result = invoke(&blob, EntryPoint::Refine, 1000, &[], &mut host);
        assert_eq!(result.status, Status::Panic);
    }

    #[test]
    fn decode_failure_panics_with_zero_gas() {
        let result = invoke(&[0xff], EntryPoint::Refine, 1000, &[], &mut NoopHost);
        assert_eq!(result.status, Status::Panic);
        assert_eq!(result.gas_used, 0);
    }
}
