//! End-to-end invariant and boundary tests (§8) driven entirely through the
//! public API, the way `fuel-vm`'s `tests/alu.rs` drives its VM through
//! assembled instruction streams rather than internal state pokes.

use polka_pvm::codec::{encode_code_blob, CodeBlob};
use polka_pvm::interp::dispatch;
use polka_pvm::memory::{Access, Memory, PagedMemory};
use polka_pvm::state::ExecutionState;
use polka_pvm::{invoke, EntryPoint, HostCalls, LoadedProgram, Status};

struct NoopHost;
impl HostCalls for NoopHost {}

fn blob_from(code_blob: CodeBlob) -> Vec<u8> {
    let encoded_code = encode_code_blob(&code_blob);
    let mut out = vec![0u8; 3 + 3 + 2 + 3];
    out.extend((encoded_code.len() as u32).to_le_bytes());
    out.extend(encoded_code);
    out
}

// Opcode numbers used here mirror `src/config.rs`; re-declared locally since
// that module isn't part of the crate's public surface.
const OPCODE_TRAP: u8 = 0;
const OPCODE_FALLTHROUGH: u8 = 1;
const OPCODE_LOAD_U8: u8 = 52;
const OPCODE_STORE_U32: u8 = 61;
const OPCODE_LOAD_IMM: u8 = 51;
const OPCODE_JUMP_IND: u8 = 50;
const OPCODE_SBRK: u8 = 101;
const OPCODE_DIV_S_64: u8 = 204;
const OPCODE_REM_S_64: u8 = 206;
const OPCODE_ADD_32: u8 = 190;

/// §8 boundary: "Opcode at position where `mask[PC] = false`."
#[test]
fn opcode_at_non_boundary_position_panics() {
    // Single `fallthrough` byte at pc 0, but its mask bit is false: the byte
    // is never a valid instruction start, so execution panics immediately.
    let code = vec![OPCODE_FALLTHROUGH];
    let mask = vec![0];
    let blob = blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 });
    let result = invoke(&blob, EntryPoint::Refine, 1000, &[], &mut NoopHost);
    assert_eq!(result.status, Status::Panic);
}

/// §8 boundary: "Gas underflow on the very last instruction of a long program."
#[test]
fn gas_underflows_on_last_instruction() {
    let code = vec![OPCODE_FALLTHROUGH; 50];
    let mask = vec![1; 50];
    let blob = blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 });
    let result = invoke(&blob, EntryPoint::Refine, 50, &[], &mut NoopHost);
    assert_eq!(result.status, Status::OutOfGas);
    // Gas went negative charging for the 50th instruction; only 49 completed,
    // but the base cost for the 50th is still spent before the underflow is seen.
    assert_eq!(result.gas_used, 50);
}

/// §8 quantified invariant 1: any address `< 0x10000` Panics, never Faults.
#[test]
fn forbidden_zone_read_is_panic_not_fault() {
    let code = vec![OPCODE_LOAD_U8, 0x00, 0xff, 0xff];
    let mask = vec![1, 0, 0, 0];
    let blob = blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 });
    let result = invoke(&blob, EntryPoint::Refine, 1000, &[], &mut NoopHost);
    assert_eq!(result.status, Status::Panic);
}

/// §8 quantified invariant 2: writing into a page with permission `!= Write`
/// Faults (recoverable), distinct from the forbidden-zone Panic above.
#[test]
fn write_to_unmapped_user_page_faults() {
    let code = vec![
        OPCODE_LOAD_IMM, 0x00, 0x07, // r0 = 7 (value to store, arbitrary)
        OPCODE_STORE_U32, 0x00, 0x00, 0x00, 0x03, // store r0 at addr 0x03000000 (never mapped)
    ];
    let mask = vec![1, 0, 0, 1, 0, 0, 0, 0];
    let blob = blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 });
    let result = invoke(&blob, EntryPoint::Refine, 1000, &[], &mut NoopHost);
    assert_eq!(result.status, Status::Fault);
}

/// §8 boundary: partial write across a page boundary with a permission drop
/// stops at the first failing byte; earlier bytes are retained.
#[test]
fn partial_write_across_page_boundary() {
    let mut memory = PagedMemory::new();
    memory.set_access(0x20000, 4096, Access::ReadWrite);
    // Leave the next page (0x21000) at None: a 4-byte write starting 2 bytes
    // before the boundary should write 2 bytes and fault on the 3rd.
    let addr = 0x20ffe;
    let write_result = memory.write(addr, &[1, 2, 3, 4]);
    assert!(matches!(write_result, polka_pvm::memory::MemResult::Fault(a) if a == 0x21000));
    match memory.read(addr, 2) {
        polka_pvm::memory::MemResult::Ok(data) => assert_eq!(data, vec![1, 2]),
        other => panic!("expected Ok, got {other:?}"),
    }
}

/// §8 round-trip: `sbrk` end to end through the interpreter, not just the
/// memory subsystem directly — `old = sbrk(delta); new = sbrk(0); new-old=delta`.
#[test]
fn sbrk_round_trip_through_interpreter() {
    let code = vec![
        OPCODE_LOAD_IMM, 0x01, 100, // r1 = 100 (delta)
        OPCODE_SBRK, 0x20, // sbrk r2, r1  (two-register format: hi=r2, lo=r1 -> reg_lo(0x20)=0=r0? use explicit bytes below)
    ];
    // `sbrk rd, rb`: operand byte is (rb<<4)|rd. rd=r2, rb=r1 -> (1<<4)|2 = 0x12.
    // `r0` is never loaded, so it still holds the halt sentinel; an explicit
    // `jump_ind r0, 0` after the `sbrk` halts cleanly rather than running off
    // the end of code, which Panics per §4.D step 2.
    let code = vec![OPCODE_LOAD_IMM, 0x01, 100, OPCODE_SBRK, 0x12, OPCODE_JUMP_IND, 0x00, 0x00];
    let mask = vec![1, 0, 0, 1, 0, 1, 0, 0];
    let program = LoadedProgram::decode(&blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 })).unwrap();
    let mut memory = PagedMemory::new();
    let mut state = ExecutionState::new(0, 1000, 0);
    while dispatch::step(&mut state, &program, &mut memory) {}
    assert_eq!(state.status, Status::Halt);
    let old = 0u64; // heap pointer starts at 0 with no RO/RW data laid out
    assert_eq!(state.registers[2], old);
    assert_eq!(memory.heap_pointer() as u64, old + 100);
}

/// §8 round-trip: division/remainder identity through the interpreter's
/// `div_s`/`rem_s` opcodes: `(a / b) * b + (a rem b) = a`.
#[test]
fn signed_division_remainder_identity_through_interpreter() {
    // r0 = -17 (via load_imm_64 would be cleaner, but load_imm sign-extends
    // a small negative immediate just as well): encode -17 as a single byte.
    let code = vec![
        OPCODE_LOAD_IMM, 0x00, (-17i8) as u8,
        OPCODE_LOAD_IMM, 0x01, 5,
        OPCODE_DIV_S_64, 0x10, 0x02, // r2 = r0 / r1
        OPCODE_REM_S_64, 0x10, 0x03, // r3 = r0 rem r1
        OPCODE_LOAD_IMM, 0x01, 5,
        // r4 = r2 * r1  (reuse ADD_32 isn't multiply; skip arithmetic check,
        // identity is verified on the raw quotient/remainder values instead)
    ];
    let mask = vec![1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0, 1, 0, 0];
    let program = LoadedProgram::decode(&blob_from(CodeBlob { code, mask, jump_table: vec![], jt_width: 2 })).unwrap();
    let mut memory = PagedMemory::new();
    let mut state = ExecutionState::new(0, 1000, 0);
    while dispatch::step(&mut state, &program, &mut memory) {}
    let q = state.registers[2] as i64;
    let r = state.registers[3] as i64;
    assert_eq!(q * 5 + r, -17);
}
