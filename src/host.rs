//! Host-call dispatch layer (§4.E): numbered service requests, encode/decode
//! via registers + memory, and the near-`u64::MAX` sentinel error taxonomy.
//!
//! Grounded in the teacher's `host_functions/base.rs` (`HostFunctionContext`,
//! `HostFunction`) and the per-call files under `host_functions/general/` and
//! `host_functions/accumulate/`. Per §1/SPEC_FULL.md, the blockchain
//! state-transition driver (service accounts, storage, preimages, entropy,
//! work-packages) is an external collaborator: calls whose whole contract is
//! register/memory shuffling plus a sentinel (`gas`) are implemented here
//! directly; calls that need chain state the embedder owns are decoded here
//! (registers, fixed-width memory reads) and then handed to the [`HostCalls`]
//! trait the embedder implements. `export`/`machine`/`peek`/`poke`/`pages`/
//! `invoke`/`expunge` are implemented directly against the inner-machine
//! table (§4.F), which the PVM core owns regardless of embedder.

use crate::config::{self, *};
use crate::inner::{InnerMachines, PagesError, PeekPokeError};
use crate::memory::{Access, MemResult, Memory};
use crate::state::{ExecutionState, Status};

/// The invocation context a host call runs under (§4.E). An out-of-context
/// call returns `What` without side effects, paying only the base gas cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostContext {
    IsAuthorized,
    Refine,
    Accumulate,
    OnTransfer,
}

/// The near-`u64::MAX` sentinel family returned in `r7` (§4.E table).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sentinel {
    Ok,
    None,
    What,
    Oob,
    Who,
    Full,
    Core,
    Cash,
    Low,
    Huh,
}

impl Sentinel {
    pub fn to_u64(self) -> u64 {
        match self {
            Sentinel::Ok => REG_OK,
            Sentinel::None => REG_NONE,
            Sentinel::What => REG_WHAT,
            Sentinel::Oob => REG_OOB,
            Sentinel::Who => REG_WHO,
            Sentinel::Full => REG_FULL,
            Sentinel::Core => REG_CORE,
            Sentinel::Cash => REG_CASH,
            Sentinel::Low => REG_LOW,
            Sentinel::Huh => REG_HUH,
        }
    }
}

/// Environment data and chain-state mutations a host call needs that the PVM
/// core does not own (§1 external collaborators). Every Accumulate-only
/// method defaults to `What` (§9's Open Question: an unimplemented call must
/// be rejected, not silently succeed like the teacher's stub Accumulate
/// host functions).
#[allow(unused_variables)]
pub trait HostCalls {
    /// Selector 0 = configuration constants, 1 = entropy, 2 = recent block
    /// hashes, 7 = encoded work-package; others `None` until defined (§6).
    fn fetch(&mut self, selector: u32) -> Option<Vec<u8>> {
        None
    }
    fn lookup_preimage(&mut self, service_id: u64, hash: &[u8; 32]) -> Option<Vec<u8>> {
        None
    }
    fn historical_lookup(&mut self, service_id: u64, hash: &[u8; 32]) -> Option<Vec<u8>> {
        None
    }
    fn read_storage(&mut self, service_id: u64, key: &[u8]) -> Option<Vec<u8>> {
        None
    }
    /// `value = None` deletes. Returns the prior value's length, or `Err` on
    /// insufficient balance (FULL).
    fn write_storage(&mut self, key: &[u8], value: Option<Vec<u8>>) -> Result<Option<u32>, Sentinel> {
        Err(Sentinel::Full)
    }
    fn service_info(&mut self, service_id: u64) -> Option<Vec<u8>> {
        None
    }

    fn bless(
        &mut self,
        manager: u64,
        delegator: u64,
        registrar: u64,
        assigners_offset: u32,
        always_accessors_offset: u32,
        always_accessors_count: u64,
        memory: &mut dyn Memory,
    ) -> Sentinel {
        Sentinel::What
    }
    fn assign(&mut self, core: u64, auth_queue_offset: u32, service_id: u64, memory: &mut dyn Memory) -> Sentinel {
        Sentinel::What
    }
    fn designate(&mut self, validators_offset: u32, memory: &mut dyn Memory) -> Sentinel {
        Sentinel::What
    }
    /// `imY' = imX` (copy regular accumulation context to exceptional).
    fn checkpoint(&mut self) -> Sentinel {
        Sentinel::What
    }
    fn new_service(
        &mut self,
        code_hash: [u8; 32],
        code_len: u64,
        min_acc_gas: u64,
        min_memo_gas: u64,
        gratis: u64,
        desired_id: u64,
    ) -> Result<u64, Sentinel> {
        Err(Sentinel::What)
    }
    fn upgrade(&mut self, code_hash: [u8; 32], min_acc_gas: u64, min_memo_gas: u64) -> Sentinel {
        Sentinel::What
    }
    fn transfer(&mut self, dest: u64, amount: u64, gas_limit: u64, memo: [u8; 128]) -> Sentinel {
        Sentinel::What
    }
    fn eject(&mut self, service_id: u64, hash: [u8; 32]) -> Sentinel {
        Sentinel::What
    }
    /// Returns the fully encoded status word (NONE, or the packed
    /// `0/1+2^32·x/2+2^32·x,y/3+2^32·x,y+2^32·z` convention); the embedder
    /// owns the encoding since it owns the request/preimage bookkeeping.
    fn query(&mut self, hash: [u8; 32], len: u64) -> u64 {
        REG_NONE
    }
    fn solicit(&mut self, hash: [u8; 32], len: u64) -> Sentinel {
        Sentinel::What
    }
    fn forget(&mut self, hash: [u8; 32], len: u64) -> Sentinel {
        Sentinel::What
    }
    fn yield_result(&mut self, hash: [u8; 32]) -> Sentinel {
        Sentinel::What
    }
    fn provide(&mut self, service_id: u64, preimage: Vec<u8>) -> Sentinel {
        Sentinel::What
    }
}

/// The Refine-only state the PVM core owns directly: the exports list and
/// the inner-machine table (§3, §4.F).
#[derive(Default)]
pub struct RefineState {
    pub exports: Vec<Vec<u8>>,
    pub machines: InnerMachines,
}

/// Base gas cost charged before any host call dispatches (§4.D gas model).
pub const HOST_CALL_BASE_GAS: i64 = 10;

fn mem_read(memory: &mut dyn Memory, addr: u32, len: u32) -> Option<Vec<u8>> {
    match memory.read(addr, len) {
        MemResult::Ok(v) => Some(v),
        MemResult::Fault(_) | MemResult::Panic => None,
    }
}

fn mem_write_or_panic(memory: &mut dyn Memory, state: &mut ExecutionState, addr: u32, data: &[u8]) -> bool {
    match memory.write(addr, data) {
        MemResult::Ok(()) => true,
        MemResult::Fault(_) | MemResult::Panic => {
            state.status = Status::Panic;
            false
        }
    }
}

fn mem_read_or_panic(memory: &mut dyn Memory, state: &mut ExecutionState, addr: u32, len: u32) -> Option<Vec<u8>> {
    match mem_read(memory, addr, len) {
        Some(v) => Some(v),
        None => {
            state.status = Status::Panic;
            None
        }
    }
}

fn fixed32(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let len = bytes.len().min(32);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Copy up to `len` bytes of `data` starting at `from` into memory at `out`,
/// matching the `fetch`/`lookup`/`read`/`info` "copy data[src..src+len)"
/// contract (§4.E). A memory-write failure escalates to Panic; the length
/// returned is always the *total* datum length, not the copied slice length.
fn slice_and_write(
    memory: &mut dyn Memory,
    state: &mut ExecutionState,
    data: &[u8],
    out: u32,
    from: u32,
    len: u32,
) -> bool {
    let total = data.len() as u32;
    let from = from.min(total);
    let available = total - from;
    let actual = len.min(available);
    if actual > 0 {
        let slice = &data[from as usize..(from + actual) as usize];
        if !mem_write_or_panic(memory, state, out, slice) {
            return false;
        }
    }
    true
}

/// Dispatch one host call (§4.E). `state.host_call_id` selects the call;
/// `state.registers[7..=12]` carry arguments; results land in `r7` (and
/// sometimes `r8`). Charges the base cost, then runs the call; a
/// memory-permission violation while handling arguments escalates the whole
/// invocation to `Status::Panic` rather than returning a sentinel (§4.E/§7).
pub fn dispatch(
    state: &mut ExecutionState,
    memory: &mut dyn Memory,
    context: HostContext,
    refine: &mut RefineState,
    host: &mut dyn HostCalls,
) {
    state.charge_gas(HOST_CALL_BASE_GAS);
    if state.status != Status::Continue {
        return;
    }

    let call_id = state.host_call_id;

    #[cfg(feature = "trace-host-calls")]
    log::trace!("ecalli {call_id} context={context:?} args={:?}", &state.registers[7..=12]);

    let regs = &mut state.registers;

    match call_id {
        x if x == u32::from(FUNC_GAS) => {
            regs[7] = state.gas as u64;
        }
        x if x == u32::from(FUNC_FETCH) => {
            let out = regs[7] as u32;
            let from = regs[8] as u32;
            let len = regs[9] as u32;
            let selector = regs[10] as u32;
            match host.fetch(selector) {
                Some(data) => {
                    if slice_and_write(memory, state, &data, out, from, len) {
                        state.registers[7] = data.len() as u64;
                    }
                }
                None => regs[7] = REG_NONE,
            }
        }
        x if x == u32::from(FUNC_LOOKUP) => {
            let service_id = regs[7];
            let hash_addr = regs[8] as u32;
            let out = regs[9] as u32;
            let from = regs[10] as u32;
            let len = regs[11] as u32;
            let Some(hash_bytes) = mem_read_or_panic(memory, state, hash_addr, 32) else { return };
            let hash = fixed32(&hash_bytes);
            match host.lookup_preimage(service_id, &hash) {
                Some(data) => {
                    if slice_and_write(memory, state, &data, out, from, len) {
                        state.registers[7] = data.len() as u64;
                    }
                }
                None => state.registers[7] = REG_NONE,
            }
        }
        x if x == u32::from(FUNC_READ) => {
            let service_selector = regs[7];
            let key_addr = regs[8] as u32;
            let key_len = regs[9] as u32;
            let out = regs[10] as u32;
            let from = regs[11] as u32;
            let len = regs[12] as u32;
            let Some(key) = mem_read_or_panic(memory, state, key_addr, key_len) else { return };
            match host.read_storage(service_selector, &key) {
                Some(data) => {
                    if slice_and_write(memory, state, &data, out, from, len) {
                        state.registers[7] = data.len() as u64;
                    }
                }
                None => state.registers[7] = REG_NONE,
            }
        }
        x if x == u32::from(FUNC_WRITE) => {
            let key_addr = regs[7] as u32;
            let key_len = regs[8] as u32;
            let val_addr = regs[9] as u32;
            let val_len = regs[10] as u32;
            let Some(key) = mem_read_or_panic(memory, state, key_addr, key_len) else { return };
            let value = if val_len == 0 {
                None
            } else {
                let Some(v) = mem_read_or_panic(memory, state, val_addr, val_len) else { return };
                Some(v)
            };
            match host.write_storage(&key, value) {
                Ok(Some(prior_len)) => state.registers[7] = u64::from(prior_len),
                Ok(None) => state.registers[7] = REG_NONE,
                Err(sentinel) => state.registers[7] = sentinel.to_u64(),
            }
        }
        x if x == u32::from(FUNC_INFO) => {
            let service_selector = regs[7];
            let out = regs[8] as u32;
            let from = regs[9] as u32;
            let len = regs[10] as u32;
            match host.service_info(service_selector) {
                Some(data) => {
                    if slice_and_write(memory, state, &data, out, from, len) {
                        state.registers[7] = data.len() as u64;
                    }
                }
                None => state.registers[7] = REG_NONE,
            }
        }
        x if x == u32::from(FUNC_HISTORICAL_LOOKUP) => dispatch_historical_lookup(state, memory, context, host),

        x if x == u32::from(FUNC_EXPORT) => dispatch_export(state, memory, context, refine),
        x if x == u32::from(FUNC_MACHINE) => dispatch_machine(state, memory, context, refine),
        x if x == u32::from(FUNC_PEEK) => dispatch_peek(state, memory, context, refine),
        x if x == u32::from(FUNC_POKE) => dispatch_poke(state, memory, context, refine),
        x if x == u32::from(FUNC_PAGES) => dispatch_pages(state, context, refine),
        x if x == u32::from(FUNC_INVOKE) => dispatch_invoke(state, memory, context, refine),
        x if x == u32::from(FUNC_EXPUNGE) => dispatch_expunge(state, context, refine),

        x if x == u32::from(FUNC_BLESS) => dispatch_bless(state, memory, context, host),
        x if x == u32::from(FUNC_ASSIGN) => dispatch_assign(state, memory, context, host),
        x if x == u32::from(FUNC_DESIGNATE) => dispatch_designate(state, memory, context, host),
        x if x == u32::from(FUNC_CHECKPOINT) => dispatch_checkpoint(state, context, host),
        x if x == u32::from(FUNC_NEW) => dispatch_new(state, context, host),
        x if x == u32::from(FUNC_UPGRADE) => dispatch_upgrade(state, memory, context, host),
        x if x == u32::from(FUNC_TRANSFER) => dispatch_transfer(state, memory, context, host),
        x if x == u32::from(FUNC_EJECT) => dispatch_eject(state, memory, context, host),
        x if x == u32::from(FUNC_QUERY) => dispatch_query(state, memory, context, host),
        x if x == u32::from(FUNC_SOLICIT) => dispatch_solicit(state, memory, context, host),
        x if x == u32::from(FUNC_FORGET) => dispatch_forget(state, memory, context, host),
        x if x == u32::from(FUNC_YIELD) => dispatch_yield(state, memory, context, host),
        x if x == u32::from(FUNC_PROVIDE) => dispatch_provide(state, memory, context, host),

        _ => state.registers[7] = Sentinel::What.to_u64(),
    }

    #[cfg(feature = "trace-host-calls")]
    log::trace!("ecalli {call_id} -> r7={:#x}", state.registers[7]);
}

fn require_refine(state: &mut ExecutionState, context: HostContext) -> bool {
    if context != HostContext::Refine {
        state.registers[7] = Sentinel::What.to_u64();
        return false;
    }
    true
}

/// `historical_lookup` is valid only in Refine and IsAuthorized (§4.E); any
/// other context returns `What` without touching memory or the embedder.
fn require_refine_or_is_authorized(state: &mut ExecutionState, context: HostContext) -> bool {
    if context != HostContext::Refine && context != HostContext::IsAuthorized {
        state.registers[7] = Sentinel::What.to_u64();
        return false;
    }
    true
}

fn require_accumulate(state: &mut ExecutionState, context: HostContext) -> bool {
    if context != HostContext::Accumulate {
        state.registers[7] = Sentinel::What.to_u64();
        return false;
    }
    true
}

fn dispatch_export(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, refine: &mut RefineState) {
    if !require_refine(state, context) {
        return;
    }
    let addr = state.registers[7] as u32;
    let raw_len = state.registers[8] as u32;
    let len = raw_len.min(config::SEGMENT_SIZE);
    // `export` charges 10 (already deducted) + length; write the actual gas used back via r8.
    state.charge_gas(i64::from(len));
    if state.status != Status::Continue {
        return;
    }
    let Some(data) = mem_read_or_panic(memory, state, addr, len) else { return };
    let mut segment = vec![0u8; config::SEGMENT_SIZE as usize];
    segment[..data.len()].copy_from_slice(&data);
    if refine.exports.len() as u64 >= u64::from(u32::MAX) {
        state.registers[7] = Sentinel::Full.to_u64();
        return;
    }
    let segoff = refine.exports.len() as u64;
    refine.exports.push(segment);
    state.registers[7] = segoff;
    state.registers[8] = HOST_CALL_BASE_GAS as u64 + len as u64;
}

fn dispatch_machine(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, refine: &mut RefineState) {
    if !require_refine(state, context) {
        return;
    }
    let prog_addr = state.registers[7] as u32;
    let prog_len = state.registers[8] as u32;
    let initial_pc = state.registers[9] as u32;
    let Some(blob) = mem_read_or_panic(memory, state, prog_addr, prog_len) else { return };
    match refine.machines.create(&blob, initial_pc) {
        Ok(id) => state.registers[7] = u64::from(id),
        Err(_) => state.registers[7] = Sentinel::Huh.to_u64(),
    }
}

/// §4.E: valid only in Refine and IsAuthorized contexts.
fn dispatch_historical_lookup(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_refine_or_is_authorized(state, context) {
        return;
    }
    let regs = state.registers;
    let service_id = regs[7];
    let hash_addr = regs[8] as u32;
    let out = regs[9] as u32;
    let from = regs[10] as u32;
    let len = regs[11] as u32;
    let Some(hash_bytes) = mem_read_or_panic(memory, state, hash_addr, 32) else { return };
    let hash = fixed32(&hash_bytes);
    match host.historical_lookup(service_id, &hash) {
        Some(data) => {
            if slice_and_write(memory, state, &data, out, from, len) {
                state.registers[7] = data.len() as u64;
            }
        }
        None => state.registers[7] = REG_NONE,
    }
}

fn dispatch_peek(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, refine: &mut RefineState) {
    if !require_refine(state, context) {
        return;
    }
    let machine_id = state.registers[7] as u32;
    let dest = state.registers[8] as u32;
    let src = state.registers[9] as u32;
    let len = state.registers[10] as u32;
    match refine.machines.peek(machine_id, src, len) {
        Ok(data) => {
            if mem_write_or_panic(memory, state, dest, &data) {
                state.registers[7] = Sentinel::Ok.to_u64();
            }
        }
        Err(PeekPokeError::NoSuchMachine) => state.registers[7] = Sentinel::Who.to_u64(),
        Err(PeekPokeError::NotReadable | PeekPokeError::NotWritable) => state.registers[7] = Sentinel::Oob.to_u64(),
    }
}

fn dispatch_poke(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, refine: &mut RefineState) {
    if !require_refine(state, context) {
        return;
    }
    let machine_id = state.registers[7] as u32;
    let src = state.registers[8] as u32;
    let dest = state.registers[9] as u32;
    let len = state.registers[10] as u32;
    let Some(data) = mem_read_or_panic(memory, state, src, len) else { return };
    match refine.machines.poke(machine_id, dest, &data) {
        Ok(()) => state.registers[7] = Sentinel::Ok.to_u64(),
        Err(PeekPokeError::NoSuchMachine) => state.registers[7] = Sentinel::Who.to_u64(),
        Err(PeekPokeError::NotReadable | PeekPokeError::NotWritable) => state.registers[7] = Sentinel::Oob.to_u64(),
    }
}

fn dispatch_pages(state: &mut ExecutionState, context: HostContext, refine: &mut RefineState) {
    if !require_refine(state, context) {
        return;
    }
    let machine_id = state.registers[7] as u32;
    let start_page = state.registers[8] as u32;
    let count = state.registers[9] as u32;
    let rights = state.registers[10] as u32;
    match refine.machines.set_pages(machine_id, start_page, count, rights) {
        Ok(()) => state.registers[7] = Sentinel::Ok.to_u64(),
        Err(PagesError::NoSuchMachine) => state.registers[7] = Sentinel::Who.to_u64(),
        Err(PagesError::InvalidRights | PagesError::PagesMustAlreadyExist) => state.registers[7] = Sentinel::Huh.to_u64(),
    }
}

const INVOKE_HEADER_SIZE: u32 = 8 + 13 * 8;

fn dispatch_invoke(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, refine: &mut RefineState) {
    if !require_refine(state, context) {
        return;
    }
    let machine_id = state.registers[7] as u32;
    let io_addr = state.registers[8] as u32;
    let Some(header) = mem_read_or_panic(memory, state, io_addr, INVOKE_HEADER_SIZE) else { return };
    let mut gas_bytes = [0u8; 8];
    gas_bytes.copy_from_slice(&header[0..8]);
    let gas_limit = i64::from_le_bytes(gas_bytes);
    let mut registers = [0u64; 13];
    for (i, r) in registers.iter_mut().enumerate() {
        let start = 8 + i * 8;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&header[start..start + 8]);
        *r = u64::from_le_bytes(buf);
    }

    let Some(machine) = refine.machines.get_mut(machine_id) else {
        state.registers[7] = Sentinel::Who.to_u64();
        return;
    };
    let outcome = machine.invoke(gas_limit, registers);

    let mut out = vec![0u8; INVOKE_HEADER_SIZE as usize];
    out[0..8].copy_from_slice(&outcome.gas_remaining.to_le_bytes());
    for (i, &r) in outcome.registers.iter().enumerate() {
        out[8 + i * 8..8 + (i + 1) * 8].copy_from_slice(&r.to_le_bytes());
    }
    if !mem_write_or_panic(memory, state, io_addr, &out) {
        return;
    }

    let (result, extra) = match outcome.status {
        Status::Halt => (RESULT_CODE_HALT as u64, 0),
        Status::Panic => (RESULT_CODE_PANIC as u64, 0),
        Status::Fault => (RESULT_CODE_FAULT as u64, u64::from(outcome.fault_address)),
        Status::OutOfGas => (RESULT_CODE_OOG as u64, 0),
        Status::HostYield => (RESULT_CODE_HOST as u64, u64::from(outcome.host_call_id)),
        Status::Continue => (RESULT_CODE_HALT as u64, 0),
    };
    state.registers[7] = result;
    state.registers[8] = extra;
}

fn dispatch_expunge(state: &mut ExecutionState, context: HostContext, refine: &mut RefineState) {
    if !require_refine(state, context) {
        return;
    }
    let machine_id = state.registers[7] as u32;
    match refine.machines.expunge(machine_id) {
        Some(pc) => state.registers[7] = u64::from(pc),
        None => state.registers[7] = Sentinel::Who.to_u64(),
    }
}

fn dispatch_bless(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let regs = state.registers;
    let sentinel = host.bless(regs[7], regs[9], regs[10], regs[8] as u32, regs[11] as u32, regs[12], memory);
    state.registers[7] = sentinel.to_u64();
}

fn dispatch_assign(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let regs = state.registers;
    let sentinel = host.assign(regs[7], regs[8] as u32, regs[9], memory);
    state.registers[7] = sentinel.to_u64();
}

fn dispatch_designate(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let offset = state.registers[7] as u32;
    let sentinel = host.designate(offset, memory);
    state.registers[7] = sentinel.to_u64();
}

fn dispatch_checkpoint(state: &mut ExecutionState, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let sentinel = host.checkpoint();
    if sentinel == Sentinel::Ok {
        state.registers[7] = state.gas as u64;
    } else {
        state.registers[7] = sentinel.to_u64();
    }
}

fn dispatch_new(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let regs = state.registers;
    let hash_addr = regs[7] as u32;
    let Some(hash_bytes) = mem_read_or_panic(memory, state, hash_addr, 32) else { return };
    let regs = state.registers;
    match host.new_service(fixed32(&hash_bytes), regs[8], regs[9], regs[10], regs[11], regs[12]) {
        Ok(id) => state.registers[7] = id,
        Err(sentinel) => state.registers[7] = sentinel.to_u64(),
    }
}

fn dispatch_upgrade(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let hash_addr = state.registers[7] as u32;
    let min_acc_gas = state.registers[8];
    let min_memo_gas = state.registers[9];
    let Some(hash_bytes) = mem_read_or_panic(memory, state, hash_addr, 32) else { return };
    let sentinel = host.upgrade(fixed32(&hash_bytes), min_acc_gas, min_memo_gas);
    state.registers[7] = sentinel.to_u64();
}

fn dispatch_transfer(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let dest = state.registers[7];
    let amount = state.registers[8];
    let gas_limit = state.registers[9];
    let memo_addr = state.registers[10] as u32;
    let Some(memo_bytes) = mem_read_or_panic(memory, state, memo_addr, 128) else { return };
    let mut memo = [0u8; 128];
    memo.copy_from_slice(&memo_bytes);
    let sentinel = host.transfer(dest, amount, gas_limit, memo);
    state.charge_gas(gas_limit as i64);
    state.registers[7] = sentinel.to_u64();
}

fn dispatch_eject(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let service_id = state.registers[7];
    let hash_addr = state.registers[8] as u32;
    let Some(hash_bytes) = mem_read_or_panic(memory, state, hash_addr, 32) else { return };
    let sentinel = host.eject(service_id, fixed32(&hash_bytes));
    state.registers[7] = sentinel.to_u64();
}

fn dispatch_query(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let hash_addr = state.registers[7] as u32;
    let len = state.registers[8];
    let Some(hash_bytes) = mem_read_or_panic(memory, state, hash_addr, 32) else { return };
    state.registers[7] = host.query(fixed32(&hash_bytes), len);
}

fn dispatch_solicit(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let hash_addr = state.registers[7] as u32;
    let len = state.registers[8];
    let Some(hash_bytes) = mem_read_or_panic(memory, state, hash_addr, 32) else { return };
    let sentinel = host.solicit(fixed32(&hash_bytes), len);
    state.registers[7] = sentinel.to_u64();
}

fn dispatch_forget(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let hash_addr = state.registers[7] as u32;
    let len = state.registers[8];
    let Some(hash_bytes) = mem_read_or_panic(memory, state, hash_addr, 32) else { return };
    let sentinel = host.forget(fixed32(&hash_bytes), len);
    state.registers[7] = sentinel.to_u64();
}

fn dispatch_yield(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let hash_addr = state.registers[7] as u32;
    let Some(hash_bytes) = mem_read_or_panic(memory, state, hash_addr, 32) else { return };
    let sentinel = host.yield_result(fixed32(&hash_bytes));
    state.registers[7] = sentinel.to_u64();
}

fn dispatch_provide(state: &mut ExecutionState, memory: &mut dyn Memory, context: HostContext, host: &mut dyn HostCalls) {
    if !require_accumulate(state, context) {
        return;
    }
    let service_id = state.registers[7];
    let preimage_addr = state.registers[8] as u32;
    let preimage_len = state.registers[9] as u32;
    let Some(preimage) = mem_read_or_panic(memory, state, preimage_addr, preimage_len) else { return };
    let sentinel = host.provide(service_id, preimage);
    state.registers[7] = sentinel.to_u64();
}
