//! Register file and execution state (§4.C), and the `Status` enum that
//! replaces the teacher's `RESULT_CODE_*` byte constants with a typed match.
//!
//! Grounded in `types.rs::RegisterState`/`InstructionResult` and the initial
//! register wiring the teacher computes in `state_wrapper.rs`.

use crate::config;

/// 13 general-purpose 64-bit registers, `r0..r12`.
pub type Registers = [u64; 13];

/// Terminal or in-progress status of an invocation (§3, §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Continue,
    Halt,
    Panic,
    Fault,
    OutOfGas,
    HostYield,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Continue | Status::HostYield)
    }
}

/// Mutable execution state for one invocation (or one inner machine).
#[derive(Clone, Debug)]
pub struct ExecutionState {
    pub pc: u32,
    /// Signed so that going negative is itself the out-of-gas signal.
    pub gas: i64,
    pub registers: Registers,
    pub status: Status,
    /// Valid only when `status == HostYield`.
    pub host_call_id: u32,
    /// Page fault address surfaced on `Status::Fault`, for diagnostics.
    pub fault_address: u32,
}

impl ExecutionState {
    /// Initial state for an invocation entering at `entry` with `input` bytes
    /// mapped at the argument segment (§4.C equations 803-811).
    pub fn new(entry: u32, gas_budget: i64, input_len: u32) -> Self {
        let mut registers = [0u64; 13];
        registers[0] = config::HALT_ADDRESS;
        registers[1] = config::STACK_SEGMENT_END;
        registers[7] = config::ARGS_SEGMENT_START;
        registers[8] = u64::from(input_len);

        Self {
            pc: entry,
            gas: gas_budget,
            registers,
            status: Status::Continue,
            host_call_id: 0,
            fault_address: 0,
        }
    }

    pub fn charge_gas(&mut self, amount: i64) {
        self.gas -= amount;
        if self.gas < 0 {
            self.status = Status::OutOfGas;
        }
    }
}
