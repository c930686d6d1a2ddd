//! Fetch-decode-execute (§4.D). `step` advances the machine by exactly one
//! instruction, charging the base gas cost first and stopping (without
//! dispatching) the moment gas goes negative, mirroring the order of checks
//! in the teacher's `state_wrapper.rs::next_step_impl`.
//!
//! Opcode semantics are grounded across the teacher's `instructions/*.rs`
//! files; the operand-format helpers live in [`super::operand`] and the pure
//! per-class functions in [`super::arith`]/[`super::bitwise`]/[`super::shift`].
//! `ecalli` deliberately does not advance `pc` itself — per the spec, resume
//! advances past the yielding instruction, which [`crate::pvm::Pvm`] does
//! after the host call returns `Continue`.

use crate::config::*;
use crate::interp::arith::{self, Width};
use crate::interp::bitwise;
use crate::interp::branch::{self, Cond};
use crate::interp::loadstore;
use crate::interp::operand::*;
use crate::memory::{MemResult, Memory};
use crate::program::LoadedProgram;
use crate::state::{ExecutionState, Status};

/// Advance `state` by one instruction. Returns `false` once `state.status`
/// is no longer `Continue` (the caller should stop the fetch loop).
pub fn step(state: &mut ExecutionState, program: &LoadedProgram, memory: &mut dyn Memory) -> bool {
    if state.status != Status::Continue {
        return false;
    }
    // §4.D step 2: PC out of bounds or landing on a non-opcode byte both Panic.
    if program.code_len == 0 || state.pc as usize >= program.code_len as usize {
        state.status = Status::Panic;
        return false;
    }
    if !program.is_opcode_boundary(state.pc) {
        state.status = Status::Panic;
        return false;
    }

    state.charge_gas(1);
    if state.status == Status::OutOfGas {
        return false;
    }

    let pc = state.pc;
    let op = program.opcode_at(pc).unwrap_or(OPCODE_TRAP);
    let skip = program.skip[pc as usize] as i32;
    let operands = program.operands_at(pc).to_vec();
    let advance = 1 + skip as u32;

    #[cfg(feature = "trace-steps")]
    log::trace!("pc={pc:#x} op={op} gas={} regs={:?}", state.gas, state.registers);

    execute(op, &operands, skip, state, program, memory, advance);
    state.status == Status::Continue || state.status == Status::HostYield
}

fn jump_or_panic(state: &mut ExecutionState, program: &LoadedProgram, target: u32) {
    if program.is_opcode_boundary(target) || target == HALT_ADDRESS {
        state.pc = target;
    } else {
        state.status = Status::Panic;
    }
}

fn mem_read(memory: &mut dyn Memory, state: &mut ExecutionState, addr: u32, len: u32) -> Option<Vec<u8>> {
    match memory.read(addr, len) {
        MemResult::Ok(v) => Some(v),
        MemResult::Fault(a) => {
            state.status = Status::Fault;
            state.fault_address = a;
            None
        }
        MemResult::Panic => {
            state.status = Status::Panic;
            None
        }
    }
}

fn mem_write(memory: &mut dyn Memory, state: &mut ExecutionState, addr: u32, data: &[u8]) {
    match memory.write(addr, data) {
        MemResult::Ok(()) => {}
        MemResult::Fault(a) => {
            state.status = Status::Fault;
            state.fault_address = a;
        }
        MemResult::Panic => {
            state.status = Status::Panic;
        }
    }
}

#[allow(clippy::too_many_lines)]
fn execute(
    op: u8,
    operands: &[u8],
    skip: i32,
    state: &mut ExecutionState,
    program: &LoadedProgram,
    memory: &mut dyn Memory,
    advance: u32,
) {
    let pc = state.pc;
    let regs = &mut state.registers;

    macro_rules! fallthrough {
        () => {
            state.pc = pc.wrapping_add(advance)
        };
    }

    match op {
        OPCODE_TRAP => state.status = Status::Panic,
        OPCODE_FALLTHROUGH => fallthrough!(),

        OPCODE_ECALLI => {
            let imm = imm_unsigned(operands, 0, skip.clamp(0, 4));
            state.host_call_id = imm as u32;
            state.status = Status::HostYield;
            // pc intentionally left unmoved; Pvm advances it by `advance` on resume.
        }

        OPCODE_LOAD_IMM_64 => {
            let rd = reg_lo(operands.first().copied().unwrap_or(0));
            let value = loadstore::bytes_to_unsigned(&operands.get(1..9).unwrap_or(&[]));
            regs[rd as usize] = value;
            fallthrough!();
        }

        OPCODE_STORE_IMM_U8 | OPCODE_STORE_IMM_U16 | OPCODE_STORE_IMM_U32 | OPCODE_STORE_IMM_U64 => {
            let width = store_imm_width(op);
            let (addr_imm, value) = two_imms(operands, skip);
            let bytes = loadstore::value_to_bytes(value as u64, width);
            mem_write(memory, state, addr_imm as u32, &bytes);
            if state.status == Status::Continue {
                fallthrough!();
            }
        }

        OPCODE_JUMP => {
            let target = jump_target(operands, skip, pc);
            jump_or_panic(state, program, target);
        }

        OPCODE_JUMP_IND => {
            let (rb, imm) = reg_imm(operands, skip);
            let addr = (regs[rb as usize] as i64).wrapping_add(imm) as u32;
            indirect_jump(state, program, addr);
        }

        OPCODE_LOAD_IMM => {
            let (rd, imm) = reg_imm(operands, skip);
            regs[rd as usize] = imm as u64;
            fallthrough!();
        }

        OPCODE_LOAD_U8 | OPCODE_LOAD_I8 | OPCODE_LOAD_U16 | OPCODE_LOAD_I16 | OPCODE_LOAD_U32
        | OPCODE_LOAD_I32 | OPCODE_LOAD_U64 => {
            let (rd, addr, width, signed) = load_direct_layout(op, operands, skip);
            if let Some(bytes) = mem_read(memory, state, addr, width) {
                regs[rd as usize] = if signed {
                    loadstore::bytes_to_signed(&bytes)
                } else {
                    loadstore::bytes_to_unsigned(&bytes)
                };
                fallthrough!();
            }
        }

        OPCODE_STORE_U8 | OPCODE_STORE_U16 | OPCODE_STORE_U32 | OPCODE_STORE_U64 => {
            let width = store_direct_width(op);
            let (rs, addr) = {
                let a = reg_lo(operands.first().copied().unwrap_or(0));
                let len = (skip - 1).clamp(0, 4);
                let addr = imm_unsigned(operands, 1, len) as u32;
                (a, addr)
            };
            let bytes = loadstore::value_to_bytes(regs[rs as usize], width);
            mem_write(memory, state, addr, &bytes);
            if state.status == Status::Continue {
                fallthrough!();
            }
        }

        OPCODE_STORE_IMM_IND_U8 | OPCODE_STORE_IMM_IND_U16 | OPCODE_STORE_IMM_IND_U32
        | OPCODE_STORE_IMM_IND_U64 => {
            let width = store_imm_ind_width(op);
            let (rb, imm_addr, imm_val) = reg_two_imms(operands, skip);
            let addr = (regs[rb as usize] as i64).wrapping_add(imm_addr) as u32;
            let bytes = loadstore::value_to_bytes(imm_val as u64, width);
            mem_write(memory, state, addr, &bytes);
            if state.status == Status::Continue {
                fallthrough!();
            }
        }

        OPCODE_LOAD_IMM_JUMP => {
            let (ra, imm_x, imm_y) = reg_two_imms(operands, skip);
            regs[ra as usize] = imm_x as u64;
            let target = (pc as i64).wrapping_add(imm_y) as u32;
            jump_or_panic(state, program, target);
        }

        OPCODE_BRANCH_EQ_IMM..=OPCODE_BRANCH_GT_S_IMM => {
            let (ra, imm, target) = branch_reg_imm(operands, pc);
            let cond = branch_cond_imm(op);
            if branch::taken(cond, regs[ra as usize], imm as u64) {
                jump_or_panic(state, program, target);
            } else {
                fallthrough!();
            }
        }

        OPCODE_MOVE_REG => {
            let (d, a) = two_regs(operands);
            regs[d as usize] = regs[a as usize];
            fallthrough!();
        }

        OPCODE_SBRK => {
            let (d, a) = two_regs(operands);
            match memory.sbrk(regs[a as usize] as u32) {
                MemResult::Ok(old) => {
                    regs[d as usize] = u64::from(old);
                    fallthrough!();
                }
                MemResult::Panic | MemResult::Fault(_) => state.status = Status::Panic,
            }
        }

        OPCODE_COUNT_SET_BITS_64 | OPCODE_COUNT_SET_BITS_32
        | OPCODE_LEADING_ZERO_BITS_64 | OPCODE_LEADING_ZERO_BITS_32
        | OPCODE_TRAILING_ZERO_BITS_64 | OPCODE_TRAILING_ZERO_BITS_32
        | OPCODE_SIGN_EXTEND_8 | OPCODE_SIGN_EXTEND_16 | OPCODE_ZERO_EXTEND_16
        | OPCODE_REVERSE_BYTES => {
            let (d, a) = two_regs(operands);
            regs[d as usize] = unary_bitop(op, regs[a as usize]);
            fallthrough!();
        }

        OPCODE_STORE_IND_U8 | OPCODE_STORE_IND_U16 | OPCODE_STORE_IND_U32 | OPCODE_STORE_IND_U64 => {
            let width = store_ind_width(op);
            let (value_reg, base_reg, imm) = two_regs_imm(operands, skip);
            let addr = (regs[base_reg as usize] as i64).wrapping_add(imm) as u32;
            let bytes = loadstore::value_to_bytes(regs[value_reg as usize], width);
            mem_write(memory, state, addr, &bytes);
            if state.status == Status::Continue {
                fallthrough!();
            }
        }

        OPCODE_LOAD_IND_U8 | OPCODE_LOAD_IND_I8 | OPCODE_LOAD_IND_U16 | OPCODE_LOAD_IND_I16
        | OPCODE_LOAD_IND_U32 | OPCODE_LOAD_IND_I32 | OPCODE_LOAD_IND_U64 => {
            let (width, signed) = load_ind_layout(op);
            let (dest_reg, base_reg, imm) = two_regs_imm(operands, skip);
            let addr = (regs[base_reg as usize] as i64).wrapping_add(imm) as u32;
            if let Some(bytes) = mem_read(memory, state, addr, width) {
                regs[dest_reg as usize] = if signed {
                    loadstore::bytes_to_signed(&bytes)
                } else {
                    loadstore::bytes_to_unsigned(&bytes)
                };
                fallthrough!();
            }
        }

        OPCODE_ADD_IMM_32..=OPCODE_ROT_R_32_IMM_ALT => {
            reg_imm_alu(op, operands, skip, regs);
            fallthrough!();
        }

        OPCODE_BRANCH_EQ..=OPCODE_BRANCH_GE_S => {
            let (ra, rb, target) = branch_two_regs(operands, pc);
            let cond = branch_cond_reg(op);
            if branch::taken(cond, regs[ra as usize], regs[rb as usize]) {
                jump_or_panic(state, program, target);
            } else {
                fallthrough!();
            }
        }

        OPCODE_LOAD_IMM_JUMP_IND => {
            let (ra, rb, imm_x, imm_y) = two_regs_two_imms(operands, skip);
            let rb_value = regs[rb as usize];
            let addr = (rb_value as i64).wrapping_add(imm_y) as u32;
            regs[ra as usize] = imm_x as u64;
            indirect_jump(state, program, addr);
        }

        OPCODE_ADD_32..=OPCODE_MIN_U => {
            reg_reg_alu(op, operands, regs);
            fallthrough!();
        }

        _ => state.status = Status::Panic,
    }
}

fn indirect_jump(state: &mut ExecutionState, program: &LoadedProgram, addr: u32) {
    if addr == HALT_ADDRESS {
        state.status = Status::Halt;
        return;
    }
    if addr == 0 || addr % DYNAMIC_ADDRESS_ALIGNMENT != 0 {
        state.status = Status::Panic;
        return;
    }
    let index = (addr / DYNAMIC_ADDRESS_ALIGNMENT) as usize;
    if index == 0 || index - 1 >= program.jump_table.len() {
        state.status = Status::Panic;
        return;
    }
    let target = program.jump_table[index - 1];
    jump_or_panic(state, program, target);
}

fn store_imm_width(op: u8) -> u32 {
    match op {
        OPCODE_STORE_IMM_U8 => 1,
        OPCODE_STORE_IMM_U16 => 2,
        OPCODE_STORE_IMM_U32 => 4,
        _ => 8,
    }
}

fn store_direct_width(op: u8) -> u32 {
    match op {
        OPCODE_STORE_U8 => 1,
        OPCODE_STORE_U16 => 2,
        OPCODE_STORE_U32 => 4,
        _ => 8,
    }
}

fn store_imm_ind_width(op: u8) -> u32 {
    match op {
        OPCODE_STORE_IMM_IND_U8 => 1,
        OPCODE_STORE_IMM_IND_U16 => 2,
        OPCODE_STORE_IMM_IND_U32 => 4,
        _ => 8,
    }
}

fn store_ind_width(op: u8) -> u32 {
    match op {
        OPCODE_STORE_IND_U8 => 1,
        OPCODE_STORE_IND_U16 => 2,
        OPCODE_STORE_IND_U32 => 4,
        _ => 8,
    }
}

fn load_ind_layout(op: u8) -> (u32, bool) {
    match op {
        OPCODE_LOAD_IND_U8 => (1, false),
        OPCODE_LOAD_IND_I8 => (1, true),
        OPCODE_LOAD_IND_U16 => (2, false),
        OPCODE_LOAD_IND_I16 => (2, true),
        OPCODE_LOAD_IND_U32 => (4, false),
        OPCODE_LOAD_IND_I32 => (4, true),
        _ => (8, false),
    }
}

fn load_direct_layout(op: u8, operands: &[u8], skip: i32) -> (u8, u32, u32, bool) {
    let rd = reg_lo(operands.first().copied().unwrap_or(0));
    let len = (skip - 1).clamp(0, 4);
    let addr = imm_unsigned(operands, 1, len) as u32;
    let (width, signed) = match op {
        OPCODE_LOAD_U8 => (1, false),
        OPCODE_LOAD_I8 => (1, true),
        OPCODE_LOAD_U16 => (2, false),
        OPCODE_LOAD_I16 => (2, true),
        OPCODE_LOAD_U32 => (4, false),
        OPCODE_LOAD_I32 => (4, true),
        _ => (8, false),
    };
    (rd, addr, width, signed)
}

fn unary_bitop(op: u8, value: u64) -> u64 {
    match op {
        OPCODE_COUNT_SET_BITS_64 => arith::count_set_bits(value, Width::W64),
        OPCODE_COUNT_SET_BITS_32 => arith::count_set_bits(value, Width::W32),
        OPCODE_LEADING_ZERO_BITS_64 => arith::leading_zero_bits(value, Width::W64),
        OPCODE_LEADING_ZERO_BITS_32 => arith::leading_zero_bits(value, Width::W32),
        OPCODE_TRAILING_ZERO_BITS_64 => arith::trailing_zero_bits(value, Width::W64),
        OPCODE_TRAILING_ZERO_BITS_32 => arith::trailing_zero_bits(value, Width::W32),
        OPCODE_SIGN_EXTEND_8 => arith::sign_extend_8(value),
        OPCODE_SIGN_EXTEND_16 => arith::sign_extend_16(value),
        OPCODE_ZERO_EXTEND_16 => arith::zero_extend_16(value),
        _ => arith::reverse_bytes(value),
    }
}

fn branch_cond_imm(op: u8) -> Cond {
    match op {
        OPCODE_BRANCH_EQ_IMM => Cond::Eq,
        OPCODE_BRANCH_NE_IMM => Cond::Ne,
        OPCODE_BRANCH_LT_U_IMM => Cond::LtU,
        OPCODE_BRANCH_LE_U_IMM => Cond::LeU,
        OPCODE_BRANCH_GE_U_IMM => Cond::GeU,
        OPCODE_BRANCH_GT_U_IMM => Cond::GtU,
        OPCODE_BRANCH_LT_S_IMM => Cond::LtS,
        OPCODE_BRANCH_LE_S_IMM => Cond::LeS,
        OPCODE_BRANCH_GE_S_IMM => Cond::GeS,
        _ => Cond::GtS,
    }
}

fn branch_cond_reg(op: u8) -> Cond {
    match op {
        OPCODE_BRANCH_EQ => Cond::Eq,
        OPCODE_BRANCH_NE => Cond::Ne,
        OPCODE_BRANCH_LT_U => Cond::LtU,
        OPCODE_BRANCH_LT_S => Cond::LtS,
        OPCODE_BRANCH_GE_U => Cond::GeU,
        _ => Cond::GeS,
    }
}

/// `op_imm rd=register_a, rb=register_b, imm`: immediate ALU ops, per the
/// teacher's `parse_two_registers_and_immediate` layout (r_A = destination).
/// `_ALT` opcodes reverse operand roles for non-commutative operations.
fn reg_imm_alu(op: u8, operands: &[u8], skip: i32, regs: &mut [u64; 13]) {
    let (a, b, imm) = two_regs_imm(operands, skip);
    let rb = regs[b as usize];
    let imm_u = imm as u64;
    let result = match op {
        OPCODE_ADD_IMM_32 => arith::add(rb, imm_u, Width::W32),
        OPCODE_AND_IMM => bitwise::and(rb, imm_u),
        OPCODE_XOR_IMM => bitwise::xor(rb, imm_u),
        OPCODE_OR_IMM => bitwise::or(rb, imm_u),
        OPCODE_MUL_IMM_32 => arith::mul(rb, imm_u, Width::W32),
        OPCODE_SET_LT_U_IMM => bitwise::set_lt_u(rb, imm_u),
        OPCODE_SET_LT_S_IMM => bitwise::set_lt_s(rb, imm_u),
        OPCODE_SHLO_L_IMM_32 => crate::interp::shift::shlo_l(rb, imm_u, Width::W32),
        OPCODE_SHLO_R_IMM_32 => crate::interp::shift::shlo_r(rb, imm_u, Width::W32),
        OPCODE_SHAR_R_IMM_32 => crate::interp::shift::shar_r(rb, imm_u, Width::W32),
        OPCODE_NEG_ADD_IMM_32 => arith::neg_add(imm_u, rb, Width::W32),
        OPCODE_SET_GT_U_IMM => bitwise::set_gt_u(rb, imm_u),
        OPCODE_SET_GT_S_IMM => bitwise::set_gt_s(rb, imm_u),
        OPCODE_SHLO_L_IMM_ALT_32 => crate::interp::shift::shlo_l(imm_u, rb, Width::W32),
        OPCODE_SHLO_R_IMM_ALT_32 => crate::interp::shift::shlo_r(imm_u, rb, Width::W32),
        OPCODE_SHAR_R_IMM_ALT_32 => crate::interp::shift::shar_r(imm_u, rb, Width::W32),
        OPCODE_CMOV_IZ_IMM => bitwise::cmov_iz(regs[a as usize], imm_u, rb),
        OPCODE_CMOV_NZ_IMM => bitwise::cmov_nz(regs[a as usize], imm_u, rb),
        OPCODE_ADD_IMM_64 => arith::add(rb, imm_u, Width::W64),
        OPCODE_MUL_IMM_64 => arith::mul(rb, imm_u, Width::W64),
        OPCODE_SHLO_L_IMM_64 => crate::interp::shift::shlo_l(rb, imm_u, Width::W64),
        OPCODE_SHLO_R_IMM_64 => crate::interp::shift::shlo_r(rb, imm_u, Width::W64),
        OPCODE_SHAR_R_IMM_64 => crate::interp::shift::shar_r(rb, imm_u, Width::W64),
        OPCODE_NEG_ADD_IMM_64 => arith::neg_add(imm_u, rb, Width::W64),
        OPCODE_SHLO_L_IMM_ALT_64 => crate::interp::shift::shlo_l(imm_u, rb, Width::W64),
        OPCODE_SHLO_R_IMM_ALT_64 => crate::interp::shift::shlo_r(imm_u, rb, Width::W64),
        OPCODE_SHAR_R_IMM_ALT_64 => crate::interp::shift::shar_r(imm_u, rb, Width::W64),
        OPCODE_ROT_R_64_IMM => crate::interp::shift::rot_r(rb, imm_u, Width::W64),
        OPCODE_ROT_R_64_IMM_ALT => crate::interp::shift::rot_r(imm_u, rb, Width::W64),
        OPCODE_ROT_R_32_IMM => crate::interp::shift::rot_r(rb, imm_u, Width::W32),
        _ => crate::interp::shift::rot_r(imm_u, rb, Width::W32),
    };
    regs[a as usize] = result;
}

/// `op rd, ra, rb`: register-register ALU, per `three_regs` layout.
fn reg_reg_alu(op: u8, operands: &[u8], regs: &mut [u64; 13]) {
    let (d, a, b) = three_regs(operands);
    let (ra, rb) = (regs[a as usize], regs[b as usize]);
    let result = match op {
        OPCODE_ADD_32 => arith::add(ra, rb, Width::W32),
        OPCODE_SUB_32 => arith::sub(ra, rb, Width::W32),
        OPCODE_MUL_32 => arith::mul(ra, rb, Width::W32),
        OPCODE_DIV_U_32 => arith::div_u(ra, rb, Width::W32),
        OPCODE_DIV_S_32 => arith::div_s(ra, rb, Width::W32),
        OPCODE_REM_U_32 => arith::rem_u(ra, rb, Width::W32),
        OPCODE_REM_S_32 => arith::rem_s(ra, rb, Width::W32),
        OPCODE_SHLO_L_32 => crate::interp::shift::shlo_l(ra, rb, Width::W32),
        OPCODE_SHLO_R_32 => crate::interp::shift::shlo_r(ra, rb, Width::W32),
        OPCODE_SHAR_R_32 => crate::interp::shift::shar_r(ra, rb, Width::W32),
        OPCODE_ADD_64 => arith::add(ra, rb, Width::W64),
        OPCODE_SUB_64 => arith::sub(ra, rb, Width::W64),
        OPCODE_MUL_64 => arith::mul(ra, rb, Width::W64),
        OPCODE_DIV_U_64 => arith::div_u(ra, rb, Width::W64),
        OPCODE_DIV_S_64 => arith::div_s(ra, rb, Width::W64),
        OPCODE_REM_U_64 => arith::rem_u(ra, rb, Width::W64),
        OPCODE_REM_S_64 => arith::rem_s(ra, rb, Width::W64),
        OPCODE_SHLO_L_64 => crate::interp::shift::shlo_l(ra, rb, Width::W64),
        OPCODE_SHLO_R_64 => crate::interp::shift::shlo_r(ra, rb, Width::W64),
        OPCODE_SHAR_R_64 => crate::interp::shift::shar_r(ra, rb, Width::W64),
        OPCODE_AND => bitwise::and(ra, rb),
        OPCODE_XOR => bitwise::xor(ra, rb),
        OPCODE_OR => bitwise::or(ra, rb),
        OPCODE_MUL_UPPER_S_S => arith::mul_upper_ss(ra, rb),
        OPCODE_MUL_UPPER_U_U => arith::mul_upper_uu(ra, rb),
        OPCODE_MUL_UPPER_S_U => arith::mul_upper_su(ra, rb),
        OPCODE_SET_LT_U => bitwise::set_lt_u(ra, rb),
        OPCODE_SET_LT_S => bitwise::set_lt_s(ra, rb),
        OPCODE_CMOV_IZ => bitwise::cmov_iz(regs[d as usize], ra, rb),
        OPCODE_CMOV_NZ => bitwise::cmov_nz(regs[d as usize], ra, rb),
        OPCODE_ROT_L_64 => crate::interp::shift::rot_l(ra, rb, Width::W64),
        OPCODE_ROT_L_32 => crate::interp::shift::rot_l(ra, rb, Width::W32),
        OPCODE_ROT_R_64 => crate::interp::shift::rot_r(ra, rb, Width::W64),
        OPCODE_ROT_R_32 => crate::interp::shift::rot_r(ra, rb, Width::W32),
        OPCODE_AND_INV => bitwise::and_inv(ra, rb),
        OPCODE_OR_INV => bitwise::or_inv(ra, rb),
        OPCODE_XNOR => bitwise::xnor(ra, rb),
        OPCODE_MAX => arith::max_s(ra, rb),
        OPCODE_MAX_U => arith::max_u(ra, rb),
        OPCODE_MIN => arith::min_s(ra, rb),
        _ => arith::min_u(ra, rb),
    };
    regs[d as usize] = result;
}
