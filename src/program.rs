//! Loaded program: the immutable, already-decoded view of a blob that the
//! interpreter walks — code, mask, jump table, and the precomputed
//! skip-distance array that gives O(1) instruction length lookup.
//!
//! Grounded in the teacher's `parser.rs::PvmParser` (`skip`/`parse_program`),
//! generalized from "parse into a `Vec<PvmInstruction>`" (a WASM-test-harness
//! convenience the teacher needed for instruction-level unit tests) to
//! "precompute a skip table the fetch loop indexes directly" — dispatch decodes
//! operands itself at execution time, matching §4.D's fetch-decode-execute
//! contract rather than pre-decoding every instruction up front.

use crate::codec::{self, CodeBlob};
use crate::error::DecodeError;

/// Distance, in bytes, scanned ahead of any opcode position before giving up
/// and capping at 24 (§4.D "Skip-distance semantics").
const MAX_SKIP: usize = 24;
/// Trailing zero bytes appended after the real code so fetch never reads past
/// the end of the backing `Vec` while still hitting a mask-false/Panic byte.
const CODE_PADDING: usize = 16;

/// A decoded and skip-precomputed program, ready to execute.
#[derive(Clone, Debug)]
pub struct LoadedProgram {
    pub code: Vec<u8>,
    pub mask: Vec<u8>,
    pub jump_table: Vec<u32>,
    pub jt_width: u8,
    /// `skip[i]` is only meaningful where `mask[i] == 1`.
    pub skip: Vec<u8>,
    pub ro_data: Vec<u8>,
    pub rw_data: Vec<u8>,
    pub heap_zero_padding_pages: u16,
    pub stack_bytes: u32,
    /// Length of the real code, before the zero-padding tail.
    pub code_len: u32,
}

impl LoadedProgram {
    pub fn decode(blob: &[u8]) -> Result<Self, DecodeError> {
        let program = codec::decode_program(blob)?;
        Ok(Self::from_code_blob(program.code, program.ro_data, program.rw_data, program.heap_zero_padding_pages, program.stack_bytes))
    }

    fn from_code_blob(
        code_blob: CodeBlob,
        ro_data: Vec<u8>,
        rw_data: Vec<u8>,
        heap_zero_padding_pages: u16,
        stack_bytes: u32,
    ) -> Self {
        let code_len = code_blob.code.len() as u32;
        let padded_len = code_blob.code.len() + CODE_PADDING;

        let mut code = vec![0u8; padded_len];
        code[..code_blob.code.len()].copy_from_slice(&code_blob.code);

        let mut mask = vec![1u8; padded_len];
        mask[..code_blob.mask.len()].copy_from_slice(&code_blob.mask);

        let skip = compute_skip_table(&mask);

        Self {
            code,
            mask,
            jump_table: code_blob.jump_table,
            jt_width: code_blob.jt_width,
            skip,
            ro_data,
            rw_data,
            heap_zero_padding_pages,
            stack_bytes,
            code_len,
        }
    }

    /// True iff `pc` is within the real (unpadded) code and begins an instruction.
    pub fn is_opcode_boundary(&self, pc: u32) -> bool {
        (pc as usize) < self.code_len as usize
            && (pc as usize) < self.mask.len()
            && self.mask[pc as usize] == 1
    }

    pub fn opcode_at(&self, pc: u32) -> Option<u8> {
        self.code.get(pc as usize).copied()
    }

    /// Operand bytes following the opcode at `pc`, per the precomputed skip distance.
    pub fn operands_at(&self, pc: u32) -> &[u8] {
        let skip = self.skip[pc as usize] as usize;
        let start = pc as usize + 1;
        let end = (start + skip).min(self.code.len());
        &self.code[start..end]
    }

    /// Reconstructs the `codec::Program` view [`crate::memory::Memory::init_layout`]
    /// wants (RO/RW data, stack/heap sizing), undoing the split this struct does
    /// for the interpreter's sake.
    pub fn layout_view(&self) -> codec::Program {
        codec::Program {
            ro_data: self.ro_data.clone(),
            rw_data: self.rw_data.clone(),
            heap_zero_padding_pages: self.heap_zero_padding_pages,
            stack_bytes: self.stack_bytes,
            code: CodeBlob {
                code: self.code[..self.code_len as usize].to_vec(),
                mask: self.mask[..self.code_len as usize].to_vec(),
                jump_table: self.jump_table.clone(),
                jt_width: self.jt_width,
            },
        }
    }
}

/// `Fskip(i) = min(24, next j>i with mask[j]=true) - i` for every opcode position.
fn compute_skip_table(mask: &[u8]) -> Vec<u8> {
    let mut skip = vec![0u8; mask.len()];
    for i in 0..mask.len() {
        if mask[i] != 1 {
            continue;
        }
        let mut dist = MAX_SKIP;
        for j in 1..=MAX_SKIP {
            let k = i + j;
            if k >= mask.len() || mask[k] == 1 {
                dist = j - 1;
                break;
            }
        }
        skip[i] = dist as u8;
    }
    skip
}

/// Validates that a branch/jump target lands on an opcode boundary (§4.D, invariant 4).
pub fn is_valid_branch_target(program: &LoadedProgram, target: u32) -> bool {
    program.is_opcode_boundary(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodeBlob;

    fn program_from(code: Vec<u8>, mask: Vec<u8>) -> LoadedProgram {
        LoadedProgram::from_code_blob(
            CodeBlob { code, mask, jump_table: vec![], jt_width: 2 },
            vec![],
            vec![],
            0,
            0,
        )
    }

    #[test]
    fn skip_caps_at_24_with_no_following_opcode() {
        let code = vec![0u8; 30];
        let mut mask = vec![0u8; 30];
        mask[0] = 1;
        let program = program_from(code, mask);
        assert_eq!(program.skip[0], 24);
    }

    #[test]
    fn skip_finds_next_opcode_boundary() {
        let code = vec![0u8; 5];
        let mask = vec![1, 0, 0, 1, 0];
        let program = program_from(code, mask);
        assert_eq!(program.skip[0], 2);
    }
}
