//! Program blob decoder (§4.A): varint codec, code-blob (deblob) format, and the
//! outer program container that wraps RO/RW data and stack sizing around it.
//!
//! Grounded in the teacher's `codec/impl_.rs` (`decode_natural`/`encode_natural`,
//! `decode_blob`/`encode_blob`, `decode_program`), upgraded from `Option` to a
//! typed `DecodeError` so callers can tell truncation apart from a bad
//! jump-table reference (the two failure conditions named in the spec).

use crate::error::DecodeError;

/// A decoded natural-number varint: its value and how many bytes it consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Natural {
    pub value: u64,
    pub consumed: usize,
}

/// Decode a single varint-encoded natural number from the front of `data`.
///
/// A single-byte prefix with `k` leading 1-bits selects a payload width of `k`
/// additional little-endian bytes; the low `7-k` bits of the prefix supply the
/// high bits of the value. `0x00` is the literal zero; `0xff` is the 9-byte
/// widest form (covers the full `u64` range).
pub fn decode_natural(data: &[u8]) -> Result<Natural, DecodeError> {
    let first = *data.first().ok_or(DecodeError::Truncated { field: "varint prefix" })?;

    if first == 0 {
        return Ok(Natural { value: 0, consumed: 1 });
    }
    if first == 0xff {
        if data.len() < 9 {
            return Err(DecodeError::VarintTruncated { needed: 9, available: data.len() });
        }
        let mut value: u64 = 0;
        for (i, &b) in data[1..9].iter().enumerate() {
            value |= u64::from(b) << (i * 8);
        }
        return Ok(Natural { value, consumed: 9 });
    }
    if (1..=127).contains(&first) {
        return Ok(Natural { value: u64::from(first), consumed: 1 });
    }

    // first is 128..=254: find the prefix-class l in 1..=8 whose [min_prefix, max_prefix]
    // range contains `first`. l leading ones in the prefix byte means l extra payload bytes.
    let mut width = 0usize;
    for l in 1..=8usize {
        let shift = 8 - l;
        let min_prefix: u64 = 256u64.saturating_sub(1 << shift);
        let max_suffix = (1u64 << (7 * (l + 1))).saturating_sub(1) >> (8 * l);
        let max_prefix = min_prefix.saturating_add(max_suffix);
        if u64::from(first) >= min_prefix && u64::from(first) <= max_prefix {
            width = l;
            break;
        }
    }
    if width == 0 {
        return Err(DecodeError::InvalidVarintPrefix(first));
    }
    if data.len() < 1 + width {
        return Err(DecodeError::VarintTruncated { needed: 1 + width, available: data.len() });
    }

    let shift = 8 - width;
    let prefix_base: u64 = 256u64.saturating_sub(1 << shift);
    let high_bits = (u64::from(first) - prefix_base) << (8 * width);
    let mut low_bits: u64 = 0;
    for (i, &b) in data[1..1 + width].iter().enumerate() {
        low_bits |= u64::from(b) << (i * 8);
    }
    Ok(Natural { value: high_bits | low_bits, consumed: 1 + width })
}

/// Encode a natural number in the same variable-length form `decode_natural` reads.
pub fn encode_natural(value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    if value >= 1 << 56 {
        let mut out = vec![0xff; 9];
        for (i, b) in out[1..9].iter_mut().enumerate() {
            *b = (value >> (i * 8)) as u8;
        }
        return out;
    }
    if (1..=127).contains(&value) {
        return vec![value as u8];
    }
    let mut l = 1usize;
    while l <= 8 && value >= (1u64 << (7 * (l + 1))) {
        l += 1;
    }
    let prefix_base = 256u64 - (1u64 << (8 - l));
    let high_bits = value >> (8 * l);
    let prefix = prefix_base + high_bits;
    let suffix = value & ((1u64 << (8 * l)) - 1);

    let mut out = vec![0u8; 1 + l];
    out[0] = prefix as u8;
    for (i, b) in out[1..].iter_mut().enumerate() {
        *b = (suffix >> (i * 8)) as u8;
    }
    out
}

fn read_le_fixed(data: &[u8], offset: usize, bytes: usize, field: &'static str) -> Result<u32, DecodeError> {
    if offset + bytes > data.len() {
        return Err(DecodeError::Truncated { field });
    }
    let mut value: u32 = 0;
    for (i, &b) in data[offset..offset + bytes].iter().enumerate() {
        value |= u32::from(b) << (i * 8);
    }
    Ok(value)
}

/// The decoded code blob: instruction bytes, opcode-boundary bitmask (one byte
/// per code position, 0/1), jump table, and jump-table entry width.
#[derive(Clone, Debug)]
pub struct CodeBlob {
    pub code: Vec<u8>,
    pub mask: Vec<u8>,
    pub jump_table: Vec<u32>,
    pub jt_width: u8,
}

/// Decode `varint(|jt|) ‖ E1(jt_width) ‖ varint(|code|) ‖ jt_entries ‖ code ‖ mask_bits`.
///
/// `mask_bits` is `ceil(|code|/8)` bytes, LSB-first per byte: bit `i` of byte
/// `i/8` is the mask value for code position `i`.
pub fn decode_code_blob(blob: &[u8]) -> Result<CodeBlob, DecodeError> {
    let mut offset = 0usize;

    let jt_len = decode_natural(&blob[offset..])?;
    offset += jt_len.consumed;

    let jt_width = *blob.get(offset).ok_or(DecodeError::Truncated { field: "jt_width" })?;
    offset += 1;

    let code_len = decode_natural(&blob[offset..])?;
    offset += code_len.consumed;

    let jt_entries_size = jt_len.value as usize * jt_width as usize;
    if offset + jt_entries_size > blob.len() {
        return Err(DecodeError::LengthExceedsRemaining {
            field: "jump_table",
            declared: jt_entries_size,
            remaining: blob.len() - offset,
        });
    }
    let mut jump_table = Vec::with_capacity(jt_len.value as usize);
    for i in 0..jt_len.value as usize {
        let start = offset + i * jt_width as usize;
        let mut value = 0u32;
        for (j, &b) in blob[start..start + jt_width as usize].iter().enumerate() {
            value |= u32::from(b) << (j * 8);
        }
        jump_table.push(value);
    }
    offset += jt_entries_size;

    let code_len = code_len.value as usize;
    if offset + code_len > blob.len() {
        return Err(DecodeError::LengthExceedsRemaining {
            field: "code",
            declared: code_len,
            remaining: blob.len() - offset,
        });
    }
    let code = blob[offset..offset + code_len].to_vec();
    offset += code_len;

    let mask_len = (code_len + 7) / 8;
    let available = blob.len() - offset;
    if available < mask_len {
        return Err(DecodeError::LengthExceedsRemaining {
            field: "mask_bits",
            declared: mask_len,
            remaining: available,
        });
    }
    let mut mask = vec![0u8; code_len];
    let mut bit_index = 0usize;
    for &packed in &blob[offset..offset + mask_len] {
        for i in 0..8 {
            if bit_index >= code_len {
                break;
            }
            mask[bit_index] = ((packed >> i) & 1) as u8;
            bit_index += 1;
        }
    }

    for (&entry, idx) in jump_table.iter().zip(0..) {
        if (entry as usize) < mask.len() && mask[entry as usize] == 0 {
            return Err(DecodeError::JumpTableTargetNotOpcode { index: idx, offset: entry });
        }
    }

    Ok(CodeBlob { code, mask, jump_table, jt_width })
}

/// Re-serialize a [`CodeBlob`], inverse of [`decode_code_blob`].
pub fn encode_code_blob(blob: &CodeBlob) -> Vec<u8> {
    let mut out = encode_natural(blob.jump_table.len() as u64);
    out.push(blob.jt_width);
    out.extend(encode_natural(blob.code.len() as u64));
    for &entry in &blob.jump_table {
        for i in 0..blob.jt_width {
            out.push((entry >> (i * 8)) as u8);
        }
    }
    out.extend_from_slice(&blob.code);
    let mask_len = (blob.code.len() + 7) / 8;
    let mut packed = vec![0u8; mask_len];
    for (i, &bit) in blob.mask.iter().enumerate() {
        if bit != 0 {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    out.extend(packed);
    out
}

/// The fully decoded program blob (§3 "Program Blob"): code/mask/jump-table
/// plus the RO/RW data segments and stack sizing that drive initial memory layout.
#[derive(Clone, Debug)]
pub struct Program {
    pub ro_data: Vec<u8>,
    pub rw_data: Vec<u8>,
    /// The 2-byte header field. Per the teacher's working memory-layout code this
    /// is the heap zero-padding page count, not a stack page count (see DESIGN.md).
    pub heap_zero_padding_pages: u16,
    /// The 3-byte header field: stack size in bytes.
    pub stack_bytes: u32,
    pub code: CodeBlob,
}

/// Decode `E3(|o|) ‖ E3(|w|) ‖ E2(z) ‖ E3(s) ‖ o ‖ w ‖ E4(|c|) ‖ c`.
pub fn decode_program(blob: &[u8]) -> Result<Program, DecodeError> {
    let mut offset = 0usize;
    let ro_len = read_le_fixed(blob, offset, 3, "ro_data_length")? as usize;
    offset += 3;
    let rw_len = read_le_fixed(blob, offset, 3, "rw_data_length")? as usize;
    offset += 3;
    let heap_zero_padding_pages = read_le_fixed(blob, offset, 2, "heap_zero_padding_size")? as u16;
    offset += 2;
    let stack_bytes = read_le_fixed(blob, offset, 3, "stack_size")?;
    offset += 3;

    if offset + ro_len > blob.len() {
        return Err(DecodeError::LengthExceedsRemaining {
            field: "ro_data",
            declared: ro_len,
            remaining: blob.len() - offset,
        });
    }
    let ro_data = blob[offset..offset + ro_len].to_vec();
    offset += ro_len;

    if offset + rw_len > blob.len() {
        return Err(DecodeError::LengthExceedsRemaining {
            field: "rw_data",
            declared: rw_len,
            remaining: blob.len() - offset,
        });
    }
    let rw_data = blob[offset..offset + rw_len].to_vec();
    offset += rw_len;

    let code_len = read_le_fixed(blob, offset, 4, "code_blob_length")? as usize;
    offset += 4;
    if offset + code_len > blob.len() {
        return Err(DecodeError::LengthExceedsRemaining {
            field: "code_blob",
            declared: code_len,
            remaining: blob.len() - offset,
        });
    }
    let code = decode_code_blob(&blob[offset..offset + code_len])?;

    Ok(Program { ro_data, rw_data, heap_zero_padding_pages, stack_bytes, code })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trip_small_values() {
        for v in [0u64, 1, 42, 127] {
            let encoded = encode_natural(v);
            let decoded = decode_natural(&encoded).unwrap();
            assert_eq!(decoded.value, v);
            assert_eq!(decoded.consumed, encoded.len());
        }
    }

    #[test]
    fn varint_round_trip_wide_values() {
        for v in [128u64, 1000, 1 << 20, 1 << 40, u64::MAX] {
            let encoded = encode_natural(v);
            let decoded = decode_natural(&encoded).unwrap();
            assert_eq!(decoded.value, v);
            assert_eq!(decoded.consumed, encoded.len());
        }
    }

    #[test]
    fn decode_natural_truncated() {
        assert!(matches!(decode_natural(&[]), Err(DecodeError::Truncated { .. })));
        assert!(matches!(decode_natural(&[0xff, 1, 2]), Err(DecodeError::VarintTruncated { .. })));
    }

    #[test]
    fn code_blob_round_trip() {
        let blob = CodeBlob {
            code: vec![0, 1, 40, 0, 0, 50],
            mask: vec![1, 1, 1, 0, 0, 1],
            jump_table: vec![2],
            jt_width: 2,
        };
        let encoded = encode_code_blob(&blob);
        let decoded = decode_code_blob(&encoded).unwrap();
        assert_eq!(decoded.code, blob.code);
        assert_eq!(decoded.mask, blob.mask);
        assert_eq!(decoded.jump_table, blob.jump_table);
    }

    #[test]
    fn jump_table_target_must_be_opcode() {
        let blob = CodeBlob {
            code: vec![0, 1],
            mask: vec![1, 0],
            jump_table: vec![1],
            jt_width: 2,
        };
        let encoded = encode_code_blob(&blob);
        assert!(matches!(
            decode_code_blob(&encoded),
            Err(DecodeError::JumpTableTargetNotOpcode { .. })
        ));
    }
}
