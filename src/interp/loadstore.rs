//! Byte<->register-value conversion for the load/store instruction family.
//! Memory access itself goes through [`crate::memory::Memory`]; this module
//! only handles the little-endian (de)composition and signed-load extension.

use crate::interp::operand::sign_extend;

pub fn value_to_bytes(value: u64, width: u32) -> Vec<u8> {
    (0..width).map(|i| (value >> (i * 8)) as u8).collect()
}

pub fn bytes_to_unsigned(bytes: &[u8]) -> u64 {
    let mut value = 0u64;
    for (i, &b) in bytes.iter().enumerate() {
        value |= u64::from(b) << (i * 8);
    }
    value
}

pub fn bytes_to_signed(bytes: &[u8]) -> u64 {
    sign_extend(bytes_to_unsigned(bytes), bytes.len() as u32)
}
