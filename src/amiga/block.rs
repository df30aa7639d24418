//! Shared raw block access: every AmigaDOS structure in this module is a 512-byte unit within a
//! flat block array, addressed by block number.

use crate::error::{kinds, UffError};

pub const BLOCK_SIZE: usize = 512;

pub fn block_slice(data: &[u8], block_id: u32) -> Result<&[u8], UffError> {
    let offset = block_id as usize * BLOCK_SIZE;
    data.get(offset..offset + BLOCK_SIZE)
        .ok_or_else(|| kinds::truncated_input().with_context(format!("block {block_id} is outside the image")))
}

pub fn block_slice_mut(data: &mut [u8], block_id: u32) -> Result<&mut [u8], UffError> {
    let offset = block_id as usize * BLOCK_SIZE;
    let len = data.len();
    if offset + BLOCK_SIZE > len {
        return Err(kinds::truncated_input().with_context(format!("block {block_id} is outside the image")));
    }
    Ok(&mut data[offset..offset + BLOCK_SIZE])
}

pub fn read_u32(block: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(block[offset..offset + 4].try_into().unwrap())
}

pub fn read_i32(block: &[u8], offset: usize) -> i32 {
    i32::from_be_bytes(block[offset..offset + 4].try_into().unwrap())
}

pub fn write_u32(block: &mut [u8], offset: usize, value: u32) {
    block[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}
