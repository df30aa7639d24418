//! AmigaDOS free-space bitmap (§4.7 "Bitmap semantics"/"Bitmap repair"): bit position math plus
//! the load/query/mutate/rebuild operations layered over an image's raw blocks.

use super::block::{block_slice, block_slice_mut, BLOCK_SIZE};
use super::checksum;
use crate::error::{kinds, UffError};

/// 127 longwords of bitmap bits follow the leading checksum longword in every bitmap block.
pub const LONGWORDS_PER_BITMAP_BLOCK: usize = 127;
pub const BITS_PER_BITMAP_BLOCK: usize = LONGWORDS_PER_BITMAP_BLOCK * 32;

/// Maps an absolute block number (`b >= 2`) to `(bitmap_block_index, longword_index, bit_index)`,
/// per §4.7's `rel = b - 2`, `bm_index = rel / (32*127)`, `word = (rel mod (32*127)) / 32`,
/// `bit = 31 - (rel mod 32)`.
pub fn bit_position(block: u32) -> (usize, usize, u32) {
    let rel = block as usize - 2;
    let bm_index = rel / BITS_PER_BITMAP_BLOCK;
    let word = (rel % BITS_PER_BITMAP_BLOCK) / 32;
    let bit = 31 - (rel % 32) as u32;
    (bm_index, word, bit)
}

/// Whether `block` is marked free in the bitmap rooted at `bitmap_block_ids` (bit = 1 means
/// free).
pub fn is_free(data: &[u8], bitmap_block_ids: &[u32], block: u32) -> Result<bool, UffError> {
    let (bm_index, word, bit) = bit_position(block);
    let &bm_block = bitmap_block_ids
        .get(bm_index)
        .ok_or_else(|| kinds::invalid_parameter().with_context(format!("block {block} is beyond the bitmap's range")))?;
    let raw = block_slice(data, bm_block)?;
    let offset = 4 + word * 4;
    let longword = u32::from_be_bytes(raw[offset..offset + 4].try_into().unwrap());
    Ok((longword >> bit) & 1 == 1)
}

fn set_free(data: &mut [u8], bitmap_block_ids: &[u32], block: u32, free: bool) -> Result<(), UffError> {
    let (bm_index, word, bit) = bit_position(block);
    let &bm_block = bitmap_block_ids
        .get(bm_index)
        .ok_or_else(|| kinds::invalid_parameter().with_context(format!("block {block} is beyond the bitmap's range")))?;
    let raw = block_slice_mut(data, bm_block)?;
    let offset = 4 + word * 4;
    let mut longword = u32::from_be_bytes(raw[offset..offset + 4].try_into().unwrap());
    if free {
        longword |= 1 << bit;
    }
    else {
        longword &= !(1 << bit);
    }
    raw[offset..offset + 4].copy_from_slice(&longword.to_be_bytes());
    checksum::update(raw, 0);
    Ok(())
}

pub fn mark_allocated(data: &mut [u8], bitmap_block_ids: &[u32], block: u32) -> Result<(), UffError> {
    set_free(data, bitmap_block_ids, block, false)
}

pub fn mark_free(data: &mut [u8], bitmap_block_ids: &[u32], block: u32) -> Result<(), UffError> {
    set_free(data, bitmap_block_ids, block, true)
}

/// Resets every bitmap block to "all free", per §4.7's format/rebuild procedure. Bits beyond
/// `total_blocks` (if the last bitmap block is only partially used) are left free too; a caller
/// walking the bitmap should still bound lookups by `total_blocks`.
pub fn reset_all_free(data: &mut [u8], bitmap_block_ids: &[u32]) -> Result<(), UffError> {
    for &bm_block in bitmap_block_ids {
        let raw = block_slice_mut(data, bm_block)?;
        for word in raw[4..].chunks_exact_mut(4) {
            word.copy_from_slice(&0xffff_ffffu32.to_be_bytes());
        }
        checksum::update(raw, 0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_one_bitmap_block(total_blocks: u32) -> (Vec<u8>, Vec<u32>) {
        let data = vec![0u8; total_blocks as usize * BLOCK_SIZE];
        (data, vec![2])
    }

    #[test]
    fn bit_position_matches_known_mapping() {
        assert_eq!(bit_position(2), (0, 0, 31));
        assert_eq!(bit_position(3), (0, 0, 30));
        assert_eq!(bit_position(2 + 32), (0, 1, 31));
    }

    #[test]
    fn reset_then_allocate_round_trips() {
        let (mut data, bm_ids) = image_with_one_bitmap_block(100);
        reset_all_free(&mut data, &bm_ids).unwrap();
        assert!(is_free(&data, &bm_ids, 10).unwrap());
        mark_allocated(&mut data, &bm_ids, 10).unwrap();
        assert!(!is_free(&data, &bm_ids, 10).unwrap());
        mark_free(&mut data, &bm_ids, 10).unwrap();
        assert!(is_free(&data, &bm_ids, 10).unwrap());
    }

    #[test]
    fn checksum_is_valid_after_reset() {
        let (mut data, bm_ids) = image_with_one_bitmap_block(100);
        reset_all_free(&mut data, &bm_ids).unwrap();
        let block = block_slice(&data, bm_ids[0]).unwrap();
        assert!(checksum::verify(block));
    }
}
