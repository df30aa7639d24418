//! Fresh AmigaDOS image formatting (§4.7 "Format").

use super::bitmap::{self, BITS_PER_BITMAP_BLOCK};
use super::block::{block_slice_mut, write_u32, BLOCK_SIZE};
use super::checksum;
use crate::error::{kinds, UffError};

const ROOT_HT_SIZE_OFFSET: usize = 12;
const ROOT_BM_FLAG_OFFSET: usize = 308;
const ROOT_BM_PAGES_OFFSET: usize = 312;
const MAX_BM_PAGES: usize = 25;
const ROOT_VOLUME_NAME_OFFSET: usize = 432;
const SECONDARY_TYPE_OFFSET: usize = 508;
const T_HEADER: u32 = 2;
const ST_ROOT: u32 = 1;
const HASH_TABLE_SIZE: u32 = 72;

/// The result of [`format`]: the formatted image bytes plus the block numbers a caller needs to
/// keep around to operate on it ([`super::directory::validate`], [`super::bitmap`] functions, ...).
pub struct FormattedImage {
    pub data: Vec<u8>,
    pub root_block: u32,
    pub bitmap_block_ids: Vec<u32>,
}

/// Zeroes a `total_blocks`-block image, writes the `"DOS"` + `fs_type` signature, places the root
/// block at `total_blocks / 2`, and allocates bitmap blocks immediately after it.
pub fn format(total_blocks: u32, fs_type: u8) -> Result<FormattedImage, UffError> {
    if total_blocks < 4 {
        return Err(kinds::invalid_parameter().with_context("an AmigaDOS image needs at least 4 blocks"));
    }
    let mut data = vec![0u8; total_blocks as usize * BLOCK_SIZE];
    data[0..3].copy_from_slice(b"DOS");
    data[3] = fs_type;

    let root_block = total_blocks / 2;
    let addressable = (total_blocks - 2) as usize;
    let bitmap_count = addressable.div_ceil(BITS_PER_BITMAP_BLOCK).max(1);
    if bitmap_count > MAX_BM_PAGES {
        return Err(kinds::invalid_parameter().with_context("image is too large for a single bitmap extension level"));
    }
    let bitmap_block_ids: Vec<u32> = (0..bitmap_count as u32).map(|i| root_block + 1 + i).collect();

    {
        let root = block_slice_mut(&mut data, root_block)?;
        write_u32(root, 0, T_HEADER);
        write_u32(root, ROOT_HT_SIZE_OFFSET, HASH_TABLE_SIZE);
        write_u32(root, ROOT_BM_FLAG_OFFSET, 0xffff_ffff);
        for (i, &bm_id) in bitmap_block_ids.iter().enumerate().take(MAX_BM_PAGES) {
            write_u32(root, ROOT_BM_PAGES_OFFSET + i * 4, bm_id);
        }
        root[ROOT_VOLUME_NAME_OFFSET] = 0; // empty BCPL volume name; caller may rename later
        write_u32(root, SECONDARY_TYPE_OFFSET, ST_ROOT);
        checksum::update(root, 20);
    }

    bitmap::reset_all_free(&mut data, &bitmap_block_ids)?;
    for &reserved in [0u32, 1, root_block].iter().chain(bitmap_block_ids.iter()) {
        if reserved >= 2 {
            bitmap::mark_allocated(&mut data, &bitmap_block_ids, reserved)?;
        }
    }

    Ok(FormattedImage {
        data,
        root_block,
        bitmap_block_ids,
    })
}
