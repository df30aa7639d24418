//! AmigaDOS block-graph filesystem engine (§4.7): block checksums, the free-space bitmap,
//! hash-chained directory traversal, file data chains, validation, repair, and formatting, over a
//! raw 512-byte-per-block image.

pub mod bitmap;
pub mod block;
pub mod checksum;
pub mod directory;
pub mod format;

pub use bitmap::bit_position;
pub use directory::{amigados_hash_name, data_chain, validate, walk, BlockKind, ValidationReport};
pub use format::{format as format_image, FormattedImage};

use std::collections::HashSet;

use crate::error::{kinds, UffError};

/// Whether an [`AmigaImage`] owns a mutable copy of its bytes or only borrows a read-only view,
/// mirroring [`crate::sector_image::CbmImage`]'s resource policy (§5): `create()` owns, `open()`
/// borrows.
enum ImageBacking<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

impl ImageBacking<'_> {
    fn as_slice(&self) -> &[u8] {
        match self {
            ImageBacking::Owned(v) => v,
            ImageBacking::Borrowed(b) => b,
        }
    }
}

/// An AmigaDOS block-graph image, with the root block and bitmap block numbers cached alongside
/// it so every operation doesn't need to re-derive them.
pub struct AmigaImage<'a> {
    backing: ImageBacking<'a>,
    total_blocks: u32,
    root_block: u32,
    bitmap_block_ids: Vec<u32>,
}

impl<'a> AmigaImage<'a> {
    /// Formats a brand-new image of `total_blocks` 512-byte blocks.
    pub fn create(total_blocks: u32, fs_type: u8) -> Result<AmigaImage<'static>, UffError> {
        let formatted = format::format(total_blocks, fs_type)?;
        Ok(AmigaImage {
            backing: ImageBacking::Owned(formatted.data),
            total_blocks,
            root_block: formatted.root_block,
            bitmap_block_ids: formatted.bitmap_block_ids,
        })
    }

    /// Opens an existing image read-only. The caller supplies `root_block`/`bitmap_block_ids`
    /// (normally read from a boot-block-level catalog or derived from the standard `total/2`
    /// convention) since nothing below the boot block self-describes where they are.
    pub fn open(data: &'a [u8], root_block: u32, bitmap_block_ids: Vec<u32>) -> Self {
        let total_blocks = (data.len() / block::BLOCK_SIZE) as u32;
        Self {
            backing: ImageBacking::Borrowed(data),
            total_blocks,
            root_block,
            bitmap_block_ids,
        }
    }

    /// Opens an existing image for mutable access, taking ownership of its bytes.
    pub fn open_owned(data: Vec<u8>, root_block: u32, bitmap_block_ids: Vec<u32>) -> AmigaImage<'static> {
        let total_blocks = (data.len() / block::BLOCK_SIZE) as u32;
        AmigaImage {
            backing: ImageBacking::Owned(data),
            total_blocks,
            root_block,
            bitmap_block_ids,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.backing.as_slice()
    }

    pub fn root_block(&self) -> u32 {
        self.root_block
    }

    /// Walks the directory graph and cross-checks it against the bitmap; see
    /// [`directory::validate`].
    pub fn validate(&self) -> Result<ValidationReport, UffError> {
        directory::validate(self.backing.as_slice(), self.total_blocks, self.root_block, &self.bitmap_block_ids)
    }

    /// Recomputes the bitmap from directory-graph reachability. Fails with
    /// [`crate::error::UffErrorKind::ReadOnly`] on a borrowed image.
    pub fn rebuild_bitmap(&mut self) -> Result<(), UffError> {
        let total_blocks = self.total_blocks;
        let root_block = self.root_block;
        let bitmap_block_ids = self.bitmap_block_ids.clone();
        match &mut self.backing {
            ImageBacking::Owned(data) => rebuild_bitmap(data, total_blocks, root_block, &bitmap_block_ids),
            ImageBacking::Borrowed(_) => {
                Err(kinds::read_only().with_context("image was opened read-only; use create() or open_owned() to repair it"))
            }
        }
    }
}

/// Stack-based DFS from the root, marking every block reachable through the directory graph
/// (hash-chain siblings, subdirectory descent, file data/extension chains), then resets the
/// bitmap to "all free" and stamps exactly those blocks allocated again. Orphan blocks - allocated
/// in the old bitmap but unreachable - are left free, recoverable later by undelete tooling
/// (§4.7 "Bitmap repair").
pub fn rebuild_bitmap(data: &mut [u8], total_blocks: u32, root_block: u32, bitmap_block_ids: &[u32]) -> Result<(), UffError> {
    let mut used = vec![false; total_blocks as usize];
    used[0] = true;
    used[1] = true;
    used[root_block as usize] = true;
    for &b in bitmap_block_ids {
        used[b as usize] = true;
    }

    let mut stack = vec![root_block];
    let mut visited_dirs = HashSet::new();
    while let Some(current) = stack.pop() {
        if !visited_dirs.insert(current) {
            continue;
        }
        let dir_block = block::block_slice(data, current)?;
        for bucket in 0..72 {
            let mut entry = block::read_u32(dir_block, 24 + bucket * 4);
            let mut seen_in_bucket = HashSet::new();
            while entry != 0 {
                if !seen_in_bucket.insert(entry) || entry as usize >= used.len() {
                    break;
                }
                used[entry as usize] = true;
                let child = block::block_slice(data, entry)?;
                match directory::block_kind(child) {
                    BlockKind::UserDir => stack.push(entry),
                    BlockKind::File => {
                        if let Ok(chain) = directory::data_chain(data, entry) {
                            for d in chain {
                                if (d as usize) < used.len() {
                                    used[d as usize] = true;
                                }
                            }
                        }
                    }
                    _ => {}
                }
                entry = block::read_u32(child, 432);
            }
        }
    }

    bitmap::reset_all_free(data, bitmap_block_ids)?;
    for (b, &is_used) in used.iter().enumerate() {
        if is_used && b >= 2 {
            bitmap::mark_allocated(data, bitmap_block_ids, b as u32)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshly_formatted_image_validates_clean() {
        let image = AmigaImage::create(1760, 0).unwrap();
        let report = image.validate().unwrap();
        assert_eq!(report.errors, 0);
        assert!(!report.bitmap_corrupt);
    }

    #[test]
    fn bitmap_recovery_after_full_corruption() {
        let mut image = AmigaImage::create(1760, 0).unwrap();
        {
            let data = match &mut image.backing {
                ImageBacking::Owned(v) => v,
                ImageBacking::Borrowed(_) => unreachable!(),
            };
            for &bm_id in &image.bitmap_block_ids.clone() {
                let block = block::block_slice_mut(data, bm_id).unwrap();
                block[4..].fill(0); // all bits "allocated"
                checksum::update(block, 0);
            }
        }

        let report = image.validate().unwrap();
        assert!(report.bitmap_corrupt);
        assert!(report.orphan_blocks > 0);

        image.rebuild_bitmap().unwrap();
        let report = image.validate().unwrap();
        assert_eq!(report.errors, 0);
        assert_eq!(report.orphan_blocks, 0);
        assert!(!report.bitmap_corrupt);
    }

    #[test]
    fn open_borrowed_image_rejects_repair() {
        let image = AmigaImage::create(1760, 0).unwrap();
        let bytes = image.as_bytes().to_vec();
        let mut borrowed = AmigaImage::open(&bytes, image.root_block(), image.bitmap_block_ids.clone());
        assert!(borrowed.rebuild_bitmap().is_err());
    }
}
