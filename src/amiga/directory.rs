//! AmigaDOS directory walk, name hashing, file data chains, and the validator (§4.7 "Directory
//! walk", "File data chain", "Validation pass", "Name hashing").

use std::collections::HashSet;

use super::bitmap;
use super::block::{block_slice, read_i32, read_u32};
use super::checksum;
use crate::error::{kinds, UffError};

const HASH_TABLE_OFFSET: usize = 24;
const HASH_SIZE: usize = 72;
const HASH_NEXT_OFFSET: usize = 432;
const DATA_PTR_BASE_OFFSET: usize = 308;
const DATA_PTR_COUNT: usize = 72;
const EXTENSION_OFFSET: usize = 496;
const SECONDARY_TYPE_OFFSET: usize = 508;
const MAX_DEPTH: usize = 100;

const T_HEADER: i32 = 2;
const T_LIST: i32 = 16;
const ST_ROOT: i32 = 1;
const ST_USERDIR: i32 = 2;
const ST_FILE: i32 = -3;

/// What a block's primary/secondary type fields say it is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Root,
    UserDir,
    File,
    Extension,
    Unknown,
}

pub fn block_kind(block: &[u8]) -> BlockKind {
    let primary = read_i32(block, 0);
    let secondary = read_i32(block, SECONDARY_TYPE_OFFSET);
    match (primary, secondary) {
        (T_HEADER, ST_ROOT) => BlockKind::Root,
        (T_HEADER, ST_USERDIR) => BlockKind::UserDir,
        (T_HEADER, ST_FILE) => BlockKind::File,
        (T_LIST, ST_FILE) => BlockKind::Extension,
        _ => BlockKind::Unknown,
    }
}

/// The historical AmigaDOS directory hash: `hash = name.len()`, then for each byte (uppercased,
/// and additionally Latin-1-folded over `0xE0..=0xFE` when `intl` is true),
/// `hash = (hash*13 + byte) & 0x7FF`. The bucket is `hash % 72`.
pub fn amigados_hash_name(name: &[u8], intl: bool) -> u32 {
    let mut hash = name.len() as u32;
    for &raw in name {
        let folded = if raw.is_ascii_lowercase() {
            raw.to_ascii_uppercase()
        }
        else if intl && (0xe0..=0xfe).contains(&raw) && raw != 0xd7 && raw != 0xf7 {
            raw & !0x20
        }
        else {
            raw
        };
        hash = (hash.wrapping_mul(13).wrapping_add(folded as u32)) & 0x7ff;
    }
    hash % HASH_SIZE as u32
}

/// Recursively visits every entry reachable from `dir_block`'s hash table, calling `visitor` with
/// each entry's block number and kind before descending into subdirectories. Aborts past
/// [`MAX_DEPTH`] or on a circular hash chain.
pub fn walk<F>(data: &[u8], dir_block: u32, depth: usize, visitor: &mut F) -> Result<(), UffError>
where
    F: FnMut(u32, BlockKind) -> Result<(), UffError>,
{
    if depth > MAX_DEPTH {
        return Err(kinds::corrupt_header().with_context("directory recursion exceeded the depth limit"));
    }
    let block = block_slice(data, dir_block)?;
    for bucket in 0..HASH_SIZE {
        let mut entry = read_u32(block, HASH_TABLE_OFFSET + bucket * 4);
        let mut seen_in_bucket = HashSet::new();
        while entry != 0 {
            if !seen_in_bucket.insert(entry) {
                return Err(kinds::corrupt_header().with_context("circular hash chain"));
            }
            let child = block_slice(data, entry)?;
            let kind = block_kind(child);
            visitor(entry, kind)?;
            if kind == BlockKind::UserDir {
                walk(data, entry, depth + 1, visitor)?;
            }
            entry = read_u32(child, HASH_NEXT_OFFSET);
        }
    }
    Ok(())
}

/// Builds the list of blocks belonging to a file, following the header block's 72 descending data
/// pointers (offset 308 down to 24) and any extension blocks chained from offset 496. The
/// extension blocks themselves are included in the result (they occupy real blocks too), so a
/// caller marking usage from this list doesn't need a second pass for them.
pub fn data_chain(data: &[u8], header_block: u32) -> Result<Vec<u32>, UffError> {
    let mut chain = Vec::new();
    let mut current = header_block;
    let mut visited = HashSet::new();

    loop {
        if !visited.insert(current) {
            return Err(kinds::corrupt_header().with_context("circular data-block extension chain"));
        }
        let block = block_slice(data, current)?;
        for i in 0..DATA_PTR_COUNT {
            let offset = DATA_PTR_BASE_OFFSET - i * 4;
            let ptr = read_u32(block, offset);
            if ptr != 0 {
                chain.push(ptr);
            }
        }
        let ext = read_u32(block, EXTENSION_OFFSET);
        if ext == 0 {
            break;
        }
        chain.push(ext);
        current = ext;
    }
    Ok(chain)
}

/// Aggregate counts produced by [`validate`], per §4.7 "Validation pass".
#[derive(Default, Debug, Clone, Copy)]
pub struct ValidationReport {
    pub errors: u32,
    pub warnings: u32,
    pub cross_linked: u32,
    pub orphan_blocks: u32,
    pub broken_chains: u32,
    pub bad_checksums: u32,
    pub bitmap_corrupt: bool,
    pub bootblock_bad: bool,
    pub root_bad: bool,
}

/// Walks the directory graph from `root_block`, stamping a `usage` vector as it goes, then
/// cross-checks that usage against the bitmap.
pub fn validate(data: &[u8], total_blocks: u32, root_block: u32, bitmap_block_ids: &[u32]) -> Result<ValidationReport, UffError> {
    let mut report = ValidationReport::default();
    let mut usage = vec![0u8; total_blocks as usize];
    usage[0] = 1;
    usage[1] = 1;
    usage[root_block as usize] = 1;
    for &b in bitmap_block_ids {
        usage[b as usize] = 1;
    }

    if !checksum::verify(block_slice(data, 0)?) {
        report.bootblock_bad = true;
        report.errors += 1;
    }
    if !checksum::verify(block_slice(data, root_block)?) {
        report.root_bad = true;
        report.errors += 1;
    }

    let mut visit = |b: u32, kind: BlockKind| -> Result<(), UffError> {
        if usage[b as usize] > 0 {
            report.cross_linked += 1;
            report.warnings += 1;
        }
        else {
            usage[b as usize] = 1;
        }
        let block = block_slice(data, b)?;
        if !checksum::verify(block) {
            report.bad_checksums += 1;
            report.errors += 1;
        }
        if kind == BlockKind::File {
            match data_chain(data, b) {
                Ok(chain) => {
                    for d in chain {
                        if d as usize >= usage.len() {
                            report.broken_chains += 1;
                            report.errors += 1;
                            continue;
                        }
                        if usage[d as usize] > 0 {
                            report.cross_linked += 1;
                            report.warnings += 1;
                        }
                        else {
                            usage[d as usize] = 1;
                        }
                    }
                }
                Err(_) => {
                    report.broken_chains += 1;
                    report.errors += 1;
                }
            }
        }
        Ok(())
    };

    walk(data, root_block, 0, &mut visit)?;

    for b in 2..total_blocks {
        let free = bitmap::is_free(data, bitmap_block_ids, b)?;
        let used = usage[b as usize] > 0;
        if free == used {
            report.bitmap_corrupt = true;
            if !free {
                report.orphan_blocks += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::block::{block_slice_mut, write_u32};

    #[test]
    fn hash_is_case_insensitive_for_ascii() {
        let lower = amigados_hash_name(b"myfile", false);
        let upper = amigados_hash_name(b"MYFILE", false);
        assert_eq!(lower, upper);
        assert!(lower < 72);
    }

    #[test]
    fn hash_is_deterministic_and_in_range() {
        let a = amigados_hash_name(b"startup-sequence", false);
        let b = amigados_hash_name(b"startup-sequence", false);
        assert_eq!(a, b);
        assert!(a < 72);
    }

    fn make_image(total_blocks: u32) -> Vec<u8> {
        vec![0u8; total_blocks as usize * checksum::BLOCK_SIZE]
    }

    fn init_root(data: &mut [u8], root: u32) {
        let block = block_slice_mut(data, root).unwrap();
        write_u32(block, 0, T_HEADER as u32);
        write_u32(block, SECONDARY_TYPE_OFFSET, ST_ROOT as u32);
        checksum::update(block, 20);
    }

    fn link_into_hash_table(data: &mut [u8], dir_block: u32, bucket: usize, target: u32) {
        let block = block_slice_mut(data, dir_block).unwrap();
        write_u32(block, HASH_TABLE_OFFSET + bucket * 4, target);
        checksum::update(block, 20);
    }

    fn init_file_header(data: &mut [u8], block_id: u32, data_blocks: &[u32]) {
        let block = block_slice_mut(data, block_id).unwrap();
        write_u32(block, 0, T_HEADER as u32);
        write_u32(block, SECONDARY_TYPE_OFFSET, ST_FILE as u32);
        for (i, &d) in data_blocks.iter().enumerate() {
            write_u32(block, DATA_PTR_BASE_OFFSET - i * 4, d);
        }
        checksum::update(block, 20);
    }

    #[test]
    fn validate_clean_image_has_no_errors() {
        let total = 50u32;
        let root = total / 2;
        let bitmap_block = 2u32;
        let mut data = make_image(total);
        bitmap::reset_all_free(&mut data, &[bitmap_block]).unwrap();
        init_root(&mut data, root);

        let file_block = 10u32;
        init_file_header(&mut data, file_block, &[11, 12]);
        link_into_hash_table(&mut data, root, 0, file_block);

        for b in [root, bitmap_block, file_block, 11, 12] {
            bitmap::mark_allocated(&mut data, &[bitmap_block], b).unwrap();
        }

        let report = validate(&data, total, root, &[bitmap_block]).unwrap();
        assert_eq!(report.errors, 0);
        assert_eq!(report.orphan_blocks, 0);
        assert!(!report.bitmap_corrupt);
    }

    #[test]
    fn validate_detects_orphan_block() {
        let total = 50u32;
        let root = total / 2;
        let bitmap_block = 2u32;
        let mut data = make_image(total);
        bitmap::reset_all_free(&mut data, &[bitmap_block]).unwrap();
        init_root(&mut data, root);

        for b in [root, bitmap_block] {
            bitmap::mark_allocated(&mut data, &[bitmap_block], b).unwrap();
        }
        // Block 20 is marked allocated in the bitmap but never reachable from the directory.
        bitmap::mark_allocated(&mut data, &[bitmap_block], 20).unwrap();

        let report = validate(&data, total, root, &[bitmap_block]).unwrap();
        assert!(report.bitmap_corrupt);
        assert_eq!(report.orphan_blocks, 1);
    }

    #[test]
    fn validate_detects_cross_linked_data_block() {
        let total = 50u32;
        let root = total / 2;
        let bitmap_block = 2u32;
        let mut data = make_image(total);
        bitmap::reset_all_free(&mut data, &[bitmap_block]).unwrap();
        init_root(&mut data, root);

        init_file_header(&mut data, 10, &[30]);
        init_file_header(&mut data, 11, &[30]); // shares data block 30 with the first file
        link_into_hash_table(&mut data, root, 0, 10);
        link_into_hash_table(&mut data, root, 1, 11);

        for b in [root, bitmap_block, 10, 11, 30] {
            bitmap::mark_allocated(&mut data, &[bitmap_block], b).unwrap();
        }

        let report = validate(&data, total, root, &[bitmap_block]).unwrap();
        assert_eq!(report.cross_linked, 1);
    }
}
