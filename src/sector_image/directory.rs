//! Directory walk, filename matching, and the data-chain read/write that backs `inject`/`extract`
//! (§4.6 "Directory walk"/"Filename matching").

use std::collections::HashSet;

use super::addressing::{sector_offset, CbmType};
use super::bam::{alloc_next, Bam};
use crate::error::{kinds, UffError};

const ENTRY_SIZE: usize = 32;
const ENTRIES_PER_SECTOR: usize = 8;
const MAX_DIRECTORY_SECTORS: usize = 100;
const SHIFTED_SPACE: u8 = 0xA0;

/// One parsed 32-byte directory entry, per §4.6's field layout.
#[derive(Clone, Debug)]
pub struct DirEntry {
    pub dir_track: u8,
    pub dir_sector: u8,
    pub slot: usize,
    pub file_type: u8,
    pub first_track: u8,
    pub first_sector: u8,
    pub filename: [u8; 16],
    pub rel_track: u8,
    pub rel_sector: u8,
    pub rel_reclen: u8,
    pub geos_type: u8,
    pub geos_struct: u8,
    pub geos_info_track: u8,
    pub geos_info_sector: u8,
    pub block_count: u16,
}

fn pad_filename(name: &[u8]) -> [u8; 16] {
    let mut padded = [SHIFTED_SPACE; 16];
    let len = name.len().min(16);
    padded[..len].copy_from_slice(&name[..len]);
    padded
}

/// Matches a (possibly wildcarded) 16-byte padded pattern against a directory entry's padded
/// filename. `*` anchors to the end of the name (everything from here on matches); `?` matches
/// exactly one byte. Comparison happens directly in PETSCII, so wildcard semantics are unaffected
/// by any UTF-8 conversion layered on top.
pub fn match_filename(pattern: &[u8], name: &[u8]) -> bool {
    for i in 0..16 {
        let p = pattern.get(i).copied().unwrap_or(SHIFTED_SPACE);
        if p == b'*' {
            return true;
        }
        let n = name.get(i).copied().unwrap_or(SHIFTED_SPACE);
        if p == b'?' {
            continue;
        }
        if p != n {
            return false;
        }
    }
    true
}

fn parse_entry(raw: &[u8], dir_track: u8, dir_sector: u8, slot: usize) -> DirEntry {
    let mut filename = [0u8; 16];
    filename.copy_from_slice(&raw[5..21]);
    DirEntry {
        dir_track,
        dir_sector,
        slot,
        file_type: raw[2],
        first_track: raw[3],
        first_sector: raw[4],
        filename,
        rel_track: raw[21],
        rel_sector: raw[22],
        rel_reclen: raw[23],
        geos_type: raw[24],
        geos_struct: raw[25],
        geos_info_track: raw[26],
        geos_info_sector: raw[27],
        block_count: u16::from_le_bytes([raw[28], raw[29]]),
    }
}

/// Walks the directory chain starting at the type's directory track, collecting every non-empty
/// 32-byte entry. Aborts on a circular sector reference (visited-set) or more than 100 sectors,
/// per §4.6.
pub fn walk_directory(data: &[u8], cbm_type: CbmType) -> Result<Vec<DirEntry>, UffError> {
    let mut entries = Vec::new();
    let mut visited = HashSet::new();
    let mut current = (cbm_type.directory_track(), cbm_type.directory_start_sector());
    let mut sectors_seen = 0usize;

    loop {
        if sectors_seen >= MAX_DIRECTORY_SECTORS {
            return Err(kinds::corrupt_header().with_context("directory chain exceeded 100 sectors"));
        }
        if !visited.insert(current) {
            return Err(kinds::corrupt_header()
                .with_context(format!("circular directory chain at {}/{}", current.0, current.1)));
        }
        sectors_seen += 1;

        let offset = sector_offset(cbm_type, current.0, current.1)?;
        if offset + 256 > data.len() {
            return Err(kinds::truncated_input().with_context("image too short to contain its directory sector"));
        }
        let sector = &data[offset..offset + 256];
        let next = (sector[0], sector[1]);

        for slot in 0..ENTRIES_PER_SECTOR {
            let raw = &sector[slot * ENTRY_SIZE..(slot + 1) * ENTRY_SIZE];
            if raw[2] == 0 && raw[3] == 0 {
                continue; // never-used slot
            }
            entries.push(parse_entry(raw, current.0, current.1, slot));
        }

        if next.0 == 0 {
            break;
        }
        current = next;
    }

    Ok(entries)
}

/// Reads a free (never-used) directory slot in the existing chain, without extending it onto a
/// new directory sector. A freshly formatted image always has free slots; once the chain fills,
/// [`inject`] reports [`crate::error::UffErrorKind::CatalogFull`] rather than growing the chain.
fn find_free_slot(data: &[u8], cbm_type: CbmType) -> Result<(u8, u8, usize), UffError> {
    let mut visited = HashSet::new();
    let mut current = (cbm_type.directory_track(), cbm_type.directory_start_sector());
    let mut sectors_seen = 0usize;

    loop {
        if sectors_seen >= MAX_DIRECTORY_SECTORS || !visited.insert(current) {
            return Err(kinds::catalog_full().with_context("directory chain has no free slot"));
        }
        sectors_seen += 1;

        let offset = sector_offset(cbm_type, current.0, current.1)?;
        let sector = &data[offset..offset + 256];
        for slot in 0..ENTRIES_PER_SECTOR {
            let raw = &sector[slot * ENTRY_SIZE..(slot + 1) * ENTRY_SIZE];
            if raw[2] == 0 && raw[3] == 0 {
                return Ok((current.0, current.1, slot));
            }
        }

        let next = (sector[0], sector[1]);
        if next.0 == 0 {
            return Err(kinds::catalog_full().with_context("directory chain is full"));
        }
        current = next;
    }
}

/// Follows a file's data-sector chain, returning its bytes in order. The link convention: bytes
/// 0-1 of each sector are `(next_track, next_sector)`; on the final sector `next_track == 0` and
/// `next_sector` holds the 1-based offset of the last valid data byte within the sector.
pub fn read_chain(data: &[u8], cbm_type: CbmType, first_track: u8, first_sector: u8) -> Result<Vec<u8>, UffError> {
    let mut out = Vec::new();
    let mut current = (first_track, first_sector);
    let mut visited = HashSet::new();

    loop {
        if !visited.insert(current) {
            return Err(kinds::corrupt_header().with_context("circular data chain"));
        }
        let offset = sector_offset(cbm_type, current.0, current.1)?;
        let sector = &data[offset..offset + 256];
        let next_track = sector[0];
        let next_sector = sector[1];
        if next_track == 0 {
            let last_byte = next_sector as usize;
            if last_byte < 2 {
                break;
            }
            out.extend_from_slice(&sector[2..last_byte.min(256)]);
            break;
        }
        out.extend_from_slice(&sector[2..256]);
        current = (next_track, next_sector);
    }
    Ok(out)
}

/// Allocates a sector chain for `contents`, writes it, and records a new directory entry for
/// `name` (PETSCII bytes, padded to 16 with `0xA0`). File type is written as `0x82` (a closed
/// `PRG`).
pub fn inject(data: &mut [u8], bam: &mut Bam, cbm_type: CbmType, name: &[u8], contents: &[u8]) -> Result<(), UffError> {
    const PAYLOAD_PER_SECTOR: usize = 254;
    let chunk_count = contents.len().div_ceil(PAYLOAD_PER_SECTOR).max(1);

    let mut sectors = Vec::with_capacity(chunk_count);
    let mut near = 1u8;
    for _ in 0..chunk_count {
        let (track, sector) = alloc_next(bam, near)?;
        near = track;
        sectors.push((track, sector));
    }

    for (i, &(track, sector)) in sectors.iter().enumerate() {
        let offset = sector_offset(cbm_type, track, sector)?;
        let start = i * PAYLOAD_PER_SECTOR;
        let end = (start + PAYLOAD_PER_SECTOR).min(contents.len());
        let chunk = &contents[start..end];

        if i + 1 < sectors.len() {
            let (next_track, next_sector) = sectors[i + 1];
            data[offset] = next_track;
            data[offset + 1] = next_sector;
        }
        else {
            data[offset] = 0;
            data[offset + 1] = (chunk.len() + 2) as u8;
        }
        data[offset + 2..offset + 2 + chunk.len()].copy_from_slice(chunk);
    }

    let (dir_track, dir_sector, slot) = find_free_slot(data, cbm_type)?;
    let dir_offset = sector_offset(cbm_type, dir_track, dir_sector)? + slot * ENTRY_SIZE;
    let (first_track, first_sector) = sectors[0];
    let padded_name = pad_filename(name);

    data[dir_offset + 2] = 0x82;
    data[dir_offset + 3] = first_track;
    data[dir_offset + 4] = first_sector;
    data[dir_offset + 5..dir_offset + 21].copy_from_slice(&padded_name);
    data[dir_offset + 21..dir_offset + 28].fill(0);
    let block_count = (sectors.len() as u16).to_le_bytes();
    data[dir_offset + 28..dir_offset + 30].copy_from_slice(&block_count);
    data[dir_offset + 30..dir_offset + 32].fill(0);

    bam.apply(data)
}

/// Finds the directory entry whose name matches `name` exactly (no wildcards) and returns its
/// data bytes.
pub fn extract(data: &[u8], cbm_type: CbmType, name: &[u8]) -> Result<Vec<u8>, UffError> {
    let padded_name = pad_filename(name);
    let entries = walk_directory(data, cbm_type)?;
    let entry = entries
        .iter()
        .find(|e| e.filename == padded_name)
        .ok_or_else(|| kinds::sector_not_found().with_context("no directory entry with that name"))?;
    read_chain(data, cbm_type, entry.first_track, entry.first_sector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector_image::bam::Bam;

    fn blank_d64() -> Vec<u8> {
        let mut data = vec![0u8; CbmType::D64.image_size()];
        let bam_offset = sector_offset(CbmType::D64, 18, 0).unwrap();
        data[bam_offset] = 18;
        data[bam_offset + 1] = 1;
        data[bam_offset + 2] = 0x41;
        for track in 1..=35u8 {
            let spt = CbmType::D64.sectors_per_track(track);
            let entry_off = bam_offset + 4 + (track as usize - 1) * 4;
            data[entry_off] = spt;
            for sector in 0..spt {
                let byte = sector as usize / 8;
                let bit = sector as usize % 8;
                data[entry_off + 1 + byte] |= 1 << bit;
            }
        }
        // Mark directory sector 18/1 allocated so it isn't handed out by alloc_next.
        let dir_entry_off = bam_offset + 4 + (18 - 1) * 4;
        data[dir_entry_off + 1] &= !(1 << 1);
        data
    }

    #[test]
    fn wildcard_star_matches_any_suffix() {
        let pattern = pad_filename(b"TEST*");
        let name = pad_filename(b"TESTFILE");
        assert!(match_filename(&pattern, &name));
    }

    #[test]
    fn question_mark_matches_one_byte() {
        let pattern = pad_filename(b"TEST????");
        let name_ok = pad_filename(b"TESTABCD");
        let name_bad = pad_filename(b"TESTAB");
        assert!(match_filename(&pattern, &name_ok));
        assert!(!match_filename(&pattern, &name_bad));
    }

    #[test]
    fn inject_then_extract_round_trips() {
        let mut data = blank_d64();
        let mut bam = Bam::load(&data, CbmType::D64).unwrap();
        let contents: Vec<u8> = (0..1000u32).map(|n| (n % 251) as u8).collect();
        inject(&mut data, &mut bam, CbmType::D64, b"HELLO", &contents).unwrap();

        let extracted = extract(&data, CbmType::D64, b"HELLO").unwrap();
        assert_eq!(extracted, contents);
    }

    #[test]
    fn directory_walk_finds_injected_entry() {
        let mut data = blank_d64();
        let mut bam = Bam::load(&data, CbmType::D64).unwrap();
        inject(&mut data, &mut bam, CbmType::D64, b"PROGRAM", b"hi").unwrap();

        let entries = walk_directory(&data, CbmType::D64).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, pad_filename(b"PROGRAM"));
    }
}
