//! Block Availability Map: load, allocate, and free, per §4.6 "BAM load"/"Allocation".
//!
//! Bit semantics are the Commodore convention: **bit = 1 means free**. Each per-track entry is a
//! free-sector count byte followed by a type-specific bitmap (3 bytes for D64/D71, 5 for D81).

use super::addressing::{sector_offset, CbmType};
use crate::error::{kinds, UffError};

const D64_D71_ENTRY_LEN: usize = 4; // 1 count byte + 3 bitmap bytes
const D81_ENTRY_LEN: usize = 6; // 1 count byte + 5 bitmap bytes

#[derive(Clone, Debug)]
struct BamTrackEntry {
    free_count: u8,
    bitmap: Vec<u8>,
}

/// An in-memory view of a disk's free-space bitmap, independent of the sector(s) it was loaded
/// from. Call [`Bam::apply`] to write changes back into an image buffer.
#[derive(Clone, Debug)]
pub struct Bam {
    cbm_type: CbmType,
    entries: Vec<BamTrackEntry>, // index 0 = track 1
    pub total_free: u32,
    pub dirty: bool,
}

/// Where a track's BAM entry lives: which BAM sector (index into `CbmType::bam_sectors`), the
/// byte offset within that sector, and the entry's length.
pub(crate) fn entry_location(cbm_type: CbmType, track: u8) -> (usize, usize, usize) {
    match cbm_type {
        CbmType::D64 => (0, 4 + (track as usize - 1) * D64_D71_ENTRY_LEN, D64_D71_ENTRY_LEN),
        CbmType::D71 => {
            if track <= 35 {
                (0, 4 + (track as usize - 1) * D64_D71_ENTRY_LEN, D64_D71_ENTRY_LEN)
            }
            else {
                (1, (track as usize - 36) * D64_D71_ENTRY_LEN, D64_D71_ENTRY_LEN)
            }
        }
        CbmType::D81 => {
            if track <= 40 {
                (0, 16 + (track as usize - 1) * D81_ENTRY_LEN, D81_ENTRY_LEN)
            }
            else {
                (1, 16 + (track as usize - 41) * D81_ENTRY_LEN, D81_ENTRY_LEN)
            }
        }
    }
}

/// The classic Commodore interleave search order within a track: start at sector 0, step by
/// `interleave` wrapping around, and fill in any sector skipped by an earlier wrap.
fn sector_search_order(sectors_per_track: u8, interleave: u8) -> Vec<u8> {
    let spt = sectors_per_track as usize;
    let mut order = Vec::with_capacity(spt);
    let mut seen = vec![false; spt];
    let mut pos = 0u8;
    for _ in 0..spt {
        while seen[pos as usize] {
            pos = (pos + 1) % sectors_per_track;
        }
        order.push(pos);
        seen[pos as usize] = true;
        pos = (pos + interleave) % sectors_per_track;
    }
    order
}

impl Bam {
    /// Parses the BAM sector(s) out of a raw sector-image buffer.
    pub fn load(data: &[u8], cbm_type: CbmType) -> Result<Self, UffError> {
        let bam_sectors = cbm_type.bam_sectors();
        let mut sector_bytes = Vec::with_capacity(bam_sectors.len());
        for &(track, sector) in bam_sectors {
            let offset = sector_offset(cbm_type, track, sector)?;
            if offset + 256 > data.len() {
                return Err(kinds::truncated_input().with_context("image too short to contain its BAM sector"));
            }
            sector_bytes.push(&data[offset..offset + 256]);
        }

        let mut entries = Vec::with_capacity(cbm_type.total_tracks() as usize);
        let mut total_free = 0u32;
        for track in 1..=cbm_type.total_tracks() {
            let (sector_idx, offset, len) = entry_location(cbm_type, track);
            let raw = sector_bytes[sector_idx];
            if offset + len > raw.len() {
                return Err(kinds::corrupt_header().with_context("BAM entry extends past its sector"));
            }
            let free_count = raw[offset];
            let bitmap = raw[offset + 1..offset + len].to_vec();
            if track != cbm_type.directory_track() {
                total_free += free_count as u32;
            }
            entries.push(BamTrackEntry { free_count, bitmap });
        }

        Ok(Self {
            cbm_type,
            entries,
            total_free,
            dirty: false,
        })
    }

    fn entry(&self, track: u8) -> Result<&BamTrackEntry, UffError> {
        self.entries
            .get(track as usize - 1)
            .ok_or_else(|| kinds::invalid_parameter().with_context(format!("track {track} has no BAM entry")))
    }

    fn entry_mut(&mut self, track: u8) -> Result<&mut BamTrackEntry, UffError> {
        self.entries
            .get_mut(track as usize - 1)
            .ok_or_else(|| kinds::invalid_parameter().with_context(format!("track {track} has no BAM entry")))
    }

    pub fn is_free(&self, track: u8, sector: u8) -> Result<bool, UffError> {
        let entry = self.entry(track)?;
        let byte = sector as usize / 8;
        let bit = sector as usize % 8;
        Ok(entry.bitmap.get(byte).map(|b| b & (1 << bit) != 0).unwrap_or(false))
    }

    fn set_free(&mut self, track: u8, sector: u8, free: bool) -> Result<(), UffError> {
        let entry = self.entry_mut(track)?;
        let byte = sector as usize / 8;
        let bit = sector as usize % 8;
        let Some(slot) = entry.bitmap.get_mut(byte)
        else {
            return Err(kinds::invalid_parameter().with_context("sector bit is outside the track's bitmap"));
        };
        let was_free = *slot & (1 << bit) != 0;
        if free {
            *slot |= 1 << bit;
            if !was_free {
                entry.free_count += 1;
            }
        }
        else {
            *slot &= !(1 << bit);
            if was_free {
                entry.free_count = entry.free_count.saturating_sub(1);
            }
        }
        Ok(())
    }

    pub fn free_sectors(&self, track: u8) -> Result<u8, UffError> {
        Ok(self.entry(track)?.free_count)
    }

    /// Marks `(track, sector)` allocated, decrementing the track's free count and, unless it is
    /// the directory track (excluded from the disk-wide total per §4.6), `total_free`.
    pub fn mark_allocated(&mut self, track: u8, sector: u8) -> Result<(), UffError> {
        if !self.is_free(track, sector)? {
            return Err(kinds::no_free_block().with_context(format!("{track}/{sector} is already allocated")));
        }
        self.set_free(track, sector, false)?;
        if track != self.cbm_type.directory_track() {
            self.total_free = self.total_free.saturating_sub(1);
        }
        self.dirty = true;
        Ok(())
    }

    /// Marks `(track, sector)` free again.
    pub fn free(&mut self, track: u8, sector: u8) -> Result<(), UffError> {
        if self.is_free(track, sector)? {
            return Ok(());
        }
        self.set_free(track, sector, true)?;
        if track != self.cbm_type.directory_track() {
            self.total_free += 1;
        }
        self.dirty = true;
        Ok(())
    }

    /// Writes the current free-count/bitmap bytes back into `data`'s BAM sector(s), leaving every
    /// other byte (disk name, DOS version, reserved fields) untouched.
    pub fn apply(&self, data: &mut [u8]) -> Result<(), UffError> {
        for track in 1..=self.cbm_type.total_tracks() {
            let (sector_idx, offset, len) = entry_location(self.cbm_type, track);
            let (bam_track, bam_sector) = self.cbm_type.bam_sectors()[sector_idx];
            let sector_start = sector_offset(self.cbm_type, bam_track, bam_sector)?;
            let entry = self.entry(track)?;
            data[sector_start + offset] = entry.free_count;
            data[sector_start + offset + 1..sector_start + offset + len].copy_from_slice(&entry.bitmap);
        }
        Ok(())
    }
}

/// Finds and allocates the first free sector at or near `near_track`, honoring the type's
/// interleave and skipping the directory track, per §4.6 "Allocation": search order is
/// `near_track + 0, +1, -1, +2, -2, ...`.
pub fn alloc_next(bam: &mut Bam, near_track: u8) -> Result<(u8, u8), UffError> {
    let cbm_type = bam.cbm_type;
    let total = cbm_type.total_tracks() as i16;

    for delta in 0..total {
        for sign in [1i16, -1i16] {
            if delta == 0 && sign < 0 {
                continue;
            }
            let candidate = near_track as i16 + sign * delta;
            if candidate < 1 || candidate > total {
                continue;
            }
            let track = candidate as u8;
            if track == cbm_type.directory_track() {
                continue;
            }
            let spt = cbm_type.sectors_per_track(track);
            for sector in sector_search_order(spt, cbm_type.interleave()) {
                if bam.is_free(track, sector)? {
                    bam.mark_allocated(track, sector)?;
                    return Ok((track, sector));
                }
            }
        }
    }
    Err(kinds::no_free_block().with_context("no free sector available on this image"))
}

#[cfg(test)]
mod tests {
    use super::*;

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
        data
    }

    #[test]
    fn load_reports_all_sectors_free_on_a_blank_image() {
        let data = blank_d64();
        let bam = Bam::load(&data, CbmType::D64).unwrap();
        assert!(bam.is_free(1, 0).unwrap());
        // Directory track is excluded from the aggregate total per §4.6.
        let expected: u32 = (1..=35u8).filter(|&t| t != 18).map(|t| CbmType::D64.sectors_per_track(t) as u32).sum();
        assert_eq!(bam.total_free, expected);
    }

    #[test]
    fn alloc_then_free_restores_state() {
        let data = blank_d64();
        let mut bam = Bam::load(&data, CbmType::D64).unwrap();
        let before = bam.total_free;
        let (track, sector) = alloc_next(&mut bam, 1).unwrap();
        assert!(!bam.is_free(track, sector).unwrap());
        assert_eq!(bam.total_free, before - 1);
        bam.free(track, sector).unwrap();
        assert!(bam.is_free(track, sector).unwrap());
        assert_eq!(bam.total_free, before);
    }

    #[test]
    fn alloc_skips_the_directory_track() {
        let data = blank_d64();
        let mut bam = Bam::load(&data, CbmType::D64).unwrap();
        let (track, _) = alloc_next(&mut bam, 18).unwrap();
        assert_ne!(track, 18);
    }

    #[test]
    fn apply_round_trips_through_a_buffer() {
        let mut data = blank_d64();
        let mut bam = Bam::load(&data, CbmType::D64).unwrap();
        alloc_next(&mut bam, 1).unwrap();
        bam.apply(&mut data).unwrap();
        let reloaded = Bam::load(&data, CbmType::D64).unwrap();
        assert_eq!(reloaded.total_free, bam.total_free);
    }
}
