//! Per-type sector addressing: sectors-per-track tables and the linear `sector_offset` function
//! shared by the BAM and directory engines (§4.6 "Sector addressing").

use crate::error::{kinds, UffError};
use crate::gcr_track::sectors_per_track as d64_sectors_per_track;

/// The three Commodore sector-image types this engine understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CbmType {
    D64,
    D71,
    D81,
}

impl CbmType {
    pub fn total_tracks(&self) -> u8 {
        match self {
            CbmType::D64 => 35,
            CbmType::D71 => 70,
            CbmType::D81 => 80,
        }
    }

    /// Directory track: 18 for D64/D71, 40 for D81 (§4.6).
    pub fn directory_track(&self) -> u8 {
        match self {
            CbmType::D64 | CbmType::D71 => 18,
            CbmType::D81 => 40,
        }
    }

    /// First sector of the directory chain.
    pub fn directory_start_sector(&self) -> u8 {
        match self {
            CbmType::D64 | CbmType::D71 => 1,
            CbmType::D81 => 3,
        }
    }

    /// The BAM sector(s) for this type, in `(track, sector)` order.
    pub fn bam_sectors(&self) -> &'static [(u8, u8)] {
        match self {
            CbmType::D64 => &[(18, 0)],
            CbmType::D71 => &[(18, 0), (53, 0)],
            CbmType::D81 => &[(40, 1), (40, 2)],
        }
    }

    /// Sector interleave used by `alloc_next` when choosing the next free sector within a track.
    pub fn interleave(&self) -> u8 {
        match self {
            CbmType::D64 => 10,
            CbmType::D71 => 6,
            CbmType::D81 => 1,
        }
    }

    pub fn sectors_per_track(&self, track: u8) -> u8 {
        match self {
            CbmType::D64 => d64_sectors_per_track(track),
            CbmType::D71 => {
                if track <= 35 {
                    d64_sectors_per_track(track)
                }
                else {
                    d64_sectors_per_track(track - 35)
                }
            }
            CbmType::D81 => 40,
        }
    }

    pub fn total_sectors(&self) -> usize {
        (1..=self.total_tracks()).map(|t| self.sectors_per_track(t) as usize).sum()
    }

    pub fn image_size(&self) -> usize {
        self.total_sectors() * 256
    }
}

/// Cumulative sector count for every track before `track`.
fn track_byte_sectors(cbm_type: CbmType, track: u8) -> usize {
    (1..track).map(|t| cbm_type.sectors_per_track(t) as usize).sum()
}

/// Returns the linear byte offset of `(track, sector)` within a raw sector-image buffer.
pub fn sector_offset(cbm_type: CbmType, track: u8, sector: u8) -> Result<usize, UffError> {
    if track == 0 || track > cbm_type.total_tracks() {
        return Err(kinds::invalid_parameter().with_context(format!("track {track} is out of range")));
    }
    let spt = cbm_type.sectors_per_track(track);
    if sector >= spt {
        return Err(kinds::sector_not_found().with_context(format!("sector {sector} does not exist on track {track}")));
    }
    let abs_sector = track_byte_sectors(cbm_type, track) + sector as usize;
    Ok(abs_sector * 256)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d64_directory_sector_matches_known_offset() {
        // Track 18 sector 0: 17 preceding tracks of 21 sectors each.
        let offset = sector_offset(CbmType::D64, 18, 0).unwrap();
        assert_eq!(offset, 17 * 21 * 256);
    }

    #[test]
    fn d64_total_image_size_is_standard() {
        assert_eq!(CbmType::D64.image_size(), 174_848);
    }

    #[test]
    fn d81_sector_offset_uses_constant_zone() {
        let offset = sector_offset(CbmType::D81, 2, 0).unwrap();
        assert_eq!(offset, 40 * 256);
    }

    #[test]
    fn out_of_range_sector_is_rejected() {
        assert!(sector_offset(CbmType::D64, 18, 21).is_err());
        assert!(sector_offset(CbmType::D64, 36, 0).is_err());
    }
}
