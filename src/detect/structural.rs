//! Structural detection: DMK (no magic bytes, validated by its invariants) and the BPB-parsed
//! IMG fallback (§4.1 rungs 5 and 6b).

use super::{confidence, Variant, VariantInfo};
use crate::codec::endian::read_u16_le;

const DMK_HEADER_SIZE: usize = 16;
const DMK_MIN_TRACK_LEN: usize = 128;
const DMK_MAX_TRACK_LEN: usize = 0x4000;
const DMK_MAX_TRACKS: u8 = 96;

/// DMK carries no magic; identification relies entirely on internal consistency. The header is
/// `write_protect(1) | tracks(1) | track_len_le(2) | flags(1) | reserved(7) | unused(4)`, and the
/// whole file size must equal `16 + tracks * track_len * (2 if double-sided else 1)`.
pub fn detect_dmk(bytes: &[u8]) -> Option<VariantInfo> {
    if bytes.len() < DMK_HEADER_SIZE {
        return None;
    }
    let tracks = bytes[1];
    let track_len = read_u16_le(bytes, 2).ok()? as usize;
    let flags = bytes[4];
    let double_sided = flags & 0x10 == 0;

    if tracks == 0 || tracks > DMK_MAX_TRACKS {
        return None;
    }
    if !(DMK_MIN_TRACK_LEN..=DMK_MAX_TRACK_LEN).contains(&track_len) {
        return None;
    }

    let sides = if double_sided { 2 } else { 1 };
    let expected_size = DMK_HEADER_SIZE + tracks as usize * track_len * sides;
    if expected_size != bytes.len() {
        return None;
    }

    let mut info = VariantInfo::new(Variant::Dmk, confidence::STRUCTURAL_FUZZY);
    info.tracks = Some(tracks as u32 * sides as u32);
    Some(info)
}

/// A BIOS Parameter Block, read at the conventional offset 11 within a boot sector, used as a
/// last-resort IMG geometry inference when the exact-size table misses (§4.1 rung 6).
pub fn detect_img_bpb(bytes: &[u8]) -> Option<VariantInfo> {
    if bytes.len() < 36 {
        return None;
    }
    let bytes_per_sector = read_u16_le(bytes, 11).ok()?;
    let sectors_per_track = read_u16_le(bytes, 24).ok()?;
    let heads = read_u16_le(bytes, 26).ok()?;

    if !matches!(bytes_per_sector, 128 | 256 | 512 | 1024 | 2048 | 4096) {
        return None;
    }
    if sectors_per_track == 0 || sectors_per_track > 63 {
        return None;
    }
    if heads == 0 || heads > 2 {
        return None;
    }

    let mut info = VariantInfo::new(Variant::Img, confidence::BPB_INFERRED);
    let total_sectors = bytes.len() / bytes_per_sector as usize;
    let cylinders = total_sectors / (sectors_per_track as usize * heads as usize).max(1);
    info.tracks = Some((cylinders * heads as usize) as u32);
    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dmk_structural_invariants_must_hold() {
        let tracks = 2u8;
        let track_len = 128usize;
        let flags = 0x10; // single-sided
        let mut bytes = vec![0u8; DMK_HEADER_SIZE + tracks as usize * track_len];
        bytes[1] = tracks;
        bytes[2..4].copy_from_slice(&(track_len as u16).to_le_bytes());
        bytes[4] = flags;
        let info = detect_dmk(&bytes).expect("dmk should be detected");
        assert_eq!(info.format, Variant::Dmk);
    }

    #[test]
    fn dmk_rejects_size_mismatch() {
        let mut bytes = vec![0u8; DMK_HEADER_SIZE + 128];
        bytes[1] = 2; // claims 2 tracks but only provides room for 1
        bytes[2..4].copy_from_slice(&128u16.to_le_bytes());
        bytes[4] = 0x10;
        assert!(detect_dmk(&bytes).is_none());
    }

    #[test]
    fn bpb_fallback_reads_geometry() {
        let mut bytes = vec![0u8; 368_640 + 1]; // deliberately off the exact-size table
        bytes[11..13].copy_from_slice(&512u16.to_le_bytes());
        bytes[24..26].copy_from_slice(&9u16.to_le_bytes());
        bytes[26..28].copy_from_slice(&2u16.to_le_bytes());
        let info = detect_img_bpb(&bytes).expect("bpb should be parsed");
        assert_eq!(info.confidence, 75);
    }
}
