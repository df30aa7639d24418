//! The `"TRK\0"` track chunk: revolution descriptors, fused flux samples, optional weak-region
//! and splice tables, and a trailing SHA-256 (§4.4).

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use bitflags::bitflags;

use crate::error::{kinds, UffError};
use crate::flux::{SplicePoint, Track, WeakRegion};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TrackChunkFlags: u8 {
        const HAS_WEAK    = 0b0000_0001;
        const HAS_SPLICES = 0b0000_0010;
    }
}

#[binrw]
#[brw(little, magic = b"TRK\0")]
#[derive(Clone, Debug)]
struct ChunkHeader {
    cylinder: u8,
    head: u8,
    flags: u8,
    encoding: u8,
    revolution_count: u32,
    flux_count_total: u32,
    weak_map_offset: u32,
    splice_offset: u32,
    hash_offset: u32,
    reserved: u64,
}

#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug)]
struct RevolutionDescriptor {
    flux_count: u32,
    confidence: u16,
    reserved: [u8; 10],
}

#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug)]
struct RawWeakRegion {
    offset: u32,
    bit_count: u32,
    /// Mean confidence scaled to `0..=10000` (four decimal digits of precision).
    confidence_scaled: u16,
    reserved: u16,
}

#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug)]
struct RawSplicePoint {
    offset: u32,
    /// Jump ratio scaled by 1000 (three decimal digits of precision).
    ratio_scaled: u32,
}

/// Serializes a fully fused [`Track`] into a `"TRK\0"` chunk.
///
/// Per track-write atomicity, the caller is expected to write this buffer in one shot (or not at
/// all) rather than streaming partial writes, so an interrupted write never leaves a chunk whose
/// length doesn't match its own revolution/flux counts.
pub fn write_track_chunk(track: &Track) -> Result<Vec<u8>, UffError> {
    if track.fused_flux.is_empty() {
        return Err(kinds::invalid_parameter().with_context("cannot serialize a track that has not been fused"));
    }
    let sha256 = track.sha256.ok_or_else(|| {
        kinds::invalid_parameter().with_context("cannot serialize a track with no computed hash")
    })?;

    let mut flags = TrackChunkFlags::empty();
    if !track.weak_regions.is_empty() {
        flags |= TrackChunkFlags::HAS_WEAK;
    }
    if !track.splices.is_empty() {
        flags |= TrackChunkFlags::HAS_SPLICES;
    }

    let revolution_count = track.revolutions.len() as u32;
    let flux_count_total = track.fused_flux.len() as u32;

    // Revolution descriptors and fused samples come right after the 36-byte fixed header.
    let descriptors_size = revolution_count as usize * 16;
    let samples_offset = 36 + descriptors_size;
    let samples_size = flux_count_total as usize * 4;
    let weak_map_offset = samples_offset + samples_size;

    let mut weak_buf = Cursor::new(Vec::new());
    (track.weak_regions.len() as u32).write_le(&mut weak_buf).map_err(UffError::from)?;
    for region in &track.weak_regions {
        let raw = RawWeakRegion {
            offset: region.flux_offset as u32,
            bit_count: region.bit_count as u32,
            confidence_scaled: (region.mean_confidence * 10_000.0).round() as u16,
            reserved: 0,
        };
        raw.write(&mut weak_buf).map_err(UffError::from)?;
    }
    let weak_bytes = weak_buf.into_inner();
    let splice_offset = weak_map_offset + weak_bytes.len();

    let mut splice_buf = Cursor::new(Vec::new());
    (track.splices.len() as u32).write_le(&mut splice_buf).map_err(UffError::from)?;
    for splice in &track.splices {
        let raw = RawSplicePoint {
            offset: splice.flux_offset as u32,
            ratio_scaled: (splice.jump_ratio * 1000.0).round() as u32,
        };
        raw.write(&mut splice_buf).map_err(UffError::from)?;
    }
    let splice_bytes = splice_buf.into_inner();
    let hash_offset = splice_offset + splice_bytes.len();

    let header = ChunkHeader {
        cylinder: track.cylinder,
        head: track.head,
        flags: flags.bits(),
        encoding: 0,
        revolution_count,
        flux_count_total,
        weak_map_offset: weak_map_offset as u32,
        splice_offset: splice_offset as u32,
        hash_offset: hash_offset as u32,
        reserved: 0,
    };

    let mut out = Cursor::new(Vec::with_capacity(hash_offset + 32));
    header.write(&mut out).map_err(UffError::from)?;
    for (i, revolution) in track.revolutions.iter().enumerate() {
        let descriptor = RevolutionDescriptor {
            flux_count: revolution.flux_count() as u32,
            confidence: track.fused_confidence.get(i).copied().unwrap_or(0.0).mul_add(10_000.0, 0.0).round()
                as u16,
            reserved: [0; 10],
        };
        descriptor.write(&mut out).map_err(UffError::from)?;
    }
    for sample in &track.fused_flux {
        sample.write_le(&mut out).map_err(UffError::from)?;
    }
    std::io::Write::write_all(out.get_mut(), &weak_bytes).map_err(UffError::from)?;
    std::io::Write::write_all(out.get_mut(), &splice_bytes).map_err(UffError::from)?;
    std::io::Write::write_all(out.get_mut(), &sha256).map_err(UffError::from)?;

    Ok(out.into_inner())
}

/// Result of parsing a track chunk: the fused flux stream, weak regions, splices, and the
/// recorded hash, in a form cheap to hand back without reconstructing raw [`Revolution`]s the
/// caller never had.
pub struct ParsedTrackChunk {
    pub cylinder: u8,
    pub head: u8,
    pub fused_flux: Vec<u32>,
    pub weak_regions: Vec<WeakRegion>,
    pub splices: Vec<SplicePoint>,
    pub sha256: [u8; 32],
}

pub fn read_track_chunk(bytes: &[u8]) -> Result<ParsedTrackChunk, UffError> {
    let mut cursor = Cursor::new(bytes);
    let header = ChunkHeader::read(&mut cursor).map_err(UffError::from)?;

    for _ in 0..header.revolution_count {
        RevolutionDescriptor::read(&mut cursor).map_err(UffError::from)?;
    }

    let mut fused_flux = Vec::with_capacity(header.flux_count_total as usize);
    for _ in 0..header.flux_count_total {
        fused_flux.push(u32::read_le(&mut cursor).map_err(UffError::from)?);
    }

    let flags = TrackChunkFlags::from_bits_truncate(header.flags);
    let mut weak_regions = Vec::new();
    if flags.contains(TrackChunkFlags::HAS_WEAK) {
        let count = u32::read_le(&mut cursor).map_err(UffError::from)?;
        for _ in 0..count {
            let raw = RawWeakRegion::read(&mut cursor).map_err(UffError::from)?;
            weak_regions.push(WeakRegion {
                flux_offset: raw.offset as usize,
                bit_count: raw.bit_count as usize,
                mean_confidence: raw.confidence_scaled as f64 / 10_000.0,
            });
        }
    }

    let mut splices = Vec::new();
    if flags.contains(TrackChunkFlags::HAS_SPLICES) {
        let count = u32::read_le(&mut cursor).map_err(UffError::from)?;
        for _ in 0..count {
            let raw = RawSplicePoint::read(&mut cursor).map_err(UffError::from)?;
            splices.push(SplicePoint {
                flux_offset: raw.offset as usize,
                jump_ratio: raw.ratio_scaled as f64 / 1000.0,
            });
        }
    }

    let mut sha256 = [0u8; 32];
    std::io::Read::read_exact(&mut cursor, &mut sha256).map_err(UffError::from)?;

    Ok(ParsedTrackChunk {
        cylinder: header.cylinder,
        head: header.head,
        fused_flux,
        weak_regions,
        splices,
        sha256,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flux::Revolution;

    fn fused_track() -> Track {
        let mut track = Track::new(10, 1);
        track.add_revolution(Revolution::new(vec![100, 200, 100, 200], 90)).unwrap();
        track.add_revolution(Revolution::new(vec![100, 600, 100, 200], 85)).unwrap();
        track.fuse_and_analyze().unwrap();
        track
    }

    #[test]
    fn chunk_round_trips_fused_flux_and_hash() {
        let track = fused_track();
        let bytes = write_track_chunk(&track).unwrap();
        assert_eq!(&bytes[0..4], b"TRK\0");

        let parsed = read_track_chunk(&bytes).unwrap();
        assert_eq!(parsed.cylinder, 10);
        assert_eq!(parsed.head, 1);
        assert_eq!(parsed.fused_flux, track.fused_flux);
        assert_eq!(parsed.sha256, track.sha256.unwrap());
    }

    #[test]
    fn unfused_track_cannot_be_serialized() {
        let track = Track::new(0, 0);
        assert!(write_track_chunk(&track).is_err());
    }
}
