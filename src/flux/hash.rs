//! Track integrity hashing (§4.3 "Track hash"): a SHA-256 and CRC-32 computed over the track's
//! identity, fused flux stream, and weak-region layout, so that re-fusing unchanged revolutions
//! always reproduces the same digest.

use super::{FluxSample, WeakRegion};
use crate::codec::checksum::{crc32, sha256};

/// Serializes the fused samples (as little-endian u32s) once, reused by both digests: the
/// SHA-256 hashes `metadata(cyl, head, flags, encoding) ∥ samples ∥ weak_regions`, while the
/// CRC-32 covers the samples alone, per §4.3 "Track hash" ("`crc32(fused_samples_as_LE_u32)`").
/// A mismatched CRC therefore still tells you the flux stream itself changed, independent of
/// weak-region bookkeeping.
pub fn track_hash(cylinder: u8, head: u8, fused: &[FluxSample], weak_regions: &[WeakRegion]) -> ([u8; 32], u32) {
    let mut samples_buf = Vec::with_capacity(fused.len() * 4);
    for sample in fused {
        samples_buf.extend_from_slice(&sample.to_le_bytes());
    }

    let mut sha_buf = Vec::with_capacity(4 + samples_buf.len() + weak_regions.len() * 16);
    // flags/encoding are not tracked on `Track` itself (they live on the UFF chunk header this
    // track is eventually serialized into); the digest reserves the bytes as zero rather than
    // silently dropping the field the spec names.
    sha_buf.extend_from_slice(&[cylinder, head, 0, 0]);
    sha_buf.extend_from_slice(&samples_buf);
    for region in weak_regions {
        sha_buf.extend_from_slice(&(region.flux_offset as u64).to_le_bytes());
        sha_buf.extend_from_slice(&(region.bit_count as u64).to_le_bytes());
    }

    (sha256(&sha_buf), crc32(&samples_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_hash_identically() {
        let fused = vec![100, 200, 300];
        let (h1, c1) = track_hash(0, 0, &fused, &[]);
        let (h2, c2) = track_hash(0, 0, &fused, &[]);
        assert_eq!(h1, h2);
        assert_eq!(c1, c2);
    }

    #[test]
    fn differing_head_changes_the_hash() {
        let fused = vec![100, 200, 300];
        let (h0, _) = track_hash(0, 0, &fused, &[]);
        let (h1, _) = track_hash(0, 1, &fused, &[]);
        assert_ne!(h0, h1);
    }

    #[test]
    fn weak_regions_participate_in_the_hash() {
        let fused = vec![100, 200, 300];
        let region = WeakRegion {
            flux_offset: 1,
            bit_count: 1,
            mean_confidence: 0.2,
        };
        let (h_plain, _) = track_hash(0, 0, &fused, &[]);
        let (h_with_region, _) = track_hash(0, 0, &fused, &[region]);
        assert_ne!(h_plain, h_with_region);
    }
}
