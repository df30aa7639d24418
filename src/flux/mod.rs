//! Flux fusion kernel (C4): confidence-weighted revolution fusion, weak-bit region extraction,
//! and splice-point detection, plus the [`Track`]/[`Revolution`] data model shared with the UFF
//! container (C5).

mod fusion;
mod hash;
mod splice;
mod weak;

pub use fusion::fuse;
pub use hash::track_hash;
pub use splice::{detect_splices, SplicePoint};
pub use weak::{extract_weak_regions, WeakRegion};

use crate::error::{kinds, UffError};

/// A single flux transition interval, in ticks at a fixed tick resolution (default 25ns). Zero is
/// reserved for "no transition in window" and is never produced by [`fuse`].
pub type FluxSample = u32;

/// One complete rotation of a disk under the read head.
#[derive(Clone, Debug, Default)]
pub struct Revolution {
    pub samples: Vec<FluxSample>,
    pub index_pulse: usize,
    pub rpm: f64,
    /// Confidence in `0..=100`, reflecting capture-hardware quality for this revolution.
    pub confidence: u8,
}

impl Revolution {
    pub fn new(samples: Vec<FluxSample>, confidence: u8) -> Self {
        Self {
            samples,
            index_pulse: 0,
            rpm: 300.0,
            confidence,
        }
    }

    pub fn flux_count(&self) -> usize {
        self.samples.len()
    }
}

/// A single track's flux data: its raw revolutions plus, once fused, the combined flux stream and
/// per-sample confidence, weak regions, splice points, and integrity hashes.
#[derive(Clone, Debug, Default)]
pub struct Track {
    pub cylinder: u8,
    pub head: u8,
    pub revolutions: Vec<Revolution>,
    pub fused_flux: Vec<FluxSample>,
    pub fused_confidence: Vec<f64>,
    pub weak_regions: Vec<WeakRegion>,
    pub splices: Vec<SplicePoint>,
    pub sha256: Option<[u8; 32]>,
    pub crc32: Option<u32>,
}

impl Track {
    pub fn new(cylinder: u8, head: u8) -> Self {
        Self {
            cylinder,
            head,
            ..Default::default()
        }
    }

    /// Adds a revolution, enforcing the `1..=MAX_REVOLUTIONS` data-model invariant.
    pub fn add_revolution(&mut self, revolution: Revolution) -> Result<(), UffError> {
        if self.revolutions.len() >= crate::MAX_REVOLUTIONS {
            return Err(kinds::invalid_parameter()
                .with_context(format!("a track may hold at most {} revolutions", crate::MAX_REVOLUTIONS)));
        }
        self.revolutions.push(revolution);
        Ok(())
    }

    /// Runs the full fusion pipeline: fuse revolutions, extract weak regions, detect splices, and
    /// compute the integrity hashes. Idempotent: calling it twice in a row on unchanged
    /// revolutions produces an identical weak-region set, per the §8 invariant.
    pub fn fuse_and_analyze(&mut self) -> Result<(), UffError> {
        if self.revolutions.is_empty() {
            return Err(kinds::invalid_parameter().with_context("cannot fuse a track with no revolutions"));
        }
        let (fused, confidence) = fuse(&self.revolutions);
        self.weak_regions = extract_weak_regions(&confidence);
        self.splices = detect_splices(&fused);
        let (sha256, crc32) = track_hash(self.cylinder, self.head, &fused, &self.weak_regions);
        self.fused_flux = fused;
        self.fused_confidence = confidence;
        self.sha256 = Some(sha256);
        self.crc32 = Some(crc32);
        Ok(())
    }

    /// `|fused| == |confidence|`, per §3.
    pub fn invariants_hold(&self) -> bool {
        if self.fused_flux.len() != self.fused_confidence.len() {
            return false;
        }
        self.weak_regions
            .iter()
            .all(|w| w.flux_offset + w.bit_count <= self.fused_flux.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuse_and_analyze_preserves_length_invariant() {
        let mut track = Track::new(0, 0);
        track.add_revolution(Revolution::new(vec![100, 200, 100, 200], 90)).unwrap();
        track.add_revolution(Revolution::new(vec![105, 195, 102, 198], 85)).unwrap();
        track.fuse_and_analyze().unwrap();
        assert!(track.invariants_hold());
        assert_eq!(track.fused_flux.len(), track.fused_confidence.len());
    }

    #[test]
    fn sixth_revolution_is_rejected() {
        let mut track = Track::new(0, 0);
        for _ in 0..crate::MAX_REVOLUTIONS {
            track.add_revolution(Revolution::new(vec![100], 90)).unwrap();
        }
        assert!(track.add_revolution(Revolution::new(vec![100], 90)).is_err());
    }
}
