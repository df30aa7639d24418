//! Splice-point detection (§4.3 "Splice detection"): locates abrupt flux-interval discontinuities
//! left behind by disk duplicators that wrote a track in more than one pass.

/// A point in the fused flux stream where a sample's interval runs far longer than the track
/// average, consistent with a write-splice seam or a long sync rather than ordinary bit-cell
/// jitter. `flux_offset` is a *bit* offset (`2 * sample index`, per §4.3: GCR emits roughly two
/// bits per flux interval), not the raw sample index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplicePoint {
    pub flux_offset: usize,
    pub jump_ratio: f64,
}

/// A sample whose interval exceeds the track average by at least this factor is a splice
/// candidate, per §4.3 "Splice detection".
const SPLICE_AVERAGE_RATIO: f64 = 3.0;

/// Scans the fused flux stream for samples more than [`SPLICE_AVERAGE_RATIO`] times the track
/// average (`avg = Σ fused / |fused|`), reporting at most [`crate::MAX_SPLICES`] points (the
/// strongest jumps are kept when more are found, since a track with pathologically many
/// candidates is more likely heavily damaged than genuinely multi-spliced).
pub fn detect_splices(fused: &[u32]) -> Vec<SplicePoint> {
    if fused.is_empty() {
        return Vec::new();
    }
    let avg = fused.iter().map(|&s| s as f64).sum::<f64>() / fused.len() as f64;
    if avg <= 0.0 {
        return Vec::new();
    }

    let mut candidates: Vec<SplicePoint> = fused
        .iter()
        .enumerate()
        .filter_map(|(i, &sample)| {
            let sample = sample as f64;
            (sample > SPLICE_AVERAGE_RATIO * avg).then_some(SplicePoint {
                flux_offset: 2 * i,
                jump_ratio: sample / avg,
            })
        })
        .collect();

    if candidates.len() > crate::MAX_SPLICES {
        candidates.sort_by(|a, b| b.jump_ratio.partial_cmp(&a.jump_ratio).unwrap());
        candidates.truncate(crate::MAX_SPLICES);
        candidates.sort_by_key(|s| s.flux_offset);
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_stream_has_no_splices() {
        assert!(detect_splices(&[100, 102, 98, 101]).is_empty());
    }

    #[test]
    fn sample_far_above_average_is_flagged_at_its_bit_offset() {
        // avg = (100+100+1000+100)/4 = 325, 3*avg = 975; only the 1000 at index 2 qualifies.
        let splices = detect_splices(&[100, 100, 1000, 100]);
        assert_eq!(splices.len(), 1);
        assert_eq!(splices[0].flux_offset, 4);
    }

    #[test]
    fn excess_candidates_are_capped() {
        // Mostly-baseline samples with a minority of spikes keep the average low enough that
        // every spike still exceeds 3x it, so this can produce more than MAX_SPLICES candidates.
        let mut fused = vec![10u32; 2000];
        fused.extend(std::iter::repeat(100_000u32).take(crate::MAX_SPLICES + 20));
        let splices = detect_splices(&fused);
        assert!(splices.len() <= crate::MAX_SPLICES);
    }
}
