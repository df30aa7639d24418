//! Weak-bit region extraction (§4.3 "Weak region extraction"): a two-pass scan over the fused
//! confidence vector that coalesces adjacent low-confidence samples into runs.

/// A contiguous run of low-confidence flux samples: deliberately unstable magnetic domains used
/// by several copy-protection schemes, or simply a noisy capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeakRegion {
    pub flux_offset: usize,
    pub bit_count: usize,
    pub mean_confidence: f64,
}

/// Pass 1 marks every sample below [`crate::WEAK_CONFIDENCE_CUTOFF`]; pass 2 coalesces adjacent
/// marked samples into runs and reports each run's extent and mean confidence. A lone marked
/// sample still forms a one-sample region; isolated single-sample noise is not filtered out here
/// since copy-protection detection (C6) treats region count and density, not just total length.
pub fn extract_weak_regions(confidence: &[f64]) -> Vec<WeakRegion> {
    let mut regions = Vec::new();
    let mut run_start: Option<usize> = None;

    let mut flush = |start: usize, end: usize, regions: &mut Vec<WeakRegion>| {
        let slice = &confidence[start..end];
        let mean = slice.iter().sum::<f64>() / slice.len() as f64;
        regions.push(WeakRegion {
            flux_offset: start,
            bit_count: end - start,
            mean_confidence: mean,
        });
    };

    for (i, &c) in confidence.iter().enumerate() {
        let is_weak = c < crate::WEAK_CONFIDENCE_CUTOFF;
        match (is_weak, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                flush(start, i, &mut regions);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        flush(start, confidence.len(), &mut regions);
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_confidence_stream_has_no_weak_regions() {
        assert!(extract_weak_regions(&[1.0, 0.95, 0.99]).is_empty());
    }

    #[test]
    fn single_weak_run_is_coalesced() {
        let confidence = vec![1.0, 0.5, 0.4, 0.3, 1.0];
        let regions = extract_weak_regions(&confidence);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].flux_offset, 1);
        assert_eq!(regions[0].bit_count, 3);
    }

    #[test]
    fn two_separate_runs_stay_separate() {
        let confidence = vec![0.1, 1.0, 0.1, 1.0];
        let regions = extract_weak_regions(&confidence);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn trailing_weak_run_is_flushed() {
        let confidence = vec![1.0, 0.1, 0.1];
        let regions = extract_weak_regions(&confidence);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bit_count, 2);
    }
}
