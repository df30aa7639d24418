//! Confidence-weighted revolution fusion (§4.3 "Fuse").

use super::{FluxSample, Revolution};

/// Fuses up to [`crate::MAX_REVOLUTIONS`] revolutions into a single flux stream plus a
/// per-sample confidence vector.
///
/// A single revolution is copied verbatim with every confidence set to `0.5` ("unknown"), per
/// §4.3 and the §8 boundary test. With two or more revolutions, the fused stream is truncated to
/// `N = min(rev.flux_count)` (the data model's "fused output uses the minimum count across
/// revolutions" invariant): `fused[i] = round(Σ_r rev[r].samples[i] * weight[r] / Σ_r weight[r])`,
/// where `weight[r] = rev[r].confidence / 100`. `confidence[i] = clamp(1 - rd / WEAK_THRESHOLD, 0,
/// 1)` with `rd = sqrt(σ²) / fused[i]` and `σ² = Σ_r weight[r] * (samples[i] - fused[i])² /
/// n_contributors`.
pub fn fuse(revolutions: &[Revolution]) -> (Vec<FluxSample>, Vec<f64>) {
    if revolutions.len() == 1 {
        let samples = revolutions[0].samples.clone();
        let confidence = vec![0.5; samples.len()];
        return (samples, confidence);
    }

    let len = revolutions.iter().map(Revolution::flux_count).min().unwrap_or(0);
    let mut fused = Vec::with_capacity(len);
    let mut confidence = Vec::with_capacity(len);

    for i in 0..len {
        let contributions: Vec<(f64, f64)> = revolutions
            .iter()
            .map(|rev| (rev.samples[i] as f64, (rev.confidence as f64 / 100.0).max(0.01)))
            .collect();

        let total_weight: f64 = contributions.iter().map(|(_, w)| w).sum();
        let weighted_sum: f64 = contributions.iter().map(|(v, w)| v * w).sum();
        let mean = weighted_sum / total_weight;
        let fused_value = mean.round();
        fused.push(fused_value as FluxSample);

        let rd = relative_deviation(&contributions, fused_value);
        let c = 1.0 - rd / crate::WEAK_THRESHOLD;
        confidence.push(c.clamp(0.0, 1.0));
    }

    (fused, confidence)
}

/// `sqrt(σ²) / fused_value`, per §4.3, where `σ² = Σ_r weight[r] * (samples[i] - fused_value)² /
/// n_contributors`. Returns `0.0` for a single contributing revolution or a zero fused value,
/// since relative deviation is undefined there and the caller should read that as "no
/// disagreement detected".
fn relative_deviation(contributions: &[(f64, f64)], fused_value: f64) -> f64 {
    if contributions.len() < 2 || fused_value == 0.0 {
        return 0.0;
    }
    let variance: f64 = contributions.iter().map(|(v, w)| w * (v - fused_value).powi(2)).sum::<f64>()
        / contributions.len() as f64;
    variance.sqrt() / fused_value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_revolutions_fuse_with_full_confidence() {
        let revs = vec![
            Revolution::new(vec![100, 200, 300], 90),
            Revolution::new(vec![100, 200, 300], 90),
            Revolution::new(vec![100, 200, 300], 90),
        ];
        let (fused, confidence) = fuse(&revs);
        assert_eq!(fused, vec![100, 200, 300]);
        assert!(confidence.iter().all(|&c| (c - 1.0).abs() < 1e-9));
    }

    #[test]
    fn disagreeing_revolutions_lower_confidence() {
        let revs = vec![
            Revolution::new(vec![100], 90),
            Revolution::new(vec![140], 90),
            Revolution::new(vec![100], 90),
        ];
        let (_, confidence) = fuse(&revs);
        assert!(confidence[0] < 1.0);
    }

    #[test]
    fn shorter_revolution_truncates_the_fused_stream_to_the_minimum_count() {
        let revs = vec![Revolution::new(vec![100, 200, 300], 90), Revolution::new(vec![100, 200], 90)];
        let (fused, confidence) = fuse(&revs);
        assert_eq!(fused.len(), 2);
        assert_eq!(confidence.len(), 2);
    }

    #[test]
    fn single_revolution_yields_uniform_half_confidence() {
        let revs = vec![Revolution::new(vec![77, 88], 50)];
        let (fused, confidence) = fuse(&revs);
        assert_eq!(fused, vec![77, 88]);
        assert!(confidence.iter().all(|&c| c == 0.5));
    }
}
