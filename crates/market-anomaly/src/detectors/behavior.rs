//! Behavioral pattern comparison and seasonal deviation.
//!
//! Similarity is directional: proportional series score 1, mirrored series
//! score negative. Only shape divergence counts as a behavior change.

use super::statistical::StatisticalDetector;

/// Result of comparing a current pattern against historical ones.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BehaviorChange {
    pub has_changed: bool,
    /// Mean cosine similarity against the historical patterns.
    pub similarity: f64,
    /// `1 - similarity`, in `[0, 2]`.
    pub change_magnitude: f64,
}

impl BehaviorChange {
    fn unchanged() -> Self {
        Self {
            has_changed: false,
            similarity: 1.0,
            change_magnitude: 0.0,
        }
    }
}

/// A value far from its own phase bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeasonalDeviation {
    pub index: usize,
    /// `index mod period`.
    pub phase: usize,
    /// Mean of the phase bucket.
    pub expected: f64,
    pub value: f64,
    /// Signed z-score against the phase bucket.
    pub deviation: f64,
}

/// Stateless behavioral detector.
pub struct BehaviorPatternDetector;

impl BehaviorPatternDetector {
    /// Cosine similarity over the common prefix of `a` and `b`.
    ///
    /// Returns 0 when either vector has zero magnitude.
    pub fn pattern_similarity(a: &[f64], b: &[f64]) -> f64 {
        let len = a.len().min(b.len());
        let (a, b) = (&a[..len], &b[..len]);

        let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
        let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();

        if norm_a < f64::EPSILON || norm_b < f64::EPSILON {
            return 0.0;
        }
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }

    /// Compare `current` against every historical pattern and average the
    /// similarities. Changed when the average falls below `threshold`.
    ///
    /// With no history there is nothing to diverge from.
    pub fn behavior_change(
        current: &[f64],
        historical: &[Vec<f64>],
        threshold: f64,
    ) -> BehaviorChange {
        if historical.is_empty() {
            return BehaviorChange::unchanged();
        }
        let similarity = historical
            .iter()
            .map(|pattern| Self::pattern_similarity(current, pattern))
            .sum::<f64>()
            / historical.len() as f64;

        BehaviorChange {
            has_changed: similarity < threshold,
            similarity,
            change_magnitude: 1.0 - similarity,
        }
    }

    /// Values whose z-score against their own `index mod period` bucket
    /// exceeds `threshold`. Needs at least two full periods.
    pub fn seasonal_anomalies(
        values: &[f64],
        period: usize,
        threshold: f64,
    ) -> Vec<SeasonalDeviation> {
        if period == 0 || values.len() < period.saturating_mul(2) {
            return vec![];
        }

        let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); period];
        for (i, &v) in values.iter().enumerate() {
            buckets[i % period].push(v);
        }
        let bucket_stats: Vec<_> = buckets
            .iter()
            .map(|b| StatisticalDetector::stats(b))
            .collect();

        values
            .iter()
            .enumerate()
            .filter_map(|(index, &value)| {
                let phase = index % period;
                let stats = bucket_stats[phase];
                if stats.is_flat() {
                    return None;
                }
                let deviation = (value - stats.mean) / stats.std_dev;
                (deviation.abs() > threshold).then_some(SeasonalDeviation {
                    index,
                    phase,
                    expected: stats.mean,
                    value,
                    deviation,
                })
            })
            .collect()
    }
}
