//! Classical statistics and density heuristics over a value column.
//!
//! Provides:
//! - population mean / standard deviation
//! - z-score and IQR (Tukey fence) outliers
//! - a randomized isolation score (path length under random partitioning)
//! - 1-D centroid clustering with per-point distances

use rand::Rng;

use crate::config::DetectionConfig;

/// Random partitioning rounds averaged per point.
pub const ISOLATION_ITERATIONS: usize = 10;

/// Maximum subsample size used to isolate a point.
pub const ISOLATION_SUBSAMPLE_SIZE: usize = 256;

/// Centroid refinement rounds.
pub const CLUSTER_ITERATIONS: usize = 10;

/// Relative spread below which a series counts as constant.
const FLAT_TOLERANCE: f64 = 1e-12;

/// Euler–Mascheroni constant.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Mean and population standard deviation of a series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl SeriesStats {
    /// False for the NaN placeholder returned on empty input.
    pub fn is_defined(&self) -> bool {
        !self.mean.is_nan() && !self.std_dev.is_nan()
    }

    /// Undefined, or a spread indistinguishable from rounding noise.
    pub fn is_flat(&self) -> bool {
        !self.is_defined() || self.std_dev <= FLAT_TOLERANCE * self.mean.abs().max(1.0)
    }
}

/// A flagged point. `score` is the signed z-score for the z-score method and
/// the fence distance in IQR units for the IQR method.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outlier {
    pub index: usize,
    pub value: f64,
    pub score: f64,
}

/// Isolation heuristic result for one point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IsolationScore {
    pub index: usize,
    /// `2^(-avg_path / c(n))`; close to 1 means easily isolated.
    pub score: f64,
    pub average_path: f64,
    pub is_anomaly: bool,
}

/// Cluster membership and absolute distance to the cluster centroid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterAssignment {
    pub cluster: usize,
    pub distance: f64,
}

/// Stateless statistical detector.
pub struct StatisticalDetector;

impl StatisticalDetector {
    /// Population mean and standard deviation. Empty input yields NaN for both.
    pub fn stats(values: &[f64]) -> SeriesStats {
        if values.is_empty() {
            return SeriesStats {
                mean: f64::NAN,
                std_dev: f64::NAN,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        SeriesStats {
            mean,
            std_dev: variance.sqrt(),
        }
    }

    /// Points with `|z| > z_score_threshold`.
    ///
    /// Zero variance means every z-score is 0, so nothing is flagged.
    pub fn z_score_outliers(values: &[f64], config: &DetectionConfig) -> Vec<Outlier> {
        let stats = Self::stats(values);
        if stats.is_flat() {
            return vec![];
        }

        values
            .iter()
            .enumerate()
            .filter_map(|(index, &value)| {
                let z = (value - stats.mean) / stats.std_dev;
                (z.abs() > config.z_score_threshold).then_some(Outlier {
                    index,
                    value,
                    score: z,
                })
            })
            .collect()
    }

    /// Points outside `[Q1 - m·IQR, Q3 + m·IQR]`, scored by their distance
    /// past the fence in IQR units.
    ///
    /// A zero IQR yields no outliers.
    pub fn iqr_outliers(values: &[f64], config: &DetectionConfig) -> Vec<Outlier> {
        let Some((q1, q3)) = quartiles(values) else {
            return vec![];
        };
        let iqr = q3 - q1;
        if iqr < f64::EPSILON {
            return vec![];
        }

        let lower = q1 - config.iqr_multiplier * iqr;
        let upper = q3 + config.iqr_multiplier * iqr;

        values
            .iter()
            .enumerate()
            .filter_map(|(index, &value)| {
                let distance = if value < lower {
                    lower - value
                } else if value > upper {
                    value - upper
                } else {
                    return None;
                };
                Some(Outlier {
                    index,
                    value,
                    score: distance / iqr,
                })
            })
            .collect()
    }

    /// Randomized isolation score for every point.
    ///
    /// Each point is isolated `ISOLATION_ITERATIONS` times by random splits
    /// over a bounded subsample; the average path length is converted with
    /// the expected path length of an unsuccessful BST search. Results vary
    /// between calls unless the random source is pinned.
    pub fn isolation_scores<R: Rng + ?Sized>(
        values: &[f64],
        contamination: f64,
        rng: &mut R,
    ) -> Vec<IsolationScore> {
        let n = values.len();
        if n < 2 {
            return vec![];
        }
        let sample_size = n.min(ISOLATION_SUBSAMPLE_SIZE);
        let normalizer = expected_path_length(sample_size);
        let cutoff = 1.0 - contamination;

        let mut scores = Vec::with_capacity(n);
        for (index, &x) in values.iter().enumerate() {
            let mut total_path = 0.0;
            for _ in 0..ISOLATION_ITERATIONS {
                let sample = subsample(values, index, sample_size, rng);
                total_path += isolation_path(x, sample, rng);
            }
            let average_path = total_path / ISOLATION_ITERATIONS as f64;
            let score = 2f64.powf(-average_path / normalizer);
            scores.push(IsolationScore {
                index,
                score,
                average_path,
                is_anomaly: score > cutoff,
            });
        }
        scores
    }

    /// 1-D centroid clustering with `k` evenly spaced seeds over the value
    /// range. Distance to the centroid, not membership, is the anomaly signal.
    pub fn cluster_distances(values: &[f64], k: usize) -> Vec<ClusterAssignment> {
        if values.is_empty() {
            return vec![];
        }
        let k = k.max(1);
        let (min, max) = min_max(values);
        let mut centroids: Vec<f64> = if k == 1 {
            vec![min]
        } else {
            (0..k)
                .map(|i| {
                    let t = i as f64 / (k - 1) as f64;
                    min * (1.0 - t) + max * t
                })
                .collect()
        };

        let mut assignment = vec![0usize; values.len()];
        for round in 0..CLUSTER_ITERATIONS {
            let mut changed = false;
            for (slot, &v) in assignment.iter_mut().zip(values) {
                let nearest = nearest_centroid(&centroids, v);
                if *slot != nearest {
                    *slot = nearest;
                    changed = true;
                }
            }

            let mut sums = vec![0.0; k];
            let mut counts = vec![0usize; k];
            for (&c, &v) in assignment.iter().zip(values) {
                sums[c] += v;
                counts[c] += 1;
            }
            for c in 0..k {
                // empty clusters keep their seed
                if counts[c] > 0 {
                    centroids[c] = sums[c] / counts[c] as f64;
                }
            }

            if round > 0 && !changed {
                break;
            }
        }

        assignment
            .iter()
            .zip(values)
            .map(|(&cluster, &v)| ClusterAssignment {
                cluster,
                distance: (v - centroids[cluster]).abs(),
            })
            .collect()
    }

    /// Member count per cluster id.
    pub fn cluster_sizes(assignments: &[ClusterAssignment]) -> Vec<usize> {
        let k = assignments.iter().map(|a| a.cluster + 1).max().unwrap_or(0);
        let mut sizes = vec![0usize; k];
        for a in assignments {
            sizes[a.cluster] += 1;
        }
        sizes
    }
}

/// Expected path length `c(n)` of an unsuccessful search in a random BST.
pub fn expected_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn quartiles(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let q1 = sorted[((n as f64 * 0.25).floor() as usize).min(n - 1)];
    let q3 = sorted[((n as f64 * 0.75).floor() as usize).min(n - 1)];
    Some((q1, q3))
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn nearest_centroid(centroids: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, &c) in centroids.iter().enumerate() {
        let d = (value - c).abs();
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

/// Subsample containing the point at `index`. The full series is used when
/// it already fits.
fn subsample<'a, R: Rng + ?Sized>(
    values: &'a [f64],
    index: usize,
    size: usize,
    rng: &mut R,
) -> std::borrow::Cow<'a, [f64]> {
    if values.len() <= size {
        return std::borrow::Cow::Borrowed(values);
    }
    let mut picked: Vec<f64> = rand::seq::index::sample(rng, values.len(), size)
        .iter()
        .filter(|&i| i != index)
        .map(|i| values[i])
        .collect();
    picked.truncate(size - 1);
    picked.push(values[index]);
    std::borrow::Cow::Owned(picked)
}

/// Number of random splits needed to isolate `x`, plus the expected
/// remaining depth when the partition degenerates before isolation.
fn isolation_path<R: Rng + ?Sized>(
    x: f64,
    sample: std::borrow::Cow<'_, [f64]>,
    rng: &mut R,
) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    let height_limit = sample.len();
    let mut current = sample.into_owned();
    current.retain(|v| v.is_finite());
    let mut depth = 0usize;

    while current.len() > 1 && depth < height_limit {
        let (min, max) = min_max(&current);
        if !(max > min) {
            break;
        }
        // interpolate rather than sample a range: `max - min` may overflow
        let u: f64 = rng.gen();
        let split = min * (1.0 - u) + max * u;
        if x < split {
            current.retain(|&v| v < split);
        } else {
            current.retain(|&v| v >= split);
        }
        depth += 1;
    }

    depth as f64 + expected_path_length(current.len())
}
