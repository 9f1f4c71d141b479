//! Detection algorithms registered with the orchestrator.
//!
//! Provides:
//! - `DetectionAlgorithm` trait for pluggable detection
//! - 7 built-in algorithms: Statistical (z-score + IQR), Trend, Volatility,
//!   Volume, Cluster (isolation + centroids), Behavior, Seasonal
//! - `default_algorithms()` returning them in their fixed evaluation order
//!
//! Every algorithm maps its leaf detector's output onto `RawAnomaly`
//! signals with a normalized score in `[0, 1]`.

use rand::RngCore;

use crate::config::DetectionConfig;
use crate::detectors::{BehaviorPatternDetector, StatisticalDetector, TimeSeriesDetector};
use crate::series::SeriesWindow;

use super::types::{AnomalyType, RawAnomaly};

// ── Trait ────────────────────────────────────────────────────────────────

/// Pluggable anomaly detection algorithm.
///
/// Each algorithm inspects a chronologically sorted series and produces
/// zero or more raw anomaly signals of a single `AnomalyType`.
pub trait DetectionAlgorithm: Send + Sync {
    /// Detect anomalies over the whole window.
    fn run(
        &self,
        series: &SeriesWindow,
        config: &DetectionConfig,
        rng: &mut dyn RngCore,
    ) -> Vec<RawAnomaly>;

    /// Name of this detection algorithm (for provenance tracking).
    fn name(&self) -> &str;

    /// The anomaly type this algorithm reports.
    fn anomaly_type(&self) -> AnomalyType;
}

/// The built-in algorithms in evaluation order.
pub fn default_algorithms() -> Vec<Box<dyn DetectionAlgorithm>> {
    vec![
        Box::new(StatisticalOutlierAlgorithm),
        Box::new(TrendBreakAlgorithm),
        Box::new(VolatilitySpikeAlgorithm),
        Box::new(VolumeSpikeAlgorithm),
        Box::new(ClusterOutlierAlgorithm),
        Box::new(BehaviorChangeAlgorithm),
        Box::new(SeasonalAlgorithm),
    ]
}

/// Z-score strength: three times the threshold saturates.
fn z_score_strength(z: f64, threshold: f64) -> f64 {
    (z.abs() / (threshold * 3.0)).min(1.0)
}

// ── 1. Statistical Outlier (z-score + IQR) ──────────────────────────────

/// Flags values outside the series distribution by z-score or Tukey fences.
pub struct StatisticalOutlierAlgorithm;

impl DetectionAlgorithm for StatisticalOutlierAlgorithm {
    fn run(
        &self,
        series: &SeriesWindow,
        config: &DetectionConfig,
        _rng: &mut dyn RngCore,
    ) -> Vec<RawAnomaly> {
        let values = series.values();
        let mut raws = Vec::new();

        for o in StatisticalDetector::z_score_outliers(values, config) {
            raws.push(
                RawAnomaly::new(
                    self.anomaly_type(),
                    o.index,
                    z_score_strength(o.score, config.z_score_threshold),
                    "z_score",
                    format!(
                        "value {:.4} has z-score {:.2} (threshold {:.1})",
                        o.value, o.score, config.z_score_threshold
                    ),
                )
                .with_detail("z_score", o.score),
            );
        }

        for o in StatisticalDetector::iqr_outliers(values, config) {
            raws.push(
                RawAnomaly::new(
                    self.anomaly_type(),
                    o.index,
                    (o.score / (config.iqr_multiplier * 4.0)).min(1.0),
                    "iqr",
                    format!(
                        "value {:.4} lies {:.2} IQRs outside the {:.1}x fences",
                        o.value, o.score, config.iqr_multiplier
                    ),
                )
                .with_detail("iqr_distance", o.score),
            );
        }

        raws
    }

    fn name(&self) -> &str {
        "statistical"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::StatisticalOutlier
    }
}

// ── 2. Trend Break ──────────────────────────────────────────────────────

/// Flags reversals of the local regression slope.
pub struct TrendBreakAlgorithm;

impl DetectionAlgorithm for TrendBreakAlgorithm {
    fn run(
        &self,
        series: &SeriesWindow,
        config: &DetectionConfig,
        _rng: &mut dyn RngCore,
    ) -> Vec<RawAnomaly> {
        TimeSeriesDetector::trend_changes(series.values(), config.trend_window_size)
            .into_iter()
            .map(|b| {
                // noise_floor * 4 is the mean absolute step
                let score = (b.magnitude / (b.noise_floor * 16.0)).min(1.0);
                let direction = if b.slope_after < 0.0 { "down" } else { "up" };
                RawAnomaly::new(
                    self.anomaly_type(),
                    b.index,
                    score,
                    self.name(),
                    format!(
                        "trend reversed {}: slope {:.4} -> {:.4}",
                        direction, b.slope_before, b.slope_after
                    ),
                )
                .with_detail("slope_before", b.slope_before)
                .with_detail("slope_after", b.slope_after)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "trend"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::TrendBreak
    }
}

// ── 3. Volatility Spike ─────────────────────────────────────────────────

/// Flags rolling windows far more volatile than the whole series.
pub struct VolatilitySpikeAlgorithm;

impl DetectionAlgorithm for VolatilitySpikeAlgorithm {
    fn run(
        &self,
        series: &SeriesWindow,
        config: &DetectionConfig,
        _rng: &mut dyn RngCore,
    ) -> Vec<RawAnomaly> {
        TimeSeriesDetector::volatility_spikes(series.values(), config)
            .into_iter()
            .map(|s| {
                RawAnomaly::new(
                    self.anomaly_type(),
                    s.index,
                    (s.ratio / (config.volatility_multiplier * 2.0)).min(1.0),
                    self.name(),
                    format!(
                        "local volatility {:.4} is {:.2}x the series volatility {:.4}",
                        s.local_std_dev, s.ratio, s.overall_std_dev
                    ),
                )
                .with_detail("local_std_dev", s.local_std_dev)
                .with_detail("volatility_ratio", s.ratio)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "volatility"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::VolatilitySpike
    }
}

// ── 4. Volume Spike ─────────────────────────────────────────────────────

/// Z-score outliers over the volume column.
pub struct VolumeSpikeAlgorithm;

impl DetectionAlgorithm for VolumeSpikeAlgorithm {
    fn run(
        &self,
        series: &SeriesWindow,
        config: &DetectionConfig,
        _rng: &mut dyn RngCore,
    ) -> Vec<RawAnomaly> {
        StatisticalDetector::z_score_outliers(series.volumes(), config)
            .into_iter()
            .map(|o| {
                RawAnomaly::new(
                    self.anomaly_type(),
                    o.index,
                    z_score_strength(o.score, config.z_score_threshold),
                    self.name(),
                    format!(
                        "volume {:.2} has z-score {:.2} (threshold {:.1})",
                        o.value, o.score, config.z_score_threshold
                    ),
                )
                .with_detail("volume_z_score", o.score)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "volume"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::VolumeAnomaly
    }
}

// ── 5. Cluster Outlier ──────────────────────────────────────────────────

/// Isolation score above this marks a point as easier to isolate than average.
const ISOLATION_SUPPORT_FLOOR: f64 = 0.5;

/// Density heuristic: a point is an outlier when the isolation heuristic
/// flags it, or when it sits in an undersized cluster and is easier to
/// isolate than an average point.
pub struct ClusterOutlierAlgorithm;

impl DetectionAlgorithm for ClusterOutlierAlgorithm {
    fn run(
        &self,
        series: &SeriesWindow,
        config: &DetectionConfig,
        rng: &mut dyn RngCore,
    ) -> Vec<RawAnomaly> {
        let values = series.values();
        let isolation =
            StatisticalDetector::isolation_scores(values, config.isolation_contamination, rng);
        if isolation.is_empty() {
            return vec![];
        }
        let clusters = StatisticalDetector::cluster_distances(values, config.cluster_count);
        let sizes = StatisticalDetector::cluster_sizes(&clusters);

        isolation
            .iter()
            .zip(&clusters)
            .filter_map(|(iso, cluster)| {
                let cluster_size = sizes[cluster.cluster];
                let small_cluster = cluster_size < config.min_cluster_size;
                if !(iso.is_anomaly || (small_cluster && iso.score > ISOLATION_SUPPORT_FLOOR)) {
                    return None;
                }
                Some(
                    RawAnomaly::new(
                        self.anomaly_type(),
                        iso.index,
                        (iso.score - ISOLATION_SUPPORT_FLOOR) * 2.0,
                        self.name(),
                        format!(
                            "value isolated after {:.2} splits (score {:.3}), cluster of {} at distance {:.4}",
                            iso.average_path, iso.score, cluster_size, cluster.distance
                        ),
                    )
                    .with_detail("isolation_score", iso.score)
                    .with_detail("cluster", cluster.cluster)
                    .with_detail("cluster_size", cluster_size)
                    .with_detail("centroid_distance", cluster.distance),
                )
            })
            .collect()
    }

    fn name(&self) -> &str {
        "cluster"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::ClusterOutlier
    }
}

// ── 6. Behavior Change ──────────────────────────────────────────────────

/// Compares the shape of the latest `window_size` values against up to
/// `pattern_history_length` preceding windows.
pub struct BehaviorChangeAlgorithm;

impl BehaviorChangeAlgorithm {
    /// Mean-centred copy of `window`, or `None` when the window is flat.
    fn centered(window: &[f64]) -> Option<Vec<f64>> {
        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let centered: Vec<f64> = window.iter().map(|v| v - mean).collect();
        centered
            .iter()
            .any(|v| v.abs() > f64::EPSILON)
            .then_some(centered)
    }
}

impl DetectionAlgorithm for BehaviorChangeAlgorithm {
    fn run(
        &self,
        series: &SeriesWindow,
        config: &DetectionConfig,
        _rng: &mut dyn RngCore,
    ) -> Vec<RawAnomaly> {
        let values = series.values();
        let w = config.window_size;
        let n = values.len();
        if w == 0 || n < w.saturating_mul(2) {
            return vec![];
        }

        // a flat window has no shape to compare
        let Some(current) = Self::centered(&values[n - w..]) else {
            return vec![];
        };
        let historical: Vec<Vec<f64>> = (1..=config.pattern_history_length)
            .map_while(|back| (back + 1).checked_mul(w).and_then(|span| n.checked_sub(span)))
            .filter_map(|start| Self::centered(&values[start..start + w]))
            .collect();
        if historical.is_empty() {
            return vec![];
        }

        let change = BehaviorPatternDetector::behavior_change(
            &current,
            &historical,
            config.behavior_change_threshold,
        );
        if !change.has_changed {
            return vec![];
        }

        vec![RawAnomaly::new(
            self.anomaly_type(),
            n - 1,
            change.change_magnitude / 2.0,
            self.name(),
            format!(
                "recent pattern similarity {:.3} below {:.2} across {} historical windows",
                change.similarity,
                config.behavior_change_threshold,
                historical.len()
            ),
        )
        .with_detail("similarity", change.similarity)
        .with_detail("change_magnitude", change.change_magnitude)
        .with_detail("patterns_compared", historical.len())]
    }

    fn name(&self) -> &str {
        "behavior"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::BehaviorChange
    }
}

// ── 7. Seasonal ─────────────────────────────────────────────────────────

/// Values far from their own `index mod seasonal_period` bucket.
pub struct SeasonalAlgorithm;

impl DetectionAlgorithm for SeasonalAlgorithm {
    fn run(
        &self,
        series: &SeriesWindow,
        config: &DetectionConfig,
        _rng: &mut dyn RngCore,
    ) -> Vec<RawAnomaly> {
        BehaviorPatternDetector::seasonal_anomalies(
            series.values(),
            config.seasonal_period,
            config.z_score_threshold,
        )
        .into_iter()
        .map(|d| {
            RawAnomaly::new(
                self.anomaly_type(),
                d.index,
                z_score_strength(d.deviation, config.z_score_threshold),
                self.name(),
                format!(
                    "value {:.4} vs phase-{} mean {:.4} ({:.2} std devs)",
                    d.value, d.phase, d.expected, d.deviation
                ),
            )
            .with_detail("phase", d.phase)
            .with_detail("seasonal_mean", d.expected)
            .with_detail("seasonal_z_score", d.deviation)
        })
        .collect()
    }

    fn name(&self) -> &str {
        "seasonal"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::SeasonalAnomaly
    }
}
