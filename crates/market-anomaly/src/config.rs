//! Detection configuration: defaults, partial overrides, loading and validation.
//!
//! A `DetectionConfig` always carries a complete set of thresholds. Callers
//! that only care about a few knobs pass a `DetectionOverrides`, which is
//! merged over the orchestrator's base configuration on every call.

use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalySeverity;
use crate::error::{AnomalyError, AnomalyResult};

/// Default z-score threshold for outlier detection.
pub const DEFAULT_Z_SCORE_THRESHOLD: f64 = 3.0;

/// Default IQR multiplier (Tukey fences).
pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

/// Default cooldown between records of the same symbol+type (5 minutes).
pub const DEFAULT_COOLDOWN_MS: u64 = 300_000;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "ANOMALY";

/// Score cut points used to map a normalized score onto a severity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            low: 0.25,
            medium: 0.5,
            high: 0.75,
        }
    }
}

impl SeverityThresholds {
    /// Map a normalized score in `[0, 1]` onto a severity bucket.
    ///
    /// Anything above `high` is critical.
    pub fn classify(&self, score: f64) -> AnomalySeverity {
        if score > self.high {
            AnomalySeverity::Critical
        } else if score > self.medium {
            AnomalySeverity::High
        } else if score > self.low {
            AnomalySeverity::Medium
        } else {
            AnomalySeverity::Low
        }
    }
}

/// Thresholds and window sizes for every detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// |z| above which a value is a statistical outlier.
    pub z_score_threshold: f64,
    /// Multiplier applied to the IQR to build the outlier fences.
    pub iqr_multiplier: f64,
    /// Series shorter than this are skipped entirely.
    pub min_data_points: usize,
    /// Pattern window length for behavior comparison.
    pub window_size: usize,
    /// Sub-window length for local slope estimation.
    pub trend_window_size: usize,
    /// Rolling window for local volatility.
    pub volatility_window_size: usize,
    /// Local/overall standard deviation ratio that counts as a spike.
    pub volatility_multiplier: f64,
    /// Expected anomaly fraction for the isolation heuristic (0..1).
    pub isolation_contamination: f64,
    /// Clusters smaller than this are treated as outlying.
    pub min_cluster_size: usize,
    /// Number of centroids for the clustering heuristic.
    pub cluster_count: usize,
    /// Maximum number of historical windows compared against the current one.
    pub pattern_history_length: usize,
    /// Aggregate similarity below which behavior is considered changed.
    pub behavior_change_threshold: f64,
    /// Period (in points) for seasonal bucketing.
    pub seasonal_period: usize,
    /// Minimum interval between records of the same symbol+type.
    pub cooldown_period_ms: u64,
    /// Score cut points for severity assignment.
    pub severity_thresholds: SeverityThresholds,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            z_score_threshold: DEFAULT_Z_SCORE_THRESHOLD,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            min_data_points: 10,
            window_size: 10,
            trend_window_size: 5,
            volatility_window_size: 5,
            volatility_multiplier: 2.0,
            isolation_contamination: 0.1,
            min_cluster_size: 3,
            cluster_count: 3,
            pattern_history_length: 5,
            behavior_change_threshold: 0.3,
            seasonal_period: 7,
            cooldown_period_ms: DEFAULT_COOLDOWN_MS,
            severity_thresholds: SeverityThresholds::default(),
        }
    }
}

impl DetectionConfig {
    /// Load configuration from defaults, an optional file, and `ANOMALY__*`
    /// environment variables (later sources win).
    ///
    /// A missing file is not an error.
    pub fn load(path: Option<&str>) -> AnomalyResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DetectionConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let loaded: DetectionConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Cooldown as a chrono duration.
    pub fn cooldown(&self) -> chrono::Duration {
        let ms = self.cooldown_period_ms.min(i64::MAX as u64) as i64;
        chrono::Duration::milliseconds(ms)
    }

    /// Reject configurations no detector can work with.
    pub fn validate(&self) -> AnomalyResult<()> {
        positive("z_score_threshold", self.z_score_threshold)?;
        positive("iqr_multiplier", self.iqr_multiplier)?;
        positive("volatility_multiplier", self.volatility_multiplier)?;

        if self.min_data_points == 0 {
            return Err(AnomalyError::invalid_config("min_data_points", "must be at least 1"));
        }
        for (field, size) in [
            ("window_size", self.window_size),
            ("trend_window_size", self.trend_window_size),
            ("volatility_window_size", self.volatility_window_size),
        ] {
            if size < 2 {
                return Err(AnomalyError::invalid_config(field, "must be at least 2"));
            }
        }
        if !(self.isolation_contamination > 0.0 && self.isolation_contamination < 1.0) {
            return Err(AnomalyError::invalid_config(
                "isolation_contamination",
                format!("{} is outside (0, 1)", self.isolation_contamination),
            ));
        }
        for (field, count) in [
            ("min_cluster_size", self.min_cluster_size),
            ("cluster_count", self.cluster_count),
            ("pattern_history_length", self.pattern_history_length),
            ("seasonal_period", self.seasonal_period),
        ] {
            if count == 0 {
                return Err(AnomalyError::invalid_config(field, "must be at least 1"));
            }
        }
        if !(-1.0..=1.0).contains(&self.behavior_change_threshold) {
            return Err(AnomalyError::invalid_config(
                "behavior_change_threshold",
                format!("{} is outside [-1, 1]", self.behavior_change_threshold),
            ));
        }

        let t = &self.severity_thresholds;
        if !(0.0 <= t.low && t.low < t.medium && t.medium < t.high && t.high <= 1.0) {
            return Err(AnomalyError::invalid_config(
                "severity_thresholds",
                format!(
                    "expected 0 <= low < medium < high <= 1, got {}/{}/{}",
                    t.low, t.medium, t.high
                ),
            ));
        }
        Ok(())
    }
}

fn positive(field: &str, value: f64) -> AnomalyResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(AnomalyError::invalid_config(
            field,
            format!("{} must be a positive finite number", value),
        ))
    }
}

/// Partial configuration; `None` fields keep the base value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOverrides {
    pub z_score_threshold: Option<f64>,
    pub iqr_multiplier: Option<f64>,
    pub min_data_points: Option<usize>,
    pub window_size: Option<usize>,
    pub trend_window_size: Option<usize>,
    pub volatility_window_size: Option<usize>,
    pub volatility_multiplier: Option<f64>,
    pub isolation_contamination: Option<f64>,
    pub min_cluster_size: Option<usize>,
    pub cluster_count: Option<usize>,
    pub pattern_history_length: Option<usize>,
    pub behavior_change_threshold: Option<f64>,
    pub seasonal_period: Option<usize>,
    pub cooldown_period_ms: Option<u64>,
    pub severity_thresholds: Option<SeverityThresholds>,
}

impl DetectionOverrides {
    /// Merge these overrides over `base`.
    pub fn apply(&self, base: &DetectionConfig) -> DetectionConfig {
        DetectionConfig {
            z_score_threshold: self.z_score_threshold.unwrap_or(base.z_score_threshold),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(base.iqr_multiplier),
            min_data_points: self.min_data_points.unwrap_or(base.min_data_points),
            window_size: self.window_size.unwrap_or(base.window_size),
            trend_window_size: self.trend_window_size.unwrap_or(base.trend_window_size),
            volatility_window_size: self
                .volatility_window_size
                .unwrap_or(base.volatility_window_size),
            volatility_multiplier: self
                .volatility_multiplier
                .unwrap_or(base.volatility_multiplier),
            isolation_contamination: self
                .isolation_contamination
                .unwrap_or(base.isolation_contamination),
            min_cluster_size: self.min_cluster_size.unwrap_or(base.min_cluster_size),
            cluster_count: self.cluster_count.unwrap_or(base.cluster_count),
            pattern_history_length: self
                .pattern_history_length
                .unwrap_or(base.pattern_history_length),
            behavior_change_threshold: self
                .behavior_change_threshold
                .unwrap_or(base.behavior_change_threshold),
            seasonal_period: self.seasonal_period.unwrap_or(base.seasonal_period),
            cooldown_period_ms: self.cooldown_period_ms.unwrap_or(base.cooldown_period_ms),
            severity_thresholds: self.severity_thresholds.unwrap_or(base.severity_thresholds),
        }
    }

    pub fn with_z_score_threshold(mut self, threshold: f64) -> Self {
        self.z_score_threshold = Some(threshold);
        self
    }

    pub fn with_min_data_points(mut self, n: usize) -> Self {
        self.min_data_points = Some(n);
        self
    }

    pub fn with_cooldown_ms(mut self, ms: u64) -> Self {
        self.cooldown_period_ms = Some(ms);
        self
    }
}
