//! Anomaly record type definitions.
//!
//! Types for representing detected anomalies, their types, severity levels,
//! lifecycle status, cross-symbol correlations and aggregate statistics.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Identifier Types ────────────────────────────────────────────────────

/// Unique identifier for a detected anomaly. Never reused.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnomalyId(pub String);

impl AnomalyId {
    /// Generate a new unique anomaly ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for AnomalyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnomalyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anomaly:{}", self.0)
    }
}

// ── Anomaly Severity ────────────────────────────────────────────────────

/// Severity of a detected anomaly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// ── Anomaly Type ────────────────────────────────────────────────────────

/// Classification of detected anomalies. Closed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    /// Value far from the series distribution (z-score / IQR).
    StatisticalOutlier,
    /// Local slope reversed direction.
    TrendBreak,
    /// Local volatility well above the series volatility.
    VolatilitySpike,
    /// Traded volume far from its distribution.
    VolumeAnomaly,
    /// Recent shape diverges from historical shapes.
    BehaviorChange,
    /// Value deviates from its own seasonal phase.
    SeasonalAnomaly,
    /// Point isolated from the dense part of the series.
    ClusterOutlier,
}

impl AnomalyType {
    pub const ALL: [AnomalyType; 7] = [
        AnomalyType::StatisticalOutlier,
        AnomalyType::TrendBreak,
        AnomalyType::VolatilitySpike,
        AnomalyType::VolumeAnomaly,
        AnomalyType::BehaviorChange,
        AnomalyType::SeasonalAnomaly,
        AnomalyType::ClusterOutlier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatisticalOutlier => "statistical_outlier",
            Self::TrendBreak => "trend_break",
            Self::VolatilitySpike => "volatility_spike",
            Self::VolumeAnomaly => "volume_anomaly",
            Self::BehaviorChange => "behavior_change",
            Self::SeasonalAnomaly => "seasonal_anomaly",
            Self::ClusterOutlier => "cluster_outlier",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::StatisticalOutlier => "Statistical outlier",
            Self::TrendBreak => "Trend break",
            Self::VolatilitySpike => "Volatility spike",
            Self::VolumeAnomaly => "Volume anomaly",
            Self::BehaviorChange => "Behavior change",
            Self::SeasonalAnomaly => "Seasonal anomaly",
            Self::ClusterOutlier => "Cluster outlier",
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Anomaly Status ──────────────────────────────────────────────────────

/// Lifecycle of an anomaly record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    #[default]
    Open,
    Acknowledged,
    Resolved,
}

impl std::fmt::Display for AnomalyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Acknowledged => write!(f, "acknowledged"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

// ── Raw Anomaly (pre-fusion) ────────────────────────────────────────────

/// Intermediate anomaly signal from a single detection algorithm.
///
/// Raw anomalies of the same type are fused into a single `Anomaly`
/// by the orchestrator.
#[derive(Clone, Debug)]
pub struct RawAnomaly {
    /// Classification.
    pub anomaly_type: AnomalyType,
    /// Index of the offending point in the chronologically sorted series.
    pub index: usize,
    /// Normalized strength (0.0 = marginal, 1.0 = extreme).
    pub score: f64,
    /// Human-readable description.
    pub description: String,
    /// Which detection algorithm produced this.
    pub detector_name: String,
    /// Algorithm-specific measurements.
    pub details: BTreeMap<String, Value>,
}

impl RawAnomaly {
    pub fn new(
        anomaly_type: AnomalyType,
        index: usize,
        score: f64,
        detector_name: &str,
        description: String,
    ) -> Self {
        Self {
            anomaly_type,
            index,
            score: score.clamp(0.0, 1.0),
            description,
            detector_name: detector_name.to_string(),
            details: BTreeMap::new(),
        }
    }

    /// Attach a detail value; non-finite floats are stored as null.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

// ── Anomaly (final output) ──────────────────────────────────────────────

/// A recorded anomaly after fusion, severity assignment and cooldown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Unique anomaly identifier.
    pub id: AnomalyId,
    /// Series the anomaly was detected in.
    pub symbol: String,
    /// Classification.
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    /// Severity assessment.
    pub severity: AnomalySeverity,
    /// Normalized detection score (0.0 to 1.0).
    pub score: f64,
    /// Human-readable description.
    pub description: String,
    /// When this anomaly was detected.
    pub detected_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: AnomalyStatus,
    /// Free-form measurements (index, value, contributing detectors, ...).
    pub details: BTreeMap<String, Value>,
}

impl Anomaly {
    /// Build the payload accepted by the notification dispatcher.
    pub fn notification(&self) -> AnomalyNotification {
        AnomalyNotification {
            severity: self.severity,
            title: format!("{} on {}", self.anomaly_type.title(), self.symbol),
            message: self.description.clone(),
            symbol: self.symbol.clone(),
        }
    }
}

/// `{severity, title, message, symbol}` payload for the notification dispatcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyNotification {
    pub severity: AnomalySeverity,
    pub title: String,
    pub message: String,
    pub symbol: String,
}

// ── Correlation ─────────────────────────────────────────────────────────

/// Anomalies in different symbols detected within a shared time window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyCorrelation {
    /// Symbols with at least one anomaly in the group.
    pub symbols: BTreeSet<String>,
    /// Detection time of the earliest anomaly in the group.
    pub timestamp: DateTime<Utc>,
    /// Detection time of the latest anomaly in the group.
    pub window_end: DateTime<Utc>,
    /// Types seen for at least two distinct symbols in the group.
    pub shared_types: BTreeSet<AnomalyType>,
    /// Members of the group, in detection order.
    pub anomaly_ids: Vec<AnomalyId>,
}

// ── Statistics ──────────────────────────────────────────────────────────

/// Aggregate counts over all retained history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyStats {
    pub total_anomalies: usize,
    pub by_symbol: BTreeMap<String, usize>,
    pub by_type: BTreeMap<AnomalyType, usize>,
    pub by_severity: BTreeMap<AnomalySeverity, usize>,
    pub by_status: BTreeMap<AnomalyStatus, usize>,
}

impl AnomalyStats {
    /// Count a single record.
    pub fn record(&mut self, anomaly: &Anomaly) {
        self.total_anomalies += 1;
        *self.by_symbol.entry(anomaly.symbol.clone()).or_default() += 1;
        *self.by_type.entry(anomaly.anomaly_type).or_default() += 1;
        *self.by_severity.entry(anomaly.severity).or_default() += 1;
        *self.by_status.entry(anomaly.status).or_default() += 1;
    }
}
