//! Anomaly detection engine with a fixed algorithm registry and fusion.
//!
//! Runs statistical, trend, volatility, volume, cluster, behavior and
//! seasonal algorithms over a sorted series, fuses their signals per anomaly
//! type, and records the survivors of the cooldown check.
//!
//! ## Architecture
//!
//! ```text
//!   symbol + &[TimeSeriesPoint] + DetectionOverrides
//!       │
//!       ├──► StatisticalOutlierAlgorithm (z-score + IQR)
//!       ├──► TrendBreakAlgorithm (slope reversal)
//!       ├──► VolatilitySpikeAlgorithm (rolling std)
//!       ├──► VolumeSpikeAlgorithm (volume z-score)
//!       ├──► ClusterOutlierAlgorithm (isolation + centroids)
//!       ├──► BehaviorChangeAlgorithm (window similarity)
//!       └──► SeasonalAlgorithm (phase buckets)
//!             │
//!             ▼
//!       fusion (one per type) ──► severity ──► AnomalyStore::commit (cooldown)
//!                                                   │
//!                                                   ▼
//!                                     history / stats / correlation
//! ```

pub mod correlation;
pub mod detector;
pub mod engine;
pub mod types;

pub use correlation::correlate;
pub use detector::{
    default_algorithms, BehaviorChangeAlgorithm, ClusterOutlierAlgorithm, DetectionAlgorithm,
    SeasonalAlgorithm, StatisticalOutlierAlgorithm, TrendBreakAlgorithm, VolatilitySpikeAlgorithm,
    VolumeSpikeAlgorithm,
};
pub use engine::AnomalyOrchestrator;
pub use types::{
    Anomaly, AnomalyCorrelation, AnomalyId, AnomalyNotification, AnomalySeverity, AnomalyStats,
    AnomalyStatus, AnomalyType, RawAnomaly,
};
