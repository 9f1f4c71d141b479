//! # maple-market-anomaly
//!
//! Anomaly detection over market price/volume time series.
//!
//! Leaf detectors are pure functions over a value column. The orchestrator
//! runs a fixed registry of algorithms built on them, fuses their signals,
//! grades severity, and records results in an explicit history store with a
//! per symbol+type cooldown.
//!
//! ## Architecture
//!
//! ```text
//!   &[TimeSeriesPoint]
//!        │ sort (copy)
//!        ▼
//!   ┌──────────────┐    ┌───────────────────────────────┐
//!   │ SeriesWindow │───►│ DetectionAlgorithm registry   │
//!   └──────────────┘    │  Statistical / TimeSeries /   │
//!                       │  BehaviorPattern detectors    │
//!                       └──────────────┬────────────────┘
//!                                      │ RawAnomaly
//!                                      ▼
//!                       ┌───────────────────────────────┐
//!                       │ AnomalyOrchestrator           │
//!                       │  fusion ─► severity ─► rank   │
//!                       └──────────────┬────────────────┘
//!                                      │ commit (cooldown, atomic)
//!                                      ▼
//!                       ┌───────────────────────────────┐
//!                       │ AnomalyStore (history)        │──► stats / correlation
//!                       └───────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use maple_market_anomaly::{AnomalyOrchestrator, DetectionOverrides, TimeSeriesPoint};
//! use chrono::{Duration, Utc};
//!
//! # async fn run() -> maple_market_anomaly::AnomalyResult<()> {
//! let engine = AnomalyOrchestrator::with_defaults();
//!
//! let start = Utc::now();
//! let points: Vec<TimeSeriesPoint> = [10.0, 12.0, 11.0, 13.0, 12.0, 11.0, 100.0, 12.0, 11.0, 13.0]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, &v)| TimeSeriesPoint::new(start + Duration::minutes(i as i64), v, 1_000.0))
//!     .collect();
//!
//! let overrides = DetectionOverrides::default().with_z_score_threshold(2.0);
//! for anomaly in engine.detect("BTC", &points, &overrides).await? {
//!     println!("{} {} {:.2}", anomaly.severity, anomaly.anomaly_type, anomaly.score);
//! }
//!
//! let stats = engine.get_anomaly_stats().await?;
//! assert!(stats.total_anomalies > 0);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod anomaly;
pub mod config;
pub mod detectors;
pub mod error;
pub mod series;
pub mod store;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use anomaly::{
    default_algorithms, Anomaly, AnomalyCorrelation, AnomalyId, AnomalyNotification,
    AnomalyOrchestrator, AnomalySeverity, AnomalyStats, AnomalyStatus, AnomalyType,
    DetectionAlgorithm, RawAnomaly,
};
pub use crate::config::{DetectionConfig, DetectionOverrides, SeverityThresholds};
pub use detectors::{BehaviorPatternDetector, StatisticalDetector, TimeSeriesDetector};
pub use error::{AnomalyError, AnomalyResult};
pub use series::{SeriesWindow, TimeSeriesPoint};
pub use store::{AnomalyStore, InMemoryAnomalyStore};
