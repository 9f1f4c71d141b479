//! Leaf detectors: pure functions over value/volume columns.
//!
//! ```text
//!   &[f64] ──┬──► StatisticalDetector      (z-score, IQR, isolation, clustering)
//!            ├──► TimeSeriesDetector       (SMA, EMA, trend breaks, volatility)
//!            └──► BehaviorPatternDetector  (cosine similarity, seasonal buckets)
//! ```
//!
//! None of them keep state or mutate their input. Degenerate input (empty,
//! too short, zero variance) yields empty output rather than an error.

pub mod behavior;
pub mod statistical;
pub mod timeseries;

pub use behavior::{BehaviorChange, BehaviorPatternDetector, SeasonalDeviation};
pub use statistical::{
    expected_path_length, ClusterAssignment, IsolationScore, Outlier, SeriesStats,
    StatisticalDetector,
};
pub use timeseries::{linear_slope, TimeSeriesDetector, TrendBreak, VolatilitySpike};
