//! Detection orchestrator: runs the algorithm registry over a series, fuses
//! the raw signals per anomaly type, assigns severity and records the result
//! through the history store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{DetectionConfig, DetectionOverrides};
use crate::error::{AnomalyError, AnomalyResult};
use crate::series::{SeriesWindow, TimeSeriesPoint};
use crate::store::{AnomalyStore, InMemoryAnomalyStore};

use super::correlation;
use super::detector::{default_algorithms, DetectionAlgorithm};
use super::types::{
    Anomaly, AnomalyCorrelation, AnomalyId, AnomalyStats, AnomalyStatus, AnomalyType, RawAnomaly,
};

/// Runs every registered algorithm and owns the path into the history store.
///
/// Safe to share across tasks behind an `Arc`. Several orchestrators may
/// share one store.
pub struct AnomalyOrchestrator {
    algorithms: Vec<Box<dyn DetectionAlgorithm>>,
    config: DetectionConfig,
    store: Arc<dyn AnomalyStore>,
    rng: Mutex<StdRng>,
}

impl AnomalyOrchestrator {
    /// Create an orchestrator with the default algorithm registry.
    pub fn new(config: DetectionConfig, store: Arc<dyn AnomalyStore>) -> Self {
        Self::with_algorithms(config, store, default_algorithms())
    }

    /// Create an orchestrator with a custom algorithm registry.
    pub fn with_algorithms(
        config: DetectionConfig,
        store: Arc<dyn AnomalyStore>,
        algorithms: Vec<Box<dyn DetectionAlgorithm>>,
    ) -> Self {
        Self {
            algorithms,
            config,
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Default config, default algorithms, private in-memory history.
    pub fn with_defaults() -> Self {
        Self::new(
            DetectionConfig::default(),
            Arc::new(InMemoryAnomalyStore::new()),
        )
    }

    /// Pin the random source used by randomized heuristics.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Base configuration merged under every call's overrides.
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Shared handle to the history store.
    pub fn store(&self) -> Arc<dyn AnomalyStore> {
        Arc::clone(&self.store)
    }

    /// Registered algorithm names, in evaluation order.
    pub fn algorithm_names(&self) -> Vec<&str> {
        self.algorithms.iter().map(|a| a.name()).collect()
    }

    // ── Detection ───────────────────────────────────────────────────────

    /// Detect anomalies in `points` for `symbol` and record the ones not
    /// suppressed by cooldown.
    ///
    /// Returns the newly recorded anomalies ranked by severity then score.
    /// Fewer than `min_data_points` points yields an empty result.
    pub async fn detect(
        &self,
        symbol: &str,
        points: &[TimeSeriesPoint],
        overrides: &DetectionOverrides,
    ) -> AnomalyResult<Vec<Anomaly>> {
        self.detect_at(symbol, points, overrides, Utc::now()).await
    }

    /// `detect` with an explicit detection time, used for both the
    /// `detected_at` stamp and the cooldown check.
    pub async fn detect_at(
        &self,
        symbol: &str,
        points: &[TimeSeriesPoint],
        overrides: &DetectionOverrides,
        now: DateTime<Utc>,
    ) -> AnomalyResult<Vec<Anomaly>> {
        let config = overrides.apply(&self.config);
        config.validate()?;

        if points.len() < config.min_data_points {
            debug!(
                symbol = %symbol,
                points = points.len(),
                min_data_points = config.min_data_points,
                "not enough data points, skipping detection"
            );
            return Ok(vec![]);
        }

        let series = SeriesWindow::from_points(points);
        let candidates = self.evaluate(symbol, &series, &config, now)?;
        let candidate_count = candidates.len();

        let mut accepted = self
            .store
            .commit(symbol, candidates, config.cooldown(), now)
            .await?;
        accepted.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.score.total_cmp(&a.score))
        });

        info!(
            symbol = %symbol,
            points = series.len(),
            candidates = candidate_count,
            count = accepted.len(),
            "anomaly detection complete"
        );
        Ok(accepted)
    }

    /// Run every algorithm and fuse the raw signals into candidate records.
    ///
    /// Kept synchronous so the random-source guard never crosses an await.
    fn evaluate(
        &self,
        symbol: &str,
        series: &SeriesWindow,
        config: &DetectionConfig,
        now: DateTime<Utc>,
    ) -> AnomalyResult<Vec<Anomaly>> {
        let mut rng = self.rng.lock().map_err(|_| AnomalyError::LockError)?;

        let mut raws = Vec::new();
        for algorithm in &self.algorithms {
            let found = algorithm.run(series, config, &mut *rng);
            debug!(
                symbol = %symbol,
                algorithm = algorithm.name(),
                count = found.len(),
                "algorithm finished"
            );
            raws.extend(found);
        }

        Ok(fuse(symbol, series, raws, config, now))
    }

    // ── History ─────────────────────────────────────────────────────────

    /// Set the status of a recorded anomaly. Returns `false` for an unknown
    /// id; nothing changes in that case.
    pub async fn update_anomaly_status(
        &self,
        id: &AnomalyId,
        status: AnomalyStatus,
    ) -> AnomalyResult<bool> {
        let updated = self.store.update_status(id, status).await?;
        if updated {
            debug!(id = %id, status = %status, "anomaly status updated");
        } else {
            warn!(id = %id, status = %status, "status update for unknown anomaly");
        }
        Ok(updated)
    }

    pub async fn get_anomaly_by_id(&self, id: &AnomalyId) -> AnomalyResult<Option<Anomaly>> {
        self.store.get(id).await
    }

    /// Records for a symbol in insertion order; empty for an unknown symbol.
    pub async fn get_anomaly_history(&self, symbol: &str) -> AnomalyResult<Vec<Anomaly>> {
        self.store.history(symbol).await
    }

    pub async fn get_anomaly_stats(&self) -> AnomalyResult<AnomalyStats> {
        self.store.stats().await
    }

    /// Group the requested symbols' history into cross-symbol correlations
    /// within `window`. Fewer than two distinct symbols yields nothing.
    pub async fn correlate_anomalies(
        &self,
        symbols: &[&str],
        window: std::time::Duration,
    ) -> AnomalyResult<Vec<AnomalyCorrelation>> {
        let requested: BTreeSet<&str> = symbols.iter().copied().collect();
        if requested.len() < 2 {
            return Ok(vec![]);
        }
        let window = chrono::Duration::from_std(window)
            .map_err(|e| AnomalyError::invalid_config("correlation_window", e.to_string()))?;

        let mut anomalies = Vec::new();
        for symbol in requested {
            anomalies.extend(self.store.history(symbol).await?);
        }
        Ok(correlation::correlate(anomalies, window))
    }

    /// Drop every recorded anomaly for every symbol.
    pub async fn clear_history(&self) -> AnomalyResult<()> {
        self.store.clear().await?;
        info!("anomaly history cleared");
        Ok(())
    }
}

impl Default for AnomalyOrchestrator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ── Fusion ──────────────────────────────────────────────────────────────

/// Collapse raw signals into one candidate per anomaly type.
///
/// The strongest raw signal represents its group; ties keep the earliest
/// point.
fn fuse(
    symbol: &str,
    series: &SeriesWindow,
    raws: Vec<RawAnomaly>,
    config: &DetectionConfig,
    now: DateTime<Utc>,
) -> Vec<Anomaly> {
    let mut groups: BTreeMap<AnomalyType, Vec<RawAnomaly>> = BTreeMap::new();
    for raw in raws {
        groups.entry(raw.anomaly_type).or_default().push(raw);
    }

    groups
        .into_iter()
        .filter_map(|(anomaly_type, group)| {
            let indices: BTreeSet<usize> = group.iter().map(|r| r.index).collect();
            let detectors: BTreeSet<String> =
                group.iter().map(|r| r.detector_name.clone()).collect();
            let occurrences = group.len();

            let best = group.into_iter().reduce(|best, r| {
                if r.score > best.score || (r.score == best.score && r.index < best.index) {
                    r
                } else {
                    best
                }
            })?;

            let mut details = best.details;
            details.insert("index".into(), Value::from(best.index));
            if let Some(point) = series.point(best.index) {
                details.insert("timestamp".into(), Value::from(point.timestamp.to_rfc3339()));
                details.insert("value".into(), Value::from(point.value));
                details.insert("volume".into(), Value::from(point.volume));
            }
            details.insert("occurrences".into(), Value::from(occurrences));
            details.insert(
                "indices".into(),
                Value::from(indices.iter().copied().collect::<Vec<_>>()),
            );
            details.insert(
                "detectors".into(),
                Value::from(detectors.into_iter().collect::<Vec<_>>()),
            );

            let description = match indices.len() {
                1 => best.description,
                n => format!("{} ({} points flagged)", best.description, n),
            };

            Some(Anomaly {
                id: AnomalyId::new(),
                symbol: symbol.to_string(),
                anomaly_type,
                severity: config.severity_thresholds.classify(best.score),
                score: best.score,
                description,
                detected_at: now,
                status: AnomalyStatus::Open,
                details,
            })
        })
        .collect()
}
