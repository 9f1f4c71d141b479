//! Anomaly history storage.
//!
//! Provides the `AnomalyStore` trait and an `InMemoryAnomalyStore`
//! implementation. Records are kept per symbol in insertion order with an
//! id index for direct lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::anomaly::{Anomaly, AnomalyId, AnomalyStats, AnomalyStatus};
use crate::error::{AnomalyError, AnomalyResult};

/// Pluggable history backend for detected anomalies.
#[async_trait]
pub trait AnomalyStore: Send + Sync {
    /// Record the candidates that are not suppressed by cooldown and return
    /// them.
    ///
    /// A candidate is suppressed when a record with the same symbol and
    /// type was detected less than `cooldown` before `now`. The check and
    /// the append happen atomically. Every candidate must belong to
    /// `symbol`; a mismatch rejects the whole batch.
    async fn commit(
        &self,
        symbol: &str,
        candidates: Vec<Anomaly>,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> AnomalyResult<Vec<Anomaly>>;

    /// Retrieve a record by id.
    async fn get(&self, id: &AnomalyId) -> AnomalyResult<Option<Anomaly>>;

    /// Set the status of a record. Returns `false` for an unknown id.
    async fn update_status(&self, id: &AnomalyId, status: AnomalyStatus) -> AnomalyResult<bool>;

    /// All records for a symbol in insertion order.
    async fn history(&self, symbol: &str) -> AnomalyResult<Vec<Anomaly>>;

    /// All records across every symbol.
    async fn all(&self) -> AnomalyResult<Vec<Anomaly>>;

    /// Aggregate counts over all records.
    async fn stats(&self) -> AnomalyResult<AnomalyStats> {
        let mut stats = AnomalyStats::default();
        for anomaly in self.all().await? {
            stats.record(&anomaly);
        }
        Ok(stats)
    }

    /// Drop every record.
    async fn clear(&self) -> AnomalyResult<()>;
}

#[derive(Default)]
struct HistoryState {
    by_symbol: HashMap<String, Vec<Anomaly>>,
    /// id -> (symbol, position in that symbol's history)
    index: HashMap<AnomalyId, (String, usize)>,
}

impl HistoryState {
    fn suppresses(&self, candidate: &Anomaly, cooldown: Duration, now: DateTime<Utc>) -> bool {
        self.by_symbol
            .get(&candidate.symbol)
            .map(|records| {
                records.iter().any(|existing| {
                    existing.anomaly_type == candidate.anomaly_type
                        && now - existing.detected_at < cooldown
                })
            })
            .unwrap_or(false)
    }

    fn lookup(&self, id: &AnomalyId) -> Option<&Anomaly> {
        let (symbol, pos) = self.index.get(id)?;
        self.by_symbol.get(symbol)?.get(*pos)
    }
}

/// In-memory anomaly history for a single process.
///
/// Queries share the read lock; `commit`, `update_status` and `clear` take
/// the write lock.
#[derive(Clone, Default)]
pub struct InMemoryAnomalyStore {
    state: Arc<RwLock<HistoryState>>,
}

impl InMemoryAnomalyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnomalyStore for InMemoryAnomalyStore {
    async fn commit(
        &self,
        symbol: &str,
        candidates: Vec<Anomaly>,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> AnomalyResult<Vec<Anomaly>> {
        if let Some(stray) = candidates.iter().find(|c| c.symbol != symbol) {
            return Err(AnomalyError::Store(format!(
                "candidate {} belongs to {}, not {}",
                stray.id, stray.symbol, symbol
            )));
        }

        let mut state = self.state.write().await;
        let mut accepted = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if state.suppresses(&candidate, cooldown, now) {
                debug!(
                    symbol = %symbol,
                    anomaly_type = %candidate.anomaly_type,
                    "suppressed by cooldown"
                );
                continue;
            }
            let records = state.by_symbol.entry(symbol.to_string()).or_default();
            let pos = records.len();
            records.push(candidate.clone());
            state
                .index
                .insert(candidate.id.clone(), (symbol.to_string(), pos));
            accepted.push(candidate);
        }

        Ok(accepted)
    }

    async fn get(&self, id: &AnomalyId) -> AnomalyResult<Option<Anomaly>> {
        let state = self.state.read().await;
        Ok(state.lookup(id).cloned())
    }

    async fn update_status(&self, id: &AnomalyId, status: AnomalyStatus) -> AnomalyResult<bool> {
        let mut state = self.state.write().await;
        let Some((symbol, pos)) = state.index.get(id).cloned() else {
            return Ok(false);
        };
        match state.by_symbol.get_mut(&symbol).and_then(|r| r.get_mut(pos)) {
            Some(anomaly) => {
                anomaly.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn history(&self, symbol: &str) -> AnomalyResult<Vec<Anomaly>> {
        let state = self.state.read().await;
        Ok(state.by_symbol.get(symbol).cloned().unwrap_or_default())
    }

    async fn all(&self) -> AnomalyResult<Vec<Anomaly>> {
        let state = self.state.read().await;
        Ok(state.by_symbol.values().flatten().cloned().collect())
    }

    async fn stats(&self) -> AnomalyResult<AnomalyStats> {
        let state = self.state.read().await;
        let mut stats = AnomalyStats::default();
        for anomaly in state.by_symbol.values().flatten() {
            stats.record(anomaly);
        }
        Ok(stats)
    }

    async fn clear(&self) -> AnomalyResult<()> {
        let mut state = self.state.write().await;
        state.by_symbol.clear();
        state.index.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalySeverity, AnomalyType};
    use std::collections::BTreeMap;

    fn anomaly(symbol: &str, anomaly_type: AnomalyType, at: DateTime<Utc>) -> Anomaly {
        Anomaly {
            id: AnomalyId::new(),
            symbol: symbol.into(),
            anomaly_type,
            severity: AnomalySeverity::Medium,
            score: 0.4,
            description: "test".into(),
            detected_at: at,
            status: AnomalyStatus::Open,
            details: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn commit_appends_in_order() {
        let store = InMemoryAnomalyStore::new();
        let now = Utc::now();
        let a = anomaly("BTC", AnomalyType::TrendBreak, now);
        let b = anomaly("BTC", AnomalyType::VolumeAnomaly, now);

        let accepted = store
            .commit("BTC", vec![a.clone(), b.clone()], Duration::minutes(5), now)
            .await
            .unwrap();
        assert_eq!(accepted.len(), 2);

        let history = store.history("BTC").await.unwrap();
        assert_eq!(history, vec![a.clone(), b]);
        assert_eq!(store.get(&a.id).await.unwrap(), Some(a));
        assert!(store.history("ETH").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cooldown_suppresses_same_symbol_and_type() {
        let store = InMemoryAnomalyStore::new();
        let cooldown = Duration::minutes(5);
        let t0 = Utc::now();

        store
            .commit("BTC", vec![anomaly("BTC", AnomalyType::TrendBreak, t0)], cooldown, t0)
            .await
            .unwrap();

        let t1 = t0 + Duration::minutes(1);
        let accepted = store
            .commit(
                "BTC",
                vec![
                    anomaly("BTC", AnomalyType::TrendBreak, t1),
                    anomaly("BTC", AnomalyType::VolumeAnomaly, t1),
                ],
                cooldown,
                t1,
            )
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].anomaly_type, AnomalyType::VolumeAnomaly);

        // other symbols are independent
        let accepted = store
            .commit("ETH", vec![anomaly("ETH", AnomalyType::TrendBreak, t1)], cooldown, t1)
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
    }

    #[tokio::test]
    async fn commit_rejects_foreign_symbol() {
        let store = InMemoryAnomalyStore::new();
        let now = Utc::now();
        let batch = vec![
            anomaly("BTC", AnomalyType::TrendBreak, now),
            anomaly("ETH", AnomalyType::TrendBreak, now),
        ];

        let err = store
            .commit("BTC", batch, Duration::minutes(5), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AnomalyError::Store(_)));
        assert!(err.to_string().contains("ETH"));

        // nothing from the rejected batch was written
        assert!(store.history("BTC").await.unwrap().is_empty());
        assert!(store.history("ETH").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cooldown_expires() {
        let store = InMemoryAnomalyStore::new();
        let cooldown = Duration::minutes(5);
        let t0 = Utc::now();
        store
            .commit("BTC", vec![anomaly("BTC", AnomalyType::TrendBreak, t0)], cooldown, t0)
            .await
            .unwrap();

        let later = t0 + Duration::minutes(5);
        let accepted = store
            .commit("BTC", vec![anomaly("BTC", AnomalyType::TrendBreak, later)], cooldown, later)
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(store.history("BTC").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_status_and_unknown_id() {
        let store = InMemoryAnomalyStore::new();
        let now = Utc::now();
        let a = anomaly("SOL", AnomalyType::SeasonalAnomaly, now);
        store
            .commit("SOL", vec![a.clone()], Duration::zero(), now)
            .await
            .unwrap();

        assert!(store.update_status(&a.id, AnomalyStatus::Resolved).await.unwrap());
        assert_eq!(
            store.get(&a.id).await.unwrap().unwrap().status,
            AnomalyStatus::Resolved
        );
        assert!(!store
            .update_status(&AnomalyId::new(), AnomalyStatus::Acknowledged)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn stats_and_clear() {
        let store = InMemoryAnomalyStore::new();
        let now = Utc::now();
        store
            .commit(
                "BTC",
                vec![
                    anomaly("BTC", AnomalyType::TrendBreak, now),
                    anomaly("BTC", AnomalyType::ClusterOutlier, now),
                ],
                Duration::zero(),
                now,
            )
            .await
            .unwrap();
        store
            .commit("ETH", vec![anomaly("ETH", AnomalyType::TrendBreak, now)], Duration::zero(), now)
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_anomalies, 3);
        assert_eq!(stats.by_symbol["BTC"], 2);
        assert_eq!(stats.by_type[&AnomalyType::TrendBreak], 2);
        assert_eq!(stats.by_severity[&AnomalySeverity::Medium], 3);
        assert_eq!(store.all().await.unwrap().len(), 3);

        store.clear().await.unwrap();
        assert_eq!(store.stats().await.unwrap(), AnomalyStats::default());
        assert!(store.history("BTC").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_commits_record_once() {
        let store = InMemoryAnomalyStore::new();
        let now = Utc::now();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .commit(
                        "BTC",
                        vec![anomaly("BTC", AnomalyType::VolatilitySpike, now)],
                        Duration::minutes(5),
                        now,
                    )
                    .await
                    .unwrap()
                    .len()
            }));
        }
        let mut total = 0;
        for h in handles {
            total += h.await.unwrap();
        }
        assert_eq!(total, 1);
        assert_eq!(store.history("BTC").await.unwrap().len(), 1);
    }
}
