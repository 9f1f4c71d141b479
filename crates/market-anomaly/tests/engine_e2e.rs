//! End-to-end tests: detection, cooldown, history, correlation and stats
//! through the public orchestrator API.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use maple_market_anomaly::{
    AnomalyOrchestrator, AnomalyStatus, AnomalyStore, AnomalyType, DetectionConfig,
    DetectionOverrides, InMemoryAnomalyStore, TimeSeriesPoint,
};

const SPIKE: [f64; 10] = [10.0, 12.0, 11.0, 13.0, 12.0, 11.0, 100.0, 12.0, 11.0, 13.0];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn series(values: &[f64], start: DateTime<Utc>) -> Vec<TimeSeriesPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| TimeSeriesPoint::new(start + Duration::minutes(i as i64), v, 500.0))
        .collect()
}

fn z2() -> DetectionOverrides {
    DetectionOverrides::default().with_z_score_threshold(2.0)
}

#[tokio::test]
async fn spike_reported_at_index_six() {
    init_tracing();
    let engine = AnomalyOrchestrator::with_defaults().with_rng_seed(17);

    let found = engine
        .detect("BTC", &series(&SPIKE, Utc::now()), &z2())
        .await
        .unwrap();
    let outlier = found
        .iter()
        .find(|a| a.anomaly_type == AnomalyType::StatisticalOutlier)
        .expect("spike must be reported");

    assert_eq!(outlier.details["index"], 6);
    assert_eq!(outlier.details["value"], 100.0);
    let detectors = outlier.details["detectors"].as_array().unwrap();
    assert!(detectors.iter().any(|d| d == "z_score"));
}

#[tokio::test]
async fn fewer_points_than_minimum_is_empty() {
    init_tracing();
    let engine = AnomalyOrchestrator::with_defaults();
    let found = engine
        .detect("BTC", &series(&SPIKE[..9], Utc::now()), &DetectionOverrides::default())
        .await
        .unwrap();
    assert!(found.is_empty());
    assert_eq!(engine.get_anomaly_stats().await.unwrap().total_anomalies, 0);

    // the minimum is itself overridable
    let found = engine
        .detect(
            "BTC",
            &series(&SPIKE[..9], Utc::now()),
            &z2().with_min_data_points(9),
        )
        .await
        .unwrap();
    assert!(!found.is_empty());
}

#[tokio::test]
async fn rapid_repeat_does_not_duplicate_symbol_type() {
    init_tracing();
    let engine = AnomalyOrchestrator::with_defaults().with_rng_seed(3);
    let points = series(&SPIKE, Utc::now());

    let first = engine.detect("BTC", &points, &z2()).await.unwrap();
    let second = engine.detect("BTC", &points, &z2()).await.unwrap();
    assert!(first
        .iter()
        .any(|a| a.anomaly_type == AnomalyType::StatisticalOutlier));
    assert!(second
        .iter()
        .all(|a| a.anomaly_type != AnomalyType::StatisticalOutlier));

    let history = engine.get_anomaly_history("BTC").await.unwrap();
    for t in AnomalyType::ALL {
        assert!(
            history.iter().filter(|a| a.anomaly_type == t).count() <= 1,
            "{} recorded twice",
            t
        );
    }
}

#[tokio::test]
async fn zero_cooldown_allows_repeats() {
    init_tracing();
    let engine = AnomalyOrchestrator::with_defaults().with_rng_seed(3);
    let points = series(&SPIKE, Utc::now());
    let overrides = z2().with_cooldown_ms(0);
    let t0 = Utc::now();

    engine.detect_at("BTC", &points, &overrides, t0).await.unwrap();
    let again = engine
        .detect_at("BTC", &points, &overrides, t0 + Duration::milliseconds(1))
        .await
        .unwrap();
    assert!(again
        .iter()
        .any(|a| a.anomaly_type == AnomalyType::StatisticalOutlier));
}

#[tokio::test]
async fn concurrent_detection_records_once() {
    init_tracing();
    let engine = Arc::new(AnomalyOrchestrator::with_defaults().with_rng_seed(21));
    let points = Arc::new(series(&SPIKE, Utc::now()));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let engine = Arc::clone(&engine);
        let points = Arc::clone(&points);
        handles.push(tokio::spawn(async move {
            engine.detect("ETH", &points, &z2()).await.unwrap()
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let history = engine.get_anomaly_history("ETH").await.unwrap();
    let outliers = history
        .iter()
        .filter(|a| a.anomaly_type == AnomalyType::StatisticalOutlier)
        .count();
    assert_eq!(outliers, 1);
}

#[tokio::test]
async fn correlated_spike_across_symbols() {
    init_tracing();
    let engine = AnomalyOrchestrator::with_defaults().with_rng_seed(9);
    let start = Utc::now();

    engine.detect("BTC", &series(&SPIKE, start), &z2()).await.unwrap();
    let scaled: Vec<f64> = SPIKE.iter().map(|v| v * 20.0).collect();
    engine.detect("ETH", &series(&scaled, start), &z2()).await.unwrap();

    let groups = engine
        .correlate_anomalies(&["BTC", "ETH"], StdDuration::from_millis(60_000))
        .await
        .unwrap();
    assert!(!groups.is_empty());
    let group = &groups[0];
    assert!(group.symbols.contains("BTC"));
    assert!(group.symbols.contains("ETH"));
    assert!(group.shared_types.contains(&AnomalyType::StatisticalOutlier));
    assert!(group.anomaly_ids.len() >= 2);

    // a symbol with no history cannot form a group on its own
    let groups = engine
        .correlate_anomalies(&["BTC", "DOGE"], StdDuration::from_millis(60_000))
        .await
        .unwrap();
    assert!(groups.is_empty());
}

#[tokio::test]
async fn status_lifecycle() {
    init_tracing();
    let engine = AnomalyOrchestrator::with_defaults().with_rng_seed(4);
    let found = engine
        .detect("SOL", &series(&SPIKE, Utc::now()), &z2())
        .await
        .unwrap();
    let id = found[0].id.clone();
    assert_eq!(found[0].status, AnomalyStatus::Open);

    for status in [AnomalyStatus::Acknowledged, AnomalyStatus::Resolved] {
        assert!(engine.update_anomaly_status(&id, status).await.unwrap());
        assert_eq!(
            engine.get_anomaly_by_id(&id).await.unwrap().unwrap().status,
            status
        );
    }

    let stats = engine.get_anomaly_stats().await.unwrap();
    assert_eq!(stats.by_status[&AnomalyStatus::Resolved], 1);
}

#[tokio::test]
async fn clear_history_resets_stats_and_history() {
    init_tracing();
    let engine = AnomalyOrchestrator::with_defaults().with_rng_seed(12);
    engine.detect("BTC", &series(&SPIKE, Utc::now()), &z2()).await.unwrap();
    engine.detect("ETH", &series(&SPIKE, Utc::now()), &z2()).await.unwrap();
    assert!(engine.get_anomaly_stats().await.unwrap().total_anomalies >= 2);

    engine.clear_history().await.unwrap();

    let stats = engine.get_anomaly_stats().await.unwrap();
    assert_eq!(stats.total_anomalies, 0);
    assert!(stats.by_symbol.is_empty());
    assert!(engine.get_anomaly_history("BTC").await.unwrap().is_empty());
    assert!(engine.get_anomaly_history("ETH").await.unwrap().is_empty());

    // cooldown state went with the history
    let again = engine.detect("BTC", &series(&SPIKE, Utc::now()), &z2()).await.unwrap();
    assert!(!again.is_empty());
}

#[tokio::test]
async fn store_shared_by_two_orchestrators() {
    init_tracing();
    let store = Arc::new(InMemoryAnomalyStore::new());
    let strict = AnomalyOrchestrator::new(DetectionConfig::default(), store.clone());
    let loose = AnomalyOrchestrator::new(
        DetectionConfig {
            z_score_threshold: 2.0,
            ..DetectionConfig::default()
        },
        store.clone(),
    );

    // 2.85 sigma: the z-score detector only fires under the looser threshold
    let strict_found = strict
        .detect("BTC", &series(&SPIKE, Utc::now()), &DetectionOverrides::default())
        .await
        .unwrap();
    assert!(strict_found
        .iter()
        .filter_map(|a| a.details["detectors"].as_array())
        .flatten()
        .all(|d| d != "z_score"));

    // same store, so the cooldown from the first call applies
    let loose_found = loose
        .detect("BTC", &series(&SPIKE, Utc::now()), &DetectionOverrides::default())
        .await
        .unwrap();
    assert!(loose_found
        .iter()
        .all(|a| strict_found.iter().all(|s| s.anomaly_type != a.anomaly_type)));
    assert_eq!(
        strict.get_anomaly_history("BTC").await.unwrap().len(),
        store.history("BTC").await.unwrap().len()
    );
}

#[tokio::test]
async fn anomalies_serialize_for_dispatch() {
    init_tracing();
    let engine = AnomalyOrchestrator::with_defaults().with_rng_seed(30);
    let found = engine
        .detect("BTC", &series(&SPIKE, Utc::now()), &z2())
        .await
        .unwrap();

    let json = serde_json::to_value(&found[0]).unwrap();
    assert_eq!(json["symbol"], "BTC");
    assert!(json["type"].is_string());
    assert!(json["details"]["timestamp"].is_string());

    let note = found[0].notification();
    assert!(note.title.ends_with("on BTC"));
}
