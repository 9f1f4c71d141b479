//! Cross-symbol correlation of recorded anomalies.
//!
//! Anomalies are walked in detection order. Each one joins the open group
//! when it was detected within `window` of the group's latest member, so a
//! group is a chain with no gap wider than `window`. Groups touching fewer
//! than two symbols are dropped.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;

use super::types::{Anomaly, AnomalyCorrelation, AnomalyType};

/// Group `anomalies` into time-windowed cross-symbol correlations.
pub fn correlate(mut anomalies: Vec<Anomaly>, window: Duration) -> Vec<AnomalyCorrelation> {
    anomalies.sort_by(|a, b| a.detected_at.cmp(&b.detected_at));

    let mut correlations = Vec::new();
    let mut group: Vec<Anomaly> = Vec::new();
    for anomaly in anomalies {
        let joins = group
            .last()
            .map(|prev| anomaly.detected_at - prev.detected_at <= window)
            .unwrap_or(true);
        if !joins {
            correlations.extend(close_group(std::mem::take(&mut group)));
        }
        group.push(anomaly);
    }
    correlations.extend(close_group(group));
    correlations
}

fn close_group(group: Vec<Anomaly>) -> Option<AnomalyCorrelation> {
    let symbols: BTreeSet<String> = group.iter().map(|a| a.symbol.clone()).collect();
    if symbols.len() < 2 {
        return None;
    }

    let mut symbols_by_type: BTreeMap<AnomalyType, BTreeSet<&str>> = BTreeMap::new();
    for a in &group {
        symbols_by_type
            .entry(a.anomaly_type)
            .or_default()
            .insert(a.symbol.as_str());
    }
    let shared_types = symbols_by_type
        .into_iter()
        .filter(|(_, syms)| syms.len() >= 2)
        .map(|(t, _)| t)
        .collect();

    let first = group.first()?;
    let last = group.last()?;
    Some(AnomalyCorrelation {
        timestamp: first.detected_at,
        window_end: last.detected_at,
        symbols,
        shared_types,
        anomaly_ids: group.iter().map(|a| a.id.clone()).collect(),
    })
}
