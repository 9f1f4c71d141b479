//! Time-series detectors: smoothing, trend breaks and volatility spikes.
//!
//! All functions are read-only over the input slice.

use crate::config::DetectionConfig;

use super::statistical::StatisticalDetector;

/// Fraction of the mean absolute step below which a slope counts as flat.
pub const TREND_NOISE_FLOOR: f64 = 0.25;

/// A reversal of the local slope around `index`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrendBreak {
    /// Pivot point shared by the before/after sub-windows.
    pub index: usize,
    pub slope_before: f64,
    pub slope_after: f64,
    /// `|slope_after - slope_before|`.
    pub magnitude: f64,
    /// Slope magnitude below which a sub-window was considered flat.
    pub noise_floor: f64,
}

/// A rolling window whose volatility exceeds the series volatility.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolatilitySpike {
    /// Last index of the window.
    pub index: usize,
    pub local_std_dev: f64,
    pub overall_std_dev: f64,
    /// `local_std_dev / overall_std_dev`.
    pub ratio: f64,
}

/// Stateless time-series detector.
pub struct TimeSeriesDetector;

impl TimeSeriesDetector {
    /// Simple moving average. Output length is `max(0, n - window + 1)`.
    pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
        if window == 0 || window > values.len() {
            return vec![];
        }
        let mut out = Vec::with_capacity(values.len() - window + 1);
        let mut sum: f64 = values[..window].iter().sum();
        out.push(sum / window as f64);
        for i in window..values.len() {
            sum += values[i] - values[i - window];
            out.push(sum / window as f64);
        }
        out
    }

    /// Exponential moving average with multiplier `2 / (window + 1)`, seeded
    /// with the first value. Output length equals input length.
    pub fn ema(values: &[f64], window: usize) -> Vec<f64> {
        let Some(&first) = values.first() else {
            return vec![];
        };
        let k = 2.0 / (window.max(1) as f64 + 1.0);
        let mut out = Vec::with_capacity(values.len());
        let mut prev = first;
        out.push(prev);
        for &v in &values[1..] {
            prev = (v - prev) * k + prev;
            out.push(prev);
        }
        out
    }

    /// Indices where the regression slope of the `window` points ending at
    /// the index and the `window` points starting at it have opposite signs,
    /// both beyond the noise floor.
    ///
    /// Consecutive pivots collapse into the strongest one.
    pub fn trend_changes(values: &[f64], window: usize) -> Vec<TrendBreak> {
        let n = values.len();
        if window < 2 || n < window.saturating_mul(2) - 1 {
            return vec![];
        }

        let mean_step =
            values.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / (n - 1) as f64;
        if mean_step < f64::EPSILON {
            return vec![];
        }
        let floor = TREND_NOISE_FLOOR * mean_step;

        let mut breaks: Vec<TrendBreak> = Vec::new();
        let mut last_flagged: Option<usize> = None;
        for pivot in (window - 1)..=(n - window) {
            let before = linear_slope(&values[pivot + 1 - window..=pivot]);
            let after = linear_slope(&values[pivot..pivot + window]);
            if before * after >= 0.0 || before.abs() <= floor || after.abs() <= floor {
                continue;
            }
            let candidate = TrendBreak {
                index: pivot,
                slope_before: before,
                slope_after: after,
                magnitude: (after - before).abs(),
                noise_floor: floor,
            };
            match (last_flagged, breaks.last_mut()) {
                (Some(prev), Some(last)) if prev + 1 == pivot => {
                    if candidate.magnitude > last.magnitude {
                        *last = candidate;
                    }
                }
                _ => breaks.push(candidate),
            }
            last_flagged = Some(pivot);
        }
        breaks
    }

    /// Rolling windows of `volatility_window_size` whose population standard
    /// deviation exceeds `volatility_multiplier` times the series standard
    /// deviation. Consecutive windows collapse into the strongest one.
    pub fn volatility_spikes(values: &[f64], config: &DetectionConfig) -> Vec<VolatilitySpike> {
        let window = config.volatility_window_size;
        if window < 2 || values.len() < window {
            return vec![];
        }
        let stats = StatisticalDetector::stats(values);
        if stats.is_flat() {
            return vec![];
        }
        let overall = stats.std_dev;

        let mut spikes: Vec<VolatilitySpike> = Vec::new();
        let mut last_flagged: Option<usize> = None;
        for end in (window - 1)..values.len() {
            let local = StatisticalDetector::stats(&values[end + 1 - window..=end]).std_dev;
            let ratio = local / overall;
            if ratio <= config.volatility_multiplier {
                continue;
            }
            let spike = VolatilitySpike {
                index: end,
                local_std_dev: local,
                overall_std_dev: overall,
                ratio,
            };
            match (last_flagged, spikes.last_mut()) {
                (Some(prev), Some(last)) if prev + 1 == end => {
                    if spike.ratio > last.ratio {
                        *last = spike;
                    }
                }
                _ => spikes.push(spike),
            }
            last_flagged = Some(end);
        }
        spikes
    }
}

/// Ordinary least squares slope of `y` against its index.
pub fn linear_slope(y: &[f64]) -> f64 {
    let n = y.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = y.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &v) in y.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (v - y_mean);
        den += dx * dx;
    }
    if den.abs() < f64::EPSILON {
        0.0
    } else {
        num / den
    }
}
