//! Time series input types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single price/volume observation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub volume: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64, volume: f64) -> Self {
        Self {
            timestamp,
            value,
            volume,
        }
    }
}

/// A chronologically sorted copy of a caller-supplied series, with the value
/// and volume columns extracted.
///
/// The caller's slice is never reordered; equal timestamps keep their
/// original relative order.
#[derive(Clone, Debug)]
pub struct SeriesWindow {
    points: Vec<TimeSeriesPoint>,
    values: Vec<f64>,
    volumes: Vec<f64>,
}

impl SeriesWindow {
    pub fn from_points(points: &[TimeSeriesPoint]) -> Self {
        let mut sorted = points.to_vec();
        sorted.sort_by_key(|p| p.timestamp);
        let values = sorted.iter().map(|p| p.value).collect();
        let volumes = sorted.iter().map(|p| p.volume).collect();
        Self {
            points: sorted,
            values,
            volumes,
        }
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<&TimeSeriesPoint> {
        self.points.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn window_sorts_without_touching_input() {
        let t0 = Utc::now();
        let input = vec![
            TimeSeriesPoint::new(t0 + Duration::seconds(2), 3.0, 30.0),
            TimeSeriesPoint::new(t0, 1.0, 10.0),
            TimeSeriesPoint::new(t0 + Duration::seconds(1), 2.0, 20.0),
        ];
        let window = SeriesWindow::from_points(&input);

        assert_eq!(window.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(window.volumes(), &[10.0, 20.0, 30.0]);
        assert_eq!(input[0].value, 3.0, "caller data must not be reordered");
    }

    #[test]
    fn equal_timestamps_keep_input_order() {
        let t0 = Utc::now();
        let input = vec![
            TimeSeriesPoint::new(t0, 5.0, 1.0),
            TimeSeriesPoint::new(t0, 6.0, 1.0),
        ];
        let window = SeriesWindow::from_points(&input);
        assert_eq!(window.values(), &[5.0, 6.0]);
    }

    #[test]
    fn empty_window() {
        let window = SeriesWindow::from_points(&[]);
        assert!(window.is_empty());
        assert!(window.point(0).is_none());
    }
}
