//! Threshold-crossing estimation on per-plot time series.
//!
//! A series is a list of `(day, value)` points, days counted from the first
//! flight. The estimate is the day the value falls to the threshold, found by
//! interpolating or extrapolating a straight line through two chosen points.

use serde::{Deserialize, Serialize};

/// Which rule produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossingRange {
    /// The series drops to the threshold after starting at or above it.
    InRange,
    /// The first half of the series never reaches the threshold.
    NeverReaches,
    /// The series stays above the threshold throughout.
    StaysAbove,
    /// No estimate could be made.
    NoPrediction,
}

impl CrossingRange {
    /// Tag stored in the `crossing_range` column.
    ///
    /// `NeverReaches` is tagged `"lower"` and `StaysAbove` `"upper"`;
    /// existing analyses depend on these literal values.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::InRange => Some("IN"),
            Self::NeverReaches => Some("lower"),
            Self::StaysAbove => Some("upper"),
            Self::NoPrediction => None,
        }
    }
}

/// Estimated crossing day for one plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossingEstimate {
    pub id: String,
    /// Day of the first point considered, `None` when no point remained.
    pub start_day: Option<i64>,
    pub predicted_day: Option<i64>,
    pub range: CrossingRange,
}

/// Day at which the line through `a` and `b` (value → day) reaches `threshold`.
fn day_at(a: (i64, f64), b: (i64, f64), threshold: f64) -> Option<i64> {
    let (day_a, value_a) = (a.0 as f64, a.1);
    let (day_b, value_b) = (b.0 as f64, b.1);
    if value_a == value_b {
        return None;
    }
    let day = day_a + (threshold - value_a) * (day_b - day_a) / (value_b - value_a);
    day.is_finite().then(|| day.round() as i64)
}

/// Classify a day-sorted series and predict its crossing day.
pub fn estimate_crossing(points: &[(i64, f64)], threshold: f64) -> (Option<i64>, CrossingRange) {
    let no_prediction = (None, CrossingRange::NoPrediction);
    if points.len() < 2 || points.iter().any(|(_, v)| !v.is_finite()) || !threshold.is_finite() {
        return no_prediction;
    }

    let first_half = &points[..(points.len() / 2).max(1)];
    let first_half_max = first_half
        .iter()
        .map(|&(_, v)| v)
        .fold(f64::NEG_INFINITY, f64::max);
    // First occurrence of the minimum.
    let min_point = points
        .iter()
        .copied()
        .fold(points[0], |min, p| if p.1 < min.1 { p } else { min });

    if min_point.1 <= threshold && first_half_max >= threshold {
        let Some(i) = (1..points.len()).find(|&i| points[i].1 <= threshold) else {
            return no_prediction;
        };
        if points[i].1 == threshold {
            return (Some(points[i].0), CrossingRange::InRange);
        }
        return match day_at(points[i - 1], points[i], threshold) {
            Some(day) => (Some(day), CrossingRange::InRange),
            None => no_prediction,
        };
    }

    let (a, b, range) = if first_half_max < threshold {
        (points[0], min_point, CrossingRange::NeverReaches)
    } else if min_point.1 >= threshold {
        (points[0], points[points.len() - 1], CrossingRange::StaysAbove)
    } else {
        return no_prediction;
    };

    match day_at(a, b, threshold) {
        Some(day) => (Some(day), range),
        None => no_prediction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_point_interpolation() {
        let (day, range) = estimate_crossing(&[(0, 0.30), (5, 0.05)], 0.10);
        assert_eq!(range, CrossingRange::InRange);
        // 0 + (0.10 - 0.30) * 5 / (0.05 - 0.30) = 4
        assert_eq!(day, Some(4));
    }

    #[test]
    fn test_exact_hit_is_not_interpolated() {
        let series = [(0, 0.8), (7, 0.6), (14, 0.4), (21, 0.2)];
        assert_eq!(
            estimate_crossing(&series, 0.4),
            (Some(14), CrossingRange::InRange)
        );
    }

    #[test]
    fn test_first_point_is_skipped_by_scan() {
        // Index 0 already sits below the threshold; the scan starts at 1.
        let series = [(0, 0.1), (10, 0.9), (20, 0.5), (30, 0.3)];
        let (day, range) = estimate_crossing(&series, 0.4);
        assert_eq!(range, CrossingRange::InRange);
        assert_eq!(day, Some(25));
    }

    #[test]
    fn test_never_reaches_uses_first_and_minimum() {
        // First half max 0.5 < 0.6; minimum 0.2 at day 10.
        let series = [(0, 0.5), (5, 0.4), (10, 0.2), (15, 0.3)];
        let (day, range) = estimate_crossing(&series, 0.6);
        assert_eq!(range, CrossingRange::NeverReaches);
        assert_eq!(range.tag(), Some("lower"));
        // 0 + (0.6 - 0.5) * 10 / (0.2 - 0.5) = -3.33
        assert_eq!(day, Some(-3));
    }

    #[test]
    fn test_stays_above_uses_first_and_last() {
        let series = [(0, 0.9), (10, 0.8), (20, 0.7), (30, 0.6)];
        let (day, range) = estimate_crossing(&series, 0.5);
        assert_eq!(range, CrossingRange::StaysAbove);
        assert_eq!(range.tag(), Some("upper"));
        assert_eq!(day, Some(40));
    }

    #[test]
    fn test_flat_series_has_no_prediction() {
        let series = [(0, 0.2), (10, 0.2), (20, 0.2)];
        assert_eq!(
            estimate_crossing(&series, 0.5),
            (None, CrossingRange::NoPrediction)
        );
    }

    #[test]
    fn test_short_or_invalid_series() {
        assert_eq!(estimate_crossing(&[(0, 0.5)], 0.1).1, CrossingRange::NoPrediction);
        assert_eq!(estimate_crossing(&[], 0.1).1, CrossingRange::NoPrediction);
        assert_eq!(
            estimate_crossing(&[(0, 0.5), (5, f64::NAN)], 0.1).1,
            CrossingRange::NoPrediction
        );
        assert_eq!(CrossingRange::NoPrediction.tag(), None);
    }
}
