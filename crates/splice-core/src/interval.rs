//! Interval utilities: overlap testing, boundary snapping, clamping.

use serde::{Deserialize, Serialize};

use crate::time::{RationalTime, TimeRange};

/// How [`snap`] chooses between several boundaries within the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapPolicy {
    /// First boundary found in track order (start before end of each range).
    FirstMatch,
    /// Closest boundary of all candidates; ties go to the earlier one in track order.
    #[default]
    Nearest,
}

/// Snap `time` to the start or end of one of `ranges` when it lies strictly
/// closer than `threshold`. Returns `time` unchanged when nothing is in reach.
pub fn snap<I>(time: RationalTime, ranges: I, threshold: RationalTime, policy: SnapPolicy) -> RationalTime
where
    I: IntoIterator<Item = TimeRange>,
{
    let mut best: Option<(RationalTime, RationalTime)> = None; // (boundary, distance)

    for range in ranges {
        for boundary in [range.start, range.end()] {
            let dist = (time - boundary).abs();
            if dist >= threshold {
                continue;
            }
            match policy {
                SnapPolicy::FirstMatch => return boundary,
                SnapPolicy::Nearest => {
                    if best.map_or(true, |(_, d)| dist < d) {
                        best = Some((boundary, dist));
                    }
                }
            }
        }
    }

    best.map(|(b, _)| b).unwrap_or(time)
}

/// True iff `candidate` overlaps any of `ranges` (half-open test).
pub fn overlaps_any<I>(candidate: TimeRange, ranges: I) -> bool
where
    I: IntoIterator<Item = TimeRange>,
{
    ranges.into_iter().any(|other| candidate.overlaps(other))
}

/// Clamp into [0, 1]. NaN maps to 0.
#[inline]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Clamp a percentage into [0, 100]. NaN maps to 0.
#[inline]
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
