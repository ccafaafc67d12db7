//! Clip types for the timeline.

use serde::{Deserialize, Serialize};
use splice_core::{FadeEnvelope, RationalTime, TimeRange};
use std::fmt;
use uuid::Uuid;

use crate::asset::AssetId;
use crate::track::TrackKind;

/// Unique clip identity. Never reused: split mints two fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub Uuid);

impl ClipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A placed instance of an asset on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Unique clip ID
    pub id: ClipId,
    /// Asset this clip plays
    pub asset_id: AssetId,
    /// Owning track
    pub track: TrackKind,
    /// Timeline start, never negative
    pub start: RationalTime,
    /// Duration on the timeline, always positive
    pub duration: RationalTime,
    /// Source in point
    pub trim_start: RationalTime,
    /// Source out point
    pub trim_end: RationalTime,
    /// Clip volume in percent [0, 100]
    pub volume: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<f64>,
    /// Playback speed multiplier (absent = 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl Clip {
    /// A fresh clip covering `[start, start + duration)` and the source window `[0, duration)`.
    pub fn new(asset_id: AssetId, track: TrackKind, start: RationalTime, duration: RationalTime) -> Self {
        Self {
            id: ClipId::new(),
            asset_id,
            track,
            start,
            duration,
            trim_start: RationalTime::ZERO,
            trim_end: duration,
            volume: 100.0,
            muted: false,
            fade_in: None,
            fade_out: None,
            speed: None,
        }
    }

    /// Timeline interval occupied by the clip.
    #[inline]
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.duration)
    }

    /// Timeline end (exclusive).
    #[inline]
    pub fn end(&self) -> RationalTime {
        self.start + self.duration
    }

    /// Effective speed. Missing, non-finite or non-positive values play at 1.0.
    pub fn speed(&self) -> f64 {
        match self.speed {
            Some(s) if s.is_finite() && s > 0.0 => s,
            _ => 1.0,
        }
    }

    /// Clip fades as an envelope (absent fades count as zero).
    pub fn envelope(&self) -> FadeEnvelope {
        FadeEnvelope::new(self.fade_in.unwrap_or(0.0), self.fade_out.unwrap_or(0.0))
    }

    /// True when the clip carries any fade of its own.
    pub fn has_fades(&self) -> bool {
        self.fade_in.is_some() || self.fade_out.is_some()
    }

    /// Source position played at timeline time `t`.
    pub fn source_time_at(&self, t: RationalTime) -> RationalTime {
        (t - self.start).scale(self.speed()) + self.trim_start
    }

    /// Amount of source consumed by `span` of timeline time.
    #[inline]
    pub fn source_span(&self, span: RationalTime) -> RationalTime {
        span.scale(self.speed())
    }

    /// Copy with a freshly minted identity.
    pub(crate) fn with_new_id(&self) -> Self {
        Self {
            id: ClipId::new(),
            ..self.clone()
        }
    }
}
