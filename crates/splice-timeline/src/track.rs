//! Track types for the timeline.

use serde::{Deserialize, Serialize};
use splice_core::{clamp_percent, overlaps_any, RationalTime, TimeRange};
use std::fmt;
use std::str::FromStr;

use crate::asset::AssetType;
use crate::clip::{Clip, ClipId};

/// Kind of track. The timeline has exactly one track of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
    Text,
}

impl TrackKind {
    pub const ALL: [TrackKind; 3] = [TrackKind::Video, TrackKind::Audio, TrackKind::Text];

    /// Whether clips of this asset type may be placed on the track.
    pub fn accepts(self, asset: AssetType) -> bool {
        matches!(
            (self, asset),
            (TrackKind::Video, AssetType::Video | AssetType::Image)
                | (TrackKind::Audio, AssetType::Audio | AssetType::Video)
                | (TrackKind::Text, AssetType::Text)
        )
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
        };
        f.write_str(s)
    }
}

impl FromStr for TrackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" | "image" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown track '{other}' (expected video, audio or text)")),
        }
    }
}

/// A track holding non-overlapping clips.
///
/// Clip order is insertion order, which is also the order first-match snapping
/// walks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track kind
    pub kind: TrackKind,
    /// Track name
    pub name: String,
    /// Clips on this track
    pub clips: Vec<Clip>,
    /// Track volume in percent [0, 100]
    pub volume: f64,
    /// Is track muted
    pub muted: bool,
    /// Noise-reduction flag (audio only; stored, not processed)
    #[serde(default)]
    pub noise_reduction: bool,
}

impl Track {
    /// Create an empty track.
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            clips: Vec::new(),
            volume: 100.0,
            muted: false,
            noise_reduction: false,
        }
    }

    /// Set the volume, clamped into [0, 100].
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = clamp_percent(volume);
    }

    /// Find a clip by id.
    pub fn find_clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    /// Find a clip mutably by id.
    pub fn find_clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    /// Position of a clip in track order.
    pub fn position(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|c| c.id == id)
    }

    /// Intervals of every clip except `exclude`, in track order.
    pub fn ranges_excluding(&self, exclude: Option<ClipId>) -> impl Iterator<Item = TimeRange> + '_ {
        self.clips
            .iter()
            .filter(move |c| Some(c.id) != exclude)
            .map(Clip::range)
    }

    /// True iff `candidate` overlaps some clip other than `exclude`.
    pub fn would_overlap(&self, candidate: TimeRange, exclude: Option<ClipId>) -> bool {
        overlaps_any(candidate, self.ranges_excluding(exclude))
    }

    /// The first clip whose interval contains `time`.
    pub fn clip_at_time(&self, time: RationalTime) -> Option<&Clip> {
        self.clips.iter().find(|c| c.range().contains(time))
    }

    /// Every clip whose interval contains `time`, in track order.
    pub fn clips_at_time(&self, time: RationalTime) -> impl Iterator<Item = &Clip> + '_ {
        self.clips.iter().filter(move |c| c.range().contains(time))
    }

    /// Clips sorted by timeline start.
    pub fn clips_by_start(&self) -> Vec<&Clip> {
        let mut clips: Vec<&Clip> = self.clips.iter().collect();
        clips.sort_by_key(|c| c.start);
        clips
    }

    /// End of the last clip, or zero for an empty track.
    pub fn end_time(&self) -> RationalTime {
        self.clips.iter().map(Clip::end).max().unwrap_or(RationalTime::ZERO)
    }

    /// Number of clips in this track.
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// True when no two clips overlap.
    pub fn is_overlap_free(&self) -> bool {
        let sorted = self.clips_by_start();
        sorted.windows(2).all(|w| w[0].end() <= w[1].start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetId;

    fn secs(s: i64) -> RationalTime {
        RationalTime::from_secs(s)
    }

    fn track_with(ranges: &[(i64, i64)]) -> Track {
        let mut track = Track::new(TrackKind::Video, "Video");
        for &(start, dur) in ranges {
            track
                .clips
                .push(Clip::new(AssetId::new(), TrackKind::Video, secs(start), secs(dur)));
        }
        track
    }

    #[test]
    fn test_compatibility_matrix() {
        assert!(TrackKind::Video.accepts(AssetType::Image));
        assert!(TrackKind::Audio.accepts(AssetType::Video));
        assert!(!TrackKind::Video.accepts(AssetType::Audio));
        assert!(!TrackKind::Text.accepts(AssetType::Image));
        assert!(TrackKind::Text.accepts(AssetType::Text));
    }

    #[test]
    fn test_overlap_excludes_self() {
        let track = track_with(&[(0, 5), (10, 5)]);
        let first = track.clips[0].id;
        assert!(!track.would_overlap(TimeRange::new(secs(1), secs(5)), Some(first)));
        assert!(track.would_overlap(TimeRange::new(secs(1), secs(5)), None));
        assert!(!track.would_overlap(TimeRange::new(secs(5), secs(5)), None));
    }

    #[test]
    fn test_lookup_at_time() {
        let track = track_with(&[(0, 5), (10, 5)]);
        assert_eq!(track.clip_at_time(secs(12)).map(|c| c.start), Some(secs(10)));
        assert!(track.clip_at_time(secs(5)).is_none());
        assert_eq!(track.end_time(), secs(15));
    }

    #[test]
    fn test_volume_clamped() {
        let mut track = Track::new(TrackKind::Audio, "Audio");
        track.set_volume(250.0);
        assert_eq!(track.volume, 100.0);
    }

    #[test]
    fn test_sorted_order_independent_of_insertion() {
        let track = track_with(&[(10, 2), (0, 2), (5, 2)]);
        let starts: Vec<_> = track.clips_by_start().iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![secs(0), secs(5), secs(10)]);
        assert!(track.is_overlap_free());
    }

    #[test]
    fn test_track_kind_parses() {
        assert_eq!("Audio".parse::<TrackKind>(), Ok(TrackKind::Audio));
        assert_eq!("image".parse::<TrackKind>(), Ok(TrackKind::Video));
        assert!("subtitles".parse::<TrackKind>().is_err());
    }
}
