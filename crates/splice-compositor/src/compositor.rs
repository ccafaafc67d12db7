//! Time-domain compositor: what is visible and audible at a given time.
//!
//! Resolution is a pure function of the project state. The live preview and
//! the CLI `preview` command sample it; the export compiler uses the same
//! envelope and gain laws so the two paths agree.

use serde::Serialize;
use smallvec::SmallVec;
use splice_core::{Color, RationalTime};
use splice_timeline::{AssetId, AssetKind, Clip, ClipId, Project, TextPosition, Track};

/// Duration reported for short or empty timelines.
pub const MIN_TIMELINE_DURATION: RationalTime = RationalTime::from_secs(10);

/// Kind of visual source on the video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualSource {
    Video,
    Image,
}

/// The picture shown by the video track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualLayer {
    pub clip: ClipId,
    pub asset: AssetId,
    pub source: VisualSource,
    /// Position inside the source media.
    pub source_time: RationalTime,
    /// Envelope value in [0, 1].
    pub opacity: f64,
}

/// The sound played by the audio track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioLayer {
    pub clip: ClipId,
    pub asset: AssetId,
    pub source_time: RationalTime,
    /// Linear gain in [0, 1]; zero when the clip or track is muted.
    pub gain: f64,
    /// Playback rate.
    pub rate: f64,
}

/// An active text overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextLayer {
    pub clip: ClipId,
    pub text: String,
    pub font_size: u32,
    pub font_family: String,
    pub color: Color,
    pub background: Option<Color>,
    pub position: TextPosition,
    pub opacity: f64,
}

/// Everything the preview needs to present at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeFrame {
    pub time: RationalTime,
    /// `None` means a blank picture.
    pub visual: Option<VisualLayer>,
    /// `None` means silence.
    pub audio: Option<AudioLayer>,
    pub text: SmallVec<[TextLayer; 2]>,
}

impl CompositeFrame {
    pub fn is_blank(&self) -> bool {
        self.visual.is_none() && self.audio.is_none() && self.text.is_empty()
    }
}

/// Resolve the composite at `time`.
pub fn resolve_at_time(time: RationalTime, project: &Project) -> CompositeFrame {
    CompositeFrame {
        time,
        visual: resolve_visual(time, project),
        audio: resolve_audio(time, project),
        text: resolve_text(time, project),
    }
}

/// Latest clip end across all tracks, never less than ten seconds.
pub fn total_duration(project: &Project) -> RationalTime {
    project.end_time().max(MIN_TIMELINE_DURATION)
}

fn local_secs(clip: &Clip, time: RationalTime) -> (f64, f64) {
    ((time - clip.start).to_seconds_f64(), clip.duration.to_seconds_f64())
}

fn resolve_visual(time: RationalTime, project: &Project) -> Option<VisualLayer> {
    let clip = project.video.clip_at_time(time)?;
    let asset = project.asset(clip.asset_id)?;
    let source = match asset.kind {
        AssetKind::Video { .. } => VisualSource::Video,
        AssetKind::Image { .. } => VisualSource::Image,
        _ => return None,
    };
    let (local, duration) = local_secs(clip, time);

    Some(VisualLayer {
        clip: clip.id,
        asset: asset.id,
        source,
        source_time: clip.source_time_at(time),
        opacity: clip.envelope().value_at(local, duration),
    })
}

/// Gain of `clip` on `track` at `time`, following the shared audio law.
pub fn clip_gain(clip: &Clip, track: &Track, time: RationalTime) -> f64 {
    if clip.muted || track.muted {
        return 0.0;
    }
    let (local, duration) = local_secs(clip, time);
    let fade = clip.envelope().value_at(local, duration);
    ((clip.volume / 100.0) * (track.volume / 100.0) * fade).clamp(0.0, 1.0)
}

fn resolve_audio(time: RationalTime, project: &Project) -> Option<AudioLayer> {
    let track = &project.audio;
    let clip = track.clip_at_time(time)?;
    let asset = project.asset(clip.asset_id)?;
    if !matches!(asset.kind, AssetKind::Audio { .. } | AssetKind::Video { .. }) {
        return None;
    }

    Some(AudioLayer {
        clip: clip.id,
        asset: asset.id,
        source_time: clip.source_time_at(time),
        gain: clip_gain(clip, track, time),
        rate: clip.speed(),
    })
}

fn resolve_text(time: RationalTime, project: &Project) -> SmallVec<[TextLayer; 2]> {
    project
        .text
        .clips_at_time(time)
        .filter_map(|clip| {
            let desc = project.asset(clip.asset_id)?.text_descriptor()?;
            let envelope = if clip.has_fades() {
                clip.envelope()
            } else {
                desc.envelope()
            };
            let (local, duration) = local_secs(clip, time);

            Some(TextLayer {
                clip: clip.id,
                text: desc.text.clone(),
                font_size: desc.font_size,
                font_family: desc.font_family.clone(),
                color: desc.color,
                background: desc.background,
                position: desc.position,
                opacity: envelope.value_at(local, duration),
            })
        })
        .collect()
}
