//! Project state: assets, the three fixed tracks, selection and export settings.

use serde::{Deserialize, Serialize};
use splice_core::RationalTime;
use uuid::Uuid;

use crate::asset::{Asset, AssetId};
use crate::clip::{Clip, ClipId};
use crate::settings::ExportSettings;
use crate::track::{Track, TrackKind};

/// One immutable editing state.
///
/// Reducers never mutate a `Project` in place; they return a modified clone.
/// Asset payloads are reference counted, so cloning a state is cheap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID
    pub id: Uuid,
    /// Project name
    pub name: String,
    /// Imported assets, in import order
    pub assets: Vec<Asset>,
    /// Video/image track
    pub video: Track,
    /// Audio track
    pub audio: Track,
    /// Text overlay track
    pub text: Track,
    /// Currently selected clip
    #[serde(default)]
    pub selection: Option<ClipId>,
    #[serde(default)]
    pub export_settings: ExportSettings,
}

impl Project {
    /// Create a new empty project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            assets: Vec::new(),
            video: Track::new(TrackKind::Video, "Image"),
            audio: Track::new(TrackKind::Audio, "Audio"),
            text: Track::new(TrackKind::Text, "Text"),
            selection: None,
            export_settings: ExportSettings::default(),
        }
    }

    pub fn track(&self, kind: TrackKind) -> &Track {
        match kind {
            TrackKind::Video => &self.video,
            TrackKind::Audio => &self.audio,
            TrackKind::Text => &self.text,
        }
    }

    pub fn track_mut(&mut self, kind: TrackKind) -> &mut Track {
        match kind {
            TrackKind::Video => &mut self.video,
            TrackKind::Audio => &mut self.audio,
            TrackKind::Text => &mut self.text,
        }
    }

    /// All tracks in fixed order: video, audio, text.
    pub fn tracks(&self) -> [&Track; 3] {
        [&self.video, &self.audio, &self.text]
    }

    pub fn asset(&self, id: AssetId) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Find a clip on any track.
    pub fn find_clip(&self, id: ClipId) -> Option<&Clip> {
        self.tracks().into_iter().find_map(|t| t.find_clip(id))
    }

    /// Find a clip mutably on any track.
    pub fn find_clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        let kind = self.find_clip(id)?.track;
        self.track_mut(kind).find_clip_mut(id)
    }

    /// Every clip on every track.
    pub fn clips(&self) -> impl Iterator<Item = &Clip> + '_ {
        self.tracks().into_iter().flat_map(|t| t.clips.iter())
    }

    /// Latest clip end across all tracks.
    pub fn end_time(&self) -> RationalTime {
        self.tracks()
            .into_iter()
            .map(Track::end_time)
            .max()
            .unwrap_or(RationalTime::ZERO)
    }

    /// Snapshot with every asset payload dropped.
    pub fn without_bytes(&self) -> Self {
        Self {
            assets: self.assets.iter().map(Asset::without_bytes).collect(),
            ..self.clone()
        }
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled Project")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_has_three_tracks() {
        let project = Project::default();
        let kinds: Vec<_> = project.tracks().iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TrackKind::Video, TrackKind::Audio, TrackKind::Text]);
        assert_eq!(project.end_time(), RationalTime::ZERO);
        assert_eq!(project.name, "Untitled Project");
    }

    #[test]
    fn test_find_clip_across_tracks() {
        let mut project = Project::default();
        let clip = Clip::new(AssetId::new(), TrackKind::Audio, RationalTime::ZERO, RationalTime::from_secs(3));
        let id = clip.id;
        project.audio.clips.push(clip);

        assert_eq!(project.find_clip(id).map(|c| c.track), Some(TrackKind::Audio));
        project.find_clip_mut(id).unwrap().volume = 40.0;
        assert_eq!(project.audio.clips[0].volume, 40.0);
        assert_eq!(project.end_time(), RationalTime::from_secs(3));
    }
}
