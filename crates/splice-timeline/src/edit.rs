//! Edit operations with undo/redo support.
//!
//! Every mutation is an `EditCommand` reducer: it reads a `Project` and either
//! returns the next state or a `Rejection`. A rejected edit leaves the prior
//! state in place. History is kept as whole-state snapshots, so undo never
//! needs an inverse command.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use splice_core::{snap, RationalTime, SnapPolicy, TimeRange};
use thiserror::Error;

use crate::asset::{Asset, AssetId, AssetType};
use crate::clip::{Clip, ClipId};
use crate::project::Project;
use crate::settings::ExportSettings;
use crate::track::TrackKind;

// ── Limits & policies ───────────────────────────────────────────

/// How the two halves of a split clip inherit fades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitFadePolicy {
    /// Both halves keep both fades.
    #[default]
    CopyBoth,
    /// The first half keeps the fade-in, the second half keeps the fade-out.
    Partition,
}

/// Tunables consulted by the reducers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLimits {
    /// Distance under which a dragged edge snaps to a neighbouring boundary.
    pub snap_threshold: RationalTime,
    /// Shortest clip a trim or speed change may produce.
    pub min_duration: RationalTime,
    /// Duration given to images and text when placed.
    pub still_duration: RationalTime,
    pub snap_policy: SnapPolicy,
    pub split_fades: SplitFadePolicy,
}

impl Default for EditLimits {
    fn default() -> Self {
        Self {
            snap_threshold: RationalTime::new(1, 2),
            min_duration: RationalTime::new(1, 2),
            still_duration: RationalTime::from_secs(5),
            snap_policy: SnapPolicy::default(),
            split_fades: SplitFadePolicy::default(),
        }
    }
}

// ── Rejections ──────────────────────────────────────────────────

/// Why an edit was refused. The project state is unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),

    #[error("unknown clip {0}")]
    UnknownClip(ClipId),

    #[error("asset {0} already exists")]
    DuplicateAsset(AssetId),

    #[error("{asset} assets cannot be placed on the {track} track")]
    IncompatibleTrack { track: TrackKind, asset: AssetType },

    #[error("clip would overlap another clip on the {0} track")]
    Overlap(TrackKind),

    #[error("duration {duration} is below the minimum of {minimum}")]
    TooShort {
        duration: RationalTime,
        minimum: RationalTime,
    },

    #[error("trim would start before the beginning of the source")]
    NegativeTrimStart,

    #[error("trim end {trim_end} exceeds the source duration {available}")]
    BeyondSource {
        trim_end: RationalTime,
        available: RationalTime,
    },

    #[error("speed must be finite and positive, got {0}")]
    InvalidSpeed(f64),

    #[error("fade lengths must be finite and non-negative, got {0}")]
    InvalidFade(f64),

    #[error("split point {0} is not strictly inside the clip")]
    SplitOutsideClip(RationalTime),
}

// ── Edit commands ───────────────────────────────────────────────

/// A user edit, expressed as data.
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    /// Register an imported asset.
    AddAsset(Asset),
    /// Delete an asset and every clip that uses it.
    RemoveAsset(AssetId),
    /// Place an asset on a track at `start`.
    Place {
        track: TrackKind,
        asset: AssetId,
        start: RationalTime,
    },
    /// Drag a clip to a new start (snapped).
    Move { clip: ClipId, start: RationalTime },
    /// Drag the left edge: moves the start and consumes source from the front.
    TrimLeft { clip: ClipId, start: RationalTime },
    /// Drag the right edge to a new duration.
    TrimRight { clip: ClipId, duration: RationalTime },
    /// Cut a clip in two at an absolute timeline time.
    Split { clip: ClipId, at: RationalTime },
    /// Delete a clip.
    Remove(ClipId),
    /// Change playback speed; the timeline duration follows the source window.
    SetSpeed { clip: ClipId, speed: f64 },
    /// Set fade lengths in seconds; `None` clears a fade.
    SetFades {
        clip: ClipId,
        fade_in: Option<f64>,
        fade_out: Option<f64>,
    },
    SetClipVolume {
        clip: ClipId,
        volume: f64,
        muted: bool,
    },
    UpdateTrack {
        track: TrackKind,
        volume: f64,
        muted: bool,
        noise_reduction: bool,
    },
    Select(Option<ClipId>),
    SetExportSettings(ExportSettings),
    Rename(String),
    /// Commands applied atomically: all of them or none.
    Batch(Vec<EditCommand>),
}

impl EditCommand {
    /// Reduce `project` by this command.
    pub fn apply(&self, project: &Project, limits: &EditLimits) -> Result<Project, Rejection> {
        match self {
            Self::AddAsset(asset) => {
                if project.asset(asset.id).is_some() {
                    return Err(Rejection::DuplicateAsset(asset.id));
                }
                let mut next = project.clone();
                next.assets.push(asset.clone());
                Ok(next)
            }
            Self::RemoveAsset(id) => {
                if project.asset(*id).is_none() {
                    return Err(Rejection::UnknownAsset(*id));
                }
                let mut next = project.clone();
                next.assets.retain(|a| a.id != *id);

                let removed: SmallVec<[ClipId; 8]> = project
                    .clips()
                    .filter(|c| c.asset_id == *id)
                    .map(|c| c.id)
                    .collect();
                for kind in TrackKind::ALL {
                    next.track_mut(kind).clips.retain(|c| c.asset_id != *id);
                }
                if next.selection.is_some_and(|s| removed.contains(&s)) {
                    next.selection = None;
                }
                Ok(next)
            }
            Self::Place { track, asset, start } => place(project, limits, *track, *asset, *start),
            Self::Move { clip, start } => {
                let current = find(project, *clip)?;
                let start = snap_on_track(project, limits, current, start.non_negative());
                let candidate = TimeRange::new(start, current.duration);
                ensure_free(project, current, candidate)?;

                let mut next = project.clone();
                if let Some(c) = next.find_clip_mut(*clip) {
                    c.start = start;
                }
                Ok(next)
            }
            Self::TrimLeft { clip, start } => {
                let current = find(project, *clip)?;
                let start = snap_on_track(project, limits, current, start.non_negative());
                let delta = start - current.start;
                let duration = current.duration - delta;
                let trim_start = current.trim_start + current.source_span(delta);

                if duration < limits.min_duration {
                    return Err(Rejection::TooShort {
                        duration,
                        minimum: limits.min_duration,
                    });
                }
                if trim_start.is_negative() {
                    return Err(Rejection::NegativeTrimStart);
                }
                ensure_free(project, current, TimeRange::new(start, duration))?;

                let mut next = project.clone();
                if let Some(c) = next.find_clip_mut(*clip) {
                    c.start = start;
                    c.duration = duration;
                    c.trim_start = trim_start;
                }
                Ok(next)
            }
            Self::TrimRight { clip, duration } => {
                let current = find(project, *clip)?;
                let asset = project
                    .asset(current.asset_id)
                    .ok_or(Rejection::UnknownAsset(current.asset_id))?;
                let duration = (*duration).max(limits.min_duration);
                let trim_end = current.trim_start + current.source_span(duration);

                if let Some(available) = asset.duration() {
                    if trim_end > available {
                        return Err(Rejection::BeyondSource { trim_end, available });
                    }
                }
                ensure_free(project, current, TimeRange::new(current.start, duration))?;

                let mut next = project.clone();
                if let Some(c) = next.find_clip_mut(*clip) {
                    c.duration = duration;
                    c.trim_end = trim_end;
                }
                Ok(next)
            }
            Self::Split { clip, at } => split(project, limits, *clip, *at),
            Self::Remove(id) => {
                let current = find(project, *id)?;
                let mut next = project.clone();
                next.track_mut(current.track).clips.retain(|c| c.id != *id);
                if next.selection == Some(*id) {
                    next.selection = None;
                }
                Ok(next)
            }
            Self::SetSpeed { clip, speed } => {
                if !speed.is_finite() || *speed <= 0.0 {
                    return Err(Rejection::InvalidSpeed(*speed));
                }
                let current = find(project, *clip)?;
                let window = current.trim_end - current.trim_start;
                let duration = window.scale(1.0 / speed);
                if duration < limits.min_duration {
                    return Err(Rejection::TooShort {
                        duration,
                        minimum: limits.min_duration,
                    });
                }
                ensure_free(project, current, TimeRange::new(current.start, duration))?;

                let mut next = project.clone();
                if let Some(c) = next.find_clip_mut(*clip) {
                    c.duration = duration;
                    c.speed = if *speed == 1.0 { None } else { Some(*speed) };
                }
                Ok(next)
            }
            Self::SetFades {
                clip,
                fade_in,
                fade_out,
            } => {
                for value in [fade_in, fade_out].into_iter().flatten() {
                    if !value.is_finite() || *value < 0.0 {
                        return Err(Rejection::InvalidFade(*value));
                    }
                }
                find(project, *clip)?;
                let mut next = project.clone();
                if let Some(c) = next.find_clip_mut(*clip) {
                    c.fade_in = *fade_in;
                    c.fade_out = *fade_out;
                }
                Ok(next)
            }
            Self::SetClipVolume {
                clip,
                volume,
                muted,
            } => {
                find(project, *clip)?;
                let mut next = project.clone();
                if let Some(c) = next.find_clip_mut(*clip) {
                    c.volume = splice_core::clamp_percent(*volume);
                    c.muted = *muted;
                }
                Ok(next)
            }
            Self::UpdateTrack {
                track,
                volume,
                muted,
                noise_reduction,
            } => {
                let mut next = project.clone();
                let t = next.track_mut(*track);
                t.set_volume(*volume);
                t.muted = *muted;
                t.noise_reduction = *track == TrackKind::Audio && *noise_reduction;
                Ok(next)
            }
            Self::Select(selection) => {
                if let Some(id) = selection {
                    find(project, *id)?;
                }
                let mut next = project.clone();
                next.selection = *selection;
                Ok(next)
            }
            Self::SetExportSettings(settings) => {
                let mut next = project.clone();
                next.export_settings = *settings;
                Ok(next)
            }
            Self::Rename(name) => {
                let mut next = project.clone();
                next.name = name.clone();
                Ok(next)
            }
            Self::Batch(commands) => commands
                .iter()
                .try_fold(project.clone(), |state, cmd| cmd.apply(&state, limits)),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddAsset(_) => "add_asset",
            Self::RemoveAsset(_) => "remove_asset",
            Self::Place { .. } => "place",
            Self::Move { .. } => "move",
            Self::TrimLeft { .. } => "trim_left",
            Self::TrimRight { .. } => "trim_right",
            Self::Split { .. } => "split",
            Self::Remove(_) => "remove",
            Self::SetSpeed { .. } => "set_speed",
            Self::SetFades { .. } => "set_fades",
            Self::SetClipVolume { .. } => "set_clip_volume",
            Self::UpdateTrack { .. } => "update_track",
            Self::Select(_) => "select",
            Self::SetExportSettings(_) => "set_export_settings",
            Self::Rename(_) => "rename",
            Self::Batch(_) => "batch",
        }
    }

    /// Selection changes are not recorded in undo history.
    fn is_recorded(&self) -> bool {
        !matches!(self, Self::Select(_))
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn find(project: &Project, id: ClipId) -> Result<&Clip, Rejection> {
    project.find_clip(id).ok_or(Rejection::UnknownClip(id))
}

fn snap_on_track(project: &Project, limits: &EditLimits, clip: &Clip, time: RationalTime) -> RationalTime {
    let track = project.track(clip.track);
    snap(
        time,
        track.ranges_excluding(Some(clip.id)),
        limits.snap_threshold,
        limits.snap_policy,
    )
}

fn ensure_free(project: &Project, clip: &Clip, candidate: TimeRange) -> Result<(), Rejection> {
    if project.track(clip.track).would_overlap(candidate, Some(clip.id)) {
        Err(Rejection::Overlap(clip.track))
    } else {
        Ok(())
    }
}

fn place(
    project: &Project,
    limits: &EditLimits,
    track: TrackKind,
    asset_id: AssetId,
    start: RationalTime,
) -> Result<Project, Rejection> {
    let asset = project.asset(asset_id).ok_or(Rejection::UnknownAsset(asset_id))?;
    if !track.accepts(asset.asset_type()) {
        return Err(Rejection::IncompatibleTrack {
            track,
            asset: asset.asset_type(),
        });
    }

    let start = start.non_negative();
    let duration = asset.duration().unwrap_or(limits.still_duration);
    if duration <= RationalTime::ZERO {
        return Err(Rejection::TooShort {
            duration,
            minimum: limits.min_duration,
        });
    }
    if project
        .track(track)
        .would_overlap(TimeRange::new(start, duration), None)
    {
        return Err(Rejection::Overlap(track));
    }

    let mut next = project.clone();
    next.track_mut(track)
        .clips
        .push(Clip::new(asset_id, track, start, duration));
    Ok(next)
}

fn split(project: &Project, limits: &EditLimits, id: ClipId, at: RationalTime) -> Result<Project, Rejection> {
    let original = find(project, id)?;
    if !original.range().strictly_contains(at) {
        return Err(Rejection::SplitOutsideClip(at));
    }

    let head_len = at - original.start;
    let cut = original.trim_start + original.source_span(head_len);

    let mut head = original.with_new_id();
    head.duration = head_len;
    head.trim_end = cut;

    let mut tail = original.with_new_id();
    tail.start = at;
    tail.duration = original.duration - head_len;
    tail.trim_start = cut;
    tail.trim_end = original.trim_end;

    if limits.split_fades == SplitFadePolicy::Partition {
        head.fade_out = None;
        tail.fade_in = None;
    }

    let mut next = project.clone();
    let track = next.track_mut(original.track);
    let index = track.position(id).ok_or(Rejection::UnknownClip(id))?;
    let head_id = head.id;
    track.clips.splice(index..=index, [head, tail]);
    if next.selection == Some(id) {
        next.selection = Some(head_id);
    }
    Ok(next)
}

// ── Undo stack ──────────────────────────────────────────────────

/// Undo/redo history of project snapshots.
#[derive(Debug)]
pub struct UndoStack {
    /// States before each applied edit (most recent last).
    undo: Vec<Project>,
    /// States that have been undone (most recent last).
    redo: Vec<Project>,
    /// Maximum history depth.
    max_depth: usize,
}

impl UndoStack {
    /// Create a new undo stack with the given maximum depth.
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            max_depth,
        }
    }

    /// Record the state that preceded an edit.
    /// Clears the redo stack (new action invalidates redo history).
    pub fn push(&mut self, previous: Project) {
        self.redo.clear();
        self.undo.push(previous);
        if self.undo.len() > self.max_depth {
            self.undo.remove(0);
        }
    }

    /// Step back: returns the previous state and parks `current` for redo.
    pub fn undo(&mut self, current: Project) -> Option<Project> {
        let previous = self.undo.pop()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Step forward: returns the undone state and parks `current` for undo.
    pub fn redo(&mut self, current: Project) -> Option<Project> {
        let next = self.redo.pop()?;
        self.undo.push(current);
        Some(next)
    }

    /// Check if undo is available.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Check if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Clear all history.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Number of undo steps available.
    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    /// Number of redo steps available.
    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(200)
    }
}

// ── Editor ──────────────────────────────────────────────────────

/// Editing context: the current state, the limits reducers consult and the
/// undo history.
#[derive(Debug)]
pub struct Editor {
    state: Project,
    limits: EditLimits,
    history: UndoStack,
}

impl Editor {
    pub fn new(project: Project, limits: EditLimits) -> Self {
        Self {
            state: project,
            limits,
            history: UndoStack::default(),
        }
    }

    pub fn state(&self) -> &Project {
        &self.state
    }

    pub fn limits(&self) -> &EditLimits {
        &self.limits
    }

    pub fn set_limits(&mut self, limits: EditLimits) {
        self.limits = limits;
    }

    pub fn into_state(self) -> Project {
        self.state
    }

    /// Replace the whole state (project load or reset). History is dropped.
    pub fn replace(&mut self, project: Project) {
        self.state = project;
        self.history.clear();
    }

    /// Apply a command. On rejection the state is left untouched and the
    /// reason is logged at debug level and handed back.
    pub fn dispatch(&mut self, command: EditCommand) -> Result<(), Rejection> {
        match command.apply(&self.state, &self.limits) {
            Ok(next) => {
                tracing::trace!(command = command.name(), "edit applied");
                let previous = std::mem::replace(&mut self.state, next);
                if command.is_recorded() {
                    self.history.push(previous);
                }
                Ok(())
            }
            Err(rejection) => {
                tracing::debug!(command = command.name(), reason = %rejection, "edit rejected");
                Err(rejection)
            }
        }
    }

    /// Undo the last recorded edit. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.state.clone()) {
            Some(previous) => {
                self.state = previous;
                true
            }
            None => false,
        }
    }

    /// Redo the last undone edit. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.state.clone()) {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(Project::default(), EditLimits::default())
    }
}

// ── Tests ───────────────────────────────────────────────────────
