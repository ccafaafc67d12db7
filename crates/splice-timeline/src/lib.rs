//! Splice Timeline - Timeline data model
//!
//! Implements the editable state of a project:
//! - Typed assets (video, audio, image, text) with shared payloads
//! - Three fixed tracks of non-overlapping clips
//! - Edit reducers with snapping, overlap rejection and undo/redo
//! - Versioned JSON persistence

pub mod asset;
pub mod clip;
pub mod edit;
pub mod project;
pub mod serialization;
pub mod settings;
pub mod track;

pub use asset::{Asset, AssetId, AssetKind, AssetType, MediaData, TextDescriptor, TextPosition};
pub use clip::{Clip, ClipId};
pub use edit::{EditCommand, EditLimits, Editor, Rejection, SplitFadePolicy, UndoStack};
pub use project::Project;
pub use serialization::{ProjectFile, CURRENT_VERSION};
pub use settings::{ExportSettings, Quality, Resolution};
pub use track::{Track, TrackKind};
