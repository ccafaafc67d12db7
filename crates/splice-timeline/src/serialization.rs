//! Project files: a versioned JSON document.
//!
//! Asset payloads are embedded as base64 strings unless explicitly stripped.
//! A loaded document is checked against the invariants the edit reducers
//! maintain before it is handed to an editor.

use splice_core::{RationalTime, Result, SpliceError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::project::Project;
use crate::track::TrackKind;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Versioned project file wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Schema version.
    pub version: u32,
    /// The project data.
    pub project: Project,
    /// Application version that wrote this file.
    pub app_version: String,
}

/// Leading fields read before the document is typed.
#[derive(Deserialize)]
struct Header {
    version: Option<u32>,
}

impl ProjectFile {
    /// Create a new project file from a project.
    pub fn new(project: Project) -> Self {
        Self {
            version: CURRENT_VERSION,
            project,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Same document with every asset payload removed.
    pub fn without_bytes(self) -> Self {
        Self {
            project: self.project.without_bytes(),
            ..self
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| SpliceError::Serialization(format!("Failed to serialize project: {}", e)))
    }

    /// Deserialize from JSON bytes and validate the project.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let header: Header = serde_json::from_slice(data)
            .map_err(|e| SpliceError::Serialization(format!("Invalid JSON: {}", e)))?;

        match header.version {
            None => {
                return Err(SpliceError::Serialization(
                    "Not a project file: missing version".to_string(),
                ))
            }
            Some(v) if v > CURRENT_VERSION => {
                return Err(SpliceError::Serialization(format!(
                    "Project file version {} is newer than supported version {}",
                    v, CURRENT_VERSION
                )))
            }
            Some(v) if v < CURRENT_VERSION => {
                return Err(SpliceError::Serialization(format!(
                    "Unknown project file version {}",
                    v
                )))
            }
            Some(_) => {}
        }

        let mut file: Self = serde_json::from_slice(data)
            .map_err(|e| SpliceError::Serialization(format!("Failed to parse project: {}", e)))?;
        validate(&mut file.project)?;
        Ok(file)
    }

    /// Save project to a file path.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, &data)?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "project saved");
        Ok(())
    }

    /// Load project from a file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let file = Self::from_json(&data)?;
        tracing::debug!(
            path = %path.display(),
            assets = file.project.assets.len(),
            clips = file.project.clips().count(),
            "project loaded"
        );
        Ok(file)
    }
}

fn invalid(msg: String) -> SpliceError {
    SpliceError::Serialization(format!("Invalid project: {}", msg))
}

/// Reject documents no sequence of edits could have produced.
///
/// A selection pointing at a missing clip is dropped rather than refused.
fn validate(project: &mut Project) -> Result<()> {
    let mut asset_ids = HashSet::new();
    for asset in &project.assets {
        if !asset_ids.insert(asset.id) {
            return Err(invalid(format!("asset {} appears twice", asset.id)));
        }
    }

    let mut clip_ids = HashSet::new();
    for kind in TrackKind::ALL {
        let track = project.track(kind);
        if track.kind != kind {
            return Err(invalid(format!("{} track stored in the {} slot", track.kind, kind)));
        }
        for clip in &track.clips {
            if !clip_ids.insert(clip.id) {
                return Err(invalid(format!("clip {} appears twice", clip.id)));
            }
            if clip.track != kind {
                return Err(invalid(format!("clip {} is on the wrong track", clip.id)));
            }
            if clip.duration <= RationalTime::ZERO
                || clip.start.is_negative()
                || clip.trim_start.is_negative()
            {
                return Err(invalid(format!("clip {} has an invalid extent", clip.id)));
            }
            let asset = project
                .asset(clip.asset_id)
                .ok_or_else(|| invalid(format!("clip {} references a missing asset", clip.id)))?;
            if !kind.accepts(asset.asset_type()) {
                return Err(invalid(format!(
                    "clip {} places a {} asset on the {} track",
                    clip.id,
                    asset.asset_type(),
                    kind
                )));
            }
        }
        if !track.is_overlap_free() {
            return Err(invalid(format!("clips overlap on the {} track", kind)));
        }
    }

    if let Some(selected) = project.selection {
        if !clip_ids.contains(&selected) {
            tracing::warn!(clip = %selected, "dropping selection of a missing clip");
            project.selection = None;
        }
    }
    Ok(())
}

/// Serde adapter storing optional asset bytes as a base64 string.
pub(crate) mod payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S: Serializer>(bytes: &Option<Arc<[u8]>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Arc<[u8]>>, D::Error> {
        let Some(encoded) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        STANDARD
            .decode(encoded.as_bytes())
            .map(|bytes| Some(Arc::from(bytes)))
            .map_err(de::Error::custom)
    }
}
