//! Pre-flight checks run before any graph is built.

use splice_timeline::{AssetId, ClipId, Project, TrackKind};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// One reason a project cannot be exported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("no video clips found")]
    EmptyVideoTrack,

    #[error("{track} clip {clip} references missing asset {asset}")]
    MissingAsset {
        track: TrackKind,
        clip: ClipId,
        asset: AssetId,
    },

    #[error("asset \"{name}\" has no media bytes")]
    MissingBytes { asset: AssetId, name: String },
}

/// Every problem found in a project, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "project cannot be exported ({} issue", self.issues.len())?;
        if self.issues.len() != 1 {
            f.write_str("s")?;
        }
        f.write_str(")")?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

/// Collect every export blocker in `project`.
pub fn validate(project: &Project) -> Result<(), ValidationReport> {
    let mut issues = Vec::new();

    if project.video.is_empty() {
        issues.push(ValidationIssue::EmptyVideoTrack);
    }

    let mut reported: HashSet<AssetId> = HashSet::new();
    for track in project.tracks() {
        for clip in &track.clips {
            match project.asset(clip.asset_id) {
                None => issues.push(ValidationIssue::MissingAsset {
                    track: track.kind,
                    clip: clip.id,
                    asset: clip.asset_id,
                }),
                Some(asset) => {
                    let lacks_bytes = asset.media().is_some_and(|m| !m.has_bytes());
                    if lacks_bytes && reported.insert(asset.id) {
                        issues.push(ValidationIssue::MissingBytes {
                            asset: asset.id,
                            name: asset.name.clone(),
                        });
                    }
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationReport { issues })
    }
}
