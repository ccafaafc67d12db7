//! Splice Media - encoder and probe integration
//!
//! This crate handles:
//! - The encoding backend contract and its ffmpeg sidecar implementation
//! - The exclusive export session (one export at a time, reset on failure)
//! - Media file probing for imports

pub mod backend;
pub mod ffmpeg;
pub mod probe;
pub mod session;

pub use backend::{BackendError, EncodeBackend, EncodeJob, ExportCancel, OUTPUT_NAME};
pub use ffmpeg::{locate_ffmpeg, FfmpegBackend};
pub use probe::{ffprobe_path, mime_for_path, MediaProbe, ProbedKind};
pub use session::{
    BackendFactory, ExportError, ExportOutput, ExportPhase, ExportProgress, ExportSession, ProgressFn,
};
