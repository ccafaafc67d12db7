//! Splice Core - Foundation types for timeline editing
//!
//! This crate provides the fundamental types used throughout Splice:
//! - Time representation (RationalTime, FrameRate, TimeRange)
//! - Interval utilities (overlap testing, snapping, clamping)
//! - The linear fade envelope shared by preview and export
//! - Colors as they appear in text overlays

pub mod color;
pub mod envelope;
pub mod error;
pub mod interval;
pub mod time;

pub use color::Color;
pub use envelope::FadeEnvelope;
pub use error::{Result, SpliceError};
pub use interval::{clamp_percent, clamp_unit, overlaps_any, snap, SnapPolicy};
pub use time::{FrameRate, RationalTime, TimeRange};
