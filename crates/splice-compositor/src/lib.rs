//! Splice Compositor - playback-side view of a timeline
//!
//! Answers "what is on screen and what is heard at time t" for a project
//! state, and drives a playhead from an external clock.

pub mod compositor;
pub mod transport;

pub use compositor::{
    clip_gain, resolve_at_time, total_duration, AudioLayer, CompositeFrame, TextLayer, VisualLayer,
    VisualSource, MIN_TIMELINE_DURATION,
};
pub use transport::{Tick, Transport};
