//! Splice Render - export compilation
//!
//! Turns a project snapshot into a [`RenderPlan`]: the ordered list of source
//! inputs, a validated filter graph and the encoder settings. Running the
//! plan is the media crate's job.

pub mod compiler;
pub mod graph;
pub mod validation;

pub use compiler::{
    compile, input_name, CompileError, CompileOptions, Degradation, EncoderSettings, FontResource,
    RenderPlan, SourceInput, OUTPUT_FPS,
};
pub use graph::{DrawText, FadeDirection, Filter, FilterChain, FilterGraph, GraphError, Pad, Pts, StreamKind};
pub use validation::{validate, ValidationIssue, ValidationReport};
