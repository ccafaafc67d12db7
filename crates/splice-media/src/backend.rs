//! The encoding backend contract.
//!
//! A backend owns a working set of named files. An export calls `begin` for a
//! fresh working set, loads every source once, then runs a single job.

use splice_core::RationalTime;
use splice_render::RenderPlan;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// File name the encoder writes inside its working set.
pub const OUTPUT_NAME: &str = "output.mp4";

/// One encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    /// Encoder arguments, inputs and output included.
    pub args: Vec<String>,
    /// Name of the file the job produces.
    pub output: String,
    /// Expected output length, used to turn encoder time into a fraction.
    pub duration: RationalTime,
}

impl EncodeJob {
    pub fn from_plan(plan: &RenderPlan) -> Self {
        Self {
            args: plan.encode_args(OUTPUT_NAME),
            output: OUTPUT_NAME.to_string(),
            duration: plan.duration,
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("encoder binary not found: {0}")]
    NotFound(String),

    #[error("working set has not been started")]
    NotStarted,

    #[error("invalid working-set file name {0:?}")]
    InvalidName(String),

    #[error("encoder I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The encoder ran and failed; `diagnostic` is its output verbatim.
    #[error("encoder exited with {status}:\n{diagnostic}")]
    Failed { status: String, diagnostic: String },

    #[error("encoding cancelled")]
    Cancelled,
}

/// Something that can turn a job plus loaded inputs into encoded bytes.
pub trait EncodeBackend: Send {
    /// Start a fresh working set, discarding anything loaded before.
    fn begin(&mut self) -> Result<(), BackendError>;

    /// Add a named file to the working set.
    fn load_input(&mut self, name: &str, bytes: &[u8]) -> Result<(), BackendError>;

    /// Run `job`, reporting progress as a fraction in [0, 1].
    fn execute(
        &mut self,
        job: &EncodeJob,
        progress: &mut dyn FnMut(f64),
        cancel: &ExportCancel,
    ) -> Result<Vec<u8>, BackendError>;
}

/// Handle for cancelling an in-progress export.
#[derive(Debug, Clone)]
pub struct ExportCancel(Arc<AtomicBool>);

impl ExportCancel {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ExportCancel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_handle_is_shared() {
        let cancel = ExportCancel::new();
        let other = cancel.clone();
        assert!(!other.is_cancelled());
        cancel.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_failed_error_keeps_diagnostic() {
        let err = BackendError::Failed {
            status: "exit status: 1".into(),
            diagnostic: "No such filter: 'bogus'".into(),
        };
        assert!(err.to_string().ends_with("No such filter: 'bogus'"));
    }
}
