//! Exclusive export session.
//!
//! The session owns the single backend instance. Exports take it under an
//! async mutex, so at most one export runs at a time, and drive it on the
//! blocking pool. A backend that fails is dropped; the next export builds a
//! fresh one from the factory.

use serde::Serialize;
use splice_render::{compile, CompileError, CompileOptions, GraphError, RenderPlan, ValidationReport};
use splice_timeline::{ExportSettings, Project};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::{BackendError, EncodeBackend, EncodeJob, ExportCancel};
use crate::ffmpeg::FfmpegBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    Preparing,
    Loading,
    Encoding,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportProgress {
    pub phase: ExportPhase,
    /// Completion of the current phase in [0, 1].
    pub fraction: f64,
}

impl ExportProgress {
    fn new(phase: ExportPhase, fraction: f64) -> Self {
        Self {
            phase,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Validation(#[from] ValidationReport),

    #[error("could not build render plan: {0}")]
    Plan(#[from] GraphError),

    #[error(transparent)]
    Backend(BackendError),

    #[error("export cancelled")]
    Cancelled,

    #[error("export worker stopped unexpectedly: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<CompileError> for ExportError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::Invalid(report) => Self::Validation(report),
            CompileError::Graph(graph) => Self::Plan(graph),
        }
    }
}

impl From<BackendError> for ExportError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Cancelled => Self::Cancelled,
            other => Self::Backend(other),
        }
    }
}

/// Result of a successful export.
#[derive(Debug)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub plan: RenderPlan,
}

pub type BackendFactory = dyn Fn() -> Result<Box<dyn EncodeBackend>, BackendError> + Send + Sync;
pub type ProgressFn = Arc<dyn Fn(ExportProgress) + Send + Sync>;

pub struct ExportSession {
    factory: Arc<BackendFactory>,
    backend: Mutex<Option<Box<dyn EncodeBackend>>>,
}

impl ExportSession {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn EncodeBackend>, BackendError> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            backend: Mutex::new(None),
        }
    }

    /// Session backed by ffmpeg, located lazily on first export.
    pub fn ffmpeg(binary: Option<PathBuf>) -> Self {
        Self::new(move || {
            let backend = FfmpegBackend::locate(binary.as_deref())?;
            Ok(Box::new(backend) as Box<dyn EncodeBackend>)
        })
    }

    /// True while a backend instance is cached.
    pub async fn has_backend(&self) -> bool {
        self.backend.lock().await.is_some()
    }

    /// Compile `project` and encode it.
    ///
    /// Validation failures return before the backend is touched.
    pub async fn export(
        &self,
        project: &Project,
        settings: &ExportSettings,
        options: &CompileOptions,
        progress: ProgressFn,
        cancel: ExportCancel,
    ) -> Result<ExportOutput, ExportError> {
        progress(ExportProgress::new(ExportPhase::Preparing, 0.0));
        let plan = compile(project, settings, options)?;
        for degradation in &plan.degradations {
            warn!(%degradation, "exporting in degraded mode");
        }

        // Every asset in the working set has bytes; validation checked it.
        let sources: Vec<(String, Arc<[u8]>)> = plan
            .working_set()
            .into_iter()
            .filter_map(|id| {
                let bytes = project.asset(id)?.media()?.bytes.clone()?;
                Some((splice_render::input_name(id), bytes))
            })
            .collect();
        let font = plan.font.clone();
        let job = EncodeJob::from_plan(&plan);

        let mut slot = self.backend.lock().await;
        let backend = match slot.take() {
            Some(backend) => backend,
            None => (self.factory)()?,
        };

        info!(
            inputs = sources.len(),
            duration = %plan.duration,
            "export started"
        );
        let worker_progress = Arc::clone(&progress);
        let (backend, result) = tokio::task::spawn_blocking(move || {
            let mut backend = backend;
            let result = run(backend.as_mut(), &sources, font.as_ref(), &job, &worker_progress, &cancel);
            (backend, result)
        })
        .await?;

        match result {
            Ok(bytes) => {
                *slot = Some(backend);
                progress(ExportProgress::new(ExportPhase::Complete, 1.0));
                info!(bytes = bytes.len(), "export complete");
                Ok(ExportOutput { bytes, plan })
            }
            Err(err) => {
                warn!(error = %err, "export failed, backend reset");
                drop(backend);
                Err(err.into())
            }
        }
    }
}

fn run(
    backend: &mut dyn EncodeBackend,
    sources: &[(String, Arc<[u8]>)],
    font: Option<&splice_render::FontResource>,
    job: &EncodeJob,
    progress: &ProgressFn,
    cancel: &ExportCancel,
) -> Result<Vec<u8>, BackendError> {
    backend.begin()?;

    let total = sources.len() + usize::from(font.is_some());
    progress(ExportProgress::new(ExportPhase::Loading, 0.0));
    for (i, (name, bytes)) in sources.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        backend.load_input(name, bytes)?;
        progress(ExportProgress::new(ExportPhase::Loading, (i + 1) as f64 / total as f64));
    }
    if let Some(font) = font {
        backend.load_input(&font.file_name, &font.bytes)?;
        progress(ExportProgress::new(ExportPhase::Loading, 1.0));
    }

    progress(ExportProgress::new(ExportPhase::Encoding, 0.0));
    backend.execute(
        job,
        &mut |fraction| progress(ExportProgress::new(ExportPhase::Encoding, fraction)),
        cancel,
    )
}
