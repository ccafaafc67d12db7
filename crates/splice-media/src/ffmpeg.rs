//! Backend that runs ffmpeg as a sidecar process.
//!
//! The working set is a temporary directory; ffmpeg runs with it as the
//! current directory so the plan's bare input names resolve. Progress comes
//! from `-progress pipe:1` on stdout while stderr is drained on a separate
//! thread and kept as the failure diagnostic. Cancellation is polled on a
//! timer, so an encoder that stops writing progress can still be killed.

use crossbeam_channel::RecvTimeoutError;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::backend::{BackendError, EncodeBackend, EncodeJob, ExportCancel};

/// Find the ffmpeg binary: an explicit override, then `PATH`, then the
/// location ffmpeg-sidecar downloads to.
pub fn locate_ffmpeg(override_path: Option<&Path>) -> Result<PathBuf, BackendError> {
    if let Some(path) = override_path {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(BackendError::NotFound(path.display().to_string()))
        };
    }
    if let Ok(path) = which::which("ffmpeg") {
        return Ok(path);
    }
    let sidecar = ffmpeg_sidecar::paths::ffmpeg_path();
    if sidecar.exists() {
        Ok(sidecar)
    } else {
        Err(BackendError::NotFound("ffmpeg".to_string()))
    }
}

/// How often a running encode checks for cancellation and exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct FfmpegBackend {
    binary: PathBuf,
    workdir: Option<TempDir>,
}

impl FfmpegBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            workdir: None,
        }
    }

    /// Backend using [`locate_ffmpeg`].
    pub fn locate(override_path: Option<&Path>) -> Result<Self, BackendError> {
        Ok(Self::new(locate_ffmpeg(override_path)?))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn workdir(&self) -> Result<&Path, BackendError> {
        self.workdir
            .as_ref()
            .map(TempDir::path)
            .ok_or(BackendError::NotStarted)
    }
}

impl EncodeBackend for FfmpegBackend {
    fn begin(&mut self) -> Result<(), BackendError> {
        // Dropping the previous directory deletes it.
        self.workdir = Some(tempfile::Builder::new().prefix("splice-export-").tempdir()?);
        Ok(())
    }

    fn load_input(&mut self, name: &str, bytes: &[u8]) -> Result<(), BackendError> {
        if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name) {
            return Err(BackendError::InvalidName(name.to_string()));
        }
        let path = self.workdir()?.join(name);
        std::fs::write(&path, bytes)?;
        debug!(name, bytes = bytes.len(), "loaded input");
        Ok(())
    }

    fn execute(
        &mut self,
        job: &EncodeJob,
        progress: &mut dyn FnMut(f64),
        cancel: &ExportCancel,
    ) -> Result<Vec<u8>, BackendError> {
        let dir = self.workdir()?.to_path_buf();
        let total = job.duration.to_seconds_f64();

        info!(binary = %self.binary.display(), args = job.args.len(), "starting ffmpeg");
        let mut child = Command::new(&self.binary)
            .args(["-hide_banner", "-nostats", "-progress", "pipe:1"])
            .args(&job.args)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take();
        let drain = std::thread::spawn(move || {
            let mut log = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut log);
            }
            log
        });

        let (tx, rx) = crossbeam_channel::unbounded();
        let stdout = child.stdout.take();
        let reader = std::thread::spawn(move || {
            let Some(stdout) = stdout else { return };
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if let Some(parsed) = parse_progress_line(&line) {
                    if tx.send(parsed).is_err() {
                        break;
                    }
                }
            }
        });

        let mut stdout_open = true;
        let status = loop {
            if cancel.is_cancelled() {
                // The reader threads end once the killed process closes its pipes.
                let _ = child.kill();
                let _ = child.wait();
                info!("ffmpeg cancelled");
                return Err(BackendError::Cancelled);
            }
            if stdout_open {
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(line) => {
                        report(line, total, progress);
                        continue;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => stdout_open = false,
                }
            } else {
                std::thread::sleep(POLL_INTERVAL);
            }
            if let Some(status) = child.try_wait()? {
                break status;
            }
        };

        let _ = reader.join();
        for line in rx.try_iter() {
            report(line, total, progress);
        }
        let diagnostic = drain.join().unwrap_or_default();
        if !status.success() {
            return Err(BackendError::Failed {
                status: status.to_string(),
                diagnostic,
            });
        }

        let bytes = std::fs::read(dir.join(&job.output))?;
        info!(bytes = bytes.len(), "ffmpeg finished");
        Ok(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressLine {
    /// Encoded output time in microseconds.
    OutTime(u64),
    End,
}

/// Forward one progress line as a fraction of `total` seconds.
fn report(line: ProgressLine, total: f64, progress: &mut dyn FnMut(f64)) {
    match line {
        ProgressLine::OutTime(micros) if total > 0.0 => {
            progress((micros as f64 / 1_000_000.0 / total).clamp(0.0, 1.0));
        }
        ProgressLine::OutTime(_) => {}
        ProgressLine::End => progress(1.0),
    }
}

/// Parse one `key=value` line of ffmpeg's `-progress` stream.
fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" => value.parse().ok().map(ProgressLine::OutTime),
        "progress" if value == "end" => Some(ProgressLine::End),
        _ => None,
    }
}
