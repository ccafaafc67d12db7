//! Media file probing with ffprobe.

use serde::{Deserialize, Serialize};
use splice_core::{RationalTime, Result, SpliceError};
use splice_timeline::{Asset, MediaData};
use std::path::{Path, PathBuf};
use std::process::Command;

/// What a probed file will become on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbedKind {
    Video,
    Audio,
    Image,
}

/// Information about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    /// Container format as reported by ffprobe (e.g. `mov,mp4,m4a`).
    pub format: String,
    /// `None` for still images.
    pub duration: Option<RationalTime>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub has_audio: bool,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    format_name: String,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    disposition: Disposition,
}

#[derive(Deserialize, Default)]
struct Disposition {
    /// Embedded cover art, not a picture stream.
    #[serde(default)]
    attached_pic: u8,
}

/// ffprobe next to the given ffmpeg binary.
pub fn ffprobe_path(ffmpeg: &Path) -> PathBuf {
    let name = if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" };
    ffmpeg.with_file_name(name)
}

impl MediaProbe {
    /// Probe `path` with the ffprobe that sits next to `ffmpeg`.
    pub fn probe(path: impl AsRef<Path>, ffmpeg: &Path) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SpliceError::NotFound(path.display().to_string()));
        }

        let ffprobe = ffprobe_path(ffmpeg);
        tracing::debug!(file = %path.display(), ffprobe = %ffprobe.display(), "probing");
        let output = Command::new(&ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(SpliceError::Media(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Self::from_json(&String::from_utf8_lossy(&output.stdout))
    }

    /// Parse ffprobe's JSON report.
    pub fn from_json(json: &str) -> Result<Self> {
        let report: ProbeOutput =
            serde_json::from_str(json).map_err(|e| SpliceError::Serialization(e.to_string()))?;
        let format = report.format.unwrap_or(ProbeFormat {
            format_name: String::new(),
            duration: None,
        });

        let video = report
            .streams
            .iter()
            .find(|s| s.codec_type == "video" && s.disposition.attached_pic == 0);
        let has_audio = report.streams.iter().any(|s| s.codec_type == "audio");
        let still = is_still_format(&format.format_name);
        let duration = if still {
            None
        } else {
            format
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(RationalTime::from_seconds_f64)
        };

        Ok(Self {
            format: format.format_name,
            duration,
            width: video.and_then(|s| s.width),
            height: video.and_then(|s| s.height),
            has_audio,
        })
    }

    pub fn has_video(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }

    pub fn kind(&self) -> Result<ProbedKind> {
        match (self.has_video(), self.duration) {
            (true, None) => Ok(ProbedKind::Image),
            (true, Some(_)) => Ok(ProbedKind::Video),
            (false, Some(_)) if self.has_audio => Ok(ProbedKind::Audio),
            _ => Err(SpliceError::UnsupportedFormat(self.format.clone())),
        }
    }

    /// Build a typed asset from this probe and the file's bytes.
    pub fn into_asset(self, name: impl Into<String>, media: MediaData) -> Result<Asset> {
        let (width, height) = (self.width.unwrap_or(0), self.height.unwrap_or(0));
        Ok(match (self.kind()?, self.duration) {
            (ProbedKind::Video, Some(duration)) => Asset::video(name, media, duration, width, height),
            (ProbedKind::Audio, Some(duration)) => Asset::audio(name, media, duration),
            _ => Asset::image(name, media, width, height),
        })
    }
}

/// MIME type guessed from a file extension.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    })
}

fn is_still_format(format_name: &str) -> bool {
    format_name
        .split(',')
        .any(|f| f == "image2" || f.ends_with("_pipe"))
}
