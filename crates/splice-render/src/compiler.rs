//! Compiles a project snapshot into a render plan.
//!
//! The plan is deterministic for a given snapshot: inputs, chains and labels
//! come out in the same order every time, so the rendered `-filter_complex`
//! text can be compared byte for byte.

use serde::Serialize;
use splice_core::{FrameRate, RationalTime};
use splice_timeline::{AssetId, AssetKind, Clip, ExportSettings, Project};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::graph::{
    DrawText, FadeDirection, Filter, FilterChain, FilterGraph, GraphError, Pad, Pts,
};
use crate::validation::{validate, ValidationReport};

/// Output frame rate of every export.
pub const OUTPUT_FPS: u32 = 30;

/// Font file made available to `drawtext`.
#[derive(Clone)]
pub struct FontResource {
    /// Name inside the encoder's working set.
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

impl FontResource {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: "font.ttf".to_string(),
            bytes: bytes.into(),
        }
    }

    /// Read a font file from disk.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }
}

impl fmt::Debug for FontResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontResource")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Font for text overlays. Without one, overlays are skipped.
    pub font: Option<FontResource>,
}

/// A feature dropped from the export, with the reason recorded in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Degradation {
    TextOverlaysSkipped { overlays: usize },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextOverlaysSkipped { overlays } => {
                write!(f, "{overlays} text overlay(s) skipped: no font available")
            }
        }
    }
}

/// A source file handed to the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInput {
    pub asset: AssetId,
    /// File name inside the encoder's working set.
    pub name: String,
}

/// Name under which an asset's bytes are written into the working set.
pub fn input_name(asset: AssetId) -> String {
    format!("input_{asset}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub pixel_format: &'static str,
    pub video_codec: &'static str,
    pub preset: &'static str,
    pub crf: u8,
    pub audio_codec: &'static str,
    pub audio_bitrate: &'static str,
}

impl EncoderSettings {
    pub fn for_export(settings: &ExportSettings) -> Self {
        let (width, height) = settings.resolution.dimensions();
        Self {
            width,
            height,
            frame_rate: OUTPUT_FPS,
            pixel_format: "yuv420p",
            video_codec: "libx264",
            preset: "veryfast",
            crf: settings.quality.crf(),
            audio_codec: "aac",
            audio_bitrate: "192k",
        }
    }
}

/// Everything the encoder needs for one export.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    /// Source files in `-i` order; one per clip.
    pub inputs: Vec<SourceInput>,
    pub graph: FilterGraph,
    pub video_output: Pad,
    pub audio_output: Option<Pad>,
    pub encoder: EncoderSettings,
    /// End of the last visual clip.
    pub video_duration: RationalTime,
    /// End of the last audible clip.
    pub audio_duration: RationalTime,
    /// Length of the encoded output.
    pub duration: RationalTime,
    /// Font used by the overlays, if any were drawn.
    pub font: Option<FontResource>,
    pub degradations: Vec<Degradation>,
}

impl RenderPlan {
    pub fn filter_complex(&self) -> String {
        self.graph.render()
    }

    /// Distinct assets whose bytes must be in the working set, first use first.
    pub fn working_set(&self) -> Vec<AssetId> {
        let mut seen = Vec::new();
        for input in &self.inputs {
            if !seen.contains(&input.asset) {
                seen.push(input.asset);
            }
        }
        seen
    }

    /// Encoder command-line arguments writing to `output`.
    pub fn encode_args(&self, output: &str) -> Vec<String> {
        let enc = &self.encoder;
        let mut args = Vec::new();
        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.name.clone());
        }
        args.push("-filter_complex".to_string());
        args.push(self.filter_complex());
        args.push("-map".to_string());
        args.push(self.video_output.to_string());
        if let Some(audio) = &self.audio_output {
            args.push("-map".to_string());
            args.push(audio.to_string());
        }
        args.extend(
            [
                "-r",
                &enc.frame_rate.to_string(),
                "-c:v",
                enc.video_codec,
                "-preset",
                enc.preset,
                "-crf",
                &enc.crf.to_string(),
                "-pix_fmt",
                enc.pixel_format,
            ]
            .map(String::from),
        );
        if self.audio_output.is_some() {
            args.extend(["-c:a", enc.audio_codec, "-b:a", enc.audio_bitrate].map(String::from));
        }
        args.push("-y".to_string());
        args.push(output.to_string());
        args
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Invalid(#[from] ValidationReport),

    #[error("inconsistent filter graph: {0}")]
    Graph(#[from] GraphError),
}

/// Compile `project` into a render plan.
pub fn compile(
    project: &Project,
    settings: &ExportSettings,
    options: &CompileOptions,
) -> Result<RenderPlan, CompileError> {
    validate(project)?;

    let encoder = EncoderSettings::for_export(settings);
    let mut builder = Builder::new(project, &encoder);

    let video_end = builder.video_segments();
    let audio = builder.audio_clips();
    let audio_end = audio
        .iter()
        .map(|(clip, available)| clip.start + clip.duration.min(*available))
        .max()
        .unwrap_or(RationalTime::ZERO);

    builder.extend_video(video_end, audio_end);
    let font = builder.text_overlays(options.font.as_ref());
    let audio_output = builder.audio_mix(&audio);

    let Builder {
        graph,
        inputs,
        degradations,
        ..
    } = builder;

    let video_output = Pad::link("vout");
    let mut mapped = vec![&video_output];
    if let Some(pad) = &audio_output {
        mapped.push(pad);
    }
    graph.validate(inputs.len(), &mapped)?;

    let plan = RenderPlan {
        inputs,
        graph,
        video_output,
        audio_output,
        encoder,
        video_duration: video_end,
        audio_duration: audio_end,
        duration: video_end.max(audio_end),
        font,
        degradations,
    };

    tracing::info!(
        inputs = plan.inputs.len(),
        chains = plan.graph.chain_count(),
        duration = %plan.duration,
        audio = plan.audio_output.is_some(),
        "render plan compiled"
    );
    tracing::debug!(filter_complex = %plan.filter_complex(), "filter graph");
    Ok(plan)
}

struct Builder<'a> {
    project: &'a Project,
    width: u32,
    height: u32,
    graph: FilterGraph,
    inputs: Vec<SourceInput>,
    degradations: Vec<Degradation>,
    /// Label of the finished base picture, before overlays.
    base: Pad,
}

impl<'a> Builder<'a> {
    fn new(project: &'a Project, encoder: &EncoderSettings) -> Self {
        Self {
            project,
            width: encoder.width,
            height: encoder.height,
            graph: FilterGraph::new(),
            inputs: Vec::new(),
            degradations: Vec::new(),
            base: Pad::link("vcat"),
        }
    }

    fn add_input(&mut self, asset: AssetId) -> usize {
        self.inputs.push(SourceInput {
            asset,
            name: input_name(asset),
        });
        self.inputs.len() - 1
    }

    fn black(&self, duration: RationalTime) -> FilterChain {
        FilterChain::source(Filter::ColorSource {
            color: "black",
            width: self.width,
            height: self.height,
            duration: duration.to_seconds_f64(),
            rate: OUTPUT_FPS,
        })
    }

    fn fit(&self, chain: FilterChain) -> FilterChain {
        chain
            .then(Filter::ScaleFit {
                width: self.width,
                height: self.height,
            })
            .then(Filter::PadCenter {
                width: self.width,
                height: self.height,
            })
            .then(Filter::SetSar1)
    }

    /// Per-clip picture chains plus black fillers for gaps, concatenated into
    /// `[vcat]`. Returns the end of the last clip.
    fn video_segments(&mut self) -> RationalTime {
        let project = self.project;
        let mut segments = Vec::new();
        let mut cursor = RationalTime::ZERO;

        for (i, clip) in project.video.clips_by_start().into_iter().enumerate() {
            let Some(asset) = project.asset(clip.asset_id) else {
                continue;
            };
            if clip.start > cursor {
                let gap = Pad::link(format!("gap{i}"));
                self.graph.push(self.black(clip.start - cursor).to(gap.clone()));
                segments.push(gap);
            }

            let input = self.add_input(asset.id);
            let d = clip.duration.to_seconds_f64();
            let chain = match asset.kind {
                AssetKind::Image { .. } => FilterChain::from(Pad::video(input))
                    .then(Filter::Loop {
                        frames: clip.duration.to_frames_ceil(FrameRate::FPS_30),
                    })
                    .then(Filter::Fps(OUTPUT_FPS))
                    .then(Filter::TrimDuration(d))
                    .then(Filter::SetPts(Pts::Reset)),
                _ => {
                    let speed = clip.speed();
                    FilterChain::from(Pad::video(input))
                        .then(Filter::Trim {
                            start: clip.trim_start.to_seconds_f64(),
                            end: clip.trim_end.to_seconds_f64(),
                        })
                        .then(Filter::SetPts(if speed == 1.0 {
                            Pts::Reset
                        } else {
                            Pts::ResetScaled(speed)
                        }))
                        .then(Filter::Fps(OUTPUT_FPS))
                }
            };
            let chain = video_fades(self.fit(chain), clip);

            let out = Pad::link(format!("v{i}"));
            self.graph.push(chain.to(out.clone()));
            segments.push(out);
            cursor = clip.end();
        }

        let count = segments.len();
        self.graph.push(
            FilterChain::new(segments)
                .then(Filter::Concat { segments: count })
                .to(Pad::link("vcat")),
        );
        cursor
    }

    /// Clips that will be heard, sorted by start, each with the timeline length
    /// its remaining source can cover.
    fn audio_clips(&self) -> Vec<(&'a Clip, RationalTime)> {
        let project = self.project;
        let track = &project.audio;
        if track.muted {
            return Vec::new();
        }
        track
            .clips_by_start()
            .into_iter()
            .filter(|clip| !clip.muted)
            .filter_map(|clip| {
                let asset = project.asset(clip.asset_id)?;
                if !matches!(asset.kind, AssetKind::Audio { .. } | AssetKind::Video { .. }) {
                    return None;
                }
                let available = asset
                    .duration()
                    .map(|d| (d - clip.trim_start).non_negative().scale(1.0 / clip.speed()))
                    .unwrap_or(clip.duration);
                Some((clip, available))
            })
            .collect()
    }

    /// When audio outlasts the picture, fade the picture out and pad it with black.
    fn extend_video(&mut self, video_end: RationalTime, audio_end: RationalTime) {
        if audio_end <= video_end {
            return;
        }
        let excess = audio_end - video_end;
        let fade = excess.min(RationalTime::from_secs(1));
        tracing::debug!(excess = %excess, "audio outlasts video, extending with black");

        self.graph.push(
            FilterChain::from(Pad::link("vcat"))
                .then(Filter::Fade {
                    direction: FadeDirection::Out,
                    start: (video_end - fade).to_seconds_f64(),
                    duration: fade.to_seconds_f64(),
                })
                .to(Pad::link("vfaded")),
        );
        self.graph.push(self.black(excess).to(Pad::link("vtail")));
        self.graph.push(
            FilterChain::new(vec![Pad::link("vfaded"), Pad::link("vtail")])
                .then(Filter::Concat { segments: 2 })
                .to(Pad::link("vext")),
        );
        self.base = Pad::link("vext");
    }

    /// Draw text overlays onto the base picture, producing `[vout]`.
    /// Returns the font when it was used.
    fn text_overlays(&mut self, font: Option<&FontResource>) -> Option<FontResource> {
        let project = self.project;
        let overlays: Vec<DrawText> = project
            .text
            .clips_by_start()
            .into_iter()
            .filter_map(|clip| {
                let desc = project.asset(clip.asset_id)?.text_descriptor()?;
                let envelope = if clip.has_fades() {
                    clip.envelope()
                } else {
                    desc.envelope()
                };
                let envelope = envelope.clamped_to(clip.duration.to_seconds_f64());
                Some(DrawText {
                    font_file: String::new(),
                    text: desc.text.clone(),
                    font_size: desc.font_size,
                    color: desc.color,
                    background: desc.background,
                    x: desc.position.x / 100.0,
                    y: desc.position.y / 100.0,
                    start: clip.start.to_seconds_f64(),
                    end: clip.end().to_seconds_f64(),
                    fade_in: envelope.fade_in,
                    fade_out: envelope.fade_out,
                })
            })
            .collect();

        let base = self.base.clone();
        let vout = Pad::link("vout");

        match font {
            Some(font) if !overlays.is_empty() => {
                let mut chain = FilterChain::from(base);
                for mut overlay in overlays {
                    overlay.font_file = font.file_name.clone();
                    chain = chain.then(Filter::DrawText(Box::new(overlay)));
                }
                self.graph.push(chain.to(vout));
                Some(font.clone())
            }
            _ => {
                if !overlays.is_empty() {
                    let degradation = Degradation::TextOverlaysSkipped {
                        overlays: overlays.len(),
                    };
                    tracing::warn!(%degradation, "export degraded");
                    self.degradations.push(degradation);
                }
                self.graph
                    .push(FilterChain::from(base).then(Filter::Null).to(vout));
                None
            }
        }
    }

    /// One chain per audible clip, mixed into `[aout]` when there are several.
    fn audio_mix(&mut self, clips: &[(&'a Clip, RationalTime)]) -> Option<Pad> {
        if clips.is_empty() {
            return None;
        }
        let track = &self.project.audio;
        let aout = Pad::link("aout");
        let single = clips.len() == 1;
        let mut mixed = Vec::with_capacity(clips.len());

        for (k, (clip, available)) in clips.iter().enumerate() {
            let input = self.add_input(clip.asset_id);
            let speed = clip.speed();
            let length = clip.duration.min(*available).to_seconds_f64();
            let envelope = clip.envelope().clamped_to(length);
            let gain = ((clip.volume / 100.0) * (track.volume / 100.0)).min(1.0);
            let delay_ms = (clip.start.to_seconds_f64() * 1000.0).round() as u64;

            let mut chain = FilterChain::from(Pad::audio(input))
                .then(Filter::ATrim {
                    start: clip.trim_start.to_seconds_f64(),
                    end: clip.trim_end.to_seconds_f64(),
                })
                .then(Filter::ASetPts);
            for factor in tempo_factors(speed) {
                chain = chain.then(Filter::ATempo(factor));
            }
            let chain = chain
                .then_if(envelope.fade_in > 0.0, || Filter::AFade {
                    direction: FadeDirection::In,
                    start: 0.0,
                    duration: envelope.fade_in,
                })
                .then_if(envelope.fade_out > 0.0, || Filter::AFade {
                    direction: FadeDirection::Out,
                    start: length - envelope.fade_out,
                    duration: envelope.fade_out,
                })
                .then(Filter::Volume(gain))
                .then_if(delay_ms > 0, || Filter::ADelay { millis: delay_ms });

            let out = if single {
                aout.clone()
            } else {
                Pad::link(format!("a{k}"))
            };
            self.graph.push(chain.to(out.clone()));
            mixed.push(out);
        }

        if !single {
            let inputs = mixed.len();
            self.graph.push(
                FilterChain::new(mixed)
                    .then(Filter::AMix { inputs })
                    .to(aout.clone()),
            );
        }
        Some(aout)
    }
}

fn video_fades(chain: FilterChain, clip: &Clip) -> FilterChain {
    let d = clip.duration.to_seconds_f64();
    let envelope = clip.envelope().clamped_to(d);
    chain
        .then_if(envelope.fade_in > 0.0, || Filter::Fade {
            direction: FadeDirection::In,
            start: 0.0,
            duration: envelope.fade_in,
        })
        .then_if(envelope.fade_out > 0.0, || Filter::Fade {
            direction: FadeDirection::Out,
            start: d - envelope.fade_out,
            duration: envelope.fade_out,
        })
}

/// Split a speed factor into `atempo` steps that each stay within [0.5, 2].
fn tempo_factors(speed: f64) -> Vec<f64> {
    let mut factors = Vec::new();
    if speed == 1.0 {
        return factors;
    }
    let mut remaining = speed;
    while remaining > 2.0 {
        factors.push(2.0);
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        factors.push(0.5);
        remaining /= 0.5;
    }
    factors.push(remaining);
    factors
}
