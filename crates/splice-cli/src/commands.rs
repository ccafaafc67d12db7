//! Subcommand implementations.
//!
//! Each mutating command loads the project file, dispatches edits through an
//! `Editor` and writes the file back.

use anyhow::{anyhow, bail, Context as _, Result};
use splice_compositor::{resolve_at_time, total_duration};
use splice_core::{Color, RationalTime};
use splice_media::{locate_ffmpeg, mime_for_path, ExportCancel, ExportSession, MediaProbe, ProgressFn};
use splice_render::{compile, CompileOptions, FontResource};
use splice_timeline::{
    Asset, AssetId, ClipId, EditCommand, Editor, ExportSettings, MediaData, Project, ProjectFile,
    Quality, Resolution, TextDescriptor, TextPosition, TrackKind,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;

pub struct Context {
    pub config: AppConfig,
    pub config_path: PathBuf,
}

impl Context {
    fn open(&self, path: &Path) -> Result<Editor> {
        let file = ProjectFile::load_from_file(path)
            .with_context(|| format!("failed to load project {}", path.display()))?;
        Ok(Editor::new(file.project, self.config.editing.limits()))
    }
}

fn load(path: &Path) -> Result<Project> {
    Ok(ProjectFile::load_from_file(path)
        .with_context(|| format!("failed to load project {}", path.display()))?
        .project)
}

fn save(editor: Editor, path: &Path) -> Result<()> {
    ProjectFile::new(editor.into_state())
        .save_to_file(path)
        .with_context(|| format!("failed to save project {}", path.display()))
}

fn dispatch(editor: &mut Editor, command: EditCommand) -> Result<()> {
    let name = command.name();
    editor
        .dispatch(command)
        .map_err(|rejection| anyhow!("{name} rejected: {rejection}"))
}

fn secs(value: f64) -> RationalTime {
    RationalTime::from_seconds_f64(value)
}

fn short(id: impl ToString) -> String {
    id.to_string().chars().take(8).collect()
}

/// Resolve a full id or a unique id prefix.
fn unique<T: Copy + ToString>(candidates: impl Iterator<Item = T>, reference: &str, what: &str) -> Result<T> {
    let matches: Vec<T> = candidates
        .filter(|id| id.to_string().starts_with(reference))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("no {what} matches '{reference}'"),
        _ => bail!("'{reference}' matches {} {what}s", matches.len()),
    }
}

fn resolve_asset(project: &Project, reference: &str) -> Result<AssetId> {
    unique(project.assets.iter().map(|a| a.id), reference, "asset")
}

fn resolve_clip(project: &Project, reference: &str) -> Result<ClipId> {
    unique(project.clips().map(|c| c.id), reference, "clip")
}

/// Id of a clip on `track` that exists in `after` but not in `before`.
fn new_clip(before: &Project, after: &Project, track: TrackKind) -> Option<ClipId> {
    after
        .track(track)
        .clips
        .iter()
        .map(|c| c.id)
        .find(|id| before.find_clip(*id).is_none())
}

pub fn new_project(ctx: &Context, path: &Path, name: Option<String>, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let name = name
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "Untitled Project".to_string());
    let mut project = Project::new(name);
    project.export_settings = ctx.config.export;

    ProjectFile::new(project).save_to_file(path)?;
    println!("Created {}", path.display());
    Ok(())
}

pub fn import(ctx: &Context, path: &Path, file: &Path, name: Option<String>) -> Result<()> {
    let mut editor = ctx.open(path)?;
    let ffmpeg = locate_ffmpeg(ctx.config.backend.ffmpeg.as_deref())?;
    let probe = MediaProbe::probe(file, &ffmpeg)
        .with_context(|| format!("failed to probe {}", file.display()))?;

    let bytes = std::fs::read(file)?;
    let media = MediaData::new(mime_for_path(file).map(String::from), bytes);
    let name = name
        .or_else(|| file.file_name().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "asset".to_string());
    let asset = probe.into_asset(name, media)?;
    let (id, kind) = (asset.id, asset.asset_type());

    dispatch(&mut editor, EditCommand::AddAsset(asset))?;
    save(editor, path)?;
    info!(asset = %id, %kind, file = %file.display(), "imported");
    println!("{id}");
    Ok(())
}

pub struct TextArgs {
    pub text: String,
    pub size: u32,
    pub color: Option<Color>,
    pub background: Option<Color>,
    pub position: TextPosition,
    pub fade_in: Option<f64>,
    pub fade_out: Option<f64>,
    pub at: Option<f64>,
}

pub fn add_text(ctx: &Context, path: &Path, args: TextArgs) -> Result<()> {
    let mut editor = ctx.open(path)?;
    let mut desc = TextDescriptor::new(args.text)
        .with_font_size(args.size)
        .with_position(args.position)
        .with_background(args.background);
    if let Some(color) = args.color {
        desc = desc.with_color(color);
    }
    let defaults = desc.envelope();
    desc = desc.with_fades(
        args.fade_in.unwrap_or(defaults.fade_in),
        args.fade_out.unwrap_or(defaults.fade_out),
    );

    let asset = Asset::text(desc);
    let id = asset.id;
    dispatch(&mut editor, EditCommand::AddAsset(asset))?;
    if let Some(at) = args.at {
        dispatch(
            &mut editor,
            EditCommand::Place {
                track: TrackKind::Text,
                asset: id,
                start: secs(at),
            },
        )?;
    }
    save(editor, path)?;
    println!("{id}");
    Ok(())
}

pub fn place(ctx: &Context, path: &Path, asset: &str, track: TrackKind, at: f64) -> Result<()> {
    let mut editor = ctx.open(path)?;
    let asset = resolve_asset(editor.state(), asset)?;
    let before = editor.state().clone();

    dispatch(
        &mut editor,
        EditCommand::Place {
            track,
            asset,
            start: secs(at),
        },
    )?;
    let clip = new_clip(&before, editor.state(), track);
    save(editor, path)?;
    if let Some(clip) = clip {
        println!("{clip}");
    }
    Ok(())
}

pub enum ClipEdit {
    Move(f64),
    TrimLeft(f64),
    TrimRight(f64),
    Split(f64),
    Remove,
    Speed(f64),
    Fades {
        fade_in: Option<f64>,
        fade_out: Option<f64>,
        clear: bool,
    },
    Volume {
        volume: f64,
        mute: bool,
    },
}

pub fn edit_clip(ctx: &Context, path: &Path, clip: &str, op: ClipEdit) -> Result<()> {
    let mut editor = ctx.open(path)?;
    let id = resolve_clip(editor.state(), clip)?;
    let current = editor
        .state()
        .find_clip(id)
        .cloned()
        .ok_or_else(|| anyhow!("clip {id} disappeared"))?;

    let command = match op {
        ClipEdit::Move(to) => EditCommand::Move {
            clip: id,
            start: secs(to),
        },
        ClipEdit::TrimLeft(to) => EditCommand::TrimLeft {
            clip: id,
            start: secs(to),
        },
        ClipEdit::TrimRight(duration) => EditCommand::TrimRight {
            clip: id,
            duration: secs(duration),
        },
        ClipEdit::Split(at) => EditCommand::Split {
            clip: id,
            at: secs(at),
        },
        ClipEdit::Remove => EditCommand::Remove(id),
        ClipEdit::Speed(speed) => EditCommand::SetSpeed { clip: id, speed },
        ClipEdit::Fades { clear: true, .. } => EditCommand::SetFades {
            clip: id,
            fade_in: None,
            fade_out: None,
        },
        ClipEdit::Fades {
            fade_in, fade_out, ..
        } => EditCommand::SetFades {
            clip: id,
            fade_in: fade_in.or(current.fade_in),
            fade_out: fade_out.or(current.fade_out),
        },
        ClipEdit::Volume { volume, mute } => EditCommand::SetClipVolume {
            clip: id,
            volume,
            muted: mute,
        },
    };

    let position = editor.state().track(current.track).position(id);
    dispatch(&mut editor, command)?;
    if let Some(clip) = editor.state().find_clip(id) {
        println!("{} {} +{}", short(clip.id), clip.start, clip.duration);
    } else if let Some((head, tail)) = position.and_then(|at| split_halves(editor.state(), current.track, at)) {
        println!("{head} {tail}");
    }
    save(editor, path)
}

pub fn update_track(
    ctx: &Context,
    path: &Path,
    kind: TrackKind,
    volume: Option<f64>,
    muted: Option<bool>,
    noise_reduction: Option<bool>,
) -> Result<()> {
    let mut editor = ctx.open(path)?;
    let track = editor.state().track(kind);
    let command = EditCommand::UpdateTrack {
        track: kind,
        volume: volume.unwrap_or(track.volume),
        muted: muted.unwrap_or(track.muted),
        noise_reduction: noise_reduction.unwrap_or(track.noise_reduction),
    };
    dispatch(&mut editor, command)?;
    save(editor, path)
}

pub fn info(path: &Path) -> Result<()> {
    let project = load(path)?;

    println!("Project: {} ({})", project.name, project.id);
    println!(
        "  Export: {} / {}",
        project.export_settings.resolution, project.export_settings.quality
    );
    println!("  Duration: {}", total_duration(&project));
    println!();

    println!("Assets ({}):", project.assets.len());
    for asset in &project.assets {
        let mut line = format!("  {}  {:<5}  {}", short(asset.id), asset.asset_type().to_string(), asset.name);
        if let Some(d) = asset.duration() {
            line.push_str(&format!("  {d}"));
        }
        if let Some((w, h)) = asset.dimensions() {
            line.push_str(&format!("  {w}x{h}"));
        }
        if asset.media().is_some_and(|m| !m.has_bytes()) {
            line.push_str("  (no bytes)");
        }
        println!("{line}");
    }
    println!();

    println!("Tracks:");
    for track in project.tracks() {
        let mut flags = Vec::new();
        if track.muted {
            flags.push("muted".to_string());
        }
        if track.noise_reduction {
            flags.push("noise-reduction".to_string());
        }
        println!(
            "  {} \"{}\"  volume {}%  {}",
            track.kind,
            track.name,
            track.volume,
            flags.join(" ")
        );
        for clip in track.clips_by_start() {
            let asset = project
                .asset(clip.asset_id)
                .map(|a| match a.text_descriptor() {
                    Some(desc) => desc.display_name(),
                    None => a.name.clone(),
                })
                .unwrap_or_else(|| "<missing>".to_string());
            let mut line = format!(
                "    {}  {}..{}  {}  trim {}..{}",
                short(clip.id),
                clip.start,
                clip.end(),
                asset,
                clip.trim_start,
                clip.trim_end
            );
            if clip.speed() != 1.0 {
                line.push_str(&format!("  speed {}x", clip.speed()));
            }
            if clip.has_fades() {
                let env = clip.envelope();
                line.push_str(&format!("  fades {}/{}", env.fade_in, env.fade_out));
            }
            if clip.muted {
                line.push_str("  muted");
            } else if clip.volume != 100.0 {
                line.push_str(&format!("  volume {}%", clip.volume));
            }
            if project.selection == Some(clip.id) {
                line.push_str("  *");
            }
            println!("{line}");
        }
    }
    Ok(())
}

pub fn preview(path: &Path, at: f64) -> Result<()> {
    let project = load(path)?;
    let frame = resolve_at_time(secs(at), &project);
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}

pub struct OutputOverrides {
    pub resolution: Option<Resolution>,
    pub quality: Option<Quality>,
    pub font: Option<PathBuf>,
}

impl OutputOverrides {
    fn settings(&self, project: &Project) -> ExportSettings {
        ExportSettings {
            resolution: self.resolution.unwrap_or(project.export_settings.resolution),
            quality: self.quality.unwrap_or(project.export_settings.quality),
        }
    }

    /// Font from the command line, else from the config. An unreadable font
    /// is logged and skipped so the export can still run.
    fn options(&self, config: &AppConfig) -> CompileOptions {
        let font = self
            .font
            .as_deref()
            .or(config.backend.font.as_deref())
            .and_then(|path| match FontResource::load(path) {
                Ok(font) => Some(font),
                Err(e) => {
                    warn!(font = %path.display(), error = %e, "font unavailable");
                    None
                }
            });
        CompileOptions { font }
    }
}

pub fn graph(ctx: &Context, path: &Path, overrides: OutputOverrides, full_args: bool) -> Result<()> {
    let project = load(path)?;
    let plan = compile(&project, &overrides.settings(&project), &overrides.options(&ctx.config))?;
    if full_args {
        for arg in plan.encode_args(splice_media::OUTPUT_NAME) {
            println!("{arg}");
        }
    } else {
        println!("{}", plan.filter_complex());
    }
    for degradation in &plan.degradations {
        eprintln!("note: {degradation}");
    }
    Ok(())
}

pub async fn export(ctx: &Context, path: &Path, output: &Path, overrides: OutputOverrides) -> Result<()> {
    let project = load(path)?;
    let settings = overrides.settings(&project);
    let options = overrides.options(&ctx.config);
    let session = ExportSession::ffmpeg(ctx.config.backend.ffmpeg.clone());

    let cancel = ExportCancel::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let progress: ProgressFn = Arc::new(|p| {
        eprint!("\r{:<10} {:>5.1}%", format!("{:?}", p.phase), p.fraction * 100.0);
    });
    let result = session.export(&project, &settings, &options, progress, cancel).await;
    watcher.abort();
    eprintln!();

    let exported = result?;
    std::fs::write(output, &exported.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    for degradation in &exported.plan.degradations {
        eprintln!("note: {degradation}");
    }
    println!(
        "Exported {} ({} bytes, {})",
        output.display(),
        exported.bytes.len(),
        exported.plan.duration
    );
    Ok(())
}

pub fn show_config(ctx: &Context, write: bool) -> Result<()> {
    if write {
        ctx.config.save_to(&ctx.config_path)?;
        eprintln!("Wrote {}", ctx.config_path.display());
    }
    println!("# {}", ctx.config_path.display());
    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    Ok(())
}

/// Ids of the two clips a split left at `position` on `track`.
fn split_halves(project: &Project, track: TrackKind, position: usize) -> Option<(ClipId, ClipId)> {
    match project.track(track).clips.get(position..position + 2)? {
        [head, tail] => Some((head.id, tail.id)),
        _ => None,
    }
}
