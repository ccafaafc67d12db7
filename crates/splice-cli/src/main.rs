//! Splice - timeline editing and export from the command line.
//!
//! Usage:
//!   splice new <PROJECT>                  Create an empty project file
//!   splice import <PROJECT> <FILE>        Import a media file as an asset
//!   splice text <PROJECT> <TEXT>          Add a text asset
//!   splice place <PROJECT> <ASSET>        Place an asset on a track
//!   splice edit <PROJECT> <CLIP> <OP>     Move, trim, split, remove, ...
//!   splice track <PROJECT> <TRACK>        Track volume and mute
//!   splice info <PROJECT>                 Show assets, tracks and clips
//!   splice preview <PROJECT> --at <T>     Resolve what plays at time T
//!   splice graph <PROJECT>                Print the export filter graph
//!   splice export <PROJECT> -o <FILE>     Encode the project
//!   splice config                         Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use splice_core::Color;
use splice_timeline::{Quality, Resolution, TrackKind};

mod commands;
mod config;
mod logging;

use config::{default_config_path, AppConfig, LoggingConfig};

#[derive(Parser)]
#[command(name = "splice", about = "Multi-track timeline editor and exporter", version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty project file
    New {
        project: PathBuf,

        /// Project name (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Import a video, audio or image file
    Import {
        project: PathBuf,
        file: PathBuf,

        /// Asset name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Add a text asset, optionally placing it on the text track
    Text {
        project: PathBuf,
        text: String,

        #[arg(long, default_value = "48")]
        size: u32,

        /// Text color (#rgb, #rrggbb or #rrggbbaa)
        #[arg(long)]
        color: Option<Color>,

        /// Background box color
        #[arg(long)]
        background: Option<Color>,

        #[arg(long, value_enum, default_value = "center")]
        position: PositionPreset,

        #[arg(long)]
        fade_in: Option<f64>,

        #[arg(long)]
        fade_out: Option<f64>,

        /// Place the new asset at this time (seconds)
        #[arg(long)]
        at: Option<f64>,
    },

    /// Place an asset on a track
    Place {
        project: PathBuf,

        /// Asset id or unique id prefix
        asset: String,

        /// Target track: video, audio or text
        #[arg(short, long)]
        track: TrackKind,

        /// Start time in seconds
        #[arg(long, default_value = "0")]
        at: f64,
    },

    /// Edit a placed clip
    Edit {
        project: PathBuf,

        /// Clip id or unique id prefix
        clip: String,

        #[command(subcommand)]
        op: EditOp,
    },

    /// Set track volume, mute and noise reduction
    Track {
        project: PathBuf,
        track: TrackKind,

        /// Volume in percent
        #[arg(long)]
        volume: Option<f64>,

        #[arg(long, conflicts_with = "unmute")]
        mute: bool,

        #[arg(long)]
        unmute: bool,

        /// Noise reduction flag (audio track only)
        #[arg(long)]
        noise_reduction: Option<bool>,
    },

    /// Show project information
    Info { project: PathBuf },

    /// Print what is visible and audible at a time, as JSON
    Preview {
        project: PathBuf,

        /// Time in seconds
        #[arg(long)]
        at: f64,
    },

    /// Print the export filter graph
    Graph {
        project: PathBuf,

        #[command(flatten)]
        output: OutputArgs,

        /// Print the full encoder argument list instead
        #[arg(long)]
        args: bool,
    },

    /// Export the project to a video file
    Export {
        project: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        settings: OutputArgs,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand)]
enum EditOp {
    /// Move the clip to a new start time
    Move { to: f64 },
    /// Move the left edge, keeping the right edge fixed
    TrimLeft { to: f64 },
    /// Set the clip duration from its start
    TrimRight { duration: f64 },
    /// Split the clip at a timeline time
    Split { at: f64 },
    /// Remove the clip
    Remove,
    /// Set playback speed
    Speed { speed: f64 },
    /// Set fade lengths in seconds; omitted values are kept
    Fades {
        #[arg(long)]
        fade_in: Option<f64>,
        #[arg(long)]
        fade_out: Option<f64>,
        /// Remove both fades
        #[arg(long, conflicts_with_all = ["fade_in", "fade_out"])]
        clear: bool,
    },
    /// Set clip volume in percent
    Volume {
        volume: f64,
        #[arg(long)]
        mute: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PositionPreset {
    Top,
    Center,
    Bottom,
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Output resolution: 720p, 1080p or 4k (defaults to the project's)
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Output quality: low, medium or high (defaults to the project's)
    #[arg(long)]
    quality: Option<Quality>,

    /// Font file for text overlays (overrides the configured font)
    #[arg(long)]
    font: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let (mut config, config_error) = match AppConfig::load_from(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    if cli.verbose {
        config.logging = LoggingConfig {
            level: "debug".to_string(),
            ..config.logging
        };
    }
    logging::init_logging(&config.logging);
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "using default configuration");
    }

    let ctx = commands::Context {
        config,
        config_path,
    };

    match cli.command {
        Commands::New {
            project,
            name,
            force,
        } => commands::new_project(&ctx, &project, name, force),
        Commands::Import {
            project,
            file,
            name,
        } => commands::import(&ctx, &project, &file, name),
        Commands::Text {
            project,
            text,
            size,
            color,
            background,
            position,
            fade_in,
            fade_out,
            at,
        } => {
            let position = match position {
                PositionPreset::Top => splice_timeline::TextPosition::TOP,
                PositionPreset::Center => splice_timeline::TextPosition::CENTER,
                PositionPreset::Bottom => splice_timeline::TextPosition::BOTTOM,
            };
            commands::add_text(
                &ctx,
                &project,
                commands::TextArgs {
                    text,
                    size,
                    color,
                    background,
                    position,
                    fade_in,
                    fade_out,
                    at,
                },
            )
        }
        Commands::Place {
            project,
            asset,
            track,
            at,
        } => commands::place(&ctx, &project, &asset, track, at),
        Commands::Edit { project, clip, op } => {
            let op = match op {
                EditOp::Move { to } => commands::ClipEdit::Move(to),
                EditOp::TrimLeft { to } => commands::ClipEdit::TrimLeft(to),
                EditOp::TrimRight { duration } => commands::ClipEdit::TrimRight(duration),
                EditOp::Split { at } => commands::ClipEdit::Split(at),
                EditOp::Remove => commands::ClipEdit::Remove,
                EditOp::Speed { speed } => commands::ClipEdit::Speed(speed),
                EditOp::Fades {
                    fade_in,
                    fade_out,
                    clear,
                } => commands::ClipEdit::Fades {
                    fade_in,
                    fade_out,
                    clear,
                },
                EditOp::Volume { volume, mute } => commands::ClipEdit::Volume { volume, mute },
            };
            commands::edit_clip(&ctx, &project, &clip, op)
        }
        Commands::Track {
            project,
            track,
            volume,
            mute,
            unmute,
            noise_reduction,
        } => {
            let muted = match (mute, unmute) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::update_track(&ctx, &project, track, volume, muted, noise_reduction)
        }
        Commands::Info { project } => commands::info(&project),
        Commands::Preview { project, at } => commands::preview(&project, at),
        Commands::Graph {
            project,
            output,
            args,
        } => commands::graph(&ctx, &project, output.into(), args),
        Commands::Export {
            project,
            output,
            settings,
        } => commands::export(&ctx, &project, &output, settings.into()).await,
        Commands::Config { write } => commands::show_config(&ctx, write),
    }
}

impl From<OutputArgs> for commands::OutputOverrides {
    fn from(args: OutputArgs) -> Self {
        Self {
            resolution: args.resolution,
            quality: args.quality,
            font: args.font,
        }
    }
}
