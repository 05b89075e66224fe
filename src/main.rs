use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use ad_compositor::{
    composition::{MergeOrchestrator, MergeOutcome, SegmentManifest},
    config::Config,
    overlay::{OverlayCompositor, OverlayRequest},
    transitions::{apply_transition, TransitionSpec},
    video::{extract_frames, FfmpegFrameSource, FrameSource},
};

#[derive(Parser)]
#[command(
    name = "ad-compositor",
    version,
    about = "Assemble generated video segments into a single advertisement",
    long_about = "Ad-Compositor joins video segments with pixel-accurate transitions (crossfade, wipe, zoom, slide, blur and more), draws text and logo overlays, and extracts still frames."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Merge the selected segments of a manifest into one video
    Merge {
        /// Segment manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Output directory, overriding the configuration
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Also write the result of every merge step
        #[arg(long)]
        keep_intermediates: bool,
    },

    /// Draw text and logo overlays onto a video
    Overlay {
        /// Overlay request (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Output video; defaults to the request's `output_path`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Save consecutive frames of a video as PNG images
    Frames {
        /// Input video
        #[arg(short, long)]
        video: PathBuf,

        /// Time of the first frame, in seconds
        #[arg(short, long, default_value_t = 0.0)]
        start: f64,

        /// Number of frames to save
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Directory the frames are written to
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Join two videos with a single transition
    Transition {
        /// Outgoing video
        first: PathBuf,

        /// Incoming video
        second: PathBuf,

        /// Transition tag (X_FADE, WIPE, ZOOM, ZOOM_WARP, DIP_TO_BLACK, CONCATENATE, BLUR, FLICKER, SLIDE, SLIDE_WARP)
        #[arg(short = 't', long = "type", default_value = "X_FADE")]
        kind: String,

        /// Parameter overrides as a JSON object, e.g. '{"duration": 0.5}'
        #[arg(short, long)]
        params: Option<String>,

        /// Output video
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Ad-Compositor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    config.validate()?;

    FfmpegFrameSource::check_available(&config.video).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    let source = FfmpegFrameSource::new(&config.video);

    match cli.command {
        Command::Merge {
            manifest,
            output_dir,
            keep_intermediates,
        } => {
            if let Some(dir) = output_dir {
                config.merge.output_dir = dir;
            }
            config.merge.keep_intermediates |= keep_intermediates;

            let manifest = SegmentManifest::from_file(&manifest)?;
            for (index, segment) in manifest.segments.iter().enumerate() {
                if segment.regenerate {
                    warn!("Segment {} is flagged for regeneration, but no generator is configured; using {:?}", index, segment.source_path);
                }
            }

            let orchestrator = MergeOrchestrator::new(&config);
            let outcome = tokio::task::spawn_blocking(move || orchestrator.merge_manifest(&source, &manifest))
                .await
                .context("merge worker stopped")??;

            match outcome {
                MergeOutcome::NothingToMerge => info!("No selected segments, nothing written"),
                MergeOutcome::Merged(report) => info!(
                    "Merged video saved to {:?} ({:.2}s, {} bytes)",
                    report.output.path, report.output.duration, report.output.file_size
                ),
            }
        }

        Command::Overlay { request, output } => {
            let request = OverlayRequest::from_file(&request)?;
            let output = output
                .or_else(|| request.output_path.clone())
                .context("no output path: pass --output or set output_path in the request")?;

            let mut compositor = OverlayCompositor::new(&config.overlay);
            let written = tokio::task::spawn_blocking(move || compositor.run_request(&source, &request, &output))
                .await
                .context("overlay worker stopped")??;
            info!("Overlay video saved to {:?}", written.path);
        }

        Command::Frames {
            video,
            start,
            count,
            output_dir,
        } => {
            let sample_fps = config.extraction.sample_fps;
            let paths = tokio::task::spawn_blocking(move || {
                extract_frames(&source, &video, start, count, &output_dir, sample_fps)
            })
            .await
            .context("frame extraction worker stopped")??;
            info!("Saved {} frame(s)", paths.len());
        }

        Command::Transition {
            first,
            second,
            kind,
            params,
            output,
        } => {
            let overrides = match params {
                Some(json) => match serde_json::from_str::<serde_json::Value>(&json).context("--params must be valid JSON")? {
                    serde_json::Value::Object(map) => map,
                    _ => anyhow::bail!("--params must be a JSON object"),
                },
                None => serde_json::Map::new(),
            };
            let spec = TransitionSpec::resolve(&kind, &overrides, &config.transitions)?;

            let written = tokio::task::spawn_blocking(move || {
                let clip1 = source.open_clip(&first)?;
                let clip2 = source.open_clip(&second)?;
                let joined = apply_transition(&clip1, &clip2, &spec)?;
                source.write_clip(&joined, &output)
            })
            .await
            .context("transition worker stopped")??;
            info!("Transition saved to {:?} ({:.2}s)", written.path, written.duration);
        }
    }

    Ok(())
}
