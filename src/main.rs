//! Subreel CLI
//!
//! Renders an audio file plus a transcript into a subtitled MP4.
//!
//! ```text
//! subreel --audio talk.wav --transcript talk.srt --output talk.mp4 \
//!         --title "My Talk" --byline "speaker name"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};

use subreel::core::captions::{export_srt, parse_transcript};
use subreel::core::Rgb;
use subreel::{EncoderConfig, Pipeline, PipelineConfig, RenderPhase, RenderProgress, RenderSpec};

#[derive(Parser, Debug)]
#[command(name = "subreel", version, about = "Render audio + transcript into a subtitled video")]
struct Cli {
    /// Audio input file (wav, mp3, m4a, ogg, flac, ...)
    #[arg(long)]
    audio: PathBuf,

    /// Transcript file: explicit-timing captions or untimed text.
    /// Omit to render without subtitles.
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Output video path
    #[arg(long)]
    output: PathBuf,

    /// Title drawn centered near the top for the whole video
    #[arg(long)]
    title: Option<String>,

    /// Byline drawn bottom-right for the whole video
    #[arg(long)]
    byline: Option<String>,

    /// Background color as hex
    #[arg(long, default_value = "#000000")]
    background: String,

    /// Text color as hex
    #[arg(long, default_value = "#FFFFFF")]
    foreground: String,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    #[arg(long, default_value_t = 24)]
    fps: u32,

    /// Font file override (otherwise SUBREEL_FONT or a system font is used)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Chunked-composition window length in seconds
    #[arg(long, default_value_t = 60.0)]
    chunk_seconds: f64,

    /// Wall-clock budget for the whole run in seconds
    #[arg(long, default_value_t = 300)]
    timeout_seconds: u64,

    /// Also write the normalized cue list to this path (SRT)
    #[arg(long)]
    cues_out: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "subreel=debug" } else { "subreel=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let encoder = EncoderConfig::detect().context("FFmpeg detection failed")?;
    info!("Using FFmpeg {} at {}", encoder.version, encoder.ffmpeg_path.display());

    let transcript_text = match &cli.transcript {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read transcript {}", path.display()))?,
        ),
        None => None,
    };

    let mut spec = RenderSpec::new(absolutize(&cli.audio)?, absolutize(&cli.output)?)
        .with_resolution(cli.width, cli.height)
        .with_fps(cli.fps)
        .with_colors(Rgb::from_hex(&cli.background), Rgb::from_hex(&cli.foreground));
    if let Some(title) = cli.title {
        spec = spec.with_title(title);
    }
    if let Some(byline) = cli.byline {
        spec = spec.with_byline(byline);
    }
    if let Some(font) = cli.font {
        spec = spec.with_font(font);
    }

    let pipeline = Pipeline::new(
        encoder,
        PipelineConfig {
            chunk_seconds: cli.chunk_seconds,
            budget: Duration::from_secs(cli.timeout_seconds),
        },
    );

    let (tx, mut rx) = mpsc::channel::<RenderProgress>(16);
    let reporter = tokio::spawn(async move {
        let mut last_phase: Option<RenderPhase> = None;
        while let Some(update) = rx.recv().await {
            if last_phase != Some(update.phase) {
                info!("{}", update.phase.as_str());
                last_phase = Some(update.phase);
            } else {
                debug!("{} ({:.0}%)", update.phase.as_str(), update.percent);
            }
        }
    });

    let report = pipeline
        .render(&spec, transcript_text.as_deref(), Some(tx))
        .await?;
    let _ = reporter.await;

    if let Some(cues_out) = &cli.cues_out {
        if let Some(text) = &transcript_text {
            let parsed = parse_transcript(text, report.duration_sec);
            std::fs::write(cues_out, export_srt(&parsed.transcript))
                .with_context(|| format!("Failed to write cues to {}", cues_out.display()))?;
            info!("Wrote {} cue(s) to {}", parsed.transcript.len(), cues_out.display());
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
