//! Pipeline Orchestrator
//!
//! Sequences probe → parse/schedule → composite+encode → concat → mux, owns
//! every temporary artifact, and enforces the wall-clock budget.
//!
//! Each run gets its own uniquely named temp directory; everything
//! intermediate (video-only segments, the concat list, the pre-mux video)
//! lives inside it and is removed on success and failure alike. The
//! caller-visible output path is only ever touched by the final rename.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use ulid::Ulid;

use super::compositor::{FrameBuffer, FrameCompositor};
use super::text::TextPainter;
use super::{RenderPhase, RenderProgress, RenderSpec};
use crate::core::captions::{parse_transcript, ParsedTranscript};
use crate::core::ffmpeg::{audio_extension_supported, EncoderConfig, FFmpegError, FfmpegRunner};
use crate::core::{fs, PipelineError, PipelineResult};

// =============================================================================
// Configuration
// =============================================================================

/// Orchestrator tuning knobs, fixed per pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Render window length for chunked composition, in seconds
    pub chunk_seconds: f64,
    /// Wall-clock budget for the whole run
    pub budget: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_seconds: 60.0,
            budget: Duration::from_secs(300),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    pub output_path: PathBuf,
    pub duration_sec: f64,
    pub total_frames: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub cue_count: usize,
    pub skipped_blocks: usize,
}

// =============================================================================
// Pipeline
// =============================================================================

/// One configured render pipeline; cheap to clone, safe for concurrent runs.
#[derive(Clone)]
pub struct Pipeline {
    runner: FfmpegRunner,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(encoder: EncoderConfig, config: PipelineConfig) -> Self {
        Self {
            runner: FfmpegRunner::new(encoder),
            config,
        }
    }

    /// Render one video.
    ///
    /// `transcript_text` may be explicit-timing caption content, untimed
    /// freeform text, or `None` for a subtitle-free video. Progress updates
    /// are emitted over `progress` when provided.
    pub async fn render(
        &self,
        spec: &RenderSpec,
        transcript_text: Option<&str>,
        progress: Option<mpsc::Sender<RenderProgress>>,
    ) -> PipelineResult<RenderReport> {
        let output_path = fs::validate_output_path(&spec.output_path)?;

        let result = self.run(spec, &output_path, transcript_text, &progress).await;
        if let Err(e) = &result {
            // Never leave a partial file looking like a deliverable.
            fs::remove_partial_output(&output_path);
            warn!("Render failed: {}", e);
        }
        result
    }

    async fn run(
        &self,
        spec: &RenderSpec,
        output_path: &Path,
        transcript_text: Option<&str>,
        progress: &Option<mpsc::Sender<RenderProgress>>,
    ) -> PipelineResult<RenderReport> {
        let deadline = Instant::now() + self.config.budget;

        if !audio_extension_supported(&spec.audio_path) {
            return Err(PipelineError::UnsupportedAudioFormat(
                spec.audio_path.to_string_lossy().to_string(),
            ));
        }

        send_progress(progress, RenderPhase::ProcessingAudio, 0.0).await;
        let audio = with_deadline(deadline, "audio probe", async {
            self.runner
                .probe_audio(&spec.audio_path)
                .await
                .map_err(|e| match e {
                    FFmpegError::ProbeError(m) | FFmpegError::InvalidInput(m) => {
                        PipelineError::ProbeFailed(m)
                    }
                    other => PipelineError::FFmpeg(other),
                })
        })
        .await?;
        let duration_sec = audio.duration_sec;
        info!(
            "Audio probed: {:.2}s {} {}Hz {}ch",
            duration_sec, audio.codec, audio.sample_rate, audio.channels
        );

        send_progress(progress, RenderPhase::Transcribing, 3.0).await;
        let parsed = match transcript_text {
            Some(text) => parse_transcript(text, duration_sec),
            None => ParsedTranscript::default(),
        };
        if !parsed.skipped.is_empty() {
            warn!(
                "Skipped {} malformed cue block(s) out of {}",
                parsed.skipped.len(),
                parsed.skipped.len() + parsed.transcript.len()
            );
        }
        if parsed.transcript.is_empty() {
            warn!("No cues available; rendering without a subtitle layer");
        }
        let cue_count = parsed.transcript.len();
        let skipped_blocks = parsed.skipped.len();

        let painter = TextPainter::resolve(spec.font_path.as_deref())?;
        let compositor = FrameCompositor::new(spec, parsed.transcript, painter);
        let resolution = compositor.resolution();
        let fps = spec.fps;
        let total_frames = (duration_sec * fps as f64).ceil() as u64;

        // Per-run unique workspace; removed on every exit path.
        let workdir = tempfile::Builder::new()
            .prefix(&format!("subreel-{}-", Ulid::new()))
            .tempdir()?;

        let encode_result = self
            .encode_video(
                deadline,
                workdir.path(),
                compositor,
                total_frames,
                fps,
                progress,
            )
            .await;
        let video_only = match encode_result {
            Ok(path) => path,
            Err(e) => {
                close_workdir(workdir);
                return Err(e);
            }
        };

        send_progress(progress, RenderPhase::Finalizing, 95.0).await;
        let tmp_output = fs::tmp_path_for(output_path);
        let mux_result = with_deadline(deadline, "final mux", async {
            self.runner
                .mux_audio(&video_only, &spec.audio_path, &tmp_output)
                .await
                .map_err(|e| PipelineError::EncodeFailed(e.to_string()))
        })
        .await;
        close_workdir(workdir);
        mux_result?;

        fs::finalize_into(output_path, &tmp_output)?;
        let metadata = std::fs::metadata(output_path)?;
        if metadata.len() == 0 {
            return Err(PipelineError::EncodeFailed(
                "output file is empty".to_string(),
            ));
        }

        send_progress(progress, RenderPhase::Complete, 100.0).await;
        info!(
            "Rendered {} ({} frames, {} bytes)",
            output_path.display(),
            total_frames,
            metadata.len()
        );

        Ok(RenderReport {
            output_path: output_path.to_path_buf(),
            duration_sec,
            total_frames,
            fps,
            width: resolution.width,
            height: resolution.height,
            cue_count,
            skipped_blocks,
        })
    }

    /// Chunked composition: render and encode fixed-size windows of global
    /// frame indices, then concatenate the segments in chronological order.
    async fn encode_video(
        &self,
        deadline: Instant,
        workdir: &Path,
        mut compositor: FrameCompositor,
        total_frames: u64,
        fps: u32,
        progress: &Option<mpsc::Sender<RenderProgress>>,
    ) -> PipelineResult<PathBuf> {
        let resolution = compositor.resolution();
        let frames_per_chunk = ((self.config.chunk_seconds * fps as f64).round() as u64).max(1);
        let chunks = plan_chunks(total_frames, frames_per_chunk);

        let mut frame = FrameBuffer::new(resolution);
        let mut segments = Vec::with_capacity(chunks.len());

        for (chunk_index, (first_frame, end_frame)) in chunks.into_iter().enumerate() {
            // Cooperative cancellation between chunks.
            if Instant::now() >= deadline {
                return Err(PipelineError::Timeout(
                    "frame generation exceeded the configured budget".to_string(),
                ));
            }

            let segment_path = workdir.join(format!("segment_{chunk_index:05}.mp4"));
            let mut encoder = self
                .runner
                .segment_encoder(resolution, fps, &segment_path)
                .map_err(|e| PipelineError::EncodeFailed(e.to_string()))?;

            let fps_f = fps as f64;
            let render = tokio::task::spawn_blocking(move || {
                for f in first_frame..end_frame {
                    // Timestamps stay global so chunk boundaries cannot
                    // duplicate, drop, or shift frames.
                    let t = f as f64 / fps_f;
                    compositor.compose_into(t, &mut frame);
                    encoder.write_frame(frame.data())?;
                }
                encoder.finish()?;
                Ok::<_, FFmpegError>((compositor, frame))
            })
            .await
            .map_err(|e| PipelineError::EncodeFailed(format!("render worker failed: {e}")))?;

            let (returned_compositor, returned_frame) =
                render.map_err(|e| PipelineError::EncodeFailed(e.to_string()))?;
            compositor = returned_compositor;
            frame = returned_frame;

            debug!(
                "Encoded chunk {} (frames {}..{})",
                chunk_index, first_frame, end_frame
            );
            segments.push(segment_path);

            let percent = 5.0 + 90.0 * (end_frame as f32 / total_frames.max(1) as f32);
            send_progress(progress, RenderPhase::GeneratingVideo, percent).await;
        }

        let video_only = workdir.join("video.mp4");
        with_deadline(deadline, "segment concatenation", async {
            self.runner
                .concat_segments(&segments, &workdir.join("segments.txt"), &video_only)
                .await
                .map_err(|e| PipelineError::EncodeFailed(e.to_string()))
        })
        .await?;

        Ok(video_only)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Partition `0..total_frames` into windows of `frames_per_chunk`.
fn plan_chunks(total_frames: u64, frames_per_chunk: u64) -> Vec<(u64, u64)> {
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total_frames {
        let end = (start + frames_per_chunk).min(total_frames);
        chunks.push((start, end));
        start = end;
    }
    chunks
}

async fn with_deadline<T, F>(deadline: Instant, phase: &str, fut: F) -> PipelineResult<T>
where
    F: std::future::Future<Output = PipelineResult<T>>,
{
    // timeout_at polls the future before the clock, so an already-expired
    // deadline has to be rejected explicitly.
    if Instant::now() >= deadline {
        return Err(PipelineError::Timeout(format!(
            "{phase} exceeded the configured budget"
        )));
    }
    match timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout(format!(
            "{phase} exceeded the configured budget"
        ))),
    }
}

async fn send_progress(
    tx: &Option<mpsc::Sender<RenderProgress>>,
    phase: RenderPhase,
    percent: f32,
) {
    if let Some(tx) = tx {
        // A closed receiver only means nobody is watching.
        let _ = tx
            .send(RenderProgress {
                phase,
                percent: percent.clamp(0.0, 100.0),
            })
            .await;
    }
}

/// Remove the run workspace, logging (never propagating) failures.
fn close_workdir(workdir: TempDir) {
    let path = workdir.path().to_path_buf();
    if let Err(e) = workdir.close() {
        warn!(
            "Failed to clean up run directory {}: {}",
            path.display(),
            e
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::parse_timed;

    #[test]
    fn test_plan_chunks_exact_partition() {
        // 150s at 24fps with 60s chunks: 3600 frames in windows of 1440.
        let chunks = plan_chunks(3600, 1440);
        assert_eq!(chunks, vec![(0, 1440), (1440, 2880), (2880, 3600)]);

        // No frame duplicated or dropped.
        let mut covered = 0;
        for (i, (start, end)) in chunks.iter().enumerate() {
            assert_eq!(*start, covered);
            assert!(end > start);
            if i + 1 < chunks.len() {
                assert_eq!(*end, chunks[i + 1].0);
            }
            covered = *end;
        }
        assert_eq!(covered, 3600);
    }

    #[test]
    fn test_plan_chunks_short_input_single_chunk() {
        assert_eq!(plan_chunks(100, 1440), vec![(0, 100)]);
        assert_eq!(plan_chunks(1440, 1440), vec![(0, 1440)]);
        assert!(plan_chunks(0, 1440).is_empty());
    }

    #[test]
    fn test_chunked_cue_visibility_matches_whole_timeline() {
        // A cue spanning a 60s chunk boundary must display on both sides,
        // and per-frame visibility must be identical to unchunked lookup.
        let transcript = parse_timed(
            "1\n00:00:50,000 --> 00:01:10,000\nSpanning\n\n2\n00:01:10,000 --> 00:02:30,000\nRest\n",
        )
        .transcript;

        let fps = 24u32;
        let total_frames = (150.0 * fps as f64).ceil() as u64;
        let chunks = plan_chunks(total_frames, 60 * fps as u64);
        assert!(chunks.len() > 1);

        let mut chunked: Vec<Option<String>> = Vec::new();
        for (start, end) in &chunks {
            for f in *start..*end {
                let t = f as f64 / fps as f64;
                chunked.push(transcript.cue_at(t).map(|c| c.text.clone()));
            }
        }

        let whole: Vec<Option<String>> = (0..total_frames)
            .map(|f| {
                let t = f as f64 / fps as f64;
                transcript.cue_at(t).map(|c| c.text.clone())
            })
            .collect();

        assert_eq!(chunked, whole);

        // Boundary frame (t=60s) falls inside the spanning cue.
        let boundary = chunks[1].0;
        assert_eq!(chunked[boundary as usize].as_deref(), Some("Spanning"));
        assert_eq!(
            chunked[(boundary - 1) as usize].as_deref(),
            Some("Spanning")
        );
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_seconds, 60.0);
        assert_eq!(config.budget, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_unsupported_audio_extension_is_fatal() {
        let encoder = EncoderConfig::from_info(crate::core::ffmpeg::FfmpegInfo {
            ffmpeg_path: PathBuf::from("/usr/bin/ffmpeg"),
            ffprobe_path: PathBuf::from("/usr/bin/ffprobe"),
            version: "test".to_string(),
        });
        let pipeline = Pipeline::new(encoder, PipelineConfig::default());

        let dir = tempfile::TempDir::new().unwrap();
        let spec = RenderSpec::new(dir.path().join("audio.xyz"), dir.path().join("out.mp4"));

        let err = pipeline.render(&spec, None, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedAudioFormat(_)));
        assert!(!dir.path().join("out.mp4").exists());
    }

    #[tokio::test]
    async fn test_failed_run_removes_partial_output() {
        // A probe failure (missing file) must leave no output artifacts.
        let encoder = EncoderConfig::from_info(crate::core::ffmpeg::FfmpegInfo {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            version: "test".to_string(),
        });
        let pipeline = Pipeline::new(encoder, PipelineConfig::default());

        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        // Stale partial output from an earlier attempt.
        std::fs::write(fs::tmp_path_for(&output), b"partial").unwrap();

        let spec = RenderSpec::new(dir.path().join("audio.wav"), &output);
        let result = pipeline.render(&spec, None, None).await;

        assert!(result.is_err());
        assert!(!output.exists());
        assert!(!fs::tmp_path_for(&output).exists());
    }

    #[tokio::test]
    async fn test_zero_budget_times_out() {
        let encoder = EncoderConfig::from_info(crate::core::ffmpeg::FfmpegInfo {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            version: "test".to_string(),
        });
        let pipeline = Pipeline::new(
            encoder,
            PipelineConfig {
                chunk_seconds: 60.0,
                budget: Duration::ZERO,
            },
        );

        let dir = tempfile::TempDir::new().unwrap();
        let audio = dir.path().join("audio.wav");
        std::fs::write(&audio, b"fake").unwrap();
        let spec = RenderSpec::new(&audio, dir.path().join("out.mp4"));

        let err = pipeline.render(&spec, None, None).await.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got: {err}");
    }
}
