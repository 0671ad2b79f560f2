//! FFmpeg Runner Module
//!
//! Executes ffmpeg/ffprobe for the pipeline's encode stages:
//! probing audio metadata, encoding raw rgb24 frames streamed over stdin
//! into video-only segments, concatenating segments, and the final mux.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;

use tracing::debug;

use super::{EncoderConfig, FFmpegError, FFmpegResult};
use crate::core::Resolution;

// =============================================================================
// Audio Info
// =============================================================================

/// Audio metadata extracted by ffprobe
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInfo {
    /// Duration in seconds
    pub duration_sec: f64,
    /// Codec name (e.g. "pcm_s16le", "mp3")
    pub codec: String,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u8,
    /// Container format
    pub format: String,
}

// =============================================================================
// Runner
// =============================================================================

/// Executes ffmpeg commands against a fixed, explicit configuration.
#[derive(Clone)]
pub struct FfmpegRunner {
    config: Arc<EncoderConfig>,
}

impl FfmpegRunner {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Probe an audio file for duration and stream metadata.
    pub async fn probe_audio(&self, input: &Path) -> FFmpegResult<AudioInfo> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        let output = tokio::process::Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                &input.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ProbeError(format!(
                "FFprobe failed: {}",
                stderr
            )));
        }

        let json_str = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&json_str)
    }

    /// Start a raw-frame segment encode.
    ///
    /// The returned encoder accepts rgb24 frames over stdin and is blocking;
    /// call it from the CPU-bound render loop, not the async runtime threads.
    pub fn segment_encoder(
        &self,
        resolution: Resolution,
        fps: u32,
        output: &Path,
    ) -> FFmpegResult<SegmentEncoder> {
        SegmentEncoder::spawn(&self.config, resolution, fps, output)
    }

    /// Concatenate video segments, in the given order, with the concat demuxer.
    ///
    /// `list_path` is where the demuxer's list file is written; it must live
    /// in the same run-scoped temp directory as the segments.
    pub async fn concat_segments(
        &self,
        segments: &[PathBuf],
        list_path: &Path,
        output: &Path,
    ) -> FFmpegResult<()> {
        if segments.is_empty() {
            return Err(FFmpegError::InvalidInput(
                "no segments to concatenate".to_string(),
            ));
        }

        let mut list = String::new();
        for segment in segments {
            list.push_str(&format!("file '{}'\n", segment.to_string_lossy()));
        }
        tokio::fs::write(list_path, list)
            .await
            .map_err(FFmpegError::ProcessError)?;

        let result = tokio::process::Command::new(&self.config.ffmpeg_path)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
                &list_path.to_string_lossy(),
                "-c",
                "copy",
                &output.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "Segment concatenation failed: {}",
                stderr.trim()
            )));
        }

        debug!("Concatenated {} segments into {}", segments.len(), output.display());
        Ok(())
    }

    /// Final mux: copy the video stream, encode audio, enable streaming playback.
    ///
    /// `-shortest` bounds the audio to the video duration (within one frame);
    /// `+faststart` moves the index to the front of the container. The output
    /// path here is the sibling temp file, never the caller-visible path.
    pub async fn mux_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> FFmpegResult<()> {
        let result = tokio::process::Command::new(&self.config.ffmpeg_path)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-i",
                &video.to_string_lossy(),
                "-i",
                &audio.to_string_lossy(),
                "-map",
                "0:v:0",
                "-map",
                "1:a:0",
                "-c:v",
                "copy",
                "-c:a",
                &self.config.audio_codec,
                "-b:a",
                &self.config.audio_bitrate,
                "-shortest",
                "-movflags",
                "+faststart",
                "-f",
                "mp4",
                &output.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(FFmpegError::ProcessError)?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "Audio mux failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Segment Encoder
// =============================================================================

/// One in-flight video-only segment encode fed raw rgb24 frames over stdin.
///
/// Dropping an encoder without calling [`SegmentEncoder::finish`] kills and
/// reaps the child, so an aborted chunk cannot leak a zombie process.
pub struct SegmentEncoder {
    child: Option<Child>,
    stdin: Option<std::io::BufWriter<ChildStdin>>,
    frame_bytes: usize,
    frames_written: u64,
}

impl SegmentEncoder {
    fn spawn(
        config: &EncoderConfig,
        resolution: Resolution,
        fps: u32,
        output: &Path,
    ) -> FFmpegResult<Self> {
        let mut child = Command::new(&config.ffmpeg_path)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s:v",
                &format!("{}x{}", resolution.width, resolution.height),
                "-r",
                &fps.to_string(),
                "-i",
                "-",
                "-an",
                "-c:v",
                &config.video_codec,
                "-preset",
                &config.preset,
                "-crf",
                &config.crf.to_string(),
                "-pix_fmt",
                "yuv420p",
                &output.to_string_lossy(),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(FFmpegError::ProcessError)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FFmpegError::ExecutionFailed("ffmpeg stdin unavailable".to_string()))?;

        Ok(Self {
            child: Some(child),
            stdin: Some(std::io::BufWriter::new(stdin)),
            frame_bytes: resolution.frame_bytes(),
            frames_written: 0,
        })
    }

    /// Write one rgb24 frame. The buffer length must match the resolution.
    pub fn write_frame(&mut self, frame: &[u8]) -> FFmpegResult<()> {
        if frame.len() != self.frame_bytes {
            return Err(FFmpegError::InvalidInput(format!(
                "frame buffer is {} bytes, expected {}",
                frame.len(),
                self.frame_bytes
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| FFmpegError::ExecutionFailed("encoder already finished".to_string()))?;
        stdin
            .write_all(frame)
            .map_err(FFmpegError::ProcessError)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Flush, close stdin and wait for the encoder to exit.
    pub fn finish(mut self) -> FFmpegResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().map_err(FFmpegError::ProcessError)?;
            // Dropping the writer closes the pipe and signals end of stream.
            drop(stdin);
        }

        let child = self
            .child
            .take()
            .ok_or_else(|| FFmpegError::ExecutionFailed("encoder already finished".to_string()))?;
        let output = child.wait_with_output().map_err(FFmpegError::ProcessError)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "Segment encode failed: {}",
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Drop for SegmentEncoder {
    fn drop(&mut self) {
        // Reached only when finish() was never called (write error, panic in
        // the render loop). Close the pipe, then kill and reap the child.
        if let Some(mut child) = self.child.take() {
            drop(self.stdin.take());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

// =============================================================================
// Probe Parsing
// =============================================================================

/// Parse FFprobe JSON output into audio metadata
fn parse_probe_output(json_str: &str) -> FFmpegResult<AudioInfo> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| FFmpegError::ParseError(format!("Failed to parse FFprobe output: {}", e)))?;

    let format = json
        .get("format")
        .ok_or_else(|| FFmpegError::ParseError("Missing format info".to_string()))?;

    let format_name = format
        .get("format_name")
        .and_then(|f| f.as_str())
        .unwrap_or("unknown")
        .to_string();

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let audio_stream = streams
        .iter()
        .find(|s| s.get("codec_type").and_then(|c| c.as_str()) == Some("audio"))
        .ok_or_else(|| FFmpegError::ProbeError("No audio stream found".to_string()))?;

    // Duration from the container, falling back to the stream.
    let duration_sec = format
        .get("duration")
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            audio_stream
                .get("duration")
                .and_then(|d| d.as_str())
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    if duration_sec <= 0.0 {
        return Err(FFmpegError::ProbeError(
            "Audio duration is zero or unknown".to_string(),
        ));
    }

    let codec = audio_stream
        .get("codec_name")
        .and_then(|c| c.as_str())
        .unwrap_or("unknown")
        .to_string();

    let sample_rate = audio_stream
        .get("sample_rate")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(44100);

    let channels = audio_stream
        .get("channels")
        .and_then(|c| c.as_u64())
        .unwrap_or(2) as u8;

    Ok(AudioInfo {
        duration_sec,
        codec,
        sample_rate,
        channels,
        format: format_name,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output_audio() {
        let json = r#"{
            "format": {
                "duration": "4.5",
                "format_name": "wav"
            },
            "streams": [
                {
                    "codec_type": "audio",
                    "codec_name": "pcm_s16le",
                    "sample_rate": "44100",
                    "channels": 2
                }
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration_sec, 4.5);
        assert_eq!(info.codec, "pcm_s16le");
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.format, "wav");
    }

    #[test]
    fn test_parse_probe_output_stream_duration_fallback() {
        let json = r#"{
            "format": { "format_name": "ogg" },
            "streams": [
                { "codec_type": "audio", "codec_name": "vorbis", "duration": "12.25" }
            ]
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration_sec, 12.25);
    }

    #[test]
    fn test_parse_probe_output_no_audio_stream() {
        let json = r#"{
            "format": { "duration": "10.0", "format_name": "mp4" },
            "streams": [ { "codec_type": "video", "codec_name": "h264" } ]
        }"#;

        let result = parse_probe_output(json);
        assert!(matches!(result, Err(FFmpegError::ProbeError(_))));
    }

    #[test]
    fn test_parse_probe_output_zero_duration() {
        let json = r#"{
            "format": { "format_name": "wav" },
            "streams": [ { "codec_type": "audio", "codec_name": "pcm_s16le" } ]
        }"#;

        let result = parse_probe_output(json);
        assert!(matches!(result, Err(FFmpegError::ProbeError(_))));
    }

    #[test]
    fn test_parse_probe_output_invalid_json() {
        assert!(matches!(
            parse_probe_output("not json"),
            Err(FFmpegError::ParseError(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_dropped_encoder_reaps_child() {
        // An encoder dropped without finish() (write error mid-chunk) must
        // kill and reap its child instead of leaking a zombie.
        let mut child = Command::new("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let stdin = child.stdin.take().unwrap();
        let pid = child.id();

        let encoder = SegmentEncoder {
            child: Some(child),
            stdin: Some(std::io::BufWriter::new(stdin)),
            frame_bytes: 12,
            frames_written: 0,
        };
        drop(encoder);

        // After kill + wait the pid is fully reaped, not left as a zombie.
        #[cfg(target_os = "linux")]
        assert!(!Path::new(&format!("/proc/{pid}")).exists());
        let _ = pid;
    }
}
