//! FFmpeg Integration Module
//!
//! Provides the encoding backend for the pipeline:
//! - binary detection (system install or env override)
//! - audio probing via ffprobe
//! - raw-frame segment encoding over stdin
//! - segment concatenation and the final audio mux
//!
//! All invocations go through an [`EncoderConfig`] resolved once per process
//! and passed in at construction; nothing mutates shared settings afterwards.

use std::path::{Path, PathBuf};

mod detection;
mod runner;

pub use detection::{detect_ffmpeg, FfmpegInfo};
pub use runner::{AudioInfo, FfmpegRunner, SegmentEncoder};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Install FFmpeg or set SUBREEL_FFMPEG/SUBREEL_FFPROBE.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;

// =============================================================================
// Encoder Configuration
// =============================================================================

/// Explicit encoder configuration, resolved once per process.
///
/// Binary paths come from detection (or env override) at startup; codec
/// settings default to the broadly compatible x264/AAC combination.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to the ffprobe binary
    pub ffprobe_path: PathBuf,
    /// Detected FFmpeg version string
    pub version: String,
    /// Video codec (e.g. "libx264")
    pub video_codec: String,
    /// Encoder preset (ultrafast..slow)
    pub preset: String,
    /// CRF value for quality-based encoding (0-51, lower is better)
    pub crf: u8,
    /// Audio codec for the final mux (e.g. "aac")
    pub audio_codec: String,
    /// Audio bitrate for the final mux (e.g. "192k")
    pub audio_bitrate: String,
}

impl EncoderConfig {
    /// Detects FFmpeg binaries and builds a config with default codec settings.
    pub fn detect() -> FFmpegResult<Self> {
        Ok(Self::from_info(detect_ffmpeg()?))
    }

    pub fn from_info(info: FfmpegInfo) -> Self {
        Self {
            ffmpeg_path: info.ffmpeg_path,
            ffprobe_path: info.ffprobe_path,
            version: info.version,
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

// =============================================================================
// Audio Capability Lookup
// =============================================================================

/// File extensions the pipeline accepts for audio input.
///
/// Consulted before ffprobe so an unknown extension surfaces as an explicit
/// unsupported-format error instead of an opaque probe failure.
const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &[
    "wav", "mp3", "m4a", "aac", "ogg", "oga", "opus", "flac", "wma", "mka",
];

/// Whether the audio file's extension maps to a known decodable format.
pub fn audio_extension_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_AUDIO_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_error_display() {
        let err = FFmpegError::NotFound;
        assert!(err.to_string().contains("FFmpeg not found"));

        let err = FFmpegError::ExecutionFailed("exit code 1".to_string());
        assert!(err.to_string().contains("exit code 1"));
    }

    #[test]
    fn test_audio_extension_capability() {
        assert!(audio_extension_supported(Path::new("/tmp/a.wav")));
        assert!(audio_extension_supported(Path::new("/tmp/a.MP3")));
        assert!(audio_extension_supported(Path::new("/tmp/a.flac")));
        assert!(!audio_extension_supported(Path::new("/tmp/a.xyz")));
        assert!(!audio_extension_supported(Path::new("/tmp/noext")));
    }

    #[test]
    fn test_encoder_config_defaults() {
        let config = EncoderConfig::from_info(FfmpegInfo {
            ffmpeg_path: PathBuf::from("/usr/bin/ffmpeg"),
            ffprobe_path: PathBuf::from("/usr/bin/ffprobe"),
            version: "7.0".to_string(),
        });
        assert_eq!(config.video_codec, "libx264");
        assert_eq!(config.audio_codec, "aac");
        assert_eq!(config.crf, 23);
    }
}
