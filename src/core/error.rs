//! Subreel Error Definitions
//!
//! Defines the crate-level error type used by the pipeline.
//!
//! Recoverable conditions are deliberately not represented here: a malformed
//! transcript block becomes a skip diagnostic on the parse result, and an
//! empty transcript renders a video without the subtitle layer. Failed
//! deletion of a temporary artifact is logged and never propagated.

use thiserror::Error;

use super::ffmpeg::FFmpegError;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    // =========================================================================
    // Audio Errors
    // =========================================================================
    #[error("Unsupported audio format: {0}")]
    UnsupportedAudioFormat(String),

    #[error("Audio probe failed: {0}")]
    ProbeFailed(String),

    // =========================================================================
    // Render Errors
    // =========================================================================
    #[error("Font not found: {0}")]
    FontNotFound(String),

    #[error("Invalid render spec: {0}")]
    InvalidSpec(String),

    // =========================================================================
    // Encode Errors
    // =========================================================================
    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    /// Distinct from other failures so callers can advise retry.
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("FFmpeg error: {0}")]
    FFmpeg(#[from] FFmpegError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline result type
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// True for budget expiry, so callers can distinguish retryable timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
