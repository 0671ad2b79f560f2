//! Render Module
//!
//! Frame composition and run orchestration: a `RenderSpec` plus transcript
//! text goes in, a subtitled MP4 comes out.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Rgb, Resolution};

mod compositor;
mod pipeline;
mod text;

pub use compositor::{FrameBuffer, FrameCompositor};
pub use pipeline::{Pipeline, PipelineConfig, RenderReport};
pub use text::{detect_system_font, TextPainter};

// =============================================================================
// Render Spec
// =============================================================================

/// Immutable configuration for one video-generation run.
#[derive(Debug, Clone)]
pub struct RenderSpec {
    /// Audio input path (canonical decodable format)
    pub audio_path: PathBuf,
    /// Caller-visible output path
    pub output_path: PathBuf,
    /// Requested resolution; normalized to even dimensions before encoding
    pub resolution: Resolution,
    /// Output frame rate
    pub fps: u32,
    /// Background fill color
    pub background: Rgb,
    /// Text color for all overlay layers
    pub foreground: Rgb,
    /// Optional title, centered near the top for the whole video
    pub title: Option<String>,
    /// Optional byline, right/bottom-anchored for the whole video
    pub byline: Option<String>,
    /// Optional font override; otherwise env/system discovery applies
    pub font_path: Option<PathBuf>,
}

impl RenderSpec {
    pub fn new(audio_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: audio_path.into(),
            output_path: output_path.into(),
            resolution: Resolution::default(),
            fps: 24,
            background: Rgb::black(),
            foreground: Rgb::white(),
            title: None,
            byline: None,
            font_path: None,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Resolution::new(width, height);
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.clamp(1, 120);
        self
    }

    pub fn with_colors(mut self, background: Rgb, foreground: Rgb) -> Self {
        self.background = background;
        self.foreground = foreground;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_byline(mut self, byline: impl Into<String>) -> Self {
        self.byline = Some(byline.into());
        self
    }

    pub fn with_font(mut self, font_path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(font_path.into());
        self
    }
}

// =============================================================================
// Progress Reporting
// =============================================================================

/// Named pipeline phase, for display purposes only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    ProcessingAudio,
    Transcribing,
    GeneratingVideo,
    Finalizing,
    Complete,
}

impl RenderPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessingAudio => "processing audio",
            Self::Transcribing => "transcribing",
            Self::GeneratingVideo => "generating video",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
        }
    }
}

/// Progress signal emitted over the optional channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderProgress {
    pub phase: RenderPhase,
    /// Overall completion, 0.0 - 100.0
    pub percent: f32,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_spec_defaults() {
        let spec = RenderSpec::new("/tmp/a.wav", "/tmp/out.mp4");
        assert_eq!(spec.resolution, Resolution::new(1280, 720));
        assert_eq!(spec.fps, 24);
        assert_eq!(spec.background, Rgb::black());
        assert_eq!(spec.foreground, Rgb::white());
        assert!(spec.title.is_none());
    }

    #[test]
    fn test_render_spec_builders() {
        let spec = RenderSpec::new("/tmp/a.wav", "/tmp/out.mp4")
            .with_resolution(1920, 1080)
            .with_fps(500)
            .with_title("Talk")
            .with_byline("by me");
        assert_eq!(spec.resolution.width, 1920);
        assert_eq!(spec.fps, 120); // clamped
        assert_eq!(spec.title.as_deref(), Some("Talk"));
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(RenderPhase::ProcessingAudio.as_str(), "processing audio");
        assert_eq!(RenderPhase::GeneratingVideo.as_str(), "generating video");
        assert_eq!(RenderPhase::Complete.as_str(), "complete");
    }
}
