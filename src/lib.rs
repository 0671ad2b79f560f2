//! Subreel — subtitle-timed video compositing pipeline.
//!
//! Takes a time-coded transcript (or untimed freeform text) plus an audio
//! track and produces a single MP4 with burned-in subtitles over a solid
//! background, with optional title and byline overlays.

pub mod core;

pub use crate::core::captions::{parse_transcript, Cue, ParsedTranscript, Transcript};
pub use crate::core::ffmpeg::{EncoderConfig, FfmpegRunner};
pub use crate::core::render::{
    Pipeline, PipelineConfig, RenderPhase, RenderProgress, RenderReport, RenderSpec,
};
pub use crate::core::{PipelineError, PipelineResult};
