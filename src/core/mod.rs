//! Subreel Core Engine
//!
//! Core pipeline module. Handles transcript parsing, cue scheduling,
//! frame composition, encoding, and run orchestration.

pub mod captions;
pub mod ffmpeg;
pub mod fs;
pub mod render;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
