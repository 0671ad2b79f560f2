//! Timed-Text Parser
//!
//! Parses the explicit-timing caption format (SubRip-style):
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,000
//! First caption text
//!
//! 2
//! 00:00:05,500 --> 00:00:08,000
//! Second caption text
//! with multiple lines
//! ```
//!
//! Parsing is best-effort over a stream of independent blocks: a block with a
//! missing timing line or unparsable timestamp is skipped with a recorded
//! reason, never fatal. Cues are emitted in source order; no sorting or
//! overlap validation is performed.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{schedule_evenly, Cue, Transcript};
use crate::core::TimeSec;

// =============================================================================
// Parse Outcome Types
// =============================================================================

/// A transcript block that failed to parse and was skipped
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedBlock {
    /// Zero-based index of the block in the source text
    pub block_index: usize,
    /// Human-readable skip reason
    pub reason: String,
}

/// Result of parsing transcript text: the cues that parsed plus a diagnostic
/// list of skipped blocks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedTranscript {
    pub transcript: Transcript,
    pub skipped: Vec<SkippedBlock>,
}

// =============================================================================
// Format Dispatch
// =============================================================================

/// Whether the text carries explicit timing, decided by content inspection:
/// any line parseable as a `start --> end` timing line qualifies.
pub fn looks_timed(content: &str) -> bool {
    content
        .lines()
        .any(|line| line.contains("-->") && parse_timing_line(line).is_ok())
}

/// Parses transcript text of either supported shape into a transcript.
///
/// Explicit-timing input keeps its own timestamps; untimed input is cleaned
/// and scheduled uniformly across `duration_sec` (see the scheduler module).
pub fn parse_transcript(content: &str, duration_sec: TimeSec) -> ParsedTranscript {
    if looks_timed(content) {
        parse_timed(content)
    } else {
        ParsedTranscript {
            transcript: schedule_evenly(content, duration_sec),
            skipped: Vec::new(),
        }
    }
}

// =============================================================================
// Explicit-Timing Format
// =============================================================================

/// Parses explicit-timing block content into cues plus skip diagnostics.
pub fn parse_timed(content: &str) -> ParsedTranscript {
    let mut transcript = Transcript::new();
    let mut skipped = Vec::new();

    for (block_index, block) in split_blocks(content).into_iter().enumerate() {
        match parse_block(&block) {
            Ok(cue) => transcript.push(cue),
            Err(reason) => {
                warn!("Skipping malformed cue block {}: {}", block_index, reason);
                skipped.push(SkippedBlock {
                    block_index,
                    reason,
                });
            }
        }
    }

    ParsedTranscript {
        transcript,
        skipped,
    }
}

/// Splits content into blank-line-separated blocks of non-empty lines.
fn split_blocks(content: &str) -> Vec<Vec<String>> {
    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.to_string());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Parses one block: optional numeric index line, timing line, text lines.
///
/// The timing line is located by pattern match rather than position, so an
/// absent index line is tolerated.
fn parse_block(lines: &[String]) -> Result<Cue, String> {
    let timing_pos = lines
        .iter()
        .position(|l| l.contains("-->"))
        .ok_or_else(|| "missing timing line".to_string())?;

    let (start_sec, end_sec) = parse_timing_line(&lines[timing_pos])?;

    let text = lines[timing_pos + 1..].join("\n");
    if text.trim().is_empty() {
        return Err("missing cue text".to_string());
    }

    Cue::checked(start_sec, end_sec, &text)
}

/// Parses a timing line (e.g. "00:00:01,000 --> 00:00:04,000").
fn parse_timing_line(line: &str) -> Result<(TimeSec, TimeSec), String> {
    let parts: Vec<&str> = line.split("-->").collect();
    if parts.len() != 2 {
        return Err(format!("expected 'start --> end': {}", line.trim()));
    }

    let start = parse_srt_timestamp(parts[0].trim())?;
    let end = parse_srt_timestamp(parts[1].trim())?;

    Ok((start, end))
}

/// Parses an `H:MM:SS,mmm` timestamp (comma or dot millisecond separator)
/// into seconds.
fn parse_srt_timestamp(ts: &str) -> Result<TimeSec, String> {
    let normalized = ts.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();

    if parts.len() != 3 {
        return Err(format!("invalid timestamp: {ts}"));
    }

    let hours: f64 = parts[0]
        .parse()
        .map_err(|_| format!("invalid timestamp: {ts}"))?;
    let minutes: f64 = parts[1]
        .parse()
        .map_err(|_| format!("invalid timestamp: {ts}"))?;
    let seconds: f64 = parts[2]
        .parse()
        .map_err(|_| format!("invalid timestamp: {ts}"))?;

    Ok(hours * 3600.0 + minutes * 60.0 + seconds)
}

// =============================================================================
// Export
// =============================================================================

/// Formats seconds as an SRT timestamp (`00:00:00,000`).
pub fn format_srt_timestamp(seconds: TimeSec) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}

/// Exports a transcript back to the explicit block format.
pub fn export_srt(transcript: &Transcript) -> String {
    let mut output = String::new();

    for (index, cue) in transcript.cues().iter().enumerate() {
        output.push_str(&format!("{}\n", index + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(cue.start_sec),
            format_srt_timestamp(cue.end_sec)
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output.trim_end().to_string()
}

// =============================================================================
// Tests
// =============================================================================
