//! Caption Data Models
//!
//! Defines the cue and transcript structures consumed by the compositor.
//!
//! A transcript is an ordered sequence of cues, insertion order =
//! chronological order. Scheduler-produced transcripts are contiguous and
//! non-overlapping; parser-produced transcripts preserve source order even
//! when the source timing is out of order.

use serde::{Deserialize, Serialize};

use super::TimeSec;

mod parse;
mod schedule;

pub use parse::{
    export_srt, format_srt_timestamp, looks_timed, parse_timed, parse_transcript,
    ParsedTranscript, SkippedBlock,
};
pub use schedule::{clean_untimed_text, schedule_evenly, split_sentences};

// =============================================================================
// Cue
// =============================================================================

/// A single timed subtitle entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// Display begin time in seconds
    pub start_sec: TimeSec,
    /// Display end time in seconds (exclusive)
    pub end_sec: TimeSec,
    /// Display text (normalized: trimmed, internal line breaks joined with a space)
    pub text: String,
}

impl Cue {
    /// Builds a cue, rejecting degenerate timing and empty text.
    pub fn checked(start_sec: TimeSec, end_sec: TimeSec, text: &str) -> Result<Self, String> {
        let text = normalize_cue_text(text);
        if text.is_empty() {
            return Err("empty cue text".to_string());
        }
        if !start_sec.is_finite() || !end_sec.is_finite() {
            return Err("non-finite cue timestamp".to_string());
        }
        if start_sec < 0.0 {
            return Err(format!("negative cue start: {start_sec}"));
        }
        if end_sec <= start_sec {
            return Err(format!(
                "zero or negative cue duration: {start_sec}~{end_sec}"
            ));
        }
        Ok(Self {
            start_sec,
            end_sec,
            text,
        })
    }

    /// Whether this cue is displayed at time `t` (`start <= t < end`).
    pub fn is_active_at(&self, t: TimeSec) -> bool {
        t >= self.start_sec && t < self.end_sec
    }

    /// Cue duration in seconds
    pub fn duration(&self) -> TimeSec {
        self.end_sec - self.start_sec
    }
}

/// Strips leading/trailing whitespace and joins internal line breaks with a
/// single space.
fn normalize_cue_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Transcript
// =============================================================================

/// Ordered sequence of cues for one audio source
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    cues: Vec<Cue>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cues(cues: Vec<Cue>) -> Self {
        Self { cues }
    }

    pub fn push(&mut self, cue: Cue) {
        self.cues.push(cue);
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    /// Looks up the cue active at time `t`.
    ///
    /// First match in source order wins: under the scheduler's
    /// non-overlapping invariant at most one cue matches, and for
    /// parser-preserved overlapping input the result stays deterministic.
    pub fn cue_at(&self, t: TimeSec) -> Option<&Cue> {
        self.cues.iter().find(|c| c.is_active_at(t))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_checked_normalizes_text() {
        let cue = Cue::checked(0.0, 2.0, "  Hello\nworld  ").unwrap();
        assert_eq!(cue.text, "Hello world");
    }

    #[test]
    fn test_cue_checked_rejects_degenerate() {
        assert!(Cue::checked(2.0, 2.0, "x").is_err());
        assert!(Cue::checked(3.0, 2.0, "x").is_err());
        assert!(Cue::checked(-1.0, 2.0, "x").is_err());
        assert!(Cue::checked(0.0, 2.0, "   \n ").is_err());
    }

    #[test]
    fn test_cue_is_active_at_half_open() {
        let cue = Cue::checked(1.0, 4.0, "x").unwrap();
        assert!(!cue.is_active_at(0.999));
        assert!(cue.is_active_at(1.0));
        assert!(cue.is_active_at(3.999));
        assert!(!cue.is_active_at(4.0));
    }

    #[test]
    fn test_cue_at_returns_at_most_one() {
        let transcript = Transcript::from_cues(vec![
            Cue::checked(0.0, 2.0, "A").unwrap(),
            Cue::checked(2.0, 5.0, "B").unwrap(),
        ]);

        assert_eq!(transcript.cue_at(0.0).unwrap().text, "A");
        assert_eq!(transcript.cue_at(1.999).unwrap().text, "A");
        assert_eq!(transcript.cue_at(2.0).unwrap().text, "B");
        assert!(transcript.cue_at(5.0).is_none());
    }

    #[test]
    fn test_cue_at_overlapping_first_wins() {
        // Parser-preserved overlap: deterministic first-match display.
        let transcript = Transcript::from_cues(vec![
            Cue::checked(0.0, 3.0, "first").unwrap(),
            Cue::checked(1.0, 4.0, "second").unwrap(),
        ]);
        assert_eq!(transcript.cue_at(2.0).unwrap().text, "first");
        assert_eq!(transcript.cue_at(3.5).unwrap().text, "second");
    }
}
