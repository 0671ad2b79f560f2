//! Cue Scheduler
//!
//! Derives cue timing for untimed transcript text by distributing the total
//! audio duration uniformly across sentence-like units.
//!
//! This is a uniform-distribution heuristic, not forced alignment: every
//! sentence gets the same slice of `duration / count` regardless of its
//! spoken length.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::{Cue, Transcript};
use crate::core::TimeSec;

// =============================================================================
// Text Cleanup
// =============================================================================

fn bracketed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]").expect("static pattern"))
}

fn timestamp_like_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Stray fragments like "00:01:23,456", "1:02" or "12:34.5".
    RE.get_or_init(|| Regex::new(r"\d{1,2}:\d{2}(:\d{2})?([.,]\d{1,3})?").expect("static pattern"))
}

fn digits_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("static pattern"))
}

/// Strips bracketed annotations, timestamp-like substrings, pure
/// sequence-number lines and empty lines from untimed transcript text.
pub fn clean_untimed_text(raw: &str) -> String {
    let mut kept = Vec::new();

    for line in raw.lines() {
        let line = bracketed_re().replace_all(line, "");
        let line = timestamp_like_re().replace_all(&line, "");
        let line = line.trim();

        if line.is_empty() || digits_only_re().is_match(line) {
            continue;
        }
        kept.push(line.to_string());
    }

    kept.join(" ")
}

// =============================================================================
// Sentence Segmentation
// =============================================================================

/// Splits text into sentence-like units at `.`, `!` or `?` followed by
/// whitespace or end of input. Terminators stay attached to their sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().is_none_or(|next| next.is_whitespace());
            if at_boundary {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

// =============================================================================
// Uniform Scheduling
// =============================================================================

/// Schedules untimed text as N contiguous cues of `duration / N` each,
/// back-to-back from 0 and covering `[0, duration)`.
///
/// Zero sentence units with non-empty text yields a single cue spanning the
/// whole duration; fully empty text yields an empty transcript (the render
/// then proceeds without a subtitle layer).
pub fn schedule_evenly(raw: &str, duration_sec: TimeSec) -> Transcript {
    let text = clean_untimed_text(raw);
    if text.is_empty() {
        warn!("Transcript text is empty after cleanup; scheduling no cues");
        return Transcript::new();
    }
    if duration_sec <= 0.0 {
        warn!(
            "Cannot schedule cues over non-positive duration {}s",
            duration_sec
        );
        return Transcript::new();
    }

    let units = {
        let mut units = split_sentences(&text);
        if units.is_empty() {
            units.push(text.clone());
        }
        units
    };

    let slice = duration_sec / units.len() as f64;
    let count = units.len();

    let mut transcript = Transcript::new();
    for (i, unit) in units.into_iter().enumerate() {
        let start = i as f64 * slice;
        // Last cue ends exactly at the total duration, absorbing float drift.
        let end = if i + 1 == count {
            duration_sec
        } else {
            (i + 1) as f64 * slice
        };
        match Cue::checked(start, end, &unit) {
            Ok(cue) => transcript.push(cue),
            Err(reason) => warn!("Dropping unschedulable unit {}: {}", i, reason),
        }
    }

    transcript
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_untimed_text() {
        let raw = "[music]\n12\nHello 00:01:23,456 world\n\n[applause] and more";
        assert_eq!(clean_untimed_text(raw), "Hello  world and more");
    }

    #[test]
    fn test_clean_keeps_plain_text() {
        assert_eq!(clean_untimed_text("Just text."), "Just text.");
    }

    #[test]
    fn test_split_sentences_basic() {
        let units = split_sentences("First one. Second one! Third? Trailing without end");
        assert_eq!(
            units,
            vec!["First one.", "Second one!", "Third?", "Trailing without end"]
        );
    }

    #[test]
    fn test_split_sentences_keeps_decimals_together() {
        let units = split_sentences("Pi is 3.14 roughly. Next.");
        assert_eq!(units, vec!["Pi is 3.14 roughly.", "Next."]);
    }

    #[test]
    fn test_schedule_evenly_uniform_contiguous() {
        let transcript = schedule_evenly("A. B. C. D.", 10.0);
        let cues = transcript.cues();
        assert_eq!(cues.len(), 4);

        for (i, cue) in cues.iter().enumerate() {
            assert!((cue.duration() - 2.5).abs() < 1e-9);
            assert!((cue.start_sec - i as f64 * 2.5).abs() < 1e-9);
        }
        // Contiguous with no gaps or overlaps, covering [0, D).
        assert_eq!(cues[0].start_sec, 0.0);
        assert_eq!(cues[3].end_sec, 10.0);
        for pair in cues.windows(2) {
            assert_eq!(pair[0].end_sec, pair[1].start_sec);
        }
    }

    #[test]
    fn test_schedule_zero_units_single_cue() {
        // No sentence terminators at all still yields one full-span cue.
        let transcript = schedule_evenly("no terminators here at all", 7.0);
        assert_eq!(transcript.len(), 1);
        let cue = &transcript.cues()[0];
        assert_eq!(cue.start_sec, 0.0);
        assert_eq!(cue.end_sec, 7.0);
    }

    #[test]
    fn test_schedule_empty_text_yields_empty_transcript() {
        assert!(schedule_evenly("", 10.0).is_empty());
        assert!(schedule_evenly("[music]\n42\n", 10.0).is_empty());
    }

    #[test]
    fn test_schedule_every_time_has_exactly_one_cue() {
        let transcript = schedule_evenly("One. Two. Three.", 9.0);
        let mut t = 0.0;
        while t < 9.0 {
            let active: Vec<_> = transcript
                .cues()
                .iter()
                .filter(|c| c.is_active_at(t))
                .collect();
            assert_eq!(active.len(), 1, "exactly one active cue at t={t}");
            t += 0.25;
        }
        assert!(transcript.cue_at(9.0).is_none());
    }
}
