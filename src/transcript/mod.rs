//! Episode transcript lookup.
//!
//! * [`TranscriptSource`]: timestamp-indexed read access used by the
//!   conversation core.
//! * [`SegmentTranscript`]: in-memory store loaded from a JSON segment file.
//! * [`NoTranscript`]: stand-in when nothing is loaded.
//! * [`format_timestamp`]: `M:SS` rendering shared by prompts and logs.

pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use store::{NoTranscript, SegmentTranscript};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One timed line of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Seconds from the start of the episode.
    pub start: f64,
    /// Seconds.
    pub duration: f64,
    pub text: String,
}

impl Segment {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// True when `[start, end]` touches `[from, to]`.
    pub fn overlaps(&self, from: f64, to: f64) -> bool {
        self.start <= to && self.end() >= from
    }
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("failed to read transcript: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse transcript: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// TranscriptSource
// ---------------------------------------------------------------------------

/// Read-only, timestamp-indexed view of the current episode's transcript.
///
/// Lookups never fail: "no transcript" and "nothing in that window" are
/// both `None`.
pub trait TranscriptSource: Send + Sync {
    fn has_transcript(&self) -> bool;

    /// All segments in start order, or `None` if no transcript is loaded.
    fn full_transcript(&self) -> Option<&[Segment]>;

    /// Space-joined text of every segment overlapping
    /// `[max(0, t - window), t + window]`.
    fn text_near(&self, t: f64, window_secs: u32) -> Option<String> {
        let text = overlapping(self.full_transcript()?, t, window_secs)
            .map(|s| s.text.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!text.is_empty()).then_some(text)
    }

    /// Same window as [`text_near`](Self::text_near), one `[M:SS] text` line
    /// per segment.
    fn timestamped_window(&self, t: f64, window_secs: u32) -> Option<String> {
        let lines = overlapping(self.full_transcript()?, t, window_secs)
            .map(|s| format!("[{}] {}", format_timestamp(s.start), s.text.trim()))
            .collect::<Vec<_>>();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

fn overlapping(segments: &[Segment], t: f64, window_secs: u32) -> impl Iterator<Item = &Segment> {
    let from = (t - f64::from(window_secs)).max(0.0);
    let to = t + f64::from(window_secs);
    segments.iter().filter(move |s| s.overlaps(from, to))
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// `M:SS`, minutes unbounded (`13486.0` → `"224:46"`).  Negative input
/// clamps to `0:00`.
pub fn format_timestamp(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
