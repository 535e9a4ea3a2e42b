//! JSON-backed transcript store.
//!
//! The file is a JSON array of `{ "start": f64, "duration": f64, "text": str }`
//! objects, the shape YouTube-style caption exports use.

use std::path::Path;

use super::{Segment, TranscriptError, TranscriptSource};

/// Transcript held fully in memory, sorted by start time.
#[derive(Debug, Clone, Default)]
pub struct SegmentTranscript {
    segments: Vec<Segment>,
}

impl SegmentTranscript {
    pub fn from_segments(mut segments: Vec<Segment>) -> Self {
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { segments }
    }

    pub fn load(path: &Path) -> Result<Self, TranscriptError> {
        let content = std::fs::read_to_string(path)?;
        let segments: Vec<Segment> = serde_json::from_str(&content)?;
        log::info!(
            "transcript: loaded {} segments from {}",
            segments.len(),
            path.display()
        );
        Ok(Self::from_segments(segments))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl TranscriptSource for SegmentTranscript {
    fn has_transcript(&self) -> bool {
        !self.segments.is_empty()
    }

    fn full_transcript(&self) -> Option<&[Segment]> {
        self.has_transcript().then_some(self.segments.as_slice())
    }
}

/// Used when no transcript is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranscript;

impl TranscriptSource for NoTranscript {
    fn has_transcript(&self) -> bool {
        false
    }

    fn full_transcript(&self) -> Option<&[Segment]> {
        None
    }
}
