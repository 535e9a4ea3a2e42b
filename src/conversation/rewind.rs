//! Background search for the resume point.
//!
//! Started once, on the first listener turn, and joined by the resume step
//! with a bounded wait.  The model is asked for the start of the sentence
//! that was playing at the interrupt and for a short transition line:
//!
//! ```text
//! TIMESTAMP: 224:36
//! TEXT_AT_POINT: Some say the share could reach
//! TRANSITION: Good question! Now, picking up where we left off...
//! ```
//!
//! A timestamp outside `[max(0, t - window) - tolerance, t + tolerance]`, an
//! unparseable reply or a failed request all degrade to `max(0, t - fallback)`.
//! The result is published through a oneshot channel and therefore written
//! at most once.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::oneshot;

use crate::config::SessionConfig;
use crate::llm::{PromptBuilder, RewindRequest, TextGenerator};
use crate::transcript::format_timestamp;
use crate::tts::{SpeechSynthesizer, VoiceTable};

use super::pipe::{AudioClip, ScratchCopies};

static TIMESTAMP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TIMESTAMP:\s*(?:(\d+):)?(\d+):(\d{1,2})").unwrap());

static TEXT_AT_POINT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TEXT_AT_POINT:\s*(.+)").unwrap());

static TRANSITION_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)TRANSITION:\s*(.+)").unwrap());

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Fields recovered from the model's reply.  Each is independent: a reply
/// with a broken timestamp can still carry a usable transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRewind {
    pub timestamp_secs: Option<f64>,
    pub text_at_point: Option<String>,
    pub transition: Option<String>,
}

/// Parse `TIMESTAMP: [H:]M:SS`, `TEXT_AT_POINT:` and `TRANSITION:` lines.
///
/// ```
/// use podchat::conversation::parse_rewind_reply;
///
/// let parsed = parse_rewind_reply("TIMESTAMP: 224:36\nTRANSITION: \"Back to it.\"");
/// assert_eq!(parsed.timestamp_secs, Some(13476.0));
/// assert_eq!(parsed.transition.as_deref(), Some("Back to it."));
/// ```
pub fn parse_rewind_reply(reply: &str) -> ParsedRewind {
    let timestamp_secs = TIMESTAMP_LINE.captures(reply).and_then(|c| {
        let hours: u64 = c.get(1).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let minutes: u64 = c.get(2)?.as_str().parse().ok()?;
        let seconds: u64 = c.get(3)?.as_str().parse().ok()?;
        if seconds >= 60 {
            return None;
        }
        hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)
            .map(|total| total as f64)
    });

    let text_at_point = TEXT_AT_POINT_LINE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    let transition = TRANSITION_LINE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string())
        .filter(|s| !s.is_empty());

    ParsedRewind {
        timestamp_secs,
        text_at_point,
        transition,
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How the rewind point is chosen or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindOutcome {
    /// The model's timestamp was inside the valid range.
    Model,
    OutOfWindow,
    Unparseable,
    RequestFailed,
    NoTranscript,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewindPolicy {
    pub window_secs: f64,
    pub tolerance_secs: f64,
    pub fallback_secs: f64,
}

impl RewindPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            window_secs: config.rewind_window_secs,
            tolerance_secs: config.rewind_tolerance_secs,
            fallback_secs: config.fallback_rewind_secs,
        }
    }

    /// Inclusive range a model timestamp must fall in.
    pub fn valid_range(&self, interrupt_secs: f64) -> (f64, f64) {
        let earliest = (interrupt_secs - self.window_secs).max(0.0);
        (earliest - self.tolerance_secs, interrupt_secs + self.tolerance_secs)
    }

    pub fn fallback(&self, interrupt_secs: f64) -> f64 {
        (interrupt_secs - self.fallback_secs).max(0.0)
    }

    pub fn decide(&self, interrupt_secs: f64, suggested: Option<f64>) -> (f64, RewindOutcome) {
        let Some(ts) = suggested else {
            return (self.fallback(interrupt_secs), RewindOutcome::Unparseable);
        };
        let (lo, hi) = self.valid_range(interrupt_secs);
        if (lo..=hi).contains(&ts) {
            (ts, RewindOutcome::Model)
        } else {
            (self.fallback(interrupt_secs), RewindOutcome::OutOfWindow)
        }
    }
}

impl Default for RewindPolicy {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// RewindResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RewindResult {
    /// `false` only when the resolver never finished (join timeout).
    pub resolved: bool,
    pub timestamp_secs: Option<f64>,
    pub transition_text: Option<String>,
    pub transition_clip: Option<AudioClip>,
    pub outcome: Option<RewindOutcome>,
}

impl RewindResult {
    /// Nothing known: resume where playback was paused.
    pub fn unresolved() -> Self {
        Self::default()
    }

    fn fallback(timestamp_secs: f64, outcome: RewindOutcome) -> Self {
        Self {
            resolved: true,
            timestamp_secs: Some(timestamp_secs),
            outcome: Some(outcome),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// RewindResolver
// ---------------------------------------------------------------------------

/// What the resolver is given when it starts.
#[derive(Debug, Clone)]
pub struct RewindInput {
    pub interrupt_secs: f64,
    /// The listener's first question.
    pub question: String,
    pub interrupt_sentence: Option<String>,
    /// `[M:SS] text` lines around the interrupt.
    pub transcript_window: Option<String>,
}

#[derive(Clone)]
pub struct RewindResolver {
    generator: Arc<dyn TextGenerator>,
    tts: Arc<dyn SpeechSynthesizer>,
    voices: Arc<VoiceTable>,
    prompts: PromptBuilder,
    policy: RewindPolicy,
    scratch_dir: Option<PathBuf>,
}

impl RewindResolver {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        tts: Arc<dyn SpeechSynthesizer>,
        voices: Arc<VoiceTable>,
        prompts: PromptBuilder,
        config: &SessionConfig,
    ) -> Self {
        Self {
            generator,
            tts,
            voices,
            prompts,
            policy: RewindPolicy::from_config(config),
            scratch_dir: config.scratch_dir.clone(),
        }
    }

    /// Run in the background; the handle yields the result exactly once.
    pub fn spawn(self, input: RewindInput) -> RewindHandle {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = self.resolve(input).await;
            // The receiver is gone if the join already timed out.
            let _ = tx.send(result);
        });
        RewindHandle { rx }
    }

    /// One reasoning call, then (if there is a transition) one synthesis call.
    pub async fn resolve(&self, input: RewindInput) -> RewindResult {
        let t = input.interrupt_secs;
        let started = Instant::now();

        let Some(window) = input.transcript_window.as_deref() else {
            log::warn!("rewind: no transcript near {}, using fixed offset", format_timestamp(t));
            return RewindResult::fallback(self.policy.fallback(t), RewindOutcome::NoTranscript);
        };

        let prompt = self.prompts.rewind(&RewindRequest {
            interrupt_secs: t,
            window_secs: self.policy.window_secs,
            question: &input.question,
            interrupt_sentence: input.interrupt_sentence.as_deref(),
            transcript: window,
        });
        let reply = match self.generator.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("rewind: request failed, using fixed offset: {e}");
                return RewindResult::fallback(
                    self.policy.fallback(t),
                    RewindOutcome::RequestFailed,
                );
            }
        };

        let parsed = parse_rewind_reply(&reply);
        let (timestamp, outcome) = self.policy.decide(t, parsed.timestamp_secs);
        match outcome {
            RewindOutcome::Model => log::info!(
                "rewind: {} → {} ({:?}) in {:.2}s",
                format_timestamp(t),
                format_timestamp(timestamp),
                parsed.text_at_point.as_deref().unwrap_or(""),
                started.elapsed().as_secs_f64()
            ),
            _ => log::warn!(
                "rewind: model answer {outcome:?} ({:?}), using {}",
                reply.lines().next().unwrap_or(""),
                format_timestamp(timestamp)
            ),
        }

        let transition_clip = match parsed.transition.as_deref() {
            Some(text) => self.voice_transition(text).await,
            None => None,
        };

        RewindResult {
            resolved: true,
            timestamp_secs: Some(timestamp),
            transition_text: parsed.transition,
            transition_clip,
            outcome: Some(outcome),
        }
    }

    async fn voice_transition(&self, text: &str) -> Option<AudioClip> {
        let voice = {
            let mut rng = rand::thread_rng();
            self.voices.choose_random(&mut rng).cloned()
        };
        let Some(voice) = voice else {
            log::warn!("rewind: no voices configured, transition stays silent");
            return None;
        };

        let bytes = match self.tts.synthesize(&voice.voice_id, text).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("rewind: transition synthesis failed: {e}");
                return None;
            }
        };

        if let Some(dir) = &self.scratch_dir {
            let mut scratch = ScratchCopies::new(dir.clone());
            let name = format!("transition_{}.mp3", scratch.stamp);
            scratch.write(&name, &bytes).await;
        }

        log::debug!("rewind: transition voiced by {}", voice.speaker);
        Some(AudioClip {
            sequence_number: 0,
            bytes,
            source_text: text.to_string(),
            speaker_id: Some(voice.speaker),
        })
    }
}

// ---------------------------------------------------------------------------
// RewindHandle
// ---------------------------------------------------------------------------

/// Read side of the write-once result.
#[derive(Debug)]
pub struct RewindHandle {
    rx: oneshot::Receiver<RewindResult>,
}

impl RewindHandle {
    /// Wait up to `timeout`.  A resolver still running is left to finish on
    /// its own; its result is discarded.
    pub async fn join(self, timeout: Duration) -> RewindResult {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                log::warn!("rewind: resolver stopped without a result");
                RewindResult::unresolved()
            }
            Err(_) => {
                log::warn!("rewind: not ready after {timeout:?}, resuming in place");
                RewindResult::unresolved()
            }
        }
    }
}
