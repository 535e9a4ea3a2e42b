//! The interrupt → talk → resume core.
//!
//! # Architecture
//!
//! ```text
//! SessionRunner::talk
//!   ContextSnapshot ─▶ pause ─▶ InterruptSession::run_turns ─▶ end_session
//!
//!   each turn:   SpeechCapture ─▶ TextGenerator ─▶ ResponseSegmenter ─▶ SpeechPipe
//!                                                              (synth ─▶ FIFO ─▶ play)
//!   first turn:  RewindResolver (tokio task) ──oneshot──▶ ResumeOrchestrator
//!
//!   end_session: join (bounded) ─▶ transition clip ─▶ seek ─▶ resume
//! ```

pub mod history;
pub mod pipe;
pub mod resume;
pub mod rewind;
pub mod runner;
pub mod segmenter;
pub mod snapshot;
pub mod state;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use history::TranscriptionLog;
pub use pipe::{play_once, AudioClip, PlaybackReport, SpeechPipe, SubmitOutcome};
pub use resume::{ResumeOrchestrator, ResumeReport};
pub use rewind::{
    parse_rewind_reply, ParsedRewind, RewindHandle, RewindInput, RewindOutcome, RewindPolicy,
    RewindResolver, RewindResult,
};
pub use runner::{Collaborators, InterruptSession, SessionRunner, SessionSummary};
pub use segmenter::{ResponseSegmenter, Segmented, SentenceChunk};
pub use snapshot::{ContextSnapshot, PodcastContext};
pub use state::{ConversationSession, ExitReason, Turn, TurnState};
