//! Speech-to-text: hear the listener's question.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │             SpeechCapture (trait)                     │
//! │                                                      │
//! │   ┌────────────────────┐    ┌──────────────┐        │
//! │   │ MicrophoneListener │───▶│ SttEngine     │        │
//! │   │ - cpal capture     │    │ WhisperEngine │        │
//! │   │ - endpointing      │    └──────────────┘        │
//! │   └────────────────────┘                             │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod listener;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use engine::{clean_transcript, SttEngine, SttError, WhisperEngine, WhisperParams};
pub use listener::{MicrophoneListener, SpeechCapture};
