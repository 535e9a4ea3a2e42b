//! Audio in and out.
//!
//! # Input
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → to_mono_16k
//!           → UtteranceDetector (onset / trailing silence) → trim_silence → STT
//! ```
//!
//! # Output
//!
//! [`AudioOutput`] hands out a [`ClipPlayer`] that owns the output device for
//! as long as it lives; [`RodioOutput`] is the production implementation.

pub mod capture;
pub mod output;
pub mod resample;
pub mod vad;

pub use capture::{AudioCapture, AudioChunk, CaptureError, StreamHandle};
pub use output::{AudioOutput, ClipPlayer, PlaybackError, RodioOutput};
pub use resample::{resample_to_16k, stereo_to_mono, STT_SAMPLE_RATE};
pub use vad::{Endpoint, UtteranceDetector, VadDetector};
