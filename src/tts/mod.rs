//! Text-to-speech in the hosts' cloned voices.
//!
//! * [`SpeechSynthesizer`]: async trait, one call per sentence.
//! * [`ElevenLabsSynthesizer`]: ElevenLabs REST client.
//! * [`VoiceTable`]: read-only speaker → voice-id mapping for a session.

pub mod elevenlabs;
pub mod voices;

use async_trait::async_trait;
use thiserror::Error;

pub use elevenlabs::ElevenLabsSynthesizer;
pub use voices::VoiceTable;

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("TTS request failed: {0}")]
    Request(String),

    #[error("TTS request timed out")]
    Timeout,

    #[error("TTS API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("TTS returned no audio")]
    EmptyAudio,

    #[error("TTS is not configured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TtsError::Timeout
        } else {
            TtsError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer
// ---------------------------------------------------------------------------

/// Turns one piece of text into encoded audio (MP3/WAV) in a given voice.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>, TtsError>;
}
