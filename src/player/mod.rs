//! Remote media player control.
//!
//! The conversation core only ever talks to [`PlaybackControl`]; the
//! production adapter is [`SpotifyPlayer`].

pub mod spotify;

use async_trait::async_trait;
use thiserror::Error;

pub use spotify::SpotifyPlayer;

// ---------------------------------------------------------------------------
// PlaybackStatus
// ---------------------------------------------------------------------------

/// What the remote player reports right now.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackStatus {
    pub is_playing: bool,
    /// The current item is a podcast episode (not a music track).
    pub is_podcast: bool,
    pub episode: Option<String>,
    pub show: Option<String>,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    /// Opaque device reference to resume on.
    pub device_id: Option<String>,
}

impl PlaybackStatus {
    /// Nothing loaded on any device.
    pub fn idle() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// ControlError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("player request failed: {0}")]
    Request(String),

    #[error("player request timed out")]
    Timeout,

    #[error("player API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Playback control requires a premium account.
    #[error("playback control not permitted for this account")]
    Forbidden,

    #[error("failed to parse player response: {0}")]
    Parse(String),

    #[error("player is not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ControlError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ControlError::Timeout
        } else {
            ControlError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackControl
// ---------------------------------------------------------------------------

/// Pause / resume / seek / status on an external player.
#[async_trait]
pub trait PlaybackControl: Send + Sync {
    async fn status(&self) -> Result<PlaybackStatus, ControlError>;

    async fn pause(&self) -> Result<(), ControlError>;

    /// `Ok(false)` when there is no active device to resume on.
    async fn resume(&self, device_id: Option<&str>) -> Result<bool, ControlError>;

    async fn seek(&self, position_ms: u64) -> Result<(), ControlError>;
}
