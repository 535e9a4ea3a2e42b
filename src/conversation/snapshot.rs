//! What was playing, and what was being said, at the moment of interrupt.

use crate::config::SessionConfig;
use crate::player::{PlaybackControl, PlaybackStatus};
use crate::transcript::{format_timestamp, TranscriptSource};

/// Podcast-specific part of the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PodcastContext {
    pub show: String,
    pub episode: Option<String>,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    /// Short window: the sentence being spoken at interrupt time.
    pub interrupt_sentence: Option<String>,
    /// Medium window used to ground host responses.
    pub grounding: Option<String>,
    /// Extended `[M:SS] text` window searched for the rewind point.
    pub rewind_window: Option<String>,
}

impl PodcastContext {
    /// `M:SS / M:SS` (position / duration).
    pub fn position_label(&self) -> String {
        match self.duration_secs {
            Some(d) => format!("{} / {}", format_timestamp(self.position_secs), format_timestamp(d)),
            None => format_timestamp(self.position_secs),
        }
    }

    pub fn has_transcript(&self) -> bool {
        self.rewind_window.is_some()
    }
}

/// Immutable view of the player at interrupt time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    pub was_playing: bool,
    pub device_id: Option<String>,
    /// `None` when no podcast episode is loaded.
    pub podcast: Option<PodcastContext>,
}

impl ContextSnapshot {
    /// Nothing playing, no context.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Read the player once and look up the transcript around the position.
    ///
    /// A failing status call is treated as "nothing playing".
    pub async fn capture(
        player: &dyn PlaybackControl,
        transcript: &dyn TranscriptSource,
        config: &SessionConfig,
    ) -> Self {
        match player.status().await {
            Ok(status) => Self::from_status(&status, transcript, config),
            Err(e) => {
                log::warn!("snapshot: could not read playback status: {e}");
                Self::idle()
            }
        }
    }

    pub fn from_status(
        status: &PlaybackStatus,
        transcript: &dyn TranscriptSource,
        config: &SessionConfig,
    ) -> Self {
        let podcast = match (status.is_podcast, status.position_ms) {
            (true, Some(ms)) => {
                let t = ms as f64 / 1000.0;
                let lookup = transcript.has_transcript();
                Some(PodcastContext {
                    show: status.show.clone().unwrap_or_else(|| "Unknown Podcast".into()),
                    episode: status.episode.clone(),
                    position_secs: t,
                    duration_secs: status.duration_ms.map(|d| d as f64 / 1000.0),
                    interrupt_sentence: lookup
                        .then(|| transcript.text_near(t, config.interrupt_window_secs))
                        .flatten(),
                    grounding: lookup
                        .then(|| transcript.text_near(t, config.grounding_window_secs))
                        .flatten(),
                    rewind_window: lookup
                        .then(|| transcript.timestamped_window(t, config.rewind_search_window_secs))
                        .flatten(),
                })
            }
            _ => None,
        };

        if let Some(p) = &podcast {
            log::info!(
                "snapshot: {} at {}{}",
                p.show,
                p.position_label(),
                if p.has_transcript() { "" } else { " (no transcript)" }
            );
        }

        Self {
            was_playing: status.is_playing,
            device_id: status.device_id.clone(),
            podcast,
        }
    }

    pub fn interrupt_secs(&self) -> Option<f64> {
        self.podcast.as_ref().map(|p| p.position_secs)
    }

    pub fn show_name(&self) -> &str {
        self.podcast.as_ref().map_or("the podcast", |p| p.show.as_str())
    }
}
