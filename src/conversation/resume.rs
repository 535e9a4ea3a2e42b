//! Hand playback back to the external player.
//!
//! ```text
//! join resolver (bounded) → play transition clip → seek → settle → resume
//! ```
//!
//! Every step is attempted even if the one before it failed.

use std::sync::Arc;
use std::time::Duration;

use crate::audio::AudioOutput;
use crate::config::SessionConfig;
use crate::player::PlaybackControl;
use crate::transcript::format_timestamp;

use super::pipe::play_once;
use super::rewind::{RewindHandle, RewindResult};

/// What the resume step actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeReport {
    pub transition_played: bool,
    /// Position sent to the player, if a seek succeeded.
    pub seeked_to_ms: Option<u64>,
    /// The player confirmed playback resumed.
    pub resumed: bool,
}

pub struct ResumeOrchestrator {
    player: Arc<dyn PlaybackControl>,
    output: Arc<dyn AudioOutput>,
    join_timeout: Duration,
    settle: Duration,
}

impl ResumeOrchestrator {
    pub fn new(
        player: Arc<dyn PlaybackControl>,
        output: Arc<dyn AudioOutput>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            player,
            output,
            join_timeout: Duration::from_secs(config.rewind_join_timeout_secs),
            settle: Duration::from_millis(config.seek_settle_ms),
        }
    }

    /// Does nothing at all unless something was playing when the session
    /// began.
    pub async fn resume(
        &self,
        was_playing: bool,
        device_id: Option<&str>,
        rewind: Option<RewindHandle>,
    ) -> ResumeReport {
        if !was_playing {
            log::info!("resume: nothing was playing, leaving player alone");
            return ResumeReport::default();
        }

        let result = match rewind {
            Some(handle) => handle.join(self.join_timeout).await,
            None => RewindResult::unresolved(),
        };
        self.apply(&result, device_id).await
    }

    /// Steps 2-4 with an already joined result.
    pub async fn apply(&self, result: &RewindResult, device_id: Option<&str>) -> ResumeReport {
        let mut report = ResumeReport::default();

        if let Some(clip) = &result.transition_clip {
            log::info!("resume: playing transition {:?}", clip.source_text);
            match play_once(self.output.clone(), clip.bytes.clone()).await {
                Ok(()) => report.transition_played = true,
                Err(e) => log::warn!("resume: transition playback failed: {e}"),
            }
        }

        if let Some(ts) = result.timestamp_secs {
            let position_ms = (ts * 1000.0).round().max(0.0) as u64;
            match self.player.seek(position_ms).await {
                Ok(()) => {
                    log::info!("resume: seeked to {}", format_timestamp(ts));
                    report.seeked_to_ms = Some(position_ms);
                    tokio::time::sleep(self.settle).await;
                }
                Err(e) => log::warn!("resume: seek failed: {e}"),
            }
        }

        match self.player.resume(device_id).await {
            Ok(true) => report.resumed = true,
            Ok(false) => log::warn!("resume: no active device to resume on"),
            Err(e) => log::warn!("resume: resume failed: {e}"),
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::pipe::AudioClip;
    use crate::conversation::rewind::RewindOutcome;
    use crate::test_support::{PlayerCall, RecordingOutput, ScriptedPlayer};

    fn orchestrator(player: Arc<ScriptedPlayer>, output: RecordingOutput) -> ResumeOrchestrator {
        let config = SessionConfig {
            seek_settle_ms: 1,
            ..SessionConfig::default()
        };
        ResumeOrchestrator::new(player, Arc::new(output), &config)
    }

    fn resolved(ts: f64, transition: Option<&str>) -> RewindResult {
        RewindResult {
            resolved: true,
            timestamp_secs: Some(ts),
            transition_text: transition.map(str::to_string),
            transition_clip: transition.map(|t| AudioClip {
                sequence_number: 0,
                bytes: t.as_bytes().to_vec(),
                source_text: t.to_string(),
                speaker_id: Some("Ben".into()),
            }),
            outcome: Some(RewindOutcome::Model),
        }
    }

    #[tokio::test]
    async fn not_playing_means_no_player_calls() {
        let player = Arc::new(ScriptedPlayer::with_status(Default::default()));
        let output = RecordingOutput::new();
        let report = orchestrator(player.clone(), output.clone())
            .resume(false, Some("dev-1"), None)
            .await;

        assert_eq!(report, ResumeReport::default());
        assert!(player.calls().is_empty());
        assert_eq!(output.opens(), 0);
    }

    #[tokio::test]
    async fn plays_transition_then_seeks_then_resumes() {
        let player = Arc::new(ScriptedPlayer::with_status(Default::default()));
        let output = RecordingOutput::new();
        let report = orchestrator(player.clone(), output.clone())
            .apply(&resolved(13476.0, Some("Back to it.")), Some("dev-1"))
            .await;

        assert!(report.transition_played);
        assert_eq!(report.seeked_to_ms, Some(13_476_000));
        assert!(report.resumed);
        assert_eq!(output.played(), vec!["Back to it."]);
        assert_eq!(
            player.calls(),
            vec![
                PlayerCall::Seek(13_476_000),
                PlayerCall::Resume(Some("dev-1".into()))
            ]
        );
    }

    #[tokio::test]
    async fn unresolved_result_resumes_in_place() {
        let player = Arc::new(ScriptedPlayer::with_status(Default::default()));
        let report = orchestrator(player.clone(), RecordingOutput::new())
            .resume(true, None, None)
            .await;

        assert_eq!(report.seeked_to_ms, None);
        assert!(report.resumed);
        assert_eq!(player.calls(), vec![PlayerCall::Resume(None)]);
    }

    #[tokio::test]
    async fn missing_device_is_reported_not_fatal() {
        let player = Arc::new(ScriptedPlayer::with_status(Default::default()).no_device());
        let report = orchestrator(player.clone(), RecordingOutput::new())
            .apply(&resolved(12.4996, None), None)
            .await;

        assert_eq!(report.seeked_to_ms, Some(12_500));
        assert!(!report.resumed);
    }
}
