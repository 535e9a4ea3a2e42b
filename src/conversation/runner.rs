//! Session orchestrator: snapshot → pause → turn loop → resume.
//!
//! [`SessionRunner`] owns the collaborators and is created once at startup.
//! Each "talk" action opens an [`InterruptSession`], which owns the
//! [`ConversationSession`] for exactly one pause/resume bracket.
//!
//! # Turn flow
//!
//! ```text
//! AwaitingSpeech ── spawn_blocking(capture) ──▶ question
//!   ├─ None / error            → Terminated(Silence / Error)
//!   └─ text
//!        ├─ first turn: spawn RewindResolver (background)
//!        └─ stream_chat ─delta─▶ ResponseSegmenter ─chunk─▶ SpeechPipe.submit
//!             ├─ exit token → stop reading, pipe.finish → Terminated(ReturnSignal)
//!             └─ stream end → flush segmenter, pipe.finish → AwaitingSpeech
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use futures::StreamExt;

use crate::audio::AudioOutput;
use crate::config::{SessionConfig, SttConfig};
use crate::llm::{HostTurn, PromptBuilder, TextGenerator};
use crate::player::PlaybackControl;
use crate::stt::SpeechCapture;
use crate::transcript::TranscriptSource;
use crate::tts::{SpeechSynthesizer, VoiceTable};

use super::history::TranscriptionLog;
use super::pipe::{SpeechPipe, SubmitOutcome};
use super::resume::{ResumeOrchestrator, ResumeReport};
use super::rewind::{RewindHandle, RewindInput, RewindResolver};
use super::segmenter::{ResponseSegmenter, Segmented, SentenceChunk};
use super::snapshot::ContextSnapshot;
use super::state::{ConversationSession, ExitReason, Turn, TurnState};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Every external service the session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub player: Arc<dyn PlaybackControl>,
    pub transcript: Arc<dyn TranscriptSource>,
    pub capture: Arc<dyn SpeechCapture>,
    pub generator: Arc<dyn TextGenerator>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub output: Arc<dyn AudioOutput>,
    /// Read-only for the whole session.
    pub voices: Arc<VoiceTable>,
}

/// How a session ended.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub exit_reason: ExitReason,
    pub turns: Vec<Turn>,
    pub resume: ResumeReport,
}

// ---------------------------------------------------------------------------
// SessionRunner
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SessionRunner {
    deps: Collaborators,
    config: SessionConfig,
    listen_timeout: Duration,
    phrase_limit: Option<Duration>,
    transcription_log: Option<TranscriptionLog>,
}

impl SessionRunner {
    pub fn new(deps: Collaborators, session: SessionConfig, stt: &SttConfig) -> Self {
        Self {
            deps,
            config: session,
            listen_timeout: Duration::from_secs(stt.listen_timeout_secs),
            phrase_limit: stt.phrase_limit_secs.map(Duration::from_secs),
            transcription_log: None,
        }
    }

    pub fn with_transcription_log(mut self, log: TranscriptionLog) -> Self {
        self.transcription_log = Some(log);
        self
    }

    /// The whole "talk" action: snapshot, pause, converse, resume.
    pub async fn talk(&self) -> SessionSummary {
        let snapshot =
            ContextSnapshot::capture(&*self.deps.player, &*self.deps.transcript, &self.config)
                .await;

        if snapshot.was_playing {
            if let Err(e) = self.deps.player.pause().await {
                log::warn!("session: pause failed: {e}");
            }
        }

        let mut session = self.start_session(snapshot);
        session.run_turns().await;
        session.end_session().await
    }

    /// Open a session for an already captured snapshot.  The caller is
    /// responsible for pausing the player.
    pub fn start_session(&self, snapshot: ContextSnapshot) -> InterruptSession {
        let prompts = PromptBuilder::new(
            snapshot.show_name(),
            self.deps.voices.speakers(),
            self.config.exit_token.clone(),
        );
        log::info!(
            "session: started ({} host{}, {})",
            self.deps.voices.len(),
            if self.deps.voices.is_multi_speaker() { "s" } else { "" },
            if snapshot.was_playing { "was playing" } else { "nothing playing" }
        );
        InterruptSession {
            runner: self.clone(),
            session: ConversationSession::new(&snapshot),
            snapshot,
            prompts,
            rewind: None,
            rewind_started: false,
        }
    }

    fn scratch_dir(&self) -> Option<PathBuf> {
        self.config.scratch_dir.clone()
    }
}

// ---------------------------------------------------------------------------
// InterruptSession
// ---------------------------------------------------------------------------

pub struct InterruptSession {
    runner: SessionRunner,
    snapshot: ContextSnapshot,
    session: ConversationSession,
    prompts: PromptBuilder,
    rewind: Option<RewindHandle>,
    rewind_started: bool,
}

impl InterruptSession {
    /// Loop turns until the session terminates.
    pub async fn run_turns(&mut self) {
        while !self.session.is_terminated() {
            self.turn().await;
        }
        if let Some(reason) = self.session.exit_reason() {
            log::info!(
                "session: ended by {} after {} turn(s)",
                reason.label(),
                self.session.turns().len()
            );
        }
    }

    /// Join the resolver, hand playback back, and discard the session.
    pub async fn end_session(mut self) -> SessionSummary {
        // Only reachable without a reason if run_turns was never driven.
        let exit_reason = self.session.exit_reason().unwrap_or(ExitReason::Error);
        let deps = &self.runner.deps;
        let orchestrator =
            ResumeOrchestrator::new(deps.player.clone(), deps.output.clone(), &self.runner.config);
        let resume = orchestrator
            .resume(
                self.session.was_playing,
                self.session.device_ref.as_deref(),
                self.rewind.take(),
            )
            .await;
        SessionSummary {
            exit_reason,
            turns: self.session.turns().to_vec(),
            resume,
        }
    }

    async fn turn(&mut self) {
        self.session.set_state(TurnState::AwaitingSpeech);

        let Some(question) = self.listen().await else {
            return;
        };
        let started_at = Local::now();
        log::info!("turn: heard {question:?}");

        if let (Some(log), Some(podcast)) =
            (&self.runner.transcription_log, &self.snapshot.podcast)
        {
            log.record(podcast, &question).await;
        }

        if self.runner.deps.voices.is_empty() {
            log::warn!("turn: no host voices configured, cannot answer");
            self.session.terminate(ExitReason::Error);
            return;
        }

        if !self.rewind_started {
            self.rewind_started = true;
            self.start_rewind(&question);
        }

        let (generated_text, exit) = self.respond(&question).await;
        self.session.push_turn(Turn {
            user_text: question,
            generated_text,
            started_at,
            ended_at: Local::now(),
        });

        if exit {
            self.session.terminate(ExitReason::ReturnSignal);
        }
    }

    async fn listen(&mut self) -> Option<String> {
        let capture = self.runner.deps.capture.clone();
        let timeout = self.runner.listen_timeout;
        let limit = self.runner.phrase_limit;

        match tokio::task::spawn_blocking(move || capture.capture(timeout, limit)).await {
            Ok(Ok(Some(text))) => Some(text),
            Ok(Ok(None)) => {
                log::info!("turn: no speech within {timeout:?}");
                self.session.terminate(ExitReason::Silence);
                None
            }
            Ok(Err(e)) => {
                log::warn!("turn: speech capture failed: {e}");
                self.session.terminate(ExitReason::Error);
                None
            }
            Err(e) => {
                log::warn!("turn: capture task failed: {e}");
                self.session.terminate(ExitReason::Error);
                None
            }
        }
    }

    fn start_rewind(&mut self, question: &str) {
        if !self.snapshot.was_playing {
            return;
        }
        let Some(podcast) = self.snapshot.podcast.as_ref().filter(|p| p.has_transcript()) else {
            log::debug!("rewind: no podcast transcript, resolver not started");
            return;
        };

        let deps = &self.runner.deps;
        let resolver = RewindResolver::new(
            deps.generator.clone(),
            deps.tts.clone(),
            deps.voices.clone(),
            self.prompts.clone(),
            &self.runner.config,
        );
        self.rewind = Some(resolver.spawn(RewindInput {
            interrupt_secs: podcast.position_secs,
            question: question.to_string(),
            interrupt_sentence: podcast.interrupt_sentence.clone(),
            transcript_window: podcast.rewind_window.clone(),
        }));
        log::debug!("rewind: resolver started");
    }

    /// Stream the hosts' answer through the segmenter into the pipe.
    /// Returns the raw generated text and whether the exit token was seen.
    async fn respond(&mut self, question: &str) -> (String, bool) {
        self.session.set_state(TurnState::Generating);
        let started = Instant::now();

        let earlier = self.session.user_questions();
        let podcast = self.snapshot.podcast.as_ref();
        let prompt = self.prompts.host_turn(&HostTurn {
            question,
            earlier_questions: &earlier,
            episode: podcast.and_then(|p| p.episode.as_deref()),
            interrupt_secs: podcast.map(|p| p.position_secs),
            just_said: podcast.and_then(|p| p.interrupt_sentence.as_deref()),
            earlier_context: podcast.and_then(|p| p.grounding.as_deref()),
        });

        let deps = self.runner.deps.clone();
        let mut stream = match deps.generator.stream_chat(&prompt).await {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("turn: generation failed, skipping this answer: {e}");
                return (String::new(), false);
            }
        };

        let mut segmenter = ResponseSegmenter::new(
            &deps.voices.speakers(),
            &self.runner.config.exit_token,
            self.runner.config.min_chunk_chars,
        );
        let mut pipe = SpeechPipe::start(
            deps.tts.clone(),
            deps.voices.clone(),
            deps.output.clone(),
            self.runner.scratch_dir(),
        );

        let mut generated = String::new();
        let mut exit = false;
        while let Some(delta) = stream.next().await {
            let delta = match delta {
                Ok(delta) => delta,
                Err(e) => {
                    log::warn!("turn: response stream broke off: {e}");
                    break;
                }
            };
            if generated.is_empty() {
                log::info!(
                    "turn: first token after {:.2}s",
                    started.elapsed().as_secs_f64()
                );
            }
            generated.push_str(&delta);

            match segmenter.push(&delta) {
                Segmented::Chunks(chunks) => self.submit_all(&mut pipe, chunks).await,
                Segmented::ExitRequested => {
                    log::info!("turn: hosts signalled return to the episode");
                    exit = true;
                    break;
                }
            }
        }
        drop(stream);

        if !exit {
            let rest = segmenter.finish();
            self.submit_all(&mut pipe, rest).await;
        }

        let report = pipe.finish().await;
        log::info!(
            "turn: {} clip(s) played, {} skipped, {} failed in {:.2}s",
            report.played.len(),
            report.skipped.len(),
            report.failed.len(),
            started.elapsed().as_secs_f64()
        );
        (generated, exit)
    }

    async fn submit_all(&mut self, pipe: &mut SpeechPipe, chunks: Vec<SentenceChunk>) {
        for chunk in chunks {
            if pipe.submit(chunk).await == SubmitOutcome::Queued {
                self.session.set_state(TurnState::Playing);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PlaybackStatus;
    use crate::test_support::{
        playing_episode, sample_transcript, voices, PlayerCall, RecordingOutput, RecordingSynth,
        ScriptedCapture, ScriptedGenerator, ScriptedPlayer,
    };

    struct Rig {
        player: Arc<ScriptedPlayer>,
        capture: Arc<ScriptedCapture>,
        generator: Arc<ScriptedGenerator>,
        output: RecordingOutput,
        runner: SessionRunner,
    }

    fn rig(
        status: PlaybackStatus,
        capture: ScriptedCapture,
        generator: ScriptedGenerator,
        hosts: &[&str],
    ) -> Rig {
        let player = Arc::new(ScriptedPlayer::with_status(status));
        let capture = Arc::new(capture);
        let generator = Arc::new(generator);
        let output = RecordingOutput::new();
        let deps = Collaborators {
            player: player.clone(),
            transcript: Arc::new(sample_transcript()),
            capture: capture.clone(),
            generator: generator.clone(),
            tts: Arc::new(RecordingSynth::new()),
            output: Arc::new(output.clone()),
            voices: voices(hosts),
        };
        let config = SessionConfig {
            seek_settle_ms: 1,
            ..SessionConfig::default()
        };
        let runner = SessionRunner::new(deps, config, &SttConfig::default());
        Rig {
            player,
            capture,
            generator,
            output,
            runner,
        }
    }

    #[tokio::test]
    async fn silence_ends_session_and_resumes_in_place() {
        let r = rig(
            playing_episode(13_486_000),
            ScriptedCapture::new(),
            ScriptedGenerator::new(),
            &["Ben"],
        );
        let summary = r.runner.talk().await;

        assert_eq!(summary.exit_reason, ExitReason::Silence);
        assert!(summary.turns.is_empty());
        assert_eq!(
            r.player.control_calls(),
            vec![PlayerCall::Pause, PlayerCall::Resume(Some("dev-1".into()))]
        );
        assert_eq!(r.generator.completion_calls(), 0);
    }

    #[tokio::test]
    async fn conversation_until_return_signal() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("transcriptions.log");
        let mut r = rig(
            playing_episode(13_486_000),
            ScriptedCapture::new()
                .says("what's the market share?")
                .says("ok thanks"),
            ScriptedGenerator::new()
                .reply(&["Great ques", "tion. Let's dig", " in."])
                .reply(&["[return]"])
                .completion("TIMESTAMP: 224:30\nTRANSITION: Back to it."),
            &["Ben"],
        );
        r.runner = r
            .runner
            .clone()
            .with_transcription_log(TranscriptionLog::new(&log_path));

        let summary = r.runner.talk().await;

        assert_eq!(summary.exit_reason, ExitReason::ReturnSignal);
        assert_eq!(summary.turns.len(), 2);
        assert_eq!(summary.turns[0].generated_text, "Great question. Let's dig in.");
        assert_eq!(
            r.output.played(),
            vec!["Great question.", "Let's dig in.", "Back to it."]
        );
        assert_eq!(
            r.player.control_calls(),
            vec![
                PlayerCall::Pause,
                PlayerCall::Seek(13_470_000),
                PlayerCall::Resume(Some("dev-1".into()))
            ]
        );
        assert!(summary.resume.transition_played);
        assert_eq!(r.generator.completion_calls(), 1);
        assert_eq!(r.output.max_concurrent(), 1);

        let second_prompt = r
            .generator
            .prompts()
            .into_iter()
            .find(|p| p.user.contains("ok thanks"))
            .unwrap();
        assert!(second_prompt
            .user
            .contains("Listener: \"what's the market share?\""));

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("Your Speech: what's the market share?"));
        assert!(log.contains("Your Speech: ok thanks"));
    }

    #[tokio::test]
    async fn exit_token_mid_response_stops_further_chunks() {
        let r = rig(
            PlaybackStatus::default(),
            ScriptedCapture::new().says("cool"),
            ScriptedGenerator::new().reply(&["Sure thing. ", "[RETURN] And more.", " Even more."]),
            &["Ben"],
        );
        let summary = r.runner.talk().await;

        assert_eq!(summary.exit_reason, ExitReason::ReturnSignal);
        assert_eq!(r.output.played(), vec!["Sure thing."]);
    }

    #[tokio::test]
    async fn nothing_playing_never_touches_player_or_resolver() {
        let r = rig(
            PlaybackStatus::default(),
            ScriptedCapture::new().says("hi there"),
            ScriptedGenerator::new()
                .reply(&["Hello to you."])
                .completion("TIMESTAMP: 0:01"),
            &["Ben"],
        );
        let summary = r.runner.talk().await;

        assert_eq!(summary.exit_reason, ExitReason::Silence);
        assert_eq!(summary.resume, ResumeReport::default());
        assert!(r.player.control_calls().is_empty());
        assert_eq!(r.generator.completion_calls(), 0);
        assert_eq!(r.output.played(), vec!["Hello to you."]);
    }

    #[tokio::test]
    async fn generation_failure_only_ends_the_turn() {
        let r = rig(
            PlaybackStatus::default(),
            ScriptedCapture::new().says("first").says("second"),
            ScriptedGenerator::new().failing_reply().reply(&["Second answer."]),
            &["Ben"],
        );
        let summary = r.runner.talk().await;

        assert_eq!(summary.exit_reason, ExitReason::Silence);
        assert_eq!(summary.turns.len(), 2);
        assert!(summary.turns[0].generated_text.is_empty());
        assert_eq!(r.output.played(), vec!["Second answer."]);
        assert_eq!(r.capture.calls(), 3);
    }

    #[tokio::test]
    async fn capture_error_terminates_with_error() {
        let r = rig(
            playing_episode(60_000),
            ScriptedCapture::new().fails(),
            ScriptedGenerator::new(),
            &["Ben"],
        );
        let summary = r.runner.talk().await;

        assert_eq!(summary.exit_reason, ExitReason::Error);
        assert!(summary.resume.resumed);
    }

    #[tokio::test]
    async fn no_voices_terminates_after_first_utterance() {
        let r = rig(
            PlaybackStatus::default(),
            ScriptedCapture::new().says("hello").says("again"),
            ScriptedGenerator::new().reply(&["Never spoken."]),
            &[],
        );
        let summary = r.runner.talk().await;

        assert_eq!(summary.exit_reason, ExitReason::Error);
        assert_eq!(r.capture.calls(), 1);
        assert!(r.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn multi_host_answer_uses_each_voice() {
        let r = rig(
            PlaybackStatus::default(),
            ScriptedCapture::new().says("who's right?"),
            ScriptedGenerator::new().reply(&[
                "[Ben:] I think I am. [Da",
                "vid:] No, I am.",
            ]),
            &["Ben", "David"],
        );
        let summary = r.runner.talk().await;

        assert_eq!(summary.exit_reason, ExitReason::Silence);
        assert_eq!(r.output.played(), vec!["I think I am.", "No, I am."]);
    }
}
