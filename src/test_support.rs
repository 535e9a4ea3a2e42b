//! Scripted stand-ins for every external collaborator, shared by the unit
//! tests of the conversation core.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::audio::{AudioOutput, ClipPlayer, PlaybackError};
use crate::config::SpeakerVoice;
use crate::llm::{ChatPrompt, DeltaStream, LlmError, TextGenerator};
use crate::player::{ControlError, PlaybackControl, PlaybackStatus};
use crate::stt::{SpeechCapture, SttError};
use crate::transcript::{Segment, SegmentTranscript};
use crate::tts::{SpeechSynthesizer, TtsError, VoiceTable};

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// A minute of "Acquired" around 224:46 (13486 s).
pub fn sample_transcript() -> SegmentTranscript {
    let lines = [
        (13440.0, "So let's talk about the data center business."),
        (13452.0, "Their share of accelerators is enormous."),
        (13464.0, "Analysts keep revising the numbers upward."),
        (13476.0, "Some say the share could reach 80 percent of training."),
        (13486.0, "maybe up to 50%. But this is going to be contested."),
        (13496.0, "AMD and the hyperscalers all want a piece."),
        (13520.0, "later stuff"),
    ];
    SegmentTranscript::from_segments(
        lines
            .iter()
            .map(|(start, text)| Segment {
                start: *start,
                duration: 8.0,
                text: (*text).to_string(),
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Voices
// ---------------------------------------------------------------------------

pub fn voices(names: &[&str]) -> Arc<VoiceTable> {
    Arc::new(VoiceTable::new(
        names
            .iter()
            .map(|n| SpeakerVoice {
                speaker: (*n).to_string(),
                voice_id: format!("voice-{}", n.to_lowercase()),
            })
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// Text generator
// ---------------------------------------------------------------------------

enum Reply {
    Deltas(Vec<String>),
    Fail,
}

/// Replays canned streaming replies in order; `complete` returns a fixed
/// answer after an optional delay.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    completion: Option<String>,
    completion_delay: Duration,
    prompts: Mutex<Vec<ChatPrompt>>,
    completions: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, deltas: &[&str]) -> Self {
        self.push(Reply::Deltas(deltas.iter().map(|d| d.to_string()).collect()))
    }

    pub fn failing_reply(self) -> Self {
        self.push(Reply::Fail)
    }

    pub fn completion(mut self, text: &str) -> Self {
        self.completion = Some(text.to_string());
        self
    }

    pub fn completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    fn push(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn prompts(&self) -> Vec<ChatPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn completion_calls(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn stream_chat(&self, prompt: &ChatPrompt) -> Result<DeltaStream, LlmError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Reply::Deltas(deltas)) => Ok(stream::iter(deltas.into_iter().map(Ok)).boxed()),
            Some(Reply::Fail) | None => Err(LlmError::Request("scripted failure".into())),
        }
    }

    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.completions.fetch_add(1, Ordering::SeqCst);
        if !self.completion_delay.is_zero() {
            tokio::time::sleep(self.completion_delay).await;
        }
        self.completion
            .clone()
            .ok_or_else(|| LlmError::Request("scripted failure".into()))
    }
}

// ---------------------------------------------------------------------------
// Speech synthesis
// ---------------------------------------------------------------------------

/// Returns the text's bytes as "audio" so playback order can be read back.
#[derive(Default)]
pub struct RecordingSynth {
    delays: HashMap<String, Duration>,
    failures: HashSet<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingSynth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay_for(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    pub fn fail_on(mut self, text: &str) -> Self {
        self.failures.insert(text.to_string());
        self
    }

    /// `(voice_id, text)` per call, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynth {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>, TtsError> {
        self.calls
            .lock()
            .unwrap()
            .push((voice_id.to_string(), text.to_string()));
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.contains(text) {
            return Err(TtsError::Api {
                status: 500,
                body: "scripted failure".into(),
            });
        }
        Ok(text.as_bytes().to_vec())
    }
}

// ---------------------------------------------------------------------------
// Audio output
// ---------------------------------------------------------------------------

/// Records what was played, with an optional per-clip delay.
#[derive(Clone, Default)]
pub struct RecordingOutput {
    played: Arc<Mutex<Vec<String>>>,
    opens: Arc<AtomicUsize>,
    open_players: Arc<AtomicUsize>,
    max_concurrent: Arc<AtomicUsize>,
    play_delay: Duration,
    fail_on: Option<String>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play_delay(mut self, delay: Duration) -> Self {
        self.play_delay = delay;
        self
    }

    pub fn fail_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Most players that were ever open at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }
}

impl AudioOutput for RecordingOutput {
    fn open(&self) -> Result<Box<dyn ClipPlayer>, PlaybackError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let now = self.open_players.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(RecordingPlayer {
            output: self.clone(),
        }))
    }
}

struct RecordingPlayer {
    output: RecordingOutput,
}

impl ClipPlayer for RecordingPlayer {
    fn play(&mut self, encoded: &[u8]) -> Result<(), PlaybackError> {
        let text = String::from_utf8_lossy(encoded).to_string();
        if self.output.fail_on.as_deref() == Some(text.as_str()) {
            return Err(PlaybackError::Decode("scripted failure".into()));
        }
        if !self.output.play_delay.is_zero() {
            std::thread::sleep(self.output.play_delay);
        }
        self.output.played.lock().unwrap().push(text);
        Ok(())
    }
}

impl Drop for RecordingPlayer {
    fn drop(&mut self) {
        self.output.open_players.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Speech capture
// ---------------------------------------------------------------------------

/// Hands out scripted utterances, then silence.
#[derive(Default)]
pub struct ScriptedCapture {
    utterances: Mutex<VecDeque<Result<Option<String>, SttError>>>,
    calls: AtomicUsize,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn says(self, text: &str) -> Self {
        self.utterances
            .lock()
            .unwrap()
            .push_back(Ok(Some(text.to_string())));
        self
    }

    pub fn fails(self) -> Self {
        self.utterances
            .lock()
            .unwrap()
            .push_back(Err(SttError::Transcription("scripted failure".into())));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechCapture for ScriptedCapture {
    fn capture(
        &self,
        _timeout: Duration,
        _phrase_limit: Option<Duration>,
    ) -> Result<Option<String>, SttError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.utterances.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

// ---------------------------------------------------------------------------
// Remote player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Status,
    Pause,
    Resume(Option<String>),
    Seek(u64),
}

/// Returns a fixed status and records every call.
#[derive(Default)]
pub struct ScriptedPlayer {
    status: Option<PlaybackStatus>,
    resume_result: bool,
    calls: Mutex<Vec<PlayerCall>>,
}

impl ScriptedPlayer {
    pub fn with_status(status: PlaybackStatus) -> Self {
        Self {
            status: Some(status),
            resume_result: true,
            calls: Mutex::default(),
        }
    }

    pub fn failing_status() -> Self {
        Self::default()
    }

    /// Resume reports "no active device".
    pub fn no_device(mut self) -> Self {
        self.resume_result = false;
        self
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change playback (everything but `Status`).
    pub fn control_calls(&self) -> Vec<PlayerCall> {
        self.calls()
            .into_iter()
            .filter(|c| *c != PlayerCall::Status)
            .collect()
    }
}

#[async_trait]
impl PlaybackControl for ScriptedPlayer {
    async fn status(&self) -> Result<PlaybackStatus, ControlError> {
        self.calls.lock().unwrap().push(PlayerCall::Status);
        self.status
            .clone()
            .ok_or_else(|| ControlError::Request("scripted failure".into()))
    }

    async fn pause(&self) -> Result<(), ControlError> {
        self.calls.lock().unwrap().push(PlayerCall::Pause);
        Ok(())
    }

    async fn resume(&self, device_id: Option<&str>) -> Result<bool, ControlError> {
        self.calls
            .lock()
            .unwrap()
            .push(PlayerCall::Resume(device_id.map(str::to_string)));
        Ok(self.resume_result)
    }

    async fn seek(&self, position_ms: u64) -> Result<(), ControlError> {
        self.calls.lock().unwrap().push(PlayerCall::Seek(position_ms));
        Ok(())
    }
}

/// A podcast episode playing at `position_ms`.
pub fn playing_episode(position_ms: u64) -> PlaybackStatus {
    PlaybackStatus {
        is_playing: true,
        is_podcast: true,
        episode: Some("Nvidia Part III".into()),
        show: Some("Acquired".into()),
        position_ms: Some(position_ms),
        duration_ms: Some(14_400_000),
        device_id: Some("dev-1".into()),
    }
}
