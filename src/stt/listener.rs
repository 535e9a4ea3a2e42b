//! Listen for one spoken utterance and transcribe it.
//!
//! [`SpeechCapture`] is what the turn loop depends on.  It is blocking: the
//! caller runs it on a blocking thread.  [`MicrophoneListener`] opens the mic
//! for the duration of one call only.

use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use crate::audio::{AudioCapture, AudioChunk, Endpoint, UtteranceDetector, VadDetector};
use crate::config::AudioConfig;
use crate::stt::engine::{SttEngine, SttError, MIN_AUDIO_SAMPLES};

/// Blocking "wait for the listener to say something".
pub trait SpeechCapture: Send + Sync {
    /// `Ok(None)` when no speech started within `timeout` or nothing
    /// intelligible was said.
    fn capture(
        &self,
        timeout: Duration,
        phrase_limit: Option<Duration>,
    ) -> Result<Option<String>, SttError>;
}

/// Microphone + energy endpointing + Whisper.
pub struct MicrophoneListener {
    engine: Arc<dyn SttEngine>,
    vad: VadDetector,
    trailing_silence: Duration,
}

/// How often the receive loop wakes up when the device delivers nothing.
const POLL: Duration = Duration::from_millis(100);
/// Extra wall-clock slack over the onset timeout before giving up on a
/// stalled device.
const STALL_GRACE: Duration = Duration::from_secs(1);

impl MicrophoneListener {
    pub fn new(engine: Arc<dyn SttEngine>, audio: &AudioConfig) -> Self {
        Self {
            engine,
            vad: VadDetector::new(audio.vad_threshold),
            trailing_silence: Duration::from_millis(audio.trailing_silence_ms),
        }
    }

    fn record(
        &self,
        timeout: Duration,
        phrase_limit: Option<Duration>,
    ) -> Result<Option<Vec<f32>>, SttError> {
        let mut detector =
            UtteranceDetector::new(self.vad, timeout, self.trailing_silence, phrase_limit);

        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let capture = AudioCapture::new()?;
        let handle = capture.start(tx)?;
        let started = Instant::now();

        let endpoint = loop {
            match rx.recv_timeout(POLL) {
                Ok(chunk) => match detector.feed(&chunk.to_mono_16k()) {
                    Endpoint::Listening => {}
                    end => break end,
                },
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break detector.finish(),
            }
            if !detector.has_onset() && started.elapsed() > timeout + STALL_GRACE {
                log::warn!("stt: input device delivered too little audio, giving up");
                break detector.finish();
            }
        };
        drop(handle);

        match endpoint {
            Endpoint::Complete => Ok(Some(detector.take_utterance())),
            _ => Ok(None),
        }
    }
}

impl SpeechCapture for MicrophoneListener {
    fn capture(
        &self,
        timeout: Duration,
        phrase_limit: Option<Duration>,
    ) -> Result<Option<String>, SttError> {
        let Some(audio) = self.record(timeout, phrase_limit)? else {
            log::debug!("stt: no speech within {timeout:?}");
            return Ok(None);
        };

        let speech = self.vad.trim_silence(&audio);
        if speech.is_empty() {
            return Ok(None);
        }
        let text = self.engine.transcribe(&pad_to_minimum(speech))?;
        Ok((!text.is_empty()).then_some(text))
    }
}

/// Whisper rejects clips under half a second; short answers ("ok") are
/// padded with silence instead of being dropped.
fn pad_to_minimum(audio: &[f32]) -> Vec<f32> {
    let mut out = audio.to_vec();
    if out.len() < MIN_AUDIO_SAMPLES {
        out.resize(MIN_AUDIO_SAMPLES, 0.0);
    }
    out
}
