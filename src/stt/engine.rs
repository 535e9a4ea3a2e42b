//! Core STT engine trait and the Whisper implementation.
//!
//! [`SttEngine`] is object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn SttEngine>` by the listener.  [`WhisperEngine`] wraps a
//! `whisper_rs::WhisperContext`; construct it with [`WhisperEngine::load`].

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::audio::CaptureError;

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// Why a question could not be heard or transcribed.
#[derive(Debug, Error)]
pub enum SttError {
    #[error("whisper model not found: {0}")]
    ModelNotFound(String),

    #[error("whisper failed to initialise: {0}")]
    ContextInit(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Whisper needs at least [`MIN_AUDIO_SAMPLES`].
    #[error("audio shorter than half a second")]
    AudioTooShort,

    /// The microphone could not be opened or started.
    #[error("microphone unavailable: {0}")]
    Capture(#[from] CaptureError),
}

// ---------------------------------------------------------------------------
// SttEngine trait
// ---------------------------------------------------------------------------

/// Speech-to-text over one complete utterance of 16 kHz mono `f32` PCM.
pub trait SttEngine: Send + Sync {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError>;
}

/// 0.5 s × 16 000 Hz.
pub const MIN_AUDIO_SAMPLES: usize = 8_000;

// ---------------------------------------------------------------------------
// WhisperParams
// ---------------------------------------------------------------------------

/// Decoding settings for one Whisper run.  Greedy, single candidate: the
/// listener's question is short and latency matters more than beam search.
#[derive(Debug, Clone)]
pub struct WhisperParams {
    /// ISO-639-1 code, or `"auto"`.
    pub language: String,
    pub n_threads: i32,
}

impl WhisperParams {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            n_threads: optimal_threads(),
        }
    }
}

/// Available parallelism capped at 8; Whisper gains little beyond that.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Production STT engine.
///
/// A fresh `WhisperState` is created per call, so the engine can be shared
/// across threads without locking.
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: WhisperParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the model
// weights are read-only after loading.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model from `model_path`.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`]: `model_path` does not exist.
    /// - [`SttError::ContextInit`]: whisper-rs failed to load the file.
    pub fn load(model_path: impl AsRef<Path>, params: WhisperParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!("stt: loaded {}", path.display());
        Ok(Self { ctx, params })
    }
}

impl SttEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32]) -> Result<String, SttError> {
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Err(SttError::AudioTooShort);
        }

        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        let lang = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let seg = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            text.push_str(&seg);
        }

        log::debug!(
            "stt: {} samples transcribed in {} ms",
            audio.len(),
            started.elapsed().as_millis()
        );
        Ok(clean_transcript(&text))
    }
}

/// Trim, and treat Whisper's non-speech markers (`[BLANK_AUDIO]`,
/// `(music)`, ...) as nothing.
pub fn clean_transcript(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
