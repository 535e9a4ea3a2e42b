//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Secrets may be left out of the file and supplied through the environment
//! instead (see [`AppConfig::apply_env`]).

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the text generator (host responses + rewind reasoning).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API endpoint.
    ///
    /// - Ollama: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key.  `None` for local providers.
    pub api_key: Option<String>,
    /// Model that voices the hosts.  Should be fast: it sits on the
    /// time-to-first-audio path.
    pub response_model: String,
    /// Model that picks the rewind point.  Runs in the background, so a
    /// slower, stronger model is fine.
    pub rewind_model: String,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f32,
    /// Token cap for a host response.
    pub response_max_tokens: u32,
    /// Token cap for the rewind answer (three short lines).
    pub rewind_max_tokens: u32,
    /// Maximum seconds to wait for a response before timing out.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            response_model: "gpt-4o-mini".into(),
            rewind_model: "gpt-4o".into(),
            temperature: 0.7,
            response_max_tokens: 400,
            rewind_max_tokens: 150,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the ElevenLabs text-to-speech service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Synthesis model (`eleven_turbo_v2_5` is the low-latency one).
    pub model_id: String,
    /// `0` (off) – `4` (max).  Trades quality for time-to-first-byte.
    pub optimize_streaming_latency: u8,
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".into(),
            api_key: None,
            model_id: "eleven_turbo_v2_5".into(),
            optimize_streaming_latency: 4,
            timeout_secs: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceConfig
// ---------------------------------------------------------------------------

/// One podcast host and the cloned voice that speaks for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerVoice {
    /// Name used in `[Name:]` speaker tags.
    pub speaker: String,
    /// Voice id at the TTS service.
    pub voice_id: String,
}

/// Speaker → voice mapping, produced by voice-clone enrollment.
///
/// The first entry is the default speaker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub hosts: Vec<SpeakerVoice>,
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine and microphone listening.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// GGML model file stem under the models directory (e.g. `"base.en"`).
    pub model: String,
    /// ISO-639-1 code, or `"auto"`.
    pub language: String,
    /// Seconds to wait for the listener to start speaking.
    pub listen_timeout_secs: u64,
    /// Hard cap on a single utterance; `None` = until trailing silence.
    pub phrase_limit_secs: Option<u64>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base.en".into(),
            language: "en".into(),
            listen_timeout_secs: 3,
            phrase_limit_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and voice-activity detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// RMS level above which a 30 ms frame counts as speech.
    pub vad_threshold: f32,
    /// Silence that ends an utterance, in milliseconds.
    pub trailing_silence_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            vad_threshold: 0.015,
            trailing_silence_ms: 800,
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerConfig
// ---------------------------------------------------------------------------

/// Remote player (Spotify Web API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub base_url: String,
    /// OAuth bearer token.  Obtaining/refreshing it is not podchat's job.
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.spotify.com/v1".into(),
            access_token: None,
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptConfig
// ---------------------------------------------------------------------------

/// Where the transcript of the current episode comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// JSON file of `{start, duration, text}` segments.  `None` = no
    /// transcript; the conversation runs without grounding.
    pub file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Tunables of the interrupt → talk → resume session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Out-of-band marker the model emits to end the conversation.
    pub exit_token: String,
    /// Sentence chunks shorter than this (in chars) are dropped as noise.
    pub min_chunk_chars: usize,
    /// How long resume waits for the rewind resolver.
    pub rewind_join_timeout_secs: u64,
    /// The rewind point must lie within this many seconds before the interrupt.
    pub rewind_window_secs: f64,
    /// Slack on both ends of the rewind window.
    pub rewind_tolerance_secs: f64,
    /// Rewind distance used whenever the model's answer is unusable.
    pub fallback_rewind_secs: f64,
    /// Transcript window for the sentence being spoken at interrupt time.
    pub interrupt_window_secs: u32,
    /// Transcript window used to ground host responses.
    pub grounding_window_secs: u32,
    /// Transcript window searched for the rewind point.
    pub rewind_search_window_secs: u32,
    /// Pause after seeking so the remote player settles before resume.
    pub seek_settle_ms: u64,
    /// Directory for debug copies of synthesized clips.  `None` = don't keep them.
    pub scratch_dir: Option<PathBuf>,
    /// Append every listener utterance to the transcription log.
    pub log_transcriptions: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exit_token: "[RETURN]".into(),
            min_chunk_chars: 4,
            rewind_join_timeout_secs: 10,
            rewind_window_secs: 30.0,
            rewind_tolerance_secs: 2.0,
            fallback_rewind_secs: 10.0,
            interrupt_window_secs: 5,
            grounding_window_secs: 30,
            rewind_search_window_secs: 45,
            seek_settle_ms: 200,
            scratch_dir: None,
            log_transcriptions: true,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Starts a conversation (e.g. `"F9"`).
    pub talk_key: String,
    /// Exits the program.
    pub quit_key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            talk_key: "F9".into(),
            quit_key: "Escape".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use podchat::config::AppConfig;
///
/// let mut config = AppConfig::load().unwrap();
/// config.apply_env();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub voices: VoiceConfig,
    pub stt: SttConfig,
    pub audio: AudioConfig,
    pub player: PlayerConfig,
    pub transcript: TranscriptConfig,
    pub session: SessionConfig,
    pub hotkey: HotkeyConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Fill unset secrets from the process environment.
    ///
    /// Values already present in the file win.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if is_unset(&self.llm.api_key) {
            self.llm.api_key = non_empty("LLM_API_KEY").or_else(|| non_empty("OPENAI_API_KEY"));
        }
        if is_unset(&self.tts.api_key) {
            self.tts.api_key = non_empty("ELEVENLABS_API_KEY");
        }
        if is_unset(&self.player.access_token) {
            self.player.access_token = non_empty("SPOTIFY_ACCESS_TOKEN");
        }
    }
}

fn is_unset(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
