//! Application entry point.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (writing defaults on first run) and apply
//!    environment overrides for secrets.
//! 3. Create the tokio runtime.
//! 4. Build the collaborators: transcript, Whisper, LLM, TTS, player, output.
//! 5. Start the hotkey listener thread.
//! 6. Serve hotkey commands until Quit or Ctrl-C.  One session at a time;
//!    presses made while a session runs are discarded.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use podchat::{
    audio::RodioOutput,
    config::{AppConfig, AppPaths},
    conversation::{Collaborators, SessionRunner, TranscriptionLog},
    hotkey::{HotkeyBindings, HotkeyCommand, HotkeyListener},
    llm::ApiGenerator,
    player::SpotifyPlayer,
    stt::{MicrophoneListener, SttEngine, SttError, WhisperEngine, WhisperParams},
    transcript::{NoTranscript, SegmentTranscript, TranscriptSource},
    tts::{ElevenLabsSynthesizer, VoiceTable},
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("podchat starting up");

    // 2. Configuration
    let paths = AppPaths::new();
    let first_run = !paths.settings_file.exists();
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if first_run {
        match config.save() {
            Ok(()) => log::info!("Wrote default settings to {}", paths.settings_file.display()),
            Err(e) => log::warn!("Could not write default settings: {e}"),
        }
    }
    // After the first-run save, so env secrets never land on disk.
    config.apply_env();

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Collaborators
    let transcript: Arc<dyn TranscriptSource> = match &config.transcript.file {
        Some(path) => match SegmentTranscript::load(path) {
            Ok(t) => Arc::new(t),
            Err(e) => {
                log::warn!("Transcript {} unavailable ({e}); no grounding", path.display());
                Arc::new(NoTranscript)
            }
        },
        None => Arc::new(NoTranscript),
    };

    let model_path = paths.whisper_model(&config.stt.model);
    let stt: Arc<dyn SttEngine> =
        match WhisperEngine::load(&model_path, WhisperParams::new(config.stt.language.clone())) {
            Ok(engine) => {
                log::info!("Whisper model loaded: {}", model_path.display());
                Arc::new(engine)
            }
            Err(e) => {
                log::warn!(
                    "Could not load Whisper model ({}): {e}. Speech capture will fail.",
                    model_path.display()
                );
                Arc::new(NoModelStt {
                    path: model_path.display().to_string(),
                })
            }
        };

    let voices = Arc::new(VoiceTable::from_config(&config.voices));
    if voices.is_empty() {
        log::warn!("No host voices configured under [voices]; sessions will end immediately");
    }

    let deps = Collaborators {
        player: Arc::new(SpotifyPlayer::from_config(&config.player)),
        transcript,
        capture: Arc::new(MicrophoneListener::new(stt, &config.audio)),
        generator: Arc::new(ApiGenerator::from_config(&config.llm)),
        tts: Arc::new(ElevenLabsSynthesizer::from_config(&config.tts)),
        output: Arc::new(RodioOutput),
        voices,
    };

    let mut runner = SessionRunner::new(deps, config.session.clone(), &config.stt);
    if config.session.log_transcriptions {
        runner = runner.with_transcription_log(TranscriptionLog::new(&paths.transcription_log));
    }

    // 5. Hotkeys
    let bindings = HotkeyBindings::from_config(&config.hotkey).unwrap_or_else(|e| {
        log::warn!("Invalid hotkey settings ({e}); using F9 / Escape");
        HotkeyBindings {
            talk: rdev::Key::F9,
            quit: rdev::Key::Escape,
        }
    });
    let (hotkey_tx, hotkey_rx) = mpsc::channel::<HotkeyCommand>(8);
    let _listener =
        HotkeyListener::start(bindings, hotkey_tx).context("failed to spawn hotkey thread")?;
    log::info!(
        "Ready: press {:?} to talk to the hosts, {:?} to quit",
        bindings.talk,
        bindings.quit
    );

    // 6. Serve
    rt.block_on(serve(runner, hotkey_rx));
    log::info!("podchat shutting down");
    Ok(())
}

async fn serve(runner: SessionRunner, mut commands: mpsc::Receiver<HotkeyCommand>) {
    loop {
        let command = tokio::select! {
            command = commands.recv() => command,
            _ = tokio::signal::ctrl_c() => None,
        };

        match command {
            Some(HotkeyCommand::Talk) => {
                let summary = runner.talk().await;
                log::info!(
                    "Session over ({}, {} turn(s), resumed: {})",
                    summary.exit_reason.label(),
                    summary.turns.len(),
                    summary.resume.resumed
                );
                let mut dropped = 0;
                while commands.try_recv().is_ok() {
                    dropped += 1;
                }
                if dropped > 0 {
                    log::debug!("Discarded {dropped} hotkey press(es) made during the session");
                }
            }
            Some(HotkeyCommand::Quit) | None => break,
        }
    }
}

// ---------------------------------------------------------------------------
// NoModelStt: stand-in SttEngine when the model file is missing
// ---------------------------------------------------------------------------

struct NoModelStt {
    path: String,
}

impl SttEngine for NoModelStt {
    fn transcribe(&self, _audio: &[f32]) -> Result<String, SttError> {
        Err(SttError::ModelNotFound(self.path.clone()))
    }
}
