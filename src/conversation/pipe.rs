//! Per-turn synthesis → playback pipe.
//!
//! ```text
//! turn loop ──submit(chunk)──▶ synthesize (await) ──Clip──▶ ┌──────────────┐
//!                                                           │ FIFO channel │──▶ playback worker
//! turn loop ──finish()──────────────────────────────End───▶ └──────────────┘    (spawn_blocking)
//! ```
//!
//! The producer side runs on the caller's task: one synthesis call per
//! chunk, awaited in submission order, so the clip queue is always in
//! sequence order.  The consumer is a blocking worker that opens the output
//! device on its first clip, plays clips back to back, and releases the
//! device when it sees the end marker.  Synthesis of the next sentence
//! overlaps playback of the current one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio::{AudioOutput, ClipPlayer, PlaybackError};
use crate::tts::{SpeechSynthesizer, VoiceTable};

use super::segmenter::SentenceChunk;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Synthesized audio for one chunk.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub sequence_number: u32,
    /// Encoded audio as returned by the synthesizer.
    pub bytes: Vec<u8>,
    pub source_text: String,
    pub speaker_id: Option<String>,
}

/// What happened to a submitted chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Queued,
    /// Synthesis failed or no voice was available; later chunks are unaffected.
    Skipped,
}

/// Summary of one turn's playback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Sequence numbers in the order they were played.
    pub played: Vec<u32>,
    /// Queued but not played (device or decode failure).
    pub failed: Vec<u32>,
    /// Never queued.
    pub skipped: Vec<u32>,
}

enum Item {
    Clip(AudioClip),
    End,
}

// ---------------------------------------------------------------------------
// SpeechPipe
// ---------------------------------------------------------------------------

/// One turn's producer/consumer pair.  Create with [`start`](Self::start),
/// feed with [`submit`](Self::submit), close with [`finish`](Self::finish).
pub struct SpeechPipe {
    tts: Arc<dyn SpeechSynthesizer>,
    voices: Arc<VoiceTable>,
    scratch: Option<ScratchCopies>,
    tx: mpsc::UnboundedSender<Item>,
    worker: JoinHandle<PlaybackReport>,
    skipped: Vec<u32>,
    queued: usize,
    opened_at: Instant,
}

impl SpeechPipe {
    /// Spawns the playback worker.  The device is not opened until the first
    /// clip arrives.
    pub fn start(
        tts: Arc<dyn SpeechSynthesizer>,
        voices: Arc<VoiceTable>,
        output: Arc<dyn AudioOutput>,
        scratch_dir: Option<PathBuf>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::task::spawn_blocking(move || playback_worker(output, rx));
        Self {
            tts,
            voices,
            scratch: scratch_dir.map(ScratchCopies::new),
            tx,
            worker,
            skipped: Vec::new(),
            queued: 0,
            opened_at: Instant::now(),
        }
    }

    /// Synthesize `chunk` and queue it behind everything submitted before.
    pub async fn submit(&mut self, chunk: SentenceChunk) -> SubmitOutcome {
        let seq = chunk.sequence_number;
        let Some(voice_id) = self.voices.voice_for(chunk.speaker_id.as_deref()) else {
            log::warn!(
                "pipe: no voice for speaker {:?}, skipping #{seq}",
                chunk.speaker_id
            );
            self.skipped.push(seq);
            return SubmitOutcome::Skipped;
        };

        let started = Instant::now();
        let bytes = match self.tts.synthesize(voice_id, &chunk.text).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("pipe: synthesis failed for #{seq}, skipping: {e}");
                self.skipped.push(seq);
                return SubmitOutcome::Skipped;
            }
        };
        log::info!(
            "pipe: #{seq} synthesized in {:.2}s ({} chars)",
            started.elapsed().as_secs_f64(),
            chunk.text.len()
        );
        if self.queued == 0 {
            log::info!(
                "pipe: first audio ready {:.2}s after turn start",
                self.opened_at.elapsed().as_secs_f64()
            );
        }

        if let Some(scratch) = &mut self.scratch {
            let name = format!("stream_{}_{seq}.mp3", scratch.stamp);
            scratch.write(&name, &bytes).await;
        }

        let clip = AudioClip {
            sequence_number: seq,
            bytes,
            source_text: chunk.text,
            speaker_id: chunk.speaker_id,
        };
        if self.tx.send(Item::Clip(clip)).is_err() {
            log::warn!("pipe: playback worker is gone, dropping #{seq}");
            self.skipped.push(seq);
            return SubmitOutcome::Skipped;
        }
        self.queued += 1;
        SubmitOutcome::Queued
    }

    /// Enqueue the end marker and wait until every queued clip has played.
    pub async fn finish(self) -> PlaybackReport {
        // Send fails only if the worker already stopped; joining covers that.
        let _ = self.tx.send(Item::End);
        let mut report = match self.worker.await {
            Ok(report) => report,
            Err(e) => {
                log::warn!("pipe: playback worker failed: {e}");
                PlaybackReport::default()
            }
        };
        report.skipped = self.skipped;
        report
    }
}

fn playback_worker(
    output: Arc<dyn AudioOutput>,
    mut rx: mpsc::UnboundedReceiver<Item>,
) -> PlaybackReport {
    let mut report = PlaybackReport::default();
    let mut player: Option<Box<dyn ClipPlayer>> = None;

    while let Some(item) = rx.blocking_recv() {
        let clip = match item {
            Item::Clip(clip) => clip,
            Item::End => break,
        };
        let seq = clip.sequence_number;

        if player.is_none() {
            match output.open() {
                Ok(p) => player = Some(p),
                Err(e) => {
                    log::warn!("pipe: cannot open output for #{seq}: {e}");
                    report.failed.push(seq);
                    continue;
                }
            }
        }
        let Some(device) = player.as_mut() else {
            continue;
        };

        log::debug!("pipe: playing #{seq} {:?}", clip.source_text);
        match device.play(&clip.bytes) {
            Ok(()) => report.played.push(seq),
            Err(e) => {
                log::warn!("pipe: playback of #{seq} failed: {e}");
                report.failed.push(seq);
            }
        }
    }

    // Dropping the player releases the device before the turn loop moves on.
    drop(player);
    report
}

/// Play one clip on its own short-lived device handle.
pub async fn play_once(output: Arc<dyn AudioOutput>, bytes: Vec<u8>) -> Result<(), PlaybackError> {
    tokio::task::spawn_blocking(move || output.open()?.play(&bytes))
        .await
        .map_err(|e| PlaybackError::Device(format!("playback task failed: {e}")))?
}

// ---------------------------------------------------------------------------
// Scratch copies
// ---------------------------------------------------------------------------

/// Best-effort copies of synthesized clips for debugging.
pub(crate) struct ScratchCopies {
    dir: PathBuf,
    pub(crate) stamp: String,
    ready: bool,
}

impl ScratchCopies {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            stamp: chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string(),
            ready: false,
        }
    }

    pub(crate) async fn write(&mut self, name: &str, bytes: &[u8]) {
        if !self.ready {
            if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
                log::debug!("pipe: scratch dir {} unavailable: {e}", self.dir.display());
                return;
            }
            self.ready = true;
        }
        let path = self.dir.join(name);
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            log::debug!("pipe: could not write {}: {e}", path.display());
        }
    }
}
