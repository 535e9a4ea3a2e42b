//! Clip playback on the default output device via `rodio`.
//!
//! [`AudioOutput::open`] acquires the device and returns a [`ClipPlayer`];
//! dropping the player releases it.  The player is created on the thread that
//! uses it (rodio's `OutputStream` is not `Send`), so `open` is called from
//! inside the playback worker rather than handed across threads.

use std::io::Cursor;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no output device available: {0}")]
    Device(String),

    #[error("failed to decode clip: {0}")]
    Decode(String),
}

/// Plays encoded clips one at a time, blocking until each has finished.
pub trait ClipPlayer {
    fn play(&mut self, encoded: &[u8]) -> Result<(), PlaybackError>;
}

/// Factory for exclusive, scoped access to the output device.
pub trait AudioOutput: Send + Sync {
    fn open(&self) -> Result<Box<dyn ClipPlayer>, PlaybackError>;
}

// ---------------------------------------------------------------------------
// Rodio
// ---------------------------------------------------------------------------

/// Default-device output.
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioOutput;

impl AudioOutput for RodioOutput {
    fn open(&self) -> Result<Box<dyn ClipPlayer>, PlaybackError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Device(e.to_string()))?;
        Ok(Box::new(RodioPlayer {
            _stream: stream,
            handle,
        }))
    }
}

struct RodioPlayer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl ClipPlayer for RodioPlayer {
    fn play(&mut self, encoded: &[u8]) -> Result<(), PlaybackError> {
        if encoded.is_empty() {
            return Ok(());
        }
        let source = Decoder::new(Cursor::new(encoded.to_vec()))
            .map_err(|e| PlaybackError::Decode(e.to_string()))?;
        let sink = Sink::try_new(&self.handle).map_err(|e| PlaybackError::Device(e.to_string()))?;
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}
