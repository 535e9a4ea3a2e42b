//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.  Call
//! [`AudioCapture::start`] to begin streaming [`AudioChunk`]s over an mpsc
//! channel; the returned [`StreamHandle`] stops the stream when dropped.
//! A capture is opened per listen, so the microphone is only live while the
//! listener is being asked for speech.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

use super::resample::{resample_to_16k, stereo_to_mono};

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// One buffer of interleaved `f32` samples as delivered by the cpal callback.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    /// Downmix and resample to what the STT engine expects.
    pub fn to_mono_16k(&self) -> Vec<f32> {
        let mono = stereo_to_mono(&self.samples, self.channels);
        resample_to_16k(&mono, self.sample_rate)
    }
}

/// Keeps the cpal stream alive; dropping it stops recording.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported input sample format: {0}")]
    SampleFormat(String),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Default input device plus its preferred stream configuration.
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
}

impl AudioCapture {
    /// Open the system default input device at its preferred configuration.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        log::debug!(
            "audio: input {} Hz x{} ({sample_format:?})",
            config.sample_rate.0,
            config.channels
        );

        Ok(Self {
            device,
            config,
            sample_format,
        })
    }

    /// Start recording and send [`AudioChunk`]s to `tx`.
    ///
    /// `f32` and `i16` devices are supported; `i16` is scaled to `[-1, 1]`.
    /// Send errors (receiver dropped) are ignored so the audio thread never
    /// panics.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let sample_rate = self.config.sample_rate.0;
        let channels = self.config.channels;
        let on_error = |err: cpal::StreamError| log::error!("audio: cpal stream error: {err}");

        let stream = match self.sample_format {
            cpal::SampleFormat::F32 => self.device.build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(AudioChunk {
                        samples: data.to_vec(),
                        sample_rate,
                        channels,
                    });
                },
                on_error,
                None,
            )?,
            cpal::SampleFormat::I16 => self.device.build_input_stream(
                &self.config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let _ = tx.send(AudioChunk {
                        samples: data.iter().map(|&s| f32::from(s) / 32_768.0).collect(),
                        sample_rate,
                        channels,
                    });
                },
                on_error,
                None,
            )?,
            other => return Err(CaptureError::SampleFormat(format!("{other:?}"))),
        };

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    #[test]
    fn chunk_converts_to_mono_16k() {
        let chunk = AudioChunk {
            samples: vec![0.2_f32; 960], // 10 ms stereo @ 48 kHz
            sample_rate: 48_000,
            channels: 2,
        };
        let out = chunk.to_mono_16k();
        assert_eq!(out.len(), 160);
        assert!((out[0] - 0.2).abs() < 1e-6);
    }
}
