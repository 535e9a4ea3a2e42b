//! Channel mixing and resampling for the STT path.
//!
//! Whisper wants **16 kHz mono `f32`**.  Microphones deliver whatever the
//! device prefers (commonly 44.1/48 kHz stereo), so every captured chunk goes
//! through [`stereo_to_mono`] then [`resample_to_16k`].  Linear interpolation
//! is plenty for speech recognition.

/// Sample rate expected by the STT engine.
pub const STT_SAMPLE_RATE: u32 = 16_000;

/// Average interleaved channels down to one.
///
/// Returns an empty vector for `channels == 0`; trailing samples that do not
/// form a whole frame are dropped.
///
/// ```rust
/// use podchat::audio::stereo_to_mono;
///
/// let mono = stereo_to_mono(&[0.5, -0.5, 0.2, 0.4], 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = usize::from(n);
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Linear-interpolation resample from `source_rate` to 16 kHz.
///
/// Output length is `ceil(len * 16000 / source_rate)`.
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    if source_rate == STT_SAMPLE_RATE || samples.is_empty() {
        return samples.to_vec();
    }
    if source_rate == 0 {
        return Vec::new();
    }

    let step = f64::from(source_rate) / f64::from(STT_SAMPLE_RATE);
    let out_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            match samples.get(idx + 1) {
                Some(next) => samples[idx] + (next - samples[idx]) * frac,
                None => samples[idx],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_passthrough_and_zero_channels() {
        assert_eq!(stereo_to_mono(&[0.1, 0.2], 1), vec![0.1, 0.2]);
        assert!(stereo_to_mono(&[0.1, 0.2], 0).is_empty());
    }

    #[test]
    fn incomplete_trailing_frame_is_dropped() {
        assert_eq!(stereo_to_mono(&[1.0, 1.0, 0.5], 2), vec![1.0]);
    }

    #[test]
    fn resample_48k_ten_ms() {
        let out = resample_to_16k(&vec![0.5_f32; 480], 48_000);
        assert_eq!(out.len(), 160);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn resample_44100_one_second() {
        let out = resample_to_16k(&vec![0.0_f32; 44_100], 44_100);
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn resample_upsamples_8k() {
        let input: Vec<f32> = (0..80).map(|i| i as f32).collect();
        let out = resample_to_16k(&input, 8_000);
        assert_eq!(out.len(), 160);
        // Midpoints land between neighbours.
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn resample_noop_at_16k() {
        let input = vec![0.25_f32; 160];
        assert_eq!(resample_to_16k(&input, 16_000), input);
    }
}
