//! Energy-based voice activity detection for push-to-talk listening.
//!
//! Audio is judged in 30 ms frames (480 samples @ 16 kHz); a frame is
//! *voice* when its RMS exceeds the threshold.
//!
//! * [`UtteranceDetector`]: streaming endpointing.  Waits for speech onset
//!   (bounded), then records until enough trailing silence or the phrase
//!   limit.
//! * [`VadDetector::trim_silence`]: trims a finished clip before Whisper,
//!   which otherwise tends to hallucinate words into silence.

use std::collections::VecDeque;
use std::time::Duration;

use super::resample::STT_SAMPLE_RATE;

/// 30 ms at 16 kHz.
const FRAME_SIZE: usize = 480;
/// Audio kept from before onset so the first syllable isn't clipped.
const PRE_ROLL_FRAMES: usize = 10;

fn samples_for(d: Duration) -> usize {
    (d.as_secs_f64() * f64::from(STT_SAMPLE_RATE)) as usize
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

// ---------------------------------------------------------------------------
// VadDetector
// ---------------------------------------------------------------------------

/// Frame classifier and silence trimmer.
///
/// ```rust
/// use podchat::audio::VadDetector;
///
/// let vad = VadDetector::new(0.01);
/// let mut audio = vec![0.0_f32; 480];
/// audio.extend(vec![0.5_f32; 480]);
/// audio.extend(vec![0.0_f32; 480]);
/// assert_eq!(vad.trim_silence(&audio).len(), 480);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct VadDetector {
    rms_threshold: f32,
}

impl VadDetector {
    pub fn new(rms_threshold: f32) -> Self {
        Self { rms_threshold }
    }

    pub fn is_voice(&self, frame: &[f32]) -> bool {
        rms(frame) > self.rms_threshold
    }

    /// Sub-slice from the first to the last voice frame; empty if all silent.
    pub fn trim_silence<'a>(&self, audio: &'a [f32]) -> &'a [f32] {
        let voiced: Vec<usize> = audio
            .chunks(FRAME_SIZE)
            .enumerate()
            .filter(|(_, f)| self.is_voice(f))
            .map(|(i, _)| i)
            .collect();

        match (voiced.first(), voiced.last()) {
            (Some(&first), Some(&last)) => {
                let start = first * FRAME_SIZE;
                let end = ((last + 1) * FRAME_SIZE).min(audio.len());
                &audio[start..end]
            }
            _ => &audio[0..0],
        }
    }
}

// ---------------------------------------------------------------------------
// UtteranceDetector
// ---------------------------------------------------------------------------

/// Result of feeding audio to an [`UtteranceDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Keep feeding.
    Listening,
    /// No speech began within the onset timeout.
    TimedOut,
    /// An utterance finished; collect it with [`UtteranceDetector::take_utterance`].
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Speaking,
    Done(Endpoint),
}

/// Streaming onset / end-of-utterance detector over 16 kHz mono audio.
#[derive(Debug)]
pub struct UtteranceDetector {
    vad: VadDetector,
    onset_timeout: usize,
    trailing_silence: usize,
    phrase_limit: Option<usize>,
    phase: Phase,
    partial: Vec<f32>,
    pre_roll: VecDeque<Vec<f32>>,
    recorded: Vec<f32>,
    waited: usize,
    speech_len: usize,
    silence_run: usize,
}

impl UtteranceDetector {
    pub fn new(
        vad: VadDetector,
        onset_timeout: Duration,
        trailing_silence: Duration,
        phrase_limit: Option<Duration>,
    ) -> Self {
        Self {
            vad,
            onset_timeout: samples_for(onset_timeout),
            trailing_silence: samples_for(trailing_silence).max(1),
            phrase_limit: phrase_limit.map(samples_for),
            phase: Phase::Waiting,
            partial: Vec::with_capacity(FRAME_SIZE),
            pre_roll: VecDeque::with_capacity(PRE_ROLL_FRAMES),
            recorded: Vec::new(),
            waited: 0,
            speech_len: 0,
            silence_run: 0,
        }
    }

    pub fn has_onset(&self) -> bool {
        !matches!(self.phase, Phase::Waiting)
    }

    /// Feed 16 kHz mono samples.  Once a terminal endpoint is returned,
    /// further input is ignored and the same endpoint is repeated.
    pub fn feed(&mut self, samples: &[f32]) -> Endpoint {
        if let Phase::Done(end) = self.phase {
            return end;
        }
        self.partial.extend_from_slice(samples);

        while self.partial.len() >= FRAME_SIZE {
            let frame: Vec<f32> = self.partial.drain(..FRAME_SIZE).collect();
            self.step(frame);
            if let Phase::Done(end) = self.phase {
                self.partial.clear();
                return end;
            }
        }
        Endpoint::Listening
    }

    /// Stop early (e.g. the input stream ended).
    pub fn finish(&mut self) -> Endpoint {
        let end = match self.phase {
            Phase::Done(end) => end,
            Phase::Speaking => {
                self.recorded.append(&mut self.partial);
                Endpoint::Complete
            }
            Phase::Waiting => Endpoint::TimedOut,
        };
        self.phase = Phase::Done(end);
        end
    }

    /// The recorded utterance (pre-roll included).  Empty unless complete.
    pub fn take_utterance(&mut self) -> Vec<f32> {
        match self.phase {
            Phase::Done(Endpoint::Complete) => std::mem::take(&mut self.recorded),
            _ => Vec::new(),
        }
    }

    fn step(&mut self, frame: Vec<f32>) {
        let voice = self.vad.is_voice(&frame);
        let len = frame.len();

        match self.phase {
            Phase::Waiting if voice => {
                self.phase = Phase::Speaking;
                for f in self.pre_roll.drain(..) {
                    self.recorded.extend(f);
                }
                self.recorded.extend(frame);
                self.speech_len = len;
                self.silence_run = 0;
            }
            Phase::Waiting => {
                self.waited += len;
                if self.pre_roll.len() == PRE_ROLL_FRAMES {
                    self.pre_roll.pop_front();
                }
                self.pre_roll.push_back(frame);
                if self.waited >= self.onset_timeout {
                    self.phase = Phase::Done(Endpoint::TimedOut);
                }
            }
            Phase::Speaking => {
                self.recorded.extend(frame);
                self.speech_len += len;
                self.silence_run = if voice { 0 } else { self.silence_run + len };

                let limit_hit = self.phrase_limit.is_some_and(|max| self.speech_len >= max);
                if self.silence_run >= self.trailing_silence || limit_hit {
                    self.phase = Phase::Done(Endpoint::Complete);
                }
            }
            Phase::Done(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn detector(limit: Option<Duration>) -> UtteranceDetector {
        UtteranceDetector::new(VadDetector::new(0.01), ms(3000), ms(800), limit)
    }

    fn silence(ms: usize) -> Vec<f32> {
        vec![0.0; ms * 16]
    }

    fn voice(ms: usize) -> Vec<f32> {
        vec![0.3; ms * 16]
    }

    #[test]
    fn trim_silence_keeps_voiced_span() {
        let vad = VadDetector::new(0.01);
        let mut audio = silence(60);
        audio.extend(voice(90));
        audio.extend(silence(30));
        assert_eq!(vad.trim_silence(&audio).len(), 90 * 16);
        assert!(vad.trim_silence(&silence(90)).is_empty());
        assert!(vad.trim_silence(&[]).is_empty());
    }

    #[test]
    fn times_out_without_onset() {
        let mut d = detector(None);
        assert_eq!(d.feed(&silence(2990)), Endpoint::Listening);
        assert_eq!(d.feed(&silence(30)), Endpoint::TimedOut);
        assert!(!d.has_onset());
        assert!(d.take_utterance().is_empty());
    }

    #[test]
    fn completes_after_trailing_silence() {
        let mut d = detector(None);
        assert_eq!(d.feed(&silence(300)), Endpoint::Listening);
        assert_eq!(d.feed(&voice(1200)), Endpoint::Listening);
        assert!(d.has_onset());
        assert_eq!(d.feed(&silence(780)), Endpoint::Listening);
        assert_eq!(d.feed(&silence(30)), Endpoint::Complete);

        let audio = d.take_utterance();
        // pre-roll (300 ms) + voice + 810 ms of trailing silence
        assert_eq!(audio.len(), (300 + 1200 + 810) * 16);
    }

    #[test]
    fn onset_stops_the_timeout_clock() {
        let mut d = detector(None);
        d.feed(&silence(2000));
        d.feed(&voice(60));
        // Long speech past the onset window is fine.
        assert_eq!(d.feed(&voice(5000)), Endpoint::Listening);
    }

    #[test]
    fn phrase_limit_cuts_long_speech() {
        let mut d = detector(Some(ms(1500)));
        assert_eq!(d.feed(&voice(1470)), Endpoint::Listening);
        assert_eq!(d.feed(&voice(60)), Endpoint::Complete);
        assert!(!d.take_utterance().is_empty());
    }

    #[test]
    fn pauses_shorter_than_trailing_silence_continue() {
        let mut d = detector(None);
        d.feed(&voice(300));
        assert_eq!(d.feed(&silence(600)), Endpoint::Listening);
        assert_eq!(d.feed(&voice(300)), Endpoint::Listening);
        assert_eq!(d.feed(&silence(600)), Endpoint::Listening);
    }

    #[test]
    fn finish_mid_speech_completes() {
        let mut d = detector(None);
        d.feed(&voice(500));
        assert_eq!(d.finish(), Endpoint::Complete);
        assert_eq!(d.feed(&voice(100)), Endpoint::Complete);
        assert_eq!(d.take_utterance().len(), 500 * 16);
    }
}
