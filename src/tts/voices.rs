//! Speaker → voice-id table.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{SpeakerVoice, VoiceConfig};

/// Ordered, read-only mapping from host name to TTS voice id.
///
/// The first entry is the default speaker.  Built once before a session and
/// shared by reference.
#[derive(Debug, Clone, Default)]
pub struct VoiceTable {
    entries: Vec<SpeakerVoice>,
}

impl VoiceTable {
    /// Entries with a blank name or voice id are skipped, as are repeated names.
    pub fn new(entries: Vec<SpeakerVoice>) -> Self {
        let mut kept: Vec<SpeakerVoice> = Vec::with_capacity(entries.len());
        for e in entries {
            let speaker = e.speaker.trim();
            let voice_id = e.voice_id.trim();
            if speaker.is_empty() || voice_id.is_empty() {
                continue;
            }
            if kept.iter().any(|k| k.speaker.eq_ignore_ascii_case(speaker)) {
                log::warn!("voices: duplicate speaker {speaker:?} ignored");
                continue;
            }
            kept.push(SpeakerVoice {
                speaker: speaker.to_string(),
                voice_id: voice_id.to_string(),
            });
        }
        Self { entries: kept }
    }

    pub fn from_config(config: &VoiceConfig) -> Self {
        Self::new(config.hosts.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Speaker tags are only parsed when more than one host is known.
    pub fn is_multi_speaker(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn speakers(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.speaker.clone()).collect()
    }

    pub fn default_speaker(&self) -> Option<&SpeakerVoice> {
        self.entries.first()
    }

    /// Voice for a speaker; `None` means the default speaker.
    pub fn voice_for(&self, speaker: Option<&str>) -> Option<&str> {
        match speaker {
            Some(name) => self
                .entries
                .iter()
                .find(|e| e.speaker.eq_ignore_ascii_case(name.trim()))
                .map(|e| e.voice_id.as_str()),
            None => self.default_speaker().map(|e| e.voice_id.as_str()),
        }
    }

    pub fn choose_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&SpeakerVoice> {
        self.entries.choose(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn voice(speaker: &str, id: &str) -> SpeakerVoice {
        SpeakerVoice {
            speaker: speaker.into(),
            voice_id: id.into(),
        }
    }

    #[test]
    fn first_entry_is_default() {
        let t = VoiceTable::new(vec![voice("Ben", "v1"), voice("David", "v2")]);
        assert_eq!(t.voice_for(None), Some("v1"));
        assert_eq!(t.voice_for(Some("david")), Some("v2"));
        assert!(t.is_multi_speaker());
    }

    #[test]
    fn blank_and_duplicate_entries_are_dropped() {
        let t = VoiceTable::new(vec![
            voice("Ben", "v1"),
            voice("", "v0"),
            voice("ben", "v9"),
            voice("David", " "),
        ]);
        assert_eq!(t.speakers(), vec!["Ben".to_string()]);
        assert!(!t.is_multi_speaker());
    }

    #[test]
    fn random_choice_comes_from_table() {
        let t = VoiceTable::new(vec![voice("Ben", "v1"), voice("David", "v2")]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let pick = t.choose_random(&mut rng).unwrap();
            assert!(pick.voice_id == "v1" || pick.voice_id == "v2");
        }
        assert!(VoiceTable::default().choose_random(&mut rng).is_none());
    }
}
