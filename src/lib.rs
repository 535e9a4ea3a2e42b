//! podchat: talk back to a podcast.
//!
//! Pause the episode, ask the hosts a question out loud, hear them answer in
//! their own (cloned) voices, and drop back into the episode at the start of
//! the thought you interrupted.
//!
//! The interesting part lives in [`conversation`]; everything else is an
//! adapter for one of its collaborators.

pub mod audio;
pub mod config;
pub mod conversation;
pub mod hotkey;
pub mod llm;
pub mod player;
pub mod stt;
pub mod transcript;
pub mod tts;

#[cfg(test)]
pub(crate) mod test_support;
