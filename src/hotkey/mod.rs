//! Global hotkeys backed by `rdev`.
//!
//! Two keys matter: one starts a talk session, the other quits.  Only key
//! presses are forwarded, and a key held down (OS auto-repeat) counts once.
//!
//! `rdev::listen()` blocks forever, so [`HotkeyListener::start`] runs it on a
//! dedicated OS thread and forwards [`HotkeyCommand`]s over a tokio channel.
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use podchat::hotkey::{HotkeyBindings, HotkeyListener};
//!
//! let bindings = HotkeyBindings::parse("F9", "Escape").expect("unknown key");
//! let (tx, mut rx) = mpsc::channel(8);
//! let _listener = HotkeyListener::start(bindings, tx).expect("hotkey thread");
//! ```

pub mod listener;

use thiserror::Error;

use crate::config::HotkeyConfig;

pub use listener::HotkeyListener;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyCommand {
    /// Interrupt the episode and talk to the hosts.
    Talk,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("unknown key name {0:?}")]
    UnknownKey(String),

    #[error("talk and quit are both bound to {0:?}")]
    SameKey(String),
}

/// Resolved key bindings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotkeyBindings {
    pub talk: rdev::Key,
    pub quit: rdev::Key,
}

impl HotkeyBindings {
    pub fn parse(talk: &str, quit: &str) -> Result<Self, HotkeyError> {
        let talk_key = parse_key(talk).ok_or_else(|| HotkeyError::UnknownKey(talk.into()))?;
        let quit_key = parse_key(quit).ok_or_else(|| HotkeyError::UnknownKey(quit.into()))?;
        if talk_key == quit_key {
            return Err(HotkeyError::SameKey(talk.into()));
        }
        Ok(Self {
            talk: talk_key,
            quit: quit_key,
        })
    }

    pub fn from_config(config: &HotkeyConfig) -> Result<Self, HotkeyError> {
        Self::parse(&config.talk_key, &config.quit_key)
    }

    pub fn command_for(&self, key: rdev::Key) -> Option<HotkeyCommand> {
        if key == self.talk {
            Some(HotkeyCommand::Talk)
        } else if key == self.quit {
            Some(HotkeyCommand::Quit)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

const FUNCTION_KEYS: [rdev::Key; 12] = [
    rdev::Key::F1,
    rdev::Key::F2,
    rdev::Key::F3,
    rdev::Key::F4,
    rdev::Key::F5,
    rdev::Key::F6,
    rdev::Key::F7,
    rdev::Key::F8,
    rdev::Key::F9,
    rdev::Key::F10,
    rdev::Key::F11,
    rdev::Key::F12,
];

const LETTER_KEYS: [rdev::Key; 26] = [
    rdev::Key::KeyA,
    rdev::Key::KeyB,
    rdev::Key::KeyC,
    rdev::Key::KeyD,
    rdev::Key::KeyE,
    rdev::Key::KeyF,
    rdev::Key::KeyG,
    rdev::Key::KeyH,
    rdev::Key::KeyI,
    rdev::Key::KeyJ,
    rdev::Key::KeyK,
    rdev::Key::KeyL,
    rdev::Key::KeyM,
    rdev::Key::KeyN,
    rdev::Key::KeyO,
    rdev::Key::KeyP,
    rdev::Key::KeyQ,
    rdev::Key::KeyR,
    rdev::Key::KeyS,
    rdev::Key::KeyT,
    rdev::Key::KeyU,
    rdev::Key::KeyV,
    rdev::Key::KeyW,
    rdev::Key::KeyX,
    rdev::Key::KeyY,
    rdev::Key::KeyZ,
];

/// Key name from the config file, matched case-insensitively: `F1`..`F12`,
/// single letters, and a handful of named keys.
///
/// ```
/// use podchat::hotkey::parse_key;
///
/// assert_eq!(parse_key("f9"), Some(rdev::Key::F9));
/// assert_eq!(parse_key("Esc"), Some(rdev::Key::Escape));
/// assert_eq!(parse_key("Ctrl+T"), None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    let lower = name.trim().to_ascii_lowercase();

    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        return FUNCTION_KEYS.get(n.checked_sub(1)?).copied();
    }

    let mut chars = lower.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_lowercase() {
            return Some(LETTER_KEYS[(c as u8 - b'a') as usize]);
        }
    }

    match lower.as_str() {
        "escape" | "esc" => Some(rdev::Key::Escape),
        "space" => Some(rdev::Key::Space),
        "return" | "enter" => Some(rdev::Key::Return),
        "tab" => Some(rdev::Key::Tab),
        "pause" => Some(rdev::Key::Pause),
        "scrolllock" => Some(rdev::Key::ScrollLock),
        "printscreen" => Some(rdev::Key::PrintScreen),
        "home" => Some(rdev::Key::Home),
        "end" => Some(rdev::Key::End),
        "insert" => Some(rdev::Key::Insert),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_keys_any_case() {
        assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
        assert_eq!(parse_key("f1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("F12"), Some(rdev::Key::F12));
        assert_eq!(parse_key("F0"), None);
        assert_eq!(parse_key("F13"), None);
    }

    #[test]
    fn letters_and_named_keys() {
        assert_eq!(parse_key("a"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("Z"), Some(rdev::Key::KeyZ));
        assert_eq!(parse_key("Escape"), Some(rdev::Key::Escape));
        assert_eq!(parse_key(" enter "), Some(rdev::Key::Return));
        assert_eq!(parse_key("f"), Some(rdev::Key::KeyF));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("xyz"), None);
        assert_eq!(parse_key("1"), None);
    }

    #[test]
    fn default_bindings_parse() {
        let b = HotkeyBindings::from_config(&HotkeyConfig::default()).unwrap();
        assert_eq!(b.command_for(rdev::Key::F9), Some(HotkeyCommand::Talk));
        assert_eq!(b.command_for(rdev::Key::Escape), Some(HotkeyCommand::Quit));
        assert_eq!(b.command_for(rdev::Key::KeyA), None);
    }

    #[test]
    fn bindings_must_differ() {
        assert_eq!(
            HotkeyBindings::parse("F9", "f9"),
            Err(HotkeyError::SameKey("F9".into()))
        );
        assert_eq!(
            HotkeyBindings::parse("F99", "Escape"),
            Err(HotkeyError::UnknownKey("F99".into()))
        );
    }
}
