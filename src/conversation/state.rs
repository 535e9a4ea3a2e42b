//! Session data model and the turn-loop state machine.
//!
//! [`ConversationSession`] is owned by the turn loop for exactly one
//! interrupt → talk → resume bracket and discarded afterwards.

use chrono::{DateTime, Local};

use super::snapshot::ContextSnapshot;

// ---------------------------------------------------------------------------
// ExitReason
// ---------------------------------------------------------------------------

/// Why a conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The listener said nothing within the listen timeout.
    Silence,
    /// The hosts emitted the exit token.
    ReturnSignal,
    /// The session could not continue (microphone failure, no voices).
    Error,
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::Silence => "silence",
            ExitReason::ReturnSignal => "return signal",
            ExitReason::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// TurnState
// ---------------------------------------------------------------------------

/// States of the turn loop.
///
/// ```text
/// AwaitingSpeech ──speech──▶ Generating ──first clip──▶ Playing ──drained──▶ AwaitingSpeech
/// AwaitingSpeech ──timeout / error──▶ Terminated
/// Generating / Playing ──exit token──▶ (drain) ──▶ Terminated(ReturnSignal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    AwaitingSpeech,
    Generating,
    Playing,
    Terminated(ExitReason),
}

impl TurnState {
    pub fn label(&self) -> &'static str {
        match self {
            TurnState::AwaitingSpeech => "Listening",
            TurnState::Generating => "Thinking",
            TurnState::Playing => "Speaking",
            TurnState::Terminated(_) => "Done",
        }
    }
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// One listener utterance and the hosts' reply.  Immutable once appended.
#[derive(Debug, Clone)]
pub struct Turn {
    pub user_text: String,
    /// Everything the generator produced, tags included.
    pub generated_text: String,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
}

// ---------------------------------------------------------------------------
// ConversationSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConversationSession {
    /// Playback position at interrupt, if a podcast was loaded.
    pub interrupt_timestamp: Option<f64>,
    pub was_playing: bool,
    pub device_ref: Option<String>,
    turns: Vec<Turn>,
    state: TurnState,
    exit_reason: Option<ExitReason>,
}

impl ConversationSession {
    pub fn new(snapshot: &ContextSnapshot) -> Self {
        Self {
            interrupt_timestamp: snapshot.interrupt_secs(),
            was_playing: snapshot.was_playing,
            device_ref: snapshot.device_id.clone(),
            turns: Vec::new(),
            state: TurnState::AwaitingSpeech,
            exit_reason: None,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit_reason
    }

    pub fn is_terminated(&self) -> bool {
        self.exit_reason.is_some()
    }

    /// Listener utterances so far, oldest first.
    pub fn user_questions(&self) -> Vec<String> {
        self.turns.iter().map(|t| t.user_text.clone()).collect()
    }

    pub(crate) fn set_state(&mut self, next: TurnState) {
        if self.is_terminated() {
            return;
        }
        if self.state != next {
            log::debug!("turn: {} → {}", self.state.label(), next.label());
        }
        self.state = next;
        if let TurnState::Terminated(reason) = next {
            self.exit_reason = Some(reason);
        }
    }

    pub(crate) fn terminate(&mut self, reason: ExitReason) {
        self.set_state(TurnState::Terminated(reason));
    }

    pub(crate) fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ConversationSession {
        ConversationSession::new(&ContextSnapshot::idle())
    }

    #[test]
    fn starts_awaiting_speech() {
        let s = session();
        assert_eq!(s.state(), TurnState::AwaitingSpeech);
        assert!(s.exit_reason().is_none());
        assert!(!s.was_playing);
    }

    #[test]
    fn first_termination_wins() {
        let mut s = session();
        s.set_state(TurnState::Generating);
        s.terminate(ExitReason::ReturnSignal);
        s.terminate(ExitReason::Error);
        s.set_state(TurnState::AwaitingSpeech);

        assert_eq!(s.exit_reason(), Some(ExitReason::ReturnSignal));
        assert_eq!(s.state(), TurnState::Terminated(ExitReason::ReturnSignal));
    }

    #[test]
    fn user_questions_in_order() {
        let mut s = session();
        for q in ["one?", "two?"] {
            let now = Local::now();
            s.push_turn(Turn {
                user_text: q.into(),
                generated_text: String::new(),
                started_at: now,
                ended_at: now,
            });
        }
        assert_eq!(s.user_questions(), vec!["one?".to_string(), "two?".to_string()]);
    }
}
