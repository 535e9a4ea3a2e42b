//! Prompt builder for host responses and rewind reasoning.
//!
//! [`PromptBuilder`] constructs two kinds of prompts:
//! * **Host** (`host_turn`): the hosts answer the listener.  With more than
//!   one host the model is asked to tag each line `[Name:]`.
//! * **Rewind** (`rewind`): asks for the start of the interrupted thought plus
//!   a short transition line, in a fixed three-line format.
//!
//! Both host prompts tell the model to answer a bare acknowledgement with
//! nothing but the exit token.

use crate::llm::ChatPrompt;
use crate::transcript::format_timestamp;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Everything the host prompt may mention about the current turn.
#[derive(Debug, Clone, Default)]
pub struct HostTurn<'a> {
    pub question: &'a str,
    /// Listener utterances from earlier turns, oldest first.
    pub earlier_questions: &'a [String],
    pub episode: Option<&'a str>,
    pub interrupt_secs: Option<f64>,
    /// Transcript right around the interrupt.
    pub just_said: Option<&'a str>,
    /// Wider transcript window for grounding.
    pub earlier_context: Option<&'a str>,
}

/// Inputs of the rewind request.
#[derive(Debug, Clone)]
pub struct RewindRequest<'a> {
    pub interrupt_secs: f64,
    /// How far back the rewind point may lie.
    pub window_secs: f64,
    pub question: &'a str,
    /// What was being said at the interrupt, if known.
    pub interrupt_sentence: Option<&'a str>,
    /// `[M:SS] text` lines around the interrupt.
    pub transcript: &'a str,
}

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds chat prompts for one podcast and its set of hosts.
///
/// # Example
/// ```rust
/// use podchat::llm::PromptBuilder;
///
/// let builder = PromptBuilder::new("Acquired", vec!["Ben".into(), "David".into()], "[RETURN]");
/// assert!(builder.host_system().contains("[Ben:]"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    show: String,
    speakers: Vec<String>,
    exit_token: String,
}

impl PromptBuilder {
    pub fn new(show: impl Into<String>, speakers: Vec<String>, exit_token: impl Into<String>) -> Self {
        Self {
            show: show.into(),
            speakers,
            exit_token: exit_token.into(),
        }
    }

    pub fn is_multi_speaker(&self) -> bool {
        self.speakers.len() > 1
    }

    fn exit_rule(&self) -> String {
        format!(
            "IMPORTANT: If the listener's message is just an acknowledgment (like \"ok\", \"thanks\", \
             \"got it\", \"that makes sense\") with no follow-up question, output ONLY the token {} \
             to signal they want to return to the podcast. Say nothing else when you output it.",
            self.exit_token
        )
    }

    /// System message for the host response.
    pub fn host_system(&self) -> String {
        let first = self.speakers.first().map(String::as_str).unwrap_or("the host");

        if self.is_multi_speaker() {
            let second = &self.speakers[1];
            format!(
                "You are the hosts of the podcast \"{show}\". The hosts are: {list}.\n\
                 You are having a natural conversation with a listener who just paused the episode to ask you something.\n\
                 \n\
                 Format your response as a conversation between the hosts using speaker tags:\n\
                 [{first}:] First host says something brief\n\
                 [{second}:] Second host adds to it or responds\n\
                 [{first}:] First host continues...\n\
                 \n\
                 Style:\n\
                 - Natural back-and-forth, 1-2 sentences per host turn\n\
                 - Conversational and warm, like talking to a friend\n\
                 - Keep the whole response brief (3-5 exchanges max)\n\
                 - Match the tone of the actual podcast\n\
                 \n\
                 Pay special attention to what you were saying right when they paused; that is almost certainly what they are asking about.\n\
                 \n\
                 {rule}",
                show = self.show,
                list = self.speakers.join(", "),
                rule = self.exit_rule(),
            )
        } else {
            format!(
                "You are {first}, a host of the podcast \"{show}\".\n\
                 You are having a natural conversation with a listener who just paused the episode to ask you something.\n\
                 \n\
                 Style:\n\
                 - Conversational and warm, knowledgeable but not condescending\n\
                 - Brief (1-3 sentences): this is a quick back-and-forth, not a monologue\n\
                 - Match the tone of the actual podcast\n\
                 \n\
                 Pay special attention to what you were saying right when they paused; that is almost certainly what they are asking about.\n\
                 \n\
                 {rule}",
                show = self.show,
                rule = self.exit_rule(),
            )
        }
    }

    /// Full chat prompt for one listener turn.
    pub fn host_turn(&self, turn: &HostTurn<'_>) -> ChatPrompt {
        let mut user = String::new();

        if !turn.earlier_questions.is_empty() {
            user.push_str("Conversation so far:\n");
            for q in turn.earlier_questions {
                user.push_str(&format!("Listener: \"{q}\"\n"));
            }
            user.push('\n');
        }

        user.push_str(&format!("Listener's question: \"{}\"\n\n", turn.question));

        if let Some(episode) = turn.episode.filter(|e| !e.is_empty()) {
            user.push_str(&format!("Episode: {episode}\n"));
        }
        if let Some(t) = turn.interrupt_secs {
            user.push_str(&format!("Timestamp when interrupted: {}\n\n", format_timestamp(t)));
        }
        if let Some(text) = turn.just_said {
            user.push_str(&format!(
                "What you were JUST saying when the listener paused (most relevant):\n\"\"\"\n{text}\n\"\"\"\n\n"
            ));
        }
        if let Some(text) = turn.earlier_context {
            user.push_str(&format!(
                "Earlier context (what you discussed before):\n\"\"\"\n{text}\n\"\"\"\n\n"
            ));
        }

        if turn.earlier_questions.is_empty() {
            user.push_str(
                "The listener's question likely refers to what you were JUST saying when they interrupted. Respond naturally:",
            );
        } else {
            user.push_str("Continue the conversation naturally based on what you've discussed:");
        }

        ChatPrompt::new(self.host_system(), user)
    }

    /// Prompt asking for the rewind point and a transition line.
    pub fn rewind(&self, req: &RewindRequest<'_>) -> ChatPrompt {
        let interrupt = format_timestamp(req.interrupt_secs);
        let earliest = format_timestamp(req.interrupt_secs - req.window_secs);

        let system = format!(
            "You pick resume points for the podcast \"{}\". Answer in exactly the requested format.",
            self.show
        );

        let at_interrupt = req
            .interrupt_sentence
            .map(|text| format!("WHAT WAS BEING SAID AT INTERRUPT: \"{text}\"\n\n"))
            .unwrap_or_default();

        let user = format!(
            "Find the best rewind point for a podcast and create a smooth transition.\n\
             \n\
             INTERRUPT TIME: {interrupt}\n\
             VALID RANGE: Any timestamp between {earliest} and {interrupt}\n\
             \n\
             USER ASKED: \"{question}\"\n\
             \n\
             {at_interrupt}\
             TRANSCRIPT WITH TIMESTAMPS:\n\
             {transcript}\n\
             \n\
             TASK 1 - Find the rewind point:\n\
             Find where the current thought started. It MUST be at the start of a sentence, never mid-sentence. \
             Segments may hold several sentences: take the segment's timestamp and add your estimate of how many \
             seconds into it the sentence begins.\n\
             Example: [224:46] contains \"maybe up to 50%. But this is going to be...\"; \"But this is...\" starts \
             about 2 seconds in, so answer 224:48.\n\
             The timestamp MUST be between {earliest} and {interrupt}.\n\
             \n\
             TASK 2 - Write a transition:\n\
             One or two short sentences a host would say to return to the episode, like \
             \"Good question! Now, picking up where we left off...\"\n\
             \n\
             OUTPUT FORMAT (exactly 3 lines):\n\
             TIMESTAMP: M:SS\n\
             TEXT_AT_POINT: first few words at that timestamp\n\
             TRANSITION: your transition sentence",
            question = req.question,
            transcript = req.transcript,
        );

        ChatPrompt::new(system, user)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn solo() -> PromptBuilder {
        PromptBuilder::new("Acquired", vec!["Ben".into()], "[RETURN]")
    }

    fn duo() -> PromptBuilder {
        PromptBuilder::new("Acquired", vec!["Ben".into(), "David".into()], "[RETURN]")
    }

    #[test]
    fn single_host_prompt_has_no_tags() {
        let sys = solo().host_system();
        assert!(sys.contains("You are Ben"));
        assert!(!sys.contains("[Ben:]"));
        assert!(sys.contains("[RETURN]"));
    }

    #[test]
    fn multi_host_prompt_lists_tag_format() {
        let sys = duo().host_system();
        assert!(sys.contains("Ben, David"));
        assert!(sys.contains("[Ben:]"));
        assert!(sys.contains("[David:]"));
        assert!(sys.contains("[RETURN]"));
    }

    #[test]
    fn first_turn_prompt_includes_grounding() {
        let p = solo().host_turn(&HostTurn {
            question: "what's the market share?",
            episode: Some("Nvidia Part III"),
            interrupt_secs: Some(13486.0),
            just_said: Some("maybe up to 50%"),
            ..HostTurn::default()
        });
        assert!(p.user.contains("Listener's question: \"what's the market share?\""));
        assert!(p.user.contains("Episode: Nvidia Part III"));
        assert!(p.user.contains("Timestamp when interrupted: 224:46"));
        assert!(p.user.contains("maybe up to 50%"));
        assert!(!p.user.contains("Conversation so far"));
        assert!(p.user.ends_with("Respond naturally:"));
    }

    #[test]
    fn later_turn_prompt_replays_history() {
        let history = vec!["first?".to_string(), "second?".to_string()];
        let p = solo().host_turn(&HostTurn {
            question: "third?",
            earlier_questions: &history,
            ..HostTurn::default()
        });
        let so_far = p.user.find("Conversation so far").unwrap();
        let first = p.user.find("Listener: \"first?\"").unwrap();
        let second = p.user.find("Listener: \"second?\"").unwrap();
        assert!(so_far < first && first < second);
        assert!(p.user.contains("Continue the conversation"));
    }

    #[test]
    fn rewind_prompt_states_valid_range() {
        let p = solo().rewind(&RewindRequest {
            interrupt_secs: 13486.0,
            window_secs: 30.0,
            question: "what's the market share?",
            interrupt_sentence: Some("maybe up to 50%."),
            transcript: "[224:46] maybe up to 50%.",
        });
        assert!(p.user.contains("INTERRUPT TIME: 224:46"));
        assert!(p.user.contains("between 224:16 and 224:46"));
        assert!(p.user.contains("[224:46] maybe up to 50%."));
        assert!(p.user.contains("WHAT WAS BEING SAID AT INTERRUPT: \"maybe up to 50%.\""));
        assert!(p.user.contains("TRANSITION:"));
    }
}
