//! Incremental sentence segmentation of a streamed host response.
//!
//! [`ResponseSegmenter`] consumes text deltas one at a time and yields
//! [`SentenceChunk`]s as soon as a sentence is known to be complete, so speech
//! synthesis can start long before the response has finished streaming.
//!
//! Rules:
//! * A sentence ends at a run of `.`, `!` or `?` (closing quotes/brackets
//!   included) that is followed by whitespace, or at the end of the stream.
//!   Waiting for the following character keeps the output identical however
//!   the deltas are split, and keeps `2.5` in one piece.
//! * With more than one known speaker, `[Name:]` tags switch the active
//!   speaker and close the previous speaker's sentence.  Text before the
//!   first tag has no speaker and is dropped.  Tags naming an unknown speaker
//!   are removed and the current speaker carries on.
//! * Chunks shorter than `min_chars` are dropped without using up a sequence
//!   number.
//! * The exit token is matched case-insensitively against everything received
//!   so far; once seen, nothing more is emitted.

/// Longest `[Name:]` tag considered, brackets included.
const MAX_TAG_CHARS: usize = 48;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One sentence of the response, in the voice of `speaker_id` (or the
/// default voice when `None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceChunk {
    pub speaker_id: Option<String>,
    pub text: String,
    /// Starts at 1 and increases by exactly 1 within a turn.
    pub sequence_number: u32,
}

/// Result of [`ResponseSegmenter::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segmented {
    Chunks(Vec<SentenceChunk>),
    /// The exit token arrived.  Returned once; later pushes yield no chunks.
    ExitRequested,
}

enum TagScan {
    Tag { name: String, byte_len: usize },
    Literal,
    Partial,
}

// ---------------------------------------------------------------------------
// ResponseSegmenter
// ---------------------------------------------------------------------------

/// Per-turn scanner state.  Create a new one for every response.
#[derive(Debug)]
pub struct ResponseSegmenter {
    speakers: Vec<String>,
    exit_token: String,
    min_chars: usize,

    lowered: String,
    search_from: usize,
    exited: bool,
    finished: bool,

    /// Unparsed tail; only ever holds an incomplete `[...` tag.
    raw: String,
    speaker: Option<String>,
    sentence: String,
    in_run: bool,
    next_seq: u32,
}

impl ResponseSegmenter {
    /// `speakers` are the known host names; tags are parsed only when there
    /// is more than one.
    pub fn new(speakers: &[String], exit_token: &str, min_chars: usize) -> Self {
        Self {
            speakers: speakers.to_vec(),
            exit_token: exit_token.to_lowercase(),
            min_chars,
            lowered: String::new(),
            search_from: 0,
            exited: false,
            finished: false,
            raw: String::new(),
            speaker: None,
            sentence: String::new(),
            in_run: false,
            next_seq: 1,
        }
    }

    pub fn is_multi_speaker(&self) -> bool {
        self.speakers.len() > 1
    }

    pub fn exit_requested(&self) -> bool {
        self.exited
    }

    /// Feed one delta.
    pub fn push(&mut self, delta: &str) -> Segmented {
        if self.exited || self.finished {
            return Segmented::Chunks(Vec::new());
        }
        if self.saw_exit_token(delta) {
            self.exited = true;
            self.raw.clear();
            self.sentence.clear();
            return Segmented::ExitRequested;
        }

        let mut out = Vec::new();
        if self.is_multi_speaker() {
            self.raw.push_str(delta);
            self.scan_tags(false, &mut out);
        } else {
            self.feed_text(delta, &mut out);
        }
        Segmented::Chunks(out)
    }

    /// End of stream: flush whatever is buffered.  Empty after an exit.
    pub fn finish(&mut self) -> Vec<SentenceChunk> {
        if self.exited || self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut out = Vec::new();
        if self.is_multi_speaker() {
            self.scan_tags(true, &mut out);
        }
        self.emit(&mut out);
        out
    }

    // -----------------------------------------------------------------------
    // Exit token
    // -----------------------------------------------------------------------

    fn saw_exit_token(&mut self, delta: &str) -> bool {
        if self.exit_token.is_empty() {
            return false;
        }
        self.lowered.push_str(&delta.to_lowercase());
        if self.lowered[self.search_from..].contains(&self.exit_token) {
            return true;
        }

        // Only a token straddling the next delta can still match.
        let mut from = self
            .lowered
            .len()
            .saturating_sub(self.exit_token.len().saturating_sub(1));
        while !self.lowered.is_char_boundary(from) {
            from -= 1;
        }
        self.search_from = from;
        false
    }

    // -----------------------------------------------------------------------
    // Speaker tags
    // -----------------------------------------------------------------------

    fn scan_tags(&mut self, at_end: bool, out: &mut Vec<SentenceChunk>) {
        loop {
            let Some(open) = self.raw.find('[') else {
                let text = std::mem::take(&mut self.raw);
                self.feed_text(&text, out);
                return;
            };

            let before: String = self.raw.drain(..open).collect();
            self.feed_text(&before, out);

            match classify_tag(&self.raw) {
                TagScan::Tag { name, byte_len } => {
                    self.raw.replace_range(..byte_len, "");
                    self.apply_tag(&name, out);
                }
                TagScan::Literal => {
                    self.raw.replace_range(..1, "");
                    self.feed_text("[", out);
                }
                TagScan::Partial if at_end => {
                    let text = std::mem::take(&mut self.raw);
                    self.feed_text(&text, out);
                    return;
                }
                TagScan::Partial => return,
            }
        }
    }

    fn apply_tag(&mut self, name: &str, out: &mut Vec<SentenceChunk>) {
        let known = self
            .speakers
            .iter()
            .find(|s| s.eq_ignore_ascii_case(name))
            .cloned();

        match known {
            Some(speaker) => {
                self.emit(out);
                self.speaker = Some(speaker);
            }
            None => log::debug!("segmenter: ignoring tag for unknown speaker {name:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Sentences
    // -----------------------------------------------------------------------

    fn feed_text(&mut self, text: &str, out: &mut Vec<SentenceChunk>) {
        for c in text.chars() {
            if self.in_run {
                if is_terminator(c) || is_closer(c) {
                    self.sentence.push(c);
                    continue;
                }
                self.in_run = false;
                if c.is_whitespace() {
                    self.emit(out);
                    continue;
                }
            } else if is_terminator(c) {
                self.in_run = true;
            }
            self.sentence.push(c);
        }
    }

    fn emit(&mut self, out: &mut Vec<SentenceChunk>) {
        self.in_run = false;
        let text = self.sentence.trim();
        let attributable = !self.is_multi_speaker() || self.speaker.is_some();

        if attributable && text.chars().count() >= self.min_chars {
            out.push(SentenceChunk {
                speaker_id: if self.is_multi_speaker() {
                    self.speaker.clone()
                } else {
                    None
                },
                text: text.to_string(),
                sequence_number: self.next_seq,
            });
            self.next_seq += 1;
        } else if !text.is_empty() {
            log::trace!("segmenter: dropped {text:?}");
        }
        self.sentence.clear();
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | '”' | '’')
}

/// Classify text starting at `[`.
fn classify_tag(rest: &str) -> TagScan {
    let body = &rest[1..];
    for (i, (idx, c)) in body.char_indices().enumerate() {
        if i + 2 > MAX_TAG_CHARS {
            return TagScan::Literal;
        }
        match c {
            ']' => {
                let inner = body[..idx].trim();
                return match inner.strip_suffix(':').map(str::trim) {
                    Some(name) if !name.is_empty() => TagScan::Tag {
                        name: name.to_string(),
                        byte_len: idx + 2,
                    },
                    _ => TagScan::Literal,
                };
            }
            '[' | '\n' => return TagScan::Literal,
            _ => {}
        }
    }
    TagScan::Partial
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
