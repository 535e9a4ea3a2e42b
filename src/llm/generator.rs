//! Core `TextGenerator` trait and `ApiGenerator` implementation.
//!
//! `ApiGenerator` calls any OpenAI-compatible `/v1/chat/completions` endpoint:
//! Ollama (OpenAI mode), OpenAI, Groq, LM Studio, vLLM.
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.
//!
//! Streaming responses arrive as server-sent events; [`SseDecoder`] turns the
//! raw byte chunks into text deltas.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use thiserror::Error;

use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the text generator.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The endpoint answered with a non-success status.
    #[error("LLM API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned a response with no usable text content.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatPrompt
// ---------------------------------------------------------------------------

/// A system + user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

impl ChatPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Incremental text deltas of one streamed response, in generation order.
pub type DeltaStream = BoxStream<'static, Result<String, LlmError>>;

// ---------------------------------------------------------------------------
// TextGenerator trait
// ---------------------------------------------------------------------------

/// Async trait for the text generator behind the hosts.
///
/// Implementors must be `Send + Sync` so they can be shared between the turn
/// loop and the background rewind task (`Arc<dyn TextGenerator>`).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Start a streamed host response.
    ///
    /// Errors before the first byte are returned directly; errors mid-stream
    /// are yielded as an `Err` item.
    async fn stream_chat(&self, prompt: &ChatPrompt) -> Result<DeltaStream, LlmError>;

    /// One-shot request used for rewind reasoning.
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// SseDecoder
// ---------------------------------------------------------------------------

/// What one batch of bytes produced.
#[derive(Debug, Default, PartialEq)]
pub struct SseBatch {
    pub deltas: Vec<String>,
    /// `data: [DONE]` was seen; later bytes are ignored.
    pub finished: bool,
}

/// Line-oriented decoder for OpenAI-style `data: {...}` events.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// characters split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) -> SseBatch {
        let mut batch = SseBatch::default();
        if self.finished {
            batch.finished = true;
            return batch;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim();

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                self.finished = true;
                self.buffer.clear();
                batch.finished = true;
                break;
            }

            match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => {
                    if let Some(content) = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                    {
                        if !content.is_empty() {
                            batch.deltas.push(content);
                        }
                    }
                }
                Err(e) => log::debug!("llm: skipping unparseable SSE event ({e}): {data}"),
            }
        }

        batch
    }
}

// ---------------------------------------------------------------------------
// ApiGenerator
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// Streamed calls use `response_model`; one-shot calls use `rewind_model`.
pub struct ApiGenerator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ApiGenerator {
    /// Build an `ApiGenerator` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn body(&self, prompt: &ChatPrompt, model: &str, max_tokens: u32, stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model":       model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user",   "content": prompt.user   }
            ],
            "stream":      stream,
            "temperature": self.config.temperature,
            "max_tokens":  max_tokens
        })
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut req = self.client.post(&url).json(body);

        // Attach Authorization header only when api_key is a non-empty string.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

struct SseState {
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
}

#[async_trait]
impl TextGenerator for ApiGenerator {
    async fn stream_chat(&self, prompt: &ChatPrompt) -> Result<DeltaStream, LlmError> {
        let body = self.body(
            prompt,
            &self.config.response_model,
            self.config.response_max_tokens,
            true,
        );
        let response = self.post(&body).await?;
        log::debug!("llm: stream established ({})", self.config.response_model);

        let state = SseState {
            body: response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
            done: false,
        };

        let deltas = futures::stream::unfold(state, |mut st| async move {
            loop {
                if let Some(delta) = st.ready.pop_front() {
                    return Some((Ok(delta), st));
                }
                if st.done {
                    return None;
                }
                match st.body.next().await {
                    Some(Ok(bytes)) => {
                        let batch = st.decoder.feed(&bytes);
                        st.ready.extend(batch.deltas);
                        st.done = batch.finished;
                    }
                    Some(Err(e)) => {
                        st.done = true;
                        return Some((Err(LlmError::from(e)), st));
                    }
                    None => st.done = true,
                }
            }
        });

        Ok(deltas.boxed())
    }

    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        let body = self.body(
            prompt,
            &self.config.rewind_model,
            self.config.rewind_max_tokens,
            false,
        );
        let response = self.post(&body).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(LlmError::EmptyResponse)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
