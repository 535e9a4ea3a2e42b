//! Text generation for the hosts.
//!
//! This module provides:
//! * [`TextGenerator`]: async trait for streamed host responses and one-shot
//!   rewind reasoning.
//! * [`ApiGenerator`]: OpenAI-compatible REST client (SSE streaming).
//! * [`PromptBuilder`]: host and rewind prompts.
//! * [`LlmError`]: error variants for LLM operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use podchat::config::AppConfig;
//! use podchat::llm::{ApiGenerator, HostTurn, PromptBuilder, TextGenerator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let generator = ApiGenerator::from_config(&config.llm);
//!     let prompts = PromptBuilder::new("Acquired", vec!["Ben".into()], "[RETURN]");
//!
//!     let prompt = prompts.host_turn(&HostTurn {
//!         question: "what did you mean by that?",
//!         ..HostTurn::default()
//!     });
//!     let mut deltas = generator.stream_chat(&prompt).await.unwrap();
//!     while let Some(delta) = deltas.next().await {
//!         print!("{}", delta.unwrap());
//!     }
//! }
//! ```

pub mod generator;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use generator::{ApiGenerator, ChatPrompt, DeltaStream, LlmError, SseDecoder, TextGenerator};
pub use prompt::{HostTurn, PromptBuilder, RewindRequest};
