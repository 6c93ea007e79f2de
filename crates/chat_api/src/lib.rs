//! Transport-only client for OpenAI-compatible chat completion endpoints.
//!
//! Owns request building, retry, and SSE normalization. Prompt assembly and
//! reply interpretation live with the callers.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::{CancellationSignal, ChatApiClient, StreamOutcome, StreamResult};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use events::{ChatStreamEvent, FinishReason};
pub use payload::{ChatRequest, RequestMessage};
pub use sse::SseStreamParser;
pub use url::normalize_chat_url;
