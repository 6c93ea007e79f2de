//! `composer` command-line front end.
//!
//! ## Provider bootstrap
//!
//! The generative provider is chosen with `COMPOSER_PROVIDER`:
//!
//! - `mock` (default) answers with a scripted demo reply
//! - `chat-api` streams from an OpenAI-compatible chat-completions endpoint
//!
//! With `chat-api`, `COMPOSER_CHAT_API_CONFIG_PATH` must name a UTF-8 JSON file:
//!
//! ```json
//! {
//!   "api_key": "sk-...",
//!   "model": "gpt-4o-mini",
//!   "base_url": "https://api.openai.com/v1",
//!   "timeout_sec": 120
//! }
//! ```
//!
//! `base_url` and `timeout_sec` are optional; unknown fields are rejected.
//!
//! ## Output
//!
//! Every command prints JSON values one per line on stdout. `send` prints one
//! `{message, artifact}` record per state change while the reply streams.
//! Logs go to stderr, filtered by `COMPOSER_LOG`.

pub mod commands;
pub mod providers;
