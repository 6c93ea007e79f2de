//! Streaming artifact composer.
//!
//! One human turn goes in; the model's tagged reply comes back as a live
//! sequence of cumulative `(message, artifact)` records.
//!
//! # Public API Overview
//! - [`TagStreamParser`] turns arbitrarily chunked reply text into channel
//!   updates and applies `<edit>` blocks against a baseline artifact.
//! - [`Composer`] drives one request end to end: history lookup, diffing,
//!   persistence, title generation, prompt assembly and streaming.
//! - [`StateSink`] receives every state change; [`JsonLinesSink`] writes them
//!   as newline-delimited JSON.
//! - [`ComposerConfig`] reads runtime settings from the environment.

pub mod compose;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod reconcile;
pub mod record;
pub mod sink;
pub mod tag_stream;
pub mod turns;

pub use crate::compose::{
    ComposeOutcome, Composer, ComposerSettings, DEFAULT_MAX_TOKENS, DEFAULT_TITLE_MAX_TOKENS,
};
pub use crate::config::{ComposerConfig, ConfigError, ProviderKind};
pub use crate::error::{ComposeError, TitleError};
pub use crate::history::{latest_artifact, previous_artifact};
pub use crate::reconcile::{is_similar, pretty_diff, reconcile, similarity};
pub use crate::record::{ComposeRequest, StreamRecord};
pub use crate::sink::{JsonLinesSink, NullSink, StateSink};
pub use crate::tag_stream::{
    Block, EditEvent, EditOutcome, FragmentOutcome, ParsedReply, SkipReason, TagStreamParser,
};
pub use crate::turns::{
    assemble_turns, clean_title, system_prompt, title_request, ArtifactFormat, LOGO_MARKER,
};
