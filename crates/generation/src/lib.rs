//! Minimal provider-agnostic contract for one generative text call.
//!
//! This crate defines only the role-tagged prompt turns, the streaming
//! fragment callback, and the cancellation flag shared by every provider. It
//! excludes transport details, wire payloads, and orchestration concerns.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag for one generative call.
pub type CancelSignal = Arc<AtomicBool>;

/// Creates a fresh, unset cancellation flag.
#[must_use]
pub fn cancel_signal() -> CancelSignal {
    Arc::new(AtomicBool::new(false))
}

/// Returns true once the flag has been raised.
#[must_use]
pub fn is_cancelled(cancel: &CancelSignal) -> bool {
    cancel.load(Ordering::Acquire)
}

/// Error returned while constructing/configuring a provider before any call starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Author of one prompt turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl TurnRole {
    /// Wire name used by chat-style transports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged unit of conversational context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
        }
    }
}

/// Input required to start one generative call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub turns: Vec<Turn>,
    pub max_tokens: u32,
}

/// Final aggregate result of a completed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutput {
    pub text: String,
}

/// Returned by a fragment callback to stop the call early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRejected {
    reason: String,
}

impl FragmentRejected {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for FragmentRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for FragmentRejected {}

/// Failure of one generative call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The caller raised the cancellation flag before the call completed.
    Cancelled,
    /// The fragment callback rejected a fragment.
    Rejected(FragmentRejected),
    /// The provider or its transport failed.
    Failed(String),
}

impl GenerationError {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("generation was cancelled"),
            Self::Rejected(rejected) => write!(f, "fragment rejected: {rejected}"),
            Self::Failed(message) => write!(f, "generation failed: {message}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<FragmentRejected> for GenerationError {
    fn from(rejected: FragmentRejected) -> Self {
        Self::Rejected(rejected)
    }
}

/// Immutable metadata describing a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Per-fragment callback invoked in stream order.
pub type FragmentCallback<'a> = dyn FnMut(&str) -> Result<(), FragmentRejected> + 'a;

/// Provider interface for executing one generative call.
pub trait GenerationProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Executes a call, invoking `on_fragment` zero or more times with raw text.
    ///
    /// Fragments are delivered serially on the calling thread. A rejected
    /// fragment ends the call with [`GenerationError::Rejected`]; a raised
    /// `cancel` flag ends it with [`GenerationError::Cancelled`].
    fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancelSignal,
        on_fragment: &mut FragmentCallback<'_>,
    ) -> Result<GenerationOutput, GenerationError>;

    /// Executes a call without observing fragments and returns the final text.
    fn complete(
        &self,
        request: GenerationRequest,
        cancel: CancelSignal,
    ) -> Result<String, GenerationError> {
        self.generate(request, cancel, &mut |_| Ok(()))
            .map(|output| output.text)
    }
}
