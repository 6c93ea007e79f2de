//! Chat-completions backed implementation of the `generation` contract.
//!
//! Bridges the async `chat_api` transport into the blocking
//! `GenerationProvider` interface; each content delta is forwarded to the
//! fragment callback as soon as it is decoded.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chat_api::{
    ChatApiClient, ChatApiConfig, ChatApiError, ChatRequest, ChatStreamEvent, FinishReason,
    RequestMessage, StreamOutcome,
};
use generation::{
    is_cancelled, CancelSignal, FragmentCallback, FragmentRejected, GenerationError,
    GenerationOutput, GenerationProvider, GenerationRequest, ProviderInitError, ProviderProfile,
};
use serde::Deserialize;

/// Stable provider identifier used for startup selection.
pub const CHAT_API_PROVIDER_ID: &str = "chat-api";

/// Runtime configuration for the chat-api provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatApiProviderConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_key: String,
    model: String,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    timeout_sec: Option<u64>,
}

impl ChatApiProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads `{ "api_key", "model", "base_url"?, "timeout_sec"? }` from disk.
    pub fn load(path: &Path) -> Result<Self, ProviderInitError> {
        let raw = fs::read_to_string(path).map_err(|error| {
            ProviderInitError::new(format!(
                "failed to read chat-api config {}: {error}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw).map_err(|error| {
            ProviderInitError::new(format!("{}: {}", path.display(), error.message()))
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ProviderInitError> {
        let file: ConfigFile = serde_json::from_str(raw)
            .map_err(|error| ProviderInitError::new(format!("invalid chat-api config: {error}")))?;

        let api_key = file.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(ProviderInitError::new("chat-api config: 'api_key' must not be empty"));
        }
        let model = file.model.trim().to_string();
        if model.is_empty() {
            return Err(ProviderInitError::new("chat-api config: 'model' must not be empty"));
        }

        let mut config = Self::new(api_key, model);
        if let Some(base_url) = file.base_url.filter(|value| !value.trim().is_empty()) {
            config = config.with_base_url(base_url.trim());
        }
        match file.timeout_sec {
            Some(0) => {
                return Err(ProviderInitError::new(
                    "chat-api config: 'timeout_sec' must be greater than zero",
                ))
            }
            Some(seconds) => config = config.with_timeout(Duration::from_secs(seconds)),
            None => {}
        }
        Ok(config)
    }

    fn to_chat_api_config(&self) -> ChatApiConfig {
        let mut config = ChatApiConfig::new(self.api_key.clone());
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }
}

type DeltaHandler<'a> = dyn FnMut(&str) -> Result<(), ChatApiError> + 'a;

trait StreamClient: Send + Sync {
    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_delta: &mut DeltaHandler<'_>,
    ) -> Result<StreamOutcome, ChatApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: ChatApiClient,
    runtime: tokio::runtime::Runtime,
}

impl StreamClient for DefaultStreamClient {
    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_delta: &mut DeltaHandler<'_>,
    ) -> Result<StreamOutcome, ChatApiError> {
        self.runtime
            .block_on(
                self.client
                    .stream_with_handler(request, Some(cancel), |event| match event {
                        ChatStreamEvent::ContentDelta { delta } => on_delta(&delta),
                        _ => Ok(()),
                    }),
            )
    }
}

/// `GenerationProvider` backed by the chat-completions transport.
pub struct ChatApiProvider {
    model: String,
    stream_client: Arc<dyn StreamClient>,
}

impl ChatApiProvider {
    pub fn new(config: ChatApiProviderConfig) -> Result<Self, ProviderInitError> {
        let client = ChatApiClient::new(config.to_chat_api_config()).map_err(map_init_error)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                ProviderInitError::new(format!("failed to initialize tokio runtime: {error}"))
            })?;

        Ok(Self {
            model: config.model,
            stream_client: Arc::new(DefaultStreamClient { client, runtime }),
        })
    }

    fn chat_request(&self, request: &GenerationRequest) -> ChatRequest {
        let messages = request
            .turns
            .iter()
            .map(|turn| RequestMessage::new(turn.role.as_str(), turn.text.clone()))
            .collect();
        ChatRequest::new(self.model.clone(), messages).with_max_tokens(request.max_tokens)
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(model: &str, stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            model: model.to_string(),
            stream_client,
        }
    }
}

impl GenerationProvider for ChatApiProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: CHAT_API_PROVIDER_ID.to_string(),
            model_id: self.model.clone(),
        }
    }

    fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancelSignal,
        on_fragment: &mut FragmentCallback<'_>,
    ) -> Result<GenerationOutput, GenerationError> {
        if is_cancelled(&cancel) {
            return Err(GenerationError::Cancelled);
        }

        let chat_request = self.chat_request(&request);
        let mut text = String::new();
        let mut rejected: Option<FragmentRejected> = None;

        let result = self.stream_client.stream(&chat_request, &cancel, &mut |delta| {
            text.push_str(delta);
            on_fragment(delta).map_err(|rejection| {
                let reason = rejection.reason().to_string();
                rejected = Some(rejection);
                ChatApiError::Aborted(reason)
            })
        });

        match result {
            Ok(outcome) => {
                if !outcome.completed {
                    tracing::warn!(model = %self.model, "chat stream ended without a finish marker");
                }
                if outcome.finish_reason == Some(FinishReason::Length) {
                    tracing::warn!(
                        model = %self.model,
                        max_tokens = request.max_tokens,
                        "chat completion stopped at the token limit"
                    );
                }
                Ok(GenerationOutput { text })
            }
            Err(ChatApiError::Cancelled) => Err(GenerationError::Cancelled),
            Err(ChatApiError::Aborted(reason)) => Err(GenerationError::Rejected(
                rejected.unwrap_or_else(|| FragmentRejected::new(reason)),
            )),
            Err(error) => Err(GenerationError::failed(format!(
                "chat API request failed: {error}"
            ))),
        }
    }
}

fn map_init_error(error: ChatApiError) -> ProviderInitError {
    ProviderInitError::new(format!("failed to initialize chat-api provider: {error}"))
}
