use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};

use crate::config::ChatApiConfig;
use crate::error::{is_quota_exhausted, parse_error_message, ChatApiError};
use crate::events::{ChatStreamEvent, FinishReason};
use crate::headers::build_headers;
use crate::payload::ChatRequest;
use crate::retry::{is_retryable_http_error, retry_delay_ms, MAX_RETRIES};
use crate::sse::SseStreamParser;
use crate::url::normalize_chat_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct ChatApiClient {
    http: Client,
    config: ChatApiConfig,
}

/// How a stream ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Last finish reason reported by the server, if any.
    pub finish_reason: Option<FinishReason>,
    /// The server sent a finish reason or the `[DONE]` sentinel.
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct StreamResult {
    pub events: Vec<ChatStreamEvent>,
    pub outcome: StreamOutcome,
}

impl StreamResult {
    /// Concatenated content deltas.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                ChatStreamEvent::ContentDelta { delta } => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl ChatApiClient {
    pub fn new(config: ChatApiConfig) -> Result<Self, ChatApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ChatApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ChatApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_chat_url(&self.config.base_url)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, ChatApiError> {
        let headers = build_headers(&self.config)?;
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes())
                    .map_err(|_| ChatApiError::InvalidHeader(format!("invalid header key: {key}")))?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ChatApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, ChatApiError> {
        validate_request_payload(request)?;

        let headers = self.build_headers()?;
        let mut payload = request.clone();
        payload.stream = true;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(&payload))
    }

    pub async fn send_with_retry(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, ChatApiError> {
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }

            let response = self.build_request(request)?.send();
            let response = await_or_cancel(response, cancellation).await?;

            match response {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status);
                    let body = await_or_cancel(response.text(), cancellation)
                        .await?
                        .unwrap_or_default();
                    let message = parse_error_message(status, &body);
                    if is_quota_exhausted(&body) {
                        return Err(ChatApiError::QuotaExhausted { message });
                    }
                    last_error = Some(message.clone());

                    if attempt < MAX_RETRIES && is_retryable_http_error(status.as_u16(), &body) {
                        tracing::debug!(attempt, status = status.as_u16(), "retrying chat request");
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }

                    return Err(ChatApiError::Status(status, message));
                }
                Err(error) => {
                    let message = error.to_string();
                    last_error = Some(message);
                    if attempt < MAX_RETRIES {
                        tracing::debug!(attempt, error = %error, "retrying chat request after transport error");
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }
                }
            }
        }

        Err(ChatApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    /// Streams a completion, handing each normalized event to `on_event`.
    ///
    /// An `Err` from the handler stops reading and is returned as-is.
    pub async fn stream_with_handler<F>(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<StreamOutcome, ChatApiError>
    where
        F: FnMut(ChatStreamEvent) -> Result<(), ChatApiError>,
    {
        let response = self.send_with_retry(request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = SseStreamParser::default();
        let mut outcome = StreamOutcome::default();

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            let chunk = chunk.map_err(ChatApiError::from)?;
            for event in parser.feed(&chunk) {
                process_stream_event(event, &mut outcome, &mut on_event)?;
            }
        }

        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        Ok(outcome)
    }

    pub async fn stream(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<StreamResult, ChatApiError> {
        let mut events = Vec::new();
        let outcome = self
            .stream_with_handler(request, cancellation, |event| {
                events.push(event);
                Ok(())
            })
            .await?;

        Ok(StreamResult { events, outcome })
    }
}

fn validate_request_payload(request: &ChatRequest) -> Result<(), ChatApiError> {
    if request.model.trim().is_empty() {
        return Err(ChatApiError::InvalidRequestPayload(
            "'model' must not be empty".to_owned(),
        ));
    }
    if request.messages.is_empty() {
        return Err(ChatApiError::InvalidRequestPayload(
            "'messages' must contain at least one message".to_owned(),
        ));
    }
    Ok(())
}

fn process_stream_event<F>(
    event: ChatStreamEvent,
    outcome: &mut StreamOutcome,
    on_event: &mut F,
) -> Result<(), ChatApiError>
where
    F: FnMut(ChatStreamEvent) -> Result<(), ChatApiError>,
{
    match &event {
        ChatStreamEvent::Error { code, message } => {
            return Err(ChatApiError::StreamFailed {
                code: code.clone(),
                message: message
                    .clone()
                    .or_else(|| code.clone())
                    .unwrap_or_else(|| "chat completion failed".to_owned()),
            });
        }
        ChatStreamEvent::Finished { reason } => {
            outcome.finish_reason = *reason;
            outcome.completed = true;
        }
        ChatStreamEvent::Done => outcome.completed = true,
        ChatStreamEvent::ContentDelta { .. } => {}
    }

    on_event(event)
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, ChatApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(ChatApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(ChatApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{process_stream_event, StreamOutcome};
    use crate::error::ChatApiError;
    use crate::events::{ChatStreamEvent, FinishReason};
    use crate::sse::SseStreamParser;

    type Run = (Result<(), ChatApiError>, StreamOutcome, Vec<ChatStreamEvent>);

    fn run(events: Vec<ChatStreamEvent>) -> Run {
        let mut outcome = StreamOutcome::default();
        let mut observed = Vec::new();
        let mut result = Ok(());
        for event in events {
            result = process_stream_event(event, &mut outcome, &mut |event| {
                observed.push(event);
                Ok(())
            });
            if result.is_err() {
                break;
            }
        }
        (result, outcome, observed)
    }

    #[test]
    fn deltas_are_forwarded_in_parser_order() {
        let frames = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n",
        );
        let parsed = SseStreamParser::default().feed(frames.as_bytes());

        let (result, outcome, observed) = run(parsed);

        result.expect("deltas should process");
        assert!(!outcome.completed);
        assert_eq!(
            observed,
            vec![
                ChatStreamEvent::ContentDelta {
                    delta: "A".to_string(),
                },
                ChatStreamEvent::ContentDelta {
                    delta: "B".to_string(),
                },
            ]
        );
    }

    #[test]
    fn finish_reason_and_done_mark_completion() {
        let (result, outcome, _) = run(vec![
            ChatStreamEvent::Finished {
                reason: Some(FinishReason::Length),
            },
            ChatStreamEvent::Done,
        ]);

        result.expect("terminal events should process");
        assert!(outcome.completed);
        assert_eq!(outcome.finish_reason, Some(FinishReason::Length));
    }

    #[test]
    fn stream_error_event_fails_before_reaching_handler() {
        let (result, _, observed) = run(vec![
            ChatStreamEvent::ContentDelta {
                delta: "partial".to_owned(),
            },
            ChatStreamEvent::Error {
                code: Some("server_error".to_owned()),
                message: Some("boom".to_owned()),
            },
        ]);

        assert!(matches!(
            result,
            Err(ChatApiError::StreamFailed { ref message, .. }) if message == "boom"
        ));
        assert_eq!(observed.len(), 1);
    }

    #[test]
    fn handler_error_is_propagated() {
        let mut outcome = StreamOutcome::default();
        let result = process_stream_event(
            ChatStreamEvent::ContentDelta {
                delta: "x".to_owned(),
            },
            &mut outcome,
            &mut |_| Err(ChatApiError::Aborted("sink closed".to_owned())),
        );

        assert!(matches!(result, Err(ChatApiError::Aborted(reason)) if reason == "sink closed"));
    }
}
