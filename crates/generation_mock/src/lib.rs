//! Deterministic scripted implementation of the shared `generation` contract.
//!
//! This crate contains no transport logic and is intended for local
//! development and scenario-level testing of the composer orchestrator.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use generation::{
    is_cancelled, CancelSignal, FragmentCallback, GenerationError, GenerationOutput,
    GenerationProvider, GenerationRequest, ProviderProfile, TurnRole,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// Outcome of one scripted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Streams every fragment, then completes with their concatenation.
    Reply(Vec<String>),
    /// Streams the fragments, then raises the caller's cancel flag and stops.
    CancelAfter(Vec<String>),
    /// Streams the fragments, then fails with the given message.
    FailAfter(Vec<String>, String),
}

impl Script {
    #[must_use]
    pub fn reply<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Reply(fragments.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn cancel_after<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::CancelAfter(fragments.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn fail_after<I, S>(fragments: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::FailAfter(
            fragments.into_iter().map(Into::into).collect(),
            message.into(),
        )
    }

    fn fragments(&self) -> &[String] {
        match self {
            Self::Reply(fragments)
            | Self::CancelAfter(fragments)
            | Self::FailAfter(fragments, _) => fragments,
        }
    }
}

/// Scripted provider used by composer tests and local runs.
///
/// Calls consume queued scripts in order; once the queue is empty the
/// fallback script (if any) answers every call. Requests that carry no
/// system turn are title requests and are answered with the title reply
/// when one is configured.
#[derive(Debug)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Option<Script>,
    title_reply: Option<String>,
    fragment_delay: Duration,
    observed: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    /// Creates a provider answering calls with `scripts` in order.
    #[must_use]
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            fallback: None,
            title_reply: None,
            fragment_delay: Duration::ZERO,
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Answers every call past the queued scripts with `script`.
    #[must_use]
    pub fn with_fallback(mut self, script: Script) -> Self {
        self.fallback = Some(script);
        self
    }

    /// Answers title requests (no system turn) with `title`.
    #[must_use]
    pub fn with_title_reply(mut self, title: impl Into<String>) -> Self {
        self.title_reply = Some(title.into());
        self
    }

    /// Sleeps between fragments to imitate a live stream.
    #[must_use]
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    /// Requests observed so far, in call order.
    #[must_use]
    pub fn observed_requests(&self) -> Vec<GenerationRequest> {
        lock_unpoisoned(&self.observed).clone()
    }

    /// Number of queued scripts not yet consumed.
    #[must_use]
    pub fn remaining_scripts(&self) -> usize {
        lock_unpoisoned(&self.scripts).len()
    }

    fn next_script(&self, request: &GenerationRequest) -> Option<Script> {
        let is_title_request = !request
            .turns
            .iter()
            .any(|turn| turn.role == TurnRole::System);
        if is_title_request {
            if let Some(title) = &self.title_reply {
                return Some(Script::Reply(vec![title.clone()]));
            }
        }

        lock_unpoisoned(&self.scripts)
            .pop_front()
            .or_else(|| self.fallback.clone())
    }

    const DEMO_FRAGMENT_DELAY_MS: u64 = 30;
}

impl Default for ScriptedProvider {
    /// Demo provider for local runs: a small markdown artifact plus explanation.
    fn default() -> Self {
        let reply = concat!(
            "<artifact>\n",
            "# Project Brief\n\n",
            "## Goals\n",
            "- Ship a first draft quickly.\n",
            "- Keep every section short and concrete.\n\n",
            "## Timeline\n",
            "1. Draft\n",
            "2. Review\n",
            "3. Publish\n",
            "</artifact>\n",
            "<explanation>\n",
            "I drafted a brief with goals and a three step timeline.\n",
            "</explanation>\n",
        );

        Self::new(Vec::new())
            .with_fallback(Script::Reply(split_tokens(reply)))
            .with_title_reply("Project brief draft")
            .with_fragment_delay(Duration::from_millis(Self::DEMO_FRAGMENT_DELAY_MS))
    }
}

impl GenerationProvider for ScriptedProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "scripted".to_string(),
        }
    }

    fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancelSignal,
        on_fragment: &mut FragmentCallback<'_>,
    ) -> Result<GenerationOutput, GenerationError> {
        let script = self.next_script(&request);
        lock_unpoisoned(&self.observed).push(request);

        let Some(script) = script else {
            return Err(GenerationError::failed("scripted provider has no script left"));
        };

        let mut text = String::new();
        for fragment in script.fragments() {
            if is_cancelled(&cancel) {
                return Err(GenerationError::Cancelled);
            }

            on_fragment(fragment)?;
            text.push_str(fragment);

            if !self.fragment_delay.is_zero() {
                thread::sleep(self.fragment_delay);
            }
        }

        match script {
            Script::Reply(_) if is_cancelled(&cancel) => Err(GenerationError::Cancelled),
            Script::Reply(_) => Ok(GenerationOutput { text }),
            Script::CancelAfter(_) => {
                cancel.store(true, std::sync::atomic::Ordering::Release);
                Err(GenerationError::Cancelled)
            }
            Script::FailAfter(_, message) => Err(GenerationError::Failed(message)),
        }
    }
}

/// Splits text into word-sized fragments, keeping trailing spaces/newlines.
#[must_use]
pub fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending_token = String::new();

    for ch in text.chars() {
        pending_token.push(ch);
        if matches!(ch, ' ' | '\n') {
            tokens.push(std::mem::take(&mut pending_token));
        }
    }

    if !pending_token.is_empty() {
        tokens.push(pending_token);
    }

    tokens
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use generation::{cancel_signal, Turn};

    use super::*;

    fn main_request() -> GenerationRequest {
        GenerationRequest {
            turns: vec![Turn::system("rules"), Turn::user("make a doc")],
            max_tokens: 64,
        }
    }

    fn title_request() -> GenerationRequest {
        GenerationRequest {
            turns: vec![Turn::user("title please")],
            max_tokens: 8,
        }
    }

    type Collected = (Vec<String>, Result<GenerationOutput, GenerationError>);

    fn collect(provider: &ScriptedProvider, request: GenerationRequest) -> Collected {
        let mut fragments = Vec::new();
        let result = provider.generate(request, cancel_signal(), &mut |fragment| {
            fragments.push(fragment.to_string());
            Ok(())
        });
        (fragments, result)
    }

    #[test]
    fn profile_exposes_mock_provider_identity() {
        let profile = ScriptedProvider::new(Vec::new()).profile();
        assert_eq!(profile.provider_id, MOCK_PROVIDER_ID);
        assert_eq!(profile.model_id, "scripted");
    }

    #[test]
    fn scripts_are_consumed_in_order() {
        let provider = ScriptedProvider::new(vec![
            Script::reply(["a", "b"]),
            Script::reply(["c"]),
        ]);

        let (first, output) = collect(&provider, main_request());
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(output.expect("first script replies").text, "ab");

        let (second, _) = collect(&provider, main_request());
        assert_eq!(second, vec!["c"]);
        assert_eq!(provider.remaining_scripts(), 0);
        assert_eq!(provider.observed_requests().len(), 2);
    }

    #[test]
    fn exhausted_queue_without_fallback_fails() {
        let provider = ScriptedProvider::new(Vec::new());
        let (_, result) = collect(&provider, main_request());
        assert!(matches!(result, Err(GenerationError::Failed(_))));
    }

    #[test]
    fn title_requests_use_title_reply_without_consuming_scripts() {
        let provider = ScriptedProvider::new(vec![Script::reply(["main"])])
            .with_title_reply("A title");

        let title = provider
            .complete(title_request(), cancel_signal())
            .expect("title reply");
        assert_eq!(title, "A title");
        assert_eq!(provider.remaining_scripts(), 1);
    }

    #[test]
    fn cancel_after_raises_flag_and_reports_cancellation() {
        let provider = ScriptedProvider::new(vec![Script::cancel_after(["<artifact>Hi"])]);
        let cancel = cancel_signal();
        let mut fragments = Vec::new();

        let error = provider
            .generate(main_request(), cancel.clone(), &mut |fragment| {
                fragments.push(fragment.to_string());
                Ok(())
            })
            .expect_err("script cancels");

        assert_eq!(fragments, vec!["<artifact>Hi"]);
        assert!(error.is_cancelled());
        assert!(is_cancelled(&cancel));
    }

    #[test]
    fn fail_after_streams_then_fails() {
        let provider = ScriptedProvider::new(vec![Script::fail_after(["x"], "boom")]);
        let (fragments, result) = collect(&provider, main_request());
        assert_eq!(fragments, vec!["x"]);
        assert_eq!(result, Err(GenerationError::Failed("boom".to_string())));
    }

    #[test]
    fn split_tokens_keeps_separators() {
        assert_eq!(split_tokens("one two\nthree"), vec!["one ", "two\n", "three"]);
    }

    #[test]
    fn demo_provider_streams_tagged_reply() {
        let provider = ScriptedProvider::default().with_fragment_delay(Duration::ZERO);
        let (fragments, output) = collect(&provider, main_request());
        let text = output.expect("demo replies").text;

        assert_eq!(fragments.concat(), text);
        assert!(text.contains("<artifact>"));
        assert!(text.contains("</explanation>"));
    }
}
