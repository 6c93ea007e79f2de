//! Per-request driver for one human turn and the streamed AI reply.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use generation::{
    is_cancelled, CancelSignal, FragmentRejected, GenerationError, GenerationProvider,
    GenerationRequest,
};
use session_store::{ChatMessage, ChatStore, NewMessage, Role, Session};

use crate::error::{ComposeError, TitleError};
use crate::history::{latest_artifact, previous_artifact};
use crate::reconcile::{reconcile, similarity};
use crate::record::{ComposeRequest, StreamRecord};
use crate::sink::StateSink;
use crate::tag_stream::{ParsedReply, TagStreamParser};
use crate::turns::{assemble_turns, clean_title, title_request, ArtifactFormat};

pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_TITLE_MAX_TOKENS: u32 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposerSettings {
    pub max_tokens: u32,
    pub title_max_tokens: u32,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            title_max_tokens: DEFAULT_TITLE_MAX_TOKENS,
        }
    }
}

/// Everything a finished turn produced.
#[derive(Debug, Clone)]
pub struct ComposeOutcome {
    pub human: ChatMessage,
    pub ai: ChatMessage,
    /// Title stored by this request, if the session was untitled.
    pub title: Option<String>,
    pub reply: ParsedReply,
}

/// Drives requests against one store and one provider.
///
/// Requests for different sessions may run concurrently. A second request
/// for a session that already has one in flight is rejected.
pub struct Composer {
    store: Arc<dyn ChatStore>,
    provider: Arc<dyn GenerationProvider>,
    settings: ComposerSettings,
    in_flight: Mutex<HashSet<String>>,
}

impl Composer {
    pub fn new(store: Arc<dyn ChatStore>, provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            store,
            provider,
            settings: ComposerSettings::default(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_settings(mut self, settings: ComposerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> ComposerSettings {
        self.settings
    }

    pub fn store(&self) -> &dyn ChatStore {
        self.store.as_ref()
    }

    /// Runs one turn, streaming cumulative state to `sink`.
    ///
    /// The human message stays stored even when a later step fails. No AI
    /// message is stored unless the stream completes without cancellation.
    pub fn compose(
        &self,
        session_id: &str,
        request: &ComposeRequest,
        cancel: &CancelSignal,
        sink: &mut dyn StateSink,
    ) -> Result<ComposeOutcome, ComposeError> {
        request.validate()?;
        let _claim = self.claim(session_id)?;

        let previous_ai = previous_artifact(self.store.as_ref(), session_id, Some(Role::Ai))?;
        let diff = reconcile(&previous_ai, &request.artifact);
        tracing::debug!(
            session_id,
            diff_len = diff.len(),
            similarity = similarity(&previous_ai, &request.artifact),
            "reconciled submitted artifact"
        );

        let human = self.store.insert_message(
            NewMessage::new(session_id, Role::Human)
                .with_content(&request.content)
                .with_doc(&request.artifact)
                .with_diff(diff)
                .with_selected_text(&request.selected_text),
        )?;
        tracing::info!(session_id, message_id = %human.id, "stored human message");

        let session = self.store.get_session(session_id)?;
        let title = if session.is_untitled() {
            match self.generate_title(session, &request.content, cancel) {
                Ok(title) => Some(title),
                Err(error) => {
                    tracing::warn!(session_id, %error, "session left untitled");
                    None
                }
            }
        } else {
            None
        };

        let history = self.store.list_messages(session_id)?;
        let turns = assemble_turns(
            &history,
            ArtifactFormat::for_editor(request.is_document_editor),
        );
        let baseline = latest_artifact(&history, None).to_string();

        let reply = self.stream_reply(
            GenerationRequest {
                turns,
                max_tokens: self.settings.max_tokens,
            },
            baseline,
            cancel,
            sink,
        )?;

        let ai = self.store.insert_message(
            NewMessage::new(session_id, Role::Ai)
                .with_content(&reply.message)
                .with_doc(&reply.complete_artifact),
        )?;
        tracing::info!(
            session_id,
            message_id = %ai.id,
            edits_applied = reply.edits_applied,
            edits_skipped = reply.edits_skipped,
            "stored ai message"
        );

        Ok(ComposeOutcome {
            human,
            ai,
            title,
            reply,
        })
    }

    fn stream_reply(
        &self,
        request: GenerationRequest,
        baseline: String,
        cancel: &CancelSignal,
        sink: &mut dyn StateSink,
    ) -> Result<ParsedReply, ComposeError> {
        let mut parser = TagStreamParser::new(baseline);
        let mut delivery_failure: Option<io::Error> = None;
        let mut fragments = 0usize;

        let result = self
            .provider
            .generate(request, Arc::clone(cancel), &mut |fragment| {
                if is_cancelled(cancel) {
                    return Err(FragmentRejected::new("request cancelled"));
                }
                fragments += 1;
                parser.push(fragment, &mut *sink).map(|_| ()).map_err(|error| {
                    let reason = error.to_string();
                    delivery_failure = Some(error);
                    FragmentRejected::new(reason)
                })
            });

        if let Some(error) = delivery_failure {
            return Err(ComposeError::Delivery(error));
        }
        if is_cancelled(cancel) {
            tracing::info!(fragments, "generation cancelled, reply discarded");
            return Err(GenerationError::Cancelled.into());
        }
        let output = result?;
        tracing::debug!(fragments, reply_len = output.text.len(), "generation finished");

        let reply = parser.finish();
        if reply.complete_artifact != reply.artifact {
            tracing::warn!(
                dropped_len = reply.artifact.len(),
                "artifact cut off, restoring the last complete version"
            );
            sink.emit(&StreamRecord {
                message: reply.message.clone(),
                artifact: reply.complete_artifact.clone(),
            })
            .map_err(ComposeError::Delivery)?;
        }
        Ok(reply)
    }

    fn generate_title(
        &self,
        mut session: Session,
        content: &str,
        cancel: &CancelSignal,
    ) -> Result<String, TitleError> {
        let raw = self.provider.complete(
            title_request(content, self.settings.title_max_tokens),
            Arc::clone(cancel),
        )?;
        let title = clean_title(&raw);
        if title.is_empty() {
            return Err(TitleError::Empty);
        }

        session.title.clone_from(&title);
        self.store.update_session(&session)?;
        tracing::info!(session_id = %session.id, %title, "stored session title");
        Ok(title)
    }

    fn claim(&self, session_id: &str) -> Result<SessionClaim<'_>, ComposeError> {
        if !lock_unpoisoned(&self.in_flight).insert(session_id.to_string()) {
            return Err(ComposeError::SessionBusy {
                session_id: session_id.to_string(),
            });
        }
        Ok(SessionClaim {
            in_flight: &self.in_flight,
            session_id: session_id.to_string(),
        })
    }
}

/// Marks a session busy until dropped.
struct SessionClaim<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    session_id: String,
}

impl Drop for SessionClaim<'_> {
    fn drop(&mut self) {
        lock_unpoisoned(self.in_flight).remove(&self.session_id);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
