//! Subcommand bodies. Every command writes JSON to `out`, one value per line.

use std::io::Write;

use anyhow::{bail, Context, Result};
use composer::{ComposeOutcome, ComposeRequest, Composer, JsonLinesSink};
use generation::CancelSignal;
use serde::Serialize;
use session_store::ChatStore;

fn write_json_line<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value).context("failed to encode output")?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

pub fn create_session(store: &dyn ChatStore, out: &mut dyn Write) -> Result<()> {
    let session = store.insert_session()?;
    tracing::info!(session_id = %session.id, "created session");
    write_json_line(out, &session)
}

/// Sessions, oldest first.
pub fn list_sessions(store: &dyn ChatStore, out: &mut dyn Write) -> Result<()> {
    for session in store.list_sessions()? {
        write_json_line(out, &session)?;
    }
    Ok(())
}

pub fn show_session(store: &dyn ChatStore, session_id: &str, out: &mut dyn Write) -> Result<()> {
    let session = store.get_session(session_id)?;
    write_json_line(out, &session)
}

pub fn rename_session(
    store: &dyn ChatStore,
    session_id: &str,
    title: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        bail!("title must not be empty");
    }
    let mut session = store.get_session(session_id)?;
    session.title = title.to_string();
    store.update_session(&session)?;
    write_json_line(out, &session)
}

pub fn delete_session(store: &dyn ChatStore, session_id: &str) -> Result<()> {
    store.delete_session(session_id)?;
    tracing::info!(session_id, "deleted session");
    Ok(())
}

pub fn list_messages(store: &dyn ChatStore, session_id: &str, out: &mut dyn Write) -> Result<()> {
    for message in store.list_messages(session_id)? {
        write_json_line(out, &message)?;
    }
    Ok(())
}

/// Runs one turn and streams cumulative records to `out` as they change.
pub fn send(
    composer: &Composer,
    session_id: &str,
    request: &ComposeRequest,
    cancel: &CancelSignal,
    out: &mut dyn Write,
) -> Result<ComposeOutcome> {
    let mut sink = JsonLinesSink::new(out);
    let outcome = composer.compose(session_id, request, cancel, &mut sink)?;
    tracing::debug!(records = sink.records_written(), "turn streamed");
    Ok(outcome)
}
