//! Lookups over a session's stored artifact versions.

use session_store::{ChatMessage, ChatStore, Role, SessionStoreError};

/// Newest non-empty `doc`, optionally restricted to one author.
///
/// Returns `""` when no message qualifies.
pub fn latest_artifact(messages: &[ChatMessage], role: Option<Role>) -> &str {
    messages
        .iter()
        .rev()
        .filter(|message| role.map_or(true, |role| message.role == role))
        .find(|message| !message.doc.is_empty())
        .map_or("", |message| message.doc.as_str())
}

/// Loads the session history and returns its newest artifact for `role`.
pub fn previous_artifact(
    store: &dyn ChatStore,
    session_id: &str,
    role: Option<Role>,
) -> Result<String, SessionStoreError> {
    let messages = store.list_messages(session_id)?;
    Ok(latest_artifact(&messages, role).to_string())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use session_store::{MemoryStore, NewMessage};

    use super::*;

    fn seed(store: &MemoryStore, session_id: &str, role: Role, doc: &str) {
        store
            .insert_message(NewMessage::new(session_id, role).with_doc(doc))
            .expect("insert message");
    }

    #[test]
    fn empty_history_has_no_artifact() {
        let store = MemoryStore::new();
        let session = store.insert_session().expect("session");

        assert_eq!(previous_artifact(&store, &session.id, None).expect("lookup"), "");
        assert_eq!(
            previous_artifact(&store, &session.id, Some(Role::Ai)).expect("lookup"),
            ""
        );
    }

    #[test]
    fn messages_without_docs_have_no_artifact() {
        let store = MemoryStore::new();
        let session = store.insert_session().expect("session");
        seed(&store, &session.id, Role::Human, "");
        seed(&store, &session.id, Role::Ai, "");

        assert_eq!(previous_artifact(&store, &session.id, None).expect("lookup"), "");
    }

    #[test]
    fn newest_matching_doc_wins() {
        let store = MemoryStore::new();
        let session = store.insert_session().expect("session");
        seed(&store, &session.id, Role::Ai, "ai v1");
        seed(&store, &session.id, Role::Human, "human edit");
        seed(&store, &session.id, Role::Ai, "");

        assert_eq!(
            previous_artifact(&store, &session.id, Some(Role::Ai)).expect("lookup"),
            "ai v1"
        );
        assert_eq!(
            previous_artifact(&store, &session.id, Some(Role::Human)).expect("lookup"),
            "human edit"
        );
        assert_eq!(
            previous_artifact(&store, &session.id, None).expect("lookup"),
            "human edit"
        );
    }

    #[test]
    fn unknown_session_is_not_found() {
        let store = MemoryStore::new();
        let error = previous_artifact(&store, "missing", None).expect_err("missing session");
        assert_matches!(error, SessionStoreError::SessionNotFound { .. });
    }
}
