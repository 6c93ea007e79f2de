use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::SessionStoreError;
use crate::replay::now_rfc3339;
use crate::schema::{ChatMessage, NewMessage, Session};
use crate::store::{lock_unpoisoned, ChatStore};

#[derive(Debug, Default)]
struct MemoryState {
    sessions: Vec<Session>,
    messages: HashMap<String, Vec<ChatMessage>>,
}

/// In-process store for tests and embedding; contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStore for MemoryStore {
    fn insert_session(&self) -> Result<Session, SessionStoreError> {
        let session = Session {
            id: Uuid::new_v4().to_string(),
            title: String::new(),
            created_at: now_rfc3339()?,
        };

        let mut state = lock_unpoisoned(&self.state);
        state.messages.insert(session.id.clone(), Vec::new());
        state.sessions.push(session.clone());
        Ok(session)
    }

    fn get_session(&self, session_id: &str) -> Result<Session, SessionStoreError> {
        lock_unpoisoned(&self.state)
            .sessions
            .iter()
            .find(|session| session.id == session_id)
            .cloned()
            .ok_or_else(|| SessionStoreError::not_found(session_id))
    }

    fn update_session(&self, session: &Session) -> Result<(), SessionStoreError> {
        let mut state = lock_unpoisoned(&self.state);
        let stored = state
            .sessions
            .iter_mut()
            .find(|stored| stored.id == session.id)
            .ok_or_else(|| SessionStoreError::not_found(&session.id))?;
        stored.title = session.title.clone();
        Ok(())
    }

    fn delete_session(&self, session_id: &str) -> Result<(), SessionStoreError> {
        let mut state = lock_unpoisoned(&self.state);
        let before = state.sessions.len();
        state.sessions.retain(|session| session.id != session_id);
        if state.sessions.len() == before {
            return Err(SessionStoreError::not_found(session_id));
        }
        state.messages.remove(session_id);
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<Session>, SessionStoreError> {
        Ok(lock_unpoisoned(&self.state).sessions.clone())
    }

    fn insert_message(&self, message: NewMessage) -> Result<ChatMessage, SessionStoreError> {
        let created_at = now_rfc3339()?;
        let mut state = lock_unpoisoned(&self.state);
        let messages = state
            .messages
            .get_mut(&message.session_id)
            .ok_or_else(|| SessionStoreError::not_found(&message.session_id))?;
        let message = message.into_message(Uuid::new_v4().to_string(), created_at);
        messages.push(message.clone());
        Ok(message)
    }

    fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, SessionStoreError> {
        lock_unpoisoned(&self.state)
            .messages
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionStoreError::not_found(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Role;

    #[test]
    fn messages_are_listed_in_insertion_order() {
        let store = MemoryStore::new();
        let session = store.insert_session().expect("session");

        for content in ["first", "second", "third"] {
            store
                .insert_message(NewMessage::new(&session.id, Role::Human).with_content(content))
                .expect("insert");
        }

        let contents: Vec<String> = store
            .list_messages(&session.id)
            .expect("list")
            .into_iter()
            .map(|message| message.content)
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn unknown_session_is_reported_as_not_found() {
        let store = MemoryStore::new();
        let error = store
            .insert_message(NewMessage::new("missing", Role::Ai))
            .expect_err("unknown session");
        assert!(error.is_not_found());
        assert!(store.list_messages("missing").expect_err("unknown").is_not_found());
        assert!(store.delete_session("missing").expect_err("unknown").is_not_found());
    }

    #[test]
    fn delete_drops_messages_with_the_session() {
        let store = MemoryStore::new();
        let session = store.insert_session().expect("session");
        store
            .insert_message(NewMessage::new(&session.id, Role::Human))
            .expect("insert");

        store.delete_session(&session.id).expect("delete");

        assert!(store.get_session(&session.id).expect_err("deleted").is_not_found());
        assert!(store.list_sessions().expect("list").is_empty());
    }
}
