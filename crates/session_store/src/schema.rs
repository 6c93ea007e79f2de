use std::fmt;

use serde::{Deserialize, Serialize};

/// Author of a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Ai,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "human" => Self::Human,
            "ai" => Self::Ai,
            _ => return None,
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat session. The title starts empty and is set once from the first request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub created_at: String,
}

impl Session {
    #[must_use]
    pub fn is_untitled(&self) -> bool {
        self.title.trim().is_empty()
    }
}

/// One persisted message. Messages are append-only and ordered by creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub doc: String,
    pub diff: String,
    #[serde(rename = "selectedText")]
    pub selected_text: String,
    pub created_at: String,
}

/// Message fields supplied by callers; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub doc: String,
    pub diff: String,
    pub selected_text: String,
}

impl NewMessage {
    #[must_use]
    pub fn new(session_id: impl Into<String>, role: Role) -> Self {
        Self {
            session_id: session_id.into(),
            role,
            content: String::new(),
            doc: String::new(),
            diff: String::new(),
            selected_text: String::new(),
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    #[must_use]
    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = diff.into();
        self
    }

    #[must_use]
    pub fn with_selected_text(mut self, selected_text: impl Into<String>) -> Self {
        self.selected_text = selected_text.into();
        self
    }

    pub(crate) fn into_message(self, id: String, created_at: String) -> ChatMessage {
        ChatMessage {
            id,
            session_id: self.session_id,
            role: self.role,
            content: self.content,
            doc: self.doc,
            diff: self.diff,
            selected_text: self.selected_text,
            created_at,
        }
    }
}

/// First line of every session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionHeader {
    pub version: u32,
    pub session_id: String,
    pub created_at: String,
}

impl SessionHeader {
    #[must_use]
    pub fn v1(session_id: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            version: 1,
            session_id: session_id.into(),
            created_at: created_at.into(),
        }
    }
}

/// Appended message line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageRecord {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub doc: String,
    pub diff: String,
    pub selected_text: String,
    pub ts: String,
}

/// Appended title change line; the last one wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TitleRecord {
    pub title: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum JsonLine {
    Session(SessionHeader),
    Message(MessageRecord),
    Title(TitleRecord),
}

impl MessageRecord {
    pub(crate) fn from_message(message: &ChatMessage) -> Self {
        Self {
            id: message.id.clone(),
            role: message.role,
            content: message.content.clone(),
            doc: message.doc.clone(),
            diff: message.diff.clone(),
            selected_text: message.selected_text.clone(),
            ts: message.created_at.clone(),
        }
    }

    pub(crate) fn into_message(self, session_id: &str) -> ChatMessage {
        ChatMessage {
            id: self.id,
            session_id: session_id.to_string(),
            role: self.role,
            content: self.content,
            doc: self.doc,
            diff: self.diff,
            selected_text: self.selected_text,
            created_at: self.ts,
        }
    }
}
