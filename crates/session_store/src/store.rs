use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::SessionStoreError;
use crate::paths::{is_valid_session_id, session_file_name, session_id_from_file_name, session_root};
use crate::replay::{now_rfc3339, replay_file, SessionLog};
use crate::schema::{
    ChatMessage, JsonLine, MessageRecord, NewMessage, Session, SessionHeader, TitleRecord,
};

/// Storage collaborator for sessions and their append-only messages.
///
/// Implementations serialize conflicting writes themselves; callers hold no locks.
pub trait ChatStore: Send + Sync {
    /// Creates an untitled session.
    fn insert_session(&self) -> Result<Session, SessionStoreError>;

    fn get_session(&self, session_id: &str) -> Result<Session, SessionStoreError>;

    /// Persists the session title.
    fn update_session(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// Removes the session together with its messages.
    fn delete_session(&self, session_id: &str) -> Result<(), SessionStoreError>;

    /// All sessions, oldest first.
    fn list_sessions(&self) -> Result<Vec<Session>, SessionStoreError>;

    /// Appends a message, assigning its id and creation timestamp.
    fn insert_message(&self, message: NewMessage) -> Result<ChatMessage, SessionStoreError>;

    /// Messages of one session in creation order.
    fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, SessionStoreError>;
}

/// File-backed store: one append-only JSONL log per session under `root`.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    writes: Mutex<()>,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|source| SessionStoreError::io("creating session root", &root, source))?;

        Ok(Self {
            root,
            writes: Mutex::new(()),
        })
    }

    /// Opens the conventional store location below `cwd`.
    pub fn in_dir(cwd: &Path) -> Result<Self, SessionStoreError> {
        Self::open(session_root(cwd))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find_session_file(&self, session_id: &str) -> Result<PathBuf, SessionStoreError> {
        if !is_valid_session_id(session_id) {
            return Err(SessionStoreError::not_found(session_id));
        }

        for (path, file_session_id) in self.session_files()? {
            if file_session_id == session_id {
                return Ok(path);
            }
        }

        Err(SessionStoreError::not_found(session_id))
    }

    fn session_files(&self) -> Result<Vec<(PathBuf, String)>, SessionStoreError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|source| SessionStoreError::io("listing session root", &self.root, source))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|source| SessionStoreError::io("listing session root", &self.root, source))?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(session_id) = session_id_from_file_name(file_name) {
                files.push((entry.path(), session_id.to_string()));
            }
        }

        Ok(files)
    }

    fn load(&self, session_id: &str) -> Result<SessionLog, SessionStoreError> {
        let path = self.find_session_file(session_id)?;
        let log = replay_file(&path)?;
        if log.session.id != session_id {
            return Err(SessionStoreError::SessionIdMismatch {
                path,
                expected: session_id.to_string(),
                found: log.session.id,
            });
        }
        Ok(log)
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        lock_unpoisoned(&self.writes)
    }
}

impl ChatStore for FileStore {
    fn insert_session(&self) -> Result<Session, SessionStoreError> {
        let _guard = self.lock_writes();
        let session_id = Uuid::new_v4().to_string();
        let created_at = now_rfc3339()?;
        let path = self.root.join(session_file_name(&created_at, &session_id));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| SessionStoreError::io("creating session file", &path, source))?;
        let header = JsonLine::Session(SessionHeader::v1(&session_id, &created_at));
        write_line(&mut file, &path, &header)?;

        tracing::debug!(session_id = %session_id, path = %path.display(), "created session log");
        Ok(Session {
            id: session_id,
            title: String::new(),
            created_at,
        })
    }

    fn get_session(&self, session_id: &str) -> Result<Session, SessionStoreError> {
        Ok(self.load(session_id)?.session)
    }

    fn update_session(&self, session: &Session) -> Result<(), SessionStoreError> {
        let _guard = self.lock_writes();
        let path = self.find_session_file(&session.id)?;
        let record = JsonLine::Title(TitleRecord {
            title: session.title.clone(),
            ts: now_rfc3339()?,
        });
        append_line(&path, &record)
    }

    fn delete_session(&self, session_id: &str) -> Result<(), SessionStoreError> {
        let _guard = self.lock_writes();
        let path = self.find_session_file(session_id)?;
        fs::remove_file(&path)
            .map_err(|source| SessionStoreError::io("removing session file", &path, source))
    }

    fn list_sessions(&self) -> Result<Vec<Session>, SessionStoreError> {
        let mut sessions = Vec::new();
        for (path, _) in self.session_files()? {
            sessions.push(replay_file(&path)?.session);
        }
        sessions.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(sessions)
    }

    fn insert_message(&self, message: NewMessage) -> Result<ChatMessage, SessionStoreError> {
        let _guard = self.lock_writes();
        let path = self.find_session_file(&message.session_id)?;
        let message = message.into_message(Uuid::new_v4().to_string(), now_rfc3339()?);
        append_line(&path, &JsonLine::Message(MessageRecord::from_message(&message)))?;
        Ok(message)
    }

    fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>, SessionStoreError> {
        Ok(self.load(session_id)?.messages)
    }
}

fn append_line(path: &Path, line: &JsonLine) -> Result<(), SessionStoreError> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|source| {
            SessionStoreError::io("opening session file for append", path, source)
        })?;
    write_line(&mut file, path, line)
}

fn write_line(file: &mut fs::File, path: &Path, line: &JsonLine) -> Result<(), SessionStoreError> {
    let mut encoded =
        serde_json::to_string(line).map_err(|source| SessionStoreError::json_serialize(path, source))?;
    encoded.push('\n');
    file.write_all(encoded.as_bytes())
        .map_err(|source| SessionStoreError::io("appending session line", path, source))
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
