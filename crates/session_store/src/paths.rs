use std::path::{Path, PathBuf};

pub const SESSION_DIR: [&str; 2] = [".composer", "sessions"];
pub const SESSION_FILE_EXTENSION: &str = "jsonl";

#[must_use]
pub fn session_root(cwd: &Path) -> PathBuf {
    cwd.join(SESSION_DIR[0]).join(SESSION_DIR[1])
}

#[must_use]
pub fn sanitize_timestamp_for_filename(timestamp: &str) -> String {
    timestamp
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | ' ' => '-',
            _ => c,
        })
        .collect()
}

#[must_use]
pub fn session_file_name(created_at: &str, session_id: &str) -> String {
    format!(
        "{}_{}.{SESSION_FILE_EXTENSION}",
        sanitize_timestamp_for_filename(created_at),
        session_id
    )
}

/// Extracts the session id from a file name produced by [`session_file_name`].
#[must_use]
pub fn session_id_from_file_name(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(&format!(".{SESSION_FILE_EXTENSION}"))?;
    let (_, session_id) = stem.rsplit_once('_')?;
    if session_id.is_empty() {
        None
    } else {
        Some(session_id)
    }
}

/// Session ids are used as file name components and must not escape the root.
#[must_use]
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}
