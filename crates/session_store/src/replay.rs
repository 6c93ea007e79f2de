use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::SessionStoreError;
use crate::schema::{ChatMessage, JsonLine, Session, SessionHeader};

/// Session state folded from one append-only log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLog {
    pub session: Session,
    pub messages: Vec<ChatMessage>,
}

/// Replays every line of a session log in file order.
///
/// The first line must be a version 1 header; later lines are message or title
/// records. The last title record wins.
pub fn replay_file(path: &Path) -> Result<SessionLog, SessionStoreError> {
    let file = File::open(path)
        .map_err(|source| SessionStoreError::io("opening session file", path, source))?;
    let reader = BufReader::new(file);

    let mut session: Option<Session> = None;
    let mut messages = Vec::new();
    let mut seen_ids = HashSet::new();

    for (line_index, line_result) in reader.lines().enumerate() {
        let line_number = line_index + 1;
        let line =
            line_result.map_err(|source| SessionStoreError::io_line(path, line_number, source))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = parse_json_line(path, line_number, &line)?;

        if session.is_none() {
            let JsonLine::Session(header) = parsed else {
                return Err(SessionStoreError::InvalidHeaderRecord {
                    path: path.to_path_buf(),
                    line: line_number,
                });
            };
            validate_header_line(path, line_number, &header)?;
            session = Some(Session {
                id: header.session_id,
                title: String::new(),
                created_at: header.created_at,
            });
            continue;
        }
        let Some(current) = session.as_mut() else {
            continue;
        };

        match parsed {
            JsonLine::Session(_) => {
                return Err(SessionStoreError::InvalidEntryRecord {
                    path: path.to_path_buf(),
                    line: line_number,
                });
            }
            JsonLine::Message(record) => {
                validate_rfc3339(path, line_number, "ts", &record.ts)?;
                if !seen_ids.insert(record.id.clone()) {
                    return Err(SessionStoreError::DuplicateMessageId {
                        path: path.to_path_buf(),
                        line: line_number,
                        id: record.id,
                    });
                }
                messages.push(record.into_message(&current.id));
            }
            JsonLine::Title(record) => {
                validate_rfc3339(path, line_number, "ts", &record.ts)?;
                current.title = record.title;
            }
        }
    }

    let session = session.ok_or_else(|| SessionStoreError::MissingHeader {
        path: path.to_path_buf(),
    })?;

    Ok(SessionLog { session, messages })
}

pub(crate) fn parse_json_line(
    path: &Path,
    line_number: usize,
    line: &str,
) -> Result<JsonLine, SessionStoreError> {
    serde_json::from_str::<JsonLine>(line)
        .map_err(|source| SessionStoreError::json_line(path, line_number, source))
}

pub(crate) fn validate_header_line(
    path: &Path,
    line_number: usize,
    header: &SessionHeader,
) -> Result<(), SessionStoreError> {
    if header.version != 1 {
        return Err(SessionStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            line: line_number,
            found: header.version,
        });
    }

    validate_rfc3339(path, line_number, "created_at", &header.created_at)
}

pub(crate) fn validate_rfc3339(
    path: &Path,
    line_number: usize,
    field: &'static str,
    value: &str,
) -> Result<(), SessionStoreError> {
    if OffsetDateTime::parse(value, &Rfc3339).is_err() {
        return Err(SessionStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            line: line_number,
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}

pub(crate) fn now_rfc3339() -> Result<String, SessionStoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(SessionStoreError::ClockFormat)
}
