mod error;
mod memory;
mod paths;
mod replay;
mod schema;
mod store;

pub use error::SessionStoreError;
pub use memory::MemoryStore;
pub use paths::{is_valid_session_id, session_file_name, session_root};
pub use replay::{replay_file, SessionLog};
pub use schema::{
    ChatMessage, MessageRecord, NewMessage, Role, Session, SessionHeader, TitleRecord,
};
pub use store::{ChatStore, FileStore};
