//! Durable per-chat state.
//!
//! Persistence is best-effort: callers log failures and continue, the
//! in-memory state stays authoritative for the life of the process.

mod json;

pub use json::JsonStorage;

use thiserror::Error;

use crate::chats::ChatId;
use crate::users::Roster;
use crate::watchlist::Entry;

/// Errors from the storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding state for disk failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The three persisted movie lists of a chat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatLists {
    pub active: Vec<Entry>,
    pub archived: Vec<Entry>,
    pub undo_batch: Vec<Entry>,
}

/// Durable storage for per-chat lists and members.
pub trait ChatStorage: Send + Sync {
    /// Returns true if the chat has a durable record.
    fn chat_exists(&self, chat: ChatId) -> bool;

    /// Create the chat's durable record.
    fn create_chat(&self, chat: ChatId) -> Result<(), StorageError>;

    /// Load the three lists. Missing or unreadable data degrades to empty
    /// lists rather than an error.
    fn load_lists(&self, chat: ChatId) -> Result<ChatLists, StorageError>;

    /// Persist the three lists. Every file is attempted even when an
    /// earlier one fails; the first failure is reported.
    fn save_lists(
        &self,
        chat: ChatId,
        active: &[Entry],
        archived: &[Entry],
        undo_batch: &[Entry],
    ) -> Result<(), StorageError>;

    /// Load the member roster.
    fn load_roster(&self, chat: ChatId) -> Result<Roster, StorageError>;

    /// Persist the member roster.
    fn save_roster(&self, chat: ChatId, roster: &Roster) -> Result<(), StorageError>;
}
