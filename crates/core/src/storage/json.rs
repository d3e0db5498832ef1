//! Flat-file JSON storage, one directory per chat.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::chats::ChatId;
use crate::users::Roster;
use crate::watchlist::Entry;

use super::{ChatLists, ChatStorage, StorageError};

const ACTIVE_FILE: &str = "watchlist.json";
const ARCHIVE_FILE: &str = "archive.json";
const UNDO_FILE: &str = "undo.json";
const MEMBERS_FILE: &str = "members.json";

/// Anything shorter holds no data; a serialized empty list or map fits
/// within this.
const MIN_DATA_LEN: u64 = 5;

/// One directory per chat under a common root, each holding independently
/// loadable JSON files for the active list, the archive, the undo batch
/// and the member roster.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Open the storage root, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn chat_dir(&self, chat: ChatId) -> PathBuf {
        self.root.join(format!("chat{}", chat))
    }

    /// Load one file, degrading to the default on absence, near-empty
    /// content or parse failure. Only genuine read failures are logged.
    fn load_file<T: DeserializeOwned + Default>(&self, path: &Path) -> T {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => return T::default(),
        };
        if meta.len() < MIN_DATA_LEN {
            return T::default();
        }
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read state file, treating as empty");
                return T::default();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse state file, treating as empty");
                T::default()
            }
        }
    }

    fn save_file<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_vec(value)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

impl ChatStorage for JsonStorage {
    fn chat_exists(&self, chat: ChatId) -> bool {
        self.chat_dir(chat).is_dir()
    }

    fn create_chat(&self, chat: ChatId) -> Result<(), StorageError> {
        fs::create_dir_all(self.chat_dir(chat))?;
        Ok(())
    }

    fn load_lists(&self, chat: ChatId) -> Result<ChatLists, StorageError> {
        let dir = self.chat_dir(chat);
        Ok(ChatLists {
            active: self.load_file(&dir.join(ACTIVE_FILE)),
            archived: self.load_file(&dir.join(ARCHIVE_FILE)),
            undo_batch: self.load_file(&dir.join(UNDO_FILE)),
        })
    }

    fn save_lists(
        &self,
        chat: ChatId,
        active: &[Entry],
        archived: &[Entry],
        undo_batch: &[Entry],
    ) -> Result<(), StorageError> {
        let dir = self.chat_dir(chat);
        fs::create_dir_all(&dir)?;

        let mut first_error = None;
        let files: [(&str, &[Entry]); 3] = [
            (ACTIVE_FILE, active),
            (ARCHIVE_FILE, archived),
            (UNDO_FILE, undo_batch),
        ];
        for (name, list) in files {
            if let Err(e) = self.save_file(&dir.join(name), &list) {
                warn!(chat = %chat, file = name, error = %e, "failed to write list file");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn load_roster(&self, chat: ChatId) -> Result<Roster, StorageError> {
        Ok(self.load_file(&self.chat_dir(chat).join(MEMBERS_FILE)))
    }

    fn save_roster(&self, chat: ChatId, roster: &Roster) -> Result<(), StorageError> {
        let dir = self.chat_dir(chat);
        fs::create_dir_all(&dir)?;
        self.save_file(&dir.join(MEMBERS_FILE), roster)
    }
}
