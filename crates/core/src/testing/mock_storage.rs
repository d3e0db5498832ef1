//! Mock chat storage for testing.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Mutex;

use crate::chats::ChatId;
use crate::storage::{ChatLists, ChatStorage, StorageError};
use crate::users::Roster;
use crate::watchlist::Entry;

#[derive(Default)]
struct MockStorageState {
    chats: HashSet<ChatId>,
    lists: HashMap<ChatId, ChatLists>,
    rosters: HashMap<ChatId, Roster>,
    fail_saves: bool,
    list_saves: usize,
    roster_saves: usize,
}

/// In-memory implementation of the ChatStorage trait.
///
/// Provides controllable behavior for testing:
/// - Seed chats with pre-existing lists and rosters
/// - Count and inspect saves for persistence-policy assertions
/// - Simulate write failures
///
/// # Example
///
/// ```rust,ignore
/// use marquee_core::testing::MockStorage;
///
/// let storage = MockStorage::new();
/// storage.set_fail_saves(true);
///
/// // Saves now fail; in-memory chat state must survive anyway.
/// ```
#[derive(Default)]
pub struct MockStorage {
    state: Mutex<MockStorageState>,
}

impl MockStorage {
    /// Create a new empty mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a chat with persisted lists and a roster, marking it existing.
    pub fn seed_chat(&self, chat: ChatId, lists: ChatLists, roster: Roster) {
        let mut state = self.state.lock().unwrap();
        state.chats.insert(chat);
        state.lists.insert(chat, lists);
        state.rosters.insert(chat, roster);
    }

    /// Make every subsequent save fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.state.lock().unwrap().fail_saves = fail;
    }

    /// Number of successful list saves.
    pub fn list_save_count(&self) -> usize {
        self.state.lock().unwrap().list_saves
    }

    /// Number of successful roster saves.
    pub fn roster_save_count(&self) -> usize {
        self.state.lock().unwrap().roster_saves
    }

    /// The last lists saved for a chat, if any.
    pub fn saved_lists(&self, chat: ChatId) -> Option<ChatLists> {
        self.state.lock().unwrap().lists.get(&chat).cloned()
    }

    /// The last roster saved for a chat, if any.
    pub fn saved_roster(&self, chat: ChatId) -> Option<Roster> {
        self.state.lock().unwrap().rosters.get(&chat).cloned()
    }

    fn injected_failure() -> StorageError {
        StorageError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "injected save failure",
        ))
    }
}

impl ChatStorage for MockStorage {
    fn chat_exists(&self, chat: ChatId) -> bool {
        self.state.lock().unwrap().chats.contains(&chat)
    }

    fn create_chat(&self, chat: ChatId) -> Result<(), StorageError> {
        self.state.lock().unwrap().chats.insert(chat);
        Ok(())
    }

    fn load_lists(&self, chat: ChatId) -> Result<ChatLists, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .lists
            .get(&chat)
            .cloned()
            .unwrap_or_default())
    }

    fn save_lists(
        &self,
        chat: ChatId,
        active: &[Entry],
        archived: &[Entry],
        undo_batch: &[Entry],
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_saves {
            return Err(Self::injected_failure());
        }
        state.chats.insert(chat);
        state.lists.insert(
            chat,
            ChatLists {
                active: active.to_vec(),
                archived: archived.to_vec(),
                undo_batch: undo_batch.to_vec(),
            },
        );
        state.list_saves += 1;
        Ok(())
    }

    fn load_roster(&self, chat: ChatId) -> Result<Roster, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rosters
            .get(&chat)
            .cloned()
            .unwrap_or_default())
    }

    fn save_roster(&self, chat: ChatId, roster: &Roster) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_saves {
            return Err(Self::injected_failure());
        }
        state.chats.insert(chat);
        state.rosters.insert(chat, roster.clone());
        state.roster_saves += 1;
        Ok(())
    }
}
