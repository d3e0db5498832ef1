//! Per-chat state and the process-wide chat registry.
//!
//! A [`ChatState`] couples one watchlist and one member roster with the
//! persistence policy: which operations reach disk and which stay in memory
//! until the next save. The [`ChatStore`] hands out one state per chat,
//! materialized lazily and kept for the process lifetime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::catalog::CatalogHit;
use crate::metrics;
use crate::storage::{ChatLists, ChatStorage};
use crate::users::{Member, Roster};
use crate::watchlist::{
    DrawnEntry, Entry, RankedMember, WatchOutcome, WatchedSummary, Watchlist, WatchlistError,
};

// ============================================================================
// Chat identifier
// ============================================================================

/// Telegram chat identifier. Group chats have negative ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ============================================================================
// Chat state
// ============================================================================

/// One chat's watchlist, roster and last free-text query, bound to storage.
///
/// Mutations persist fire-and-forget: a failed write is logged and counted
/// but never rolls back the in-memory change, so the chat keeps working on
/// whatever it has until the process restarts.
pub struct ChatState {
    id: ChatId,
    watchlist: Watchlist,
    roster: Roster,
    last_query: String,
    storage: Arc<dyn ChatStorage>,
}

impl ChatState {
    pub fn new(id: ChatId, storage: Arc<dyn ChatStorage>) -> Self {
        Self {
            id,
            watchlist: Watchlist::new(),
            roster: Roster::new(),
            last_query: String::new(),
            storage,
        }
    }

    pub fn from_parts(
        id: ChatId,
        watchlist: Watchlist,
        roster: Roster,
        storage: Arc<dyn ChatStorage>,
    ) -> Self {
        Self {
            id,
            watchlist,
            roster,
            last_query: String::new(),
            storage,
        }
    }

    pub fn id(&self) -> ChatId {
        self.id
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    pub fn set_last_query(&mut self, query: impl Into<String>) {
        self.last_query = query.into();
    }

    /// Add a catalog hit to the active list. Persists the lists on success.
    pub fn add_hit(&mut self, hit: CatalogHit) -> Result<usize, WatchlistError> {
        let index = self.watchlist.add(Entry::from(hit))?;
        metrics::ENTRIES_ADDED.inc();
        self.persist_lists();
        Ok(index)
    }

    /// Remove the entry at `index` from the active list and persist.
    pub fn remove(&mut self, index: usize) -> Result<Entry, WatchlistError> {
        let removed = self.watchlist.remove(index)?;
        self.persist_lists();
        Ok(removed)
    }

    /// Mark entries watched by `user` and sweep fully-watched ones into the
    /// archive. Always persists, whether or not anything changed.
    pub fn watch(&mut self, indices: &[usize], user: &str) -> WatchOutcome {
        let outcome = self.watchlist.watch(indices, user, self.roster.len());
        if !outcome.archived.is_empty() {
            metrics::ENTRIES_ARCHIVED.inc_by(outcome.archived.len() as u64);
        }
        self.persist_lists();
        outcome
    }

    /// Unmark entries for `user`. Never persists and never re-evaluates
    /// archival; the change reaches disk with the next watch or save.
    pub fn unwatch(&mut self, indices: &[usize], user: &str) {
        self.watchlist.unwatch(indices, user);
    }

    /// Undo the most recent auto-archival. Persists only when entries moved.
    pub fn restore(&mut self) -> Result<usize, WatchlistError> {
        match self.watchlist.restore() {
            Ok(0) => {
                metrics::RESTORES_TOTAL.with_label_values(&["noop"]).inc();
                Ok(0)
            }
            Ok(moved) => {
                metrics::RESTORES_TOTAL.with_label_values(&["restored"]).inc();
                self.persist_lists();
                Ok(moved)
            }
            Err(e) => {
                metrics::RESTORES_TOTAL.with_label_values(&["mismatch"]).inc();
                error!(
                    chat = %self.id,
                    error = %e,
                    "undo batch no longer matches the archive tail, leaving state untouched"
                );
                Err(e)
            }
        }
    }

    pub fn draw(&self, n: usize) -> Vec<DrawnEntry> {
        self.watchlist.draw(n)
    }

    pub fn ranking(&self) -> Vec<RankedMember> {
        self.watchlist.ranking(&self.roster)
    }

    pub fn watched_summary(&self, user: &str) -> WatchedSummary {
        self.watchlist.watched_summary(user)
    }

    /// Register a member on first sighting. Persists the roster on change.
    pub fn register(&mut self, member: Member) -> bool {
        let added = self.roster.register(member);
        if added {
            self.persist_roster();
        }
        added
    }

    /// Drop a member who left the chat. Persists the roster on change.
    pub fn deregister(&mut self, username: &str) -> Option<Member> {
        let removed = self.roster.remove(username);
        if removed.is_some() {
            self.persist_roster();
        }
        removed
    }

    /// Flush everything to storage, the explicit save command.
    pub fn save_all(&self) {
        self.persist_lists();
        self.persist_roster();
    }

    fn persist_lists(&self) {
        let result = self.storage.save_lists(
            self.id,
            self.watchlist.active(),
            self.watchlist.archived(),
            self.watchlist.undo_batch(),
        );
        if let Err(e) = result {
            warn!(chat = %self.id, error = %e, "failed to persist lists, keeping in-memory state");
            metrics::PERSISTENCE_FAILURES.inc();
        }
    }

    fn persist_roster(&self) {
        if let Err(e) = self.storage.save_roster(self.id, &self.roster) {
            warn!(chat = %self.id, error = %e, "failed to persist roster, keeping in-memory state");
            metrics::PERSISTENCE_FAILURES.inc();
        }
    }
}

// ============================================================================
// Chat store
// ============================================================================

/// Process-wide registry of chats, keyed by chat id. No eviction; a chat
/// lives for the process lifetime once touched.
pub struct ChatStore {
    chats: RwLock<HashMap<ChatId, Arc<Mutex<ChatState>>>>,
    storage: Arc<dyn ChatStorage>,
}

impl ChatStore {
    pub fn new(storage: Arc<dyn ChatStorage>) -> Self {
        Self {
            chats: RwLock::new(HashMap::new()),
            storage,
        }
    }

    /// Return the chat's state, materializing it on first touch. A known
    /// chat loads its persisted lists and roster; a brand-new one gets its
    /// durable record created immediately.
    pub async fn get_or_create(&self, id: ChatId) -> Arc<Mutex<ChatState>> {
        if let Some(chat) = self.chats.read().await.get(&id) {
            return Arc::clone(chat);
        }

        let mut chats = self.chats.write().await;
        // Another task may have materialized the chat while the write lock
        // was pending.
        if let Some(chat) = chats.get(&id) {
            return Arc::clone(chat);
        }

        let state = if self.storage.chat_exists(id) {
            self.load_existing(id)
        } else {
            self.create_new(id)
        };
        let chat = Arc::new(Mutex::new(state));
        chats.insert(id, Arc::clone(&chat));
        chat
    }

    /// Flush every materialized chat to storage.
    pub async fn save_all(&self) {
        let chats = self.chats.read().await;
        for chat in chats.values() {
            chat.lock().await.save_all();
        }
    }

    fn load_existing(&self, id: ChatId) -> ChatState {
        let lists = match self.storage.load_lists(id) {
            Ok(lists) => lists,
            Err(e) => {
                warn!(chat = %id, error = %e, "failed to load lists, starting empty");
                ChatLists::default()
            }
        };
        let roster = match self.storage.load_roster(id) {
            Ok(roster) => roster,
            Err(e) => {
                warn!(chat = %id, error = %e, "failed to load roster, starting empty");
                Roster::new()
            }
        };
        info!(
            chat = %id,
            active = lists.active.len(),
            archived = lists.archived.len(),
            members = roster.len(),
            "loaded chat state"
        );
        let watchlist = Watchlist::from_lists(lists.active, lists.archived, lists.undo_batch);
        ChatState::from_parts(id, watchlist, roster, Arc::clone(&self.storage))
    }

    fn create_new(&self, id: ChatId) -> ChatState {
        if let Err(e) = self.storage.create_chat(id) {
            warn!(chat = %id, error = %e, "failed to create durable chat record");
            metrics::PERSISTENCE_FAILURES.inc();
        }
        info!(chat = %id, "created new chat");
        ChatState::new(id, Arc::clone(&self.storage))
    }
}
