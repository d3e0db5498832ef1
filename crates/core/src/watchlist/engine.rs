//! The per-chat watchlist state machine.
//!
//! Three parallel lists: the active to-watch list users address by index,
//! the archive of entries everyone watched, and the single-level undo
//! batch remembering what the most recent auto-archival moved.

use rand::seq::index;
use rand::Rng;
use thiserror::Error;

use crate::users::Roster;

use super::Entry;

/// Errors from watchlist mutations.
#[derive(Debug, Error, PartialEq)]
pub enum WatchlistError {
    /// An active entry with the same (title, year) already exists.
    #[error("already tracked: {title} ({year})")]
    Duplicate { title: String, year: i32 },

    /// The index does not address an active entry.
    #[error("index {index} out of range (list has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The undo batch no longer matches the tail of the archive, so
    /// restoring it would corrupt the archive.
    #[error("undo batch does not match the archive tail")]
    UndoOutOfSync,
}

/// Outcome of a watch call: how many entries were newly marked, and the
/// batch auto-archival moved out (in original list order, empty when
/// nothing moved).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchOutcome {
    pub marked: usize,
    pub archived: Vec<Entry>,
}

/// One drawn entry together with its position in the active list.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnEntry {
    pub position: usize,
    pub entry: Entry,
}

/// A member's watch count for the ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMember {
    pub username: String,
    pub watched: usize,
}

/// Everything one user has watched: entries still on the active list
/// (with their positions) and entries already archived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchedSummary {
    pub active: Vec<(usize, Entry)>,
    pub archived: Vec<Entry>,
}

impl WatchedSummary {
    /// Total count across both lists.
    pub fn total(&self) -> usize {
        self.active.len() + self.archived.len()
    }
}

/// A chat's three movie lists and the operations that keep them
/// consistent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Watchlist {
    active: Vec<Entry>,
    archived: Vec<Entry>,
    undo_batch: Vec<Entry>,
}

impl Watchlist {
    /// Create an empty watchlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a watchlist from persisted lists.
    pub fn from_lists(active: Vec<Entry>, archived: Vec<Entry>, undo_batch: Vec<Entry>) -> Self {
        Self {
            active,
            archived,
            undo_batch,
        }
    }

    /// The active to-watch list, in display order.
    pub fn active(&self) -> &[Entry] {
        &self.active
    }

    /// The archive of fully-watched entries, oldest first.
    pub fn archived(&self) -> &[Entry] {
        &self.archived
    }

    /// The batch the most recent auto-archival moved; empty means there
    /// is nothing to undo.
    pub fn undo_batch(&self) -> &[Entry] {
        &self.undo_batch
    }

    /// Number of active entries.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns true if the active list is empty.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// The active entry at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.active.get(index)
    }

    /// Append a new entry and return its index.
    ///
    /// Rejects the entry when an active one shares its identity key; the
    /// archive is not consulted, so a restored-then-rewatched movie can be
    /// added again.
    pub fn add(&mut self, entry: Entry) -> Result<usize, WatchlistError> {
        if self.active.iter().any(|e| e.same_identity(&entry)) {
            return Err(WatchlistError::Duplicate {
                title: entry.title,
                year: entry.year,
            });
        }
        self.active.push(entry);
        Ok(self.active.len() - 1)
    }

    /// Remove and return the entry at `index`. Entries after it shift
    /// down one position.
    pub fn remove(&mut self, index: usize) -> Result<Entry, WatchlistError> {
        if index >= self.active.len() {
            return Err(WatchlistError::IndexOutOfRange {
                index,
                len: self.active.len(),
            });
        }
        Ok(self.active.remove(index))
    }

    /// Mark the entries at `indices` watched by `user` (normalized).
    ///
    /// Already-marked entries and out-of-range indices are skipped, so
    /// repeated indices are idempotent. When at least one new mark landed,
    /// auto-archival runs exactly once: every entry watched by all
    /// `member_count` members moves to the archive and the moved batch
    /// replaces the undo batch.
    pub fn watch(&mut self, indices: &[usize], user: &str, member_count: usize) -> WatchOutcome {
        let mut marked = 0;
        for &index in indices {
            if let Some(entry) = self.active.get_mut(index) {
                if entry.mark_watched(user) {
                    marked += 1;
                }
            }
        }
        let archived = if marked > 0 {
            self.archive_watched(member_count)
        } else {
            Vec::new()
        };
        WatchOutcome { marked, archived }
    }

    /// Remove `user`'s watched mark from the entries at `indices`.
    ///
    /// Never triggers archival and never touches the undo batch; an
    /// archived entry stays archived even if its watch count would now be
    /// below the threshold.
    pub fn unwatch(&mut self, indices: &[usize], user: &str) {
        for &index in indices {
            if let Some(entry) = self.active.get_mut(index) {
                entry.mark_unwatched(user);
            }
        }
    }

    /// Move every entry watched by all members to the archive, preserving
    /// relative order, and record the moved batch as the new undo batch.
    /// The previous batch is replaced even when nothing moves.
    fn archive_watched(&mut self, member_count: usize) -> Vec<Entry> {
        let mut remaining = Vec::with_capacity(self.active.len());
        let mut batch = Vec::new();
        for entry in self.active.drain(..) {
            if entry.watched_by.len() >= member_count {
                batch.push(entry);
            } else {
                remaining.push(entry);
            }
        }
        self.active = remaining;
        self.archived.extend_from_slice(&batch);
        self.undo_batch = batch.clone();
        batch
    }

    /// Roll back the most recent auto-archival.
    ///
    /// Verifies the undo batch still identity-matches the tail of the
    /// archive; on mismatch nothing is modified and `UndoOutOfSync` is
    /// returned. On success the tail leaves the archive and the batch
    /// entries rejoin the active list with their watch progress cleared
    /// (progress is reset, not restored). Returns the number of entries
    /// moved back; `Ok(0)` means there was nothing to undo. Single-level:
    /// a second consecutive restore is a no-op.
    pub fn restore(&mut self) -> Result<usize, WatchlistError> {
        if self.undo_batch.is_empty() {
            return Ok(0);
        }
        let count = self.undo_batch.len();
        let tail_start = self
            .archived
            .len()
            .checked_sub(count)
            .ok_or(WatchlistError::UndoOutOfSync)?;
        let tail_matches = self.archived[tail_start..]
            .iter()
            .zip(&self.undo_batch)
            .all(|(archived, batch)| archived.same_identity(batch));
        if !tail_matches {
            return Err(WatchlistError::UndoOutOfSync);
        }
        self.archived.truncate(tail_start);
        for mut entry in std::mem::take(&mut self.undo_batch) {
            entry.watched_by.clear();
            self.active.push(entry);
        }
        Ok(count)
    }

    /// Draw `n` distinct entries uniformly at random with their
    /// positions. `n` larger than the active list draws the whole list;
    /// the list itself is not modified.
    pub fn draw(&self, n: usize) -> Vec<DrawnEntry> {
        self.draw_with(n, &mut rand::rng())
    }

    /// Draw with a caller-supplied RNG, for deterministic tests.
    pub fn draw_with<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<DrawnEntry> {
        let amount = n.min(self.active.len());
        index::sample(rng, self.active.len(), amount)
            .into_iter()
            .map(|position| DrawnEntry {
                position,
                entry: self.active[position].clone(),
            })
            .collect()
    }

    /// Watch counts per roster member across the active list and the
    /// archive, most watched first. Members who watched nothing are
    /// included with a count of zero; equal counts order alphabetically
    /// by username.
    pub fn ranking(&self, roster: &Roster) -> Vec<RankedMember> {
        let mut ranked: Vec<RankedMember> = roster
            .iter()
            .map(|(key, member)| RankedMember {
                username: member.username.clone(),
                watched: self
                    .active
                    .iter()
                    .chain(&self.archived)
                    .filter(|entry| entry.is_watched_by(key))
                    .count(),
            })
            .collect();
        // Stable sort keeps equal counts in roster key order (alphabetical).
        ranked.sort_by(|a, b| b.watched.cmp(&a.watched));
        ranked
    }

    /// Everything `user` (normalized) has watched, across both lists.
    pub fn watched_summary(&self, user: &str) -> WatchedSummary {
        WatchedSummary {
            active: self
                .active
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.is_watched_by(user))
                .map(|(position, entry)| (position, entry.clone()))
                .collect(),
            archived: self
                .archived
                .iter()
                .filter(|entry| entry.is_watched_by(user))
                .cloned()
                .collect(),
        }
    }
}
