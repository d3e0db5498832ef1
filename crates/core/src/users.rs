//! Per-chat member registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A chat member known to the bot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    /// Telegram user id.
    pub id: i64,
    /// Username as Telegram reports it (display casing preserved).
    pub username: String,
    /// First name, for friendlier logs.
    #[serde(default)]
    pub first_name: String,
}

impl Member {
    /// Create a member record.
    pub fn new(id: i64, username: impl Into<String>, first_name: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            first_name: first_name.into(),
        }
    }
}

/// Normalize a username for keying and comparisons: trim whitespace, strip
/// a leading `@`, lowercase.
pub fn normalize_username(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);
    trimmed.to_lowercase()
}

/// The members of one chat, keyed by normalized username.
///
/// The roster size is the denominator of the everyone-has-watched check,
/// so registrations and departures directly change when entries
/// auto-archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Roster {
    members: BTreeMap<String, Member>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member under their normalized username.
    ///
    /// Returns false without touching the roster when the name is already
    /// registered (first sighting wins) or normalizes to the empty string.
    pub fn register(&mut self, member: Member) -> bool {
        let key = normalize_username(&member.username);
        if key.is_empty() || self.members.contains_key(&key) {
            return false;
        }
        self.members.insert(key, member);
        true
    }

    /// Look up a member; accepts `@`-prefixed and differently-cased names.
    pub fn get(&self, username: &str) -> Option<&Member> {
        self.members.get(&normalize_username(username))
    }

    /// Returns true if the username belongs to a registered member.
    pub fn contains(&self, username: &str) -> bool {
        self.members.contains_key(&normalize_username(username))
    }

    /// Remove a member, returning their record if they were registered.
    pub fn remove(&mut self, username: &str) -> Option<Member> {
        self.members.remove(&normalize_username(username))
    }

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members with their normalized keys, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Member)> {
        self.members.iter()
    }
}
