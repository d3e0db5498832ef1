//! Watchlist entry type.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogHit;

/// A movie tracked by a chat.
///
/// The identity key for de-duplication is the exact `(title, year)` pair;
/// casing differences make different entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    /// Display title as returned by the catalog.
    pub title: String,
    /// Release year.
    pub year: i32,
    /// Cover image URL.
    pub cover: String,
    /// IMDb title id (e.g. "tt0133093").
    pub imdb_id: String,
    /// Normalized usernames that marked this entry watched, in insertion
    /// order.
    #[serde(default)]
    pub watched_by: Vec<String>,
}

impl Entry {
    /// Create an entry with an empty watched-by list.
    pub fn new(
        title: impl Into<String>,
        year: i32,
        cover: impl Into<String>,
        imdb_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            year,
            cover: cover.into(),
            imdb_id: imdb_id.into(),
            watched_by: Vec::new(),
        }
    }

    /// Returns true if both entries refer to the same movie.
    pub fn same_identity(&self, other: &Entry) -> bool {
        self.title == other.title && self.year == other.year
    }

    /// Returns true if `user` (normalized) has marked this entry watched.
    pub fn is_watched_by(&self, user: &str) -> bool {
        self.watched_by.iter().any(|w| w == user)
    }

    /// Record `user` as having watched this entry. Returns false if the
    /// user was already recorded.
    pub fn mark_watched(&mut self, user: &str) -> bool {
        if self.is_watched_by(user) {
            return false;
        }
        self.watched_by.push(user.to_string());
        true
    }

    /// Remove `user` from the watched-by list. Returns false if the user
    /// was not recorded.
    pub fn mark_unwatched(&mut self, user: &str) -> bool {
        let before = self.watched_by.len();
        self.watched_by.retain(|w| w != user);
        self.watched_by.len() != before
    }

    /// IMDb title page URL.
    pub fn imdb_url(&self) -> String {
        format!("https://www.imdb.com/title/{}", self.imdb_id)
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.title, self.year)
    }
}

impl From<CatalogHit> for Entry {
    fn from(hit: CatalogHit) -> Self {
        Self {
            title: hit.title,
            year: hit.year,
            cover: hit.cover,
            imdb_id: hit.imdb_id,
            watched_by: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, year: i32) -> Entry {
        Entry::new(title, year, "https://covers.test/x.jpg", "tt0000001")
    }

    #[test]
    fn test_identity_is_exact_title_and_year() {
        let a = entry("The Matrix", 1999);
        assert!(a.same_identity(&entry("The Matrix", 1999)));
        assert!(!a.same_identity(&entry("The Matrix", 2003)));
        assert!(!a.same_identity(&entry("the matrix", 1999)));
    }

    #[test]
    fn test_identity_ignores_catalog_id() {
        let a = Entry::new("Heat", 1995, "c1", "tt0113277");
        let b = Entry::new("Heat", 1995, "c2", "tt9999999");
        assert!(a.same_identity(&b));
    }

    #[test]
    fn test_mark_watched_is_idempotent() {
        let mut e = entry("Alien", 1979);
        assert!(e.mark_watched("alice"));
        assert!(!e.mark_watched("alice"));
        assert!(e.mark_watched("bob"));
        assert_eq!(e.watched_by, ["alice", "bob"]);
    }

    #[test]
    fn test_mark_unwatched() {
        let mut e = entry("Alien", 1979);
        e.mark_watched("alice");
        assert!(e.mark_unwatched("alice"));
        assert!(!e.mark_unwatched("alice"));
        assert!(e.watched_by.is_empty());
    }

    #[test]
    fn test_display_is_title_and_year() {
        assert_eq!(entry("Heat", 1995).to_string(), "Heat (1995)");
    }

    #[test]
    fn test_watched_by_defaults_when_absent() {
        let json = r#"{"title":"Heat","year":1995,"cover":"c","imdb_id":"tt0113277"}"#;
        let e: Entry = serde_json::from_str(json).unwrap();
        assert!(e.watched_by.is_empty());
    }

    #[test]
    fn test_from_catalog_hit() {
        let hit = CatalogHit {
            title: "Heat".to_string(),
            year: 1995,
            cover: "https://covers.test/heat.jpg".to_string(),
            imdb_id: "tt0113277".to_string(),
        };
        let e = Entry::from(hit);
        assert_eq!(e.title, "Heat");
        assert_eq!(e.year, 1995);
        assert!(e.watched_by.is_empty());
        assert_eq!(e.imdb_url(), "https://www.imdb.com/title/tt0113277");
    }
}
