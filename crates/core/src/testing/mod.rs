//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! allowing full command-flow testing without a Telegram connection, a real
//! catalog or a writable disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use marquee_core::testing::{fixtures, MockCatalog, MockStorage};
//!
//! let catalog = MockCatalog::new();
//! let storage = MockStorage::new();
//!
//! // Configure mock responses
//! catalog.add_hit("inception", fixtures::catalog_hit("Inception", 2010)).await;
//! storage.set_fail_saves(true);
//!
//! // Wire into a ChatStore...
//! ```

mod mock_catalog;
mod mock_storage;

pub use mock_catalog::MockCatalog;
pub use mock_storage::MockStorage;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::catalog::CatalogHit;
    use crate::users::Member;
    use crate::watchlist::Entry;

    /// Create a test catalog hit with a plausible cover and id.
    pub fn catalog_hit(title: &str, year: i32) -> CatalogHit {
        let slug = title.to_lowercase().replace(' ', "-");
        CatalogHit {
            title: title.to_string(),
            year,
            cover: format!("https://covers.test/{}.jpg", slug),
            imdb_id: format!("tt{:07}", title.len() as u32 * 1000 + year as u32 % 1000),
        }
    }

    /// Create a test entry nobody has watched yet.
    pub fn entry(title: &str, year: i32) -> Entry {
        Entry::from(catalog_hit(title, year))
    }

    /// Create a test entry already watched by the given users.
    pub fn watched_entry(title: &str, year: i32, watchers: &[&str]) -> Entry {
        let mut entry = entry(title, year);
        for watcher in watchers {
            entry.mark_watched(watcher);
        }
        entry
    }

    /// Create a test member whose first name matches their username.
    pub fn member(id: i64, username: &str) -> Member {
        Member::new(id, username, username)
    }
}
