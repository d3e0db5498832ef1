//! External movie catalog lookup.
//!
//! The bot resolves free-text titles against a catalog before anything
//! lands on a list, so every tracked entry carries a real title, year,
//! cover and catalog id.

mod imdb;

pub use imdb::{CatalogConfig, ImdbClient};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// A catalog result complete enough to track: title, year, cover and id
/// all present.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogHit {
    pub title: String,
    pub year: i32,
    pub cover: String,
    pub imdb_id: String,
}

/// A movie catalog the bot can resolve titles against.
///
/// `Ok(None)` is a clean miss (no usable candidate for the query); `Err`
/// means the catalog could not be asked.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve a free-text query to the best candidate.
    async fn lookup(&self, query: &str) -> Result<Option<CatalogHit>, CatalogError>;
}
