//! Mock catalog for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{Catalog, CatalogError, CatalogHit};

/// Mock implementation of the Catalog trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable hits per query
/// - Track queries for assertions
/// - Simulate failures
///
/// # Example
///
/// ```rust,ignore
/// use marquee_core::testing::{fixtures, MockCatalog};
///
/// let catalog = MockCatalog::new();
/// catalog.add_hit("inception", fixtures::catalog_hit("Inception", 2010)).await;
///
/// let hit = catalog.lookup("inception").await?;
/// assert!(hit.is_some());
/// ```
#[derive(Debug)]
pub struct MockCatalog {
    /// Hits keyed by the exact query string.
    hits: Arc<RwLock<HashMap<String, CatalogHit>>>,
    /// Recorded queries.
    queries: Arc<RwLock<Vec<String>>>,
    /// If set, the next lookup will fail with this error.
    next_error: Arc<RwLock<Option<CatalogError>>>,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalog {
    /// Create a new empty mock catalog. Every lookup misses until hits are
    /// added.
    pub fn new() -> Self {
        Self {
            hits: Arc::new(RwLock::new(HashMap::new())),
            queries: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Map a query string to a hit.
    pub async fn add_hit(&self, query: &str, hit: CatalogHit) {
        self.hits.write().await.insert(query.to_string(), hit);
    }

    /// Clear all configured hits.
    pub async fn clear_hits(&self) {
        self.hits.write().await.clear();
    }

    /// Configure the next lookup to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get all recorded queries.
    pub async fn recorded_queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }

    /// Get the number of lookups performed.
    pub async fn query_count(&self) -> usize {
        self.queries.read().await.len()
    }

    async fn take_error(&self) -> Option<CatalogError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn lookup(&self, query: &str) -> Result<Option<CatalogHit>, CatalogError> {
        self.queries.write().await.push(query.to_string());
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self.hits.read().await.get(query).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_lookup_returns_configured_hit() {
        let catalog = MockCatalog::new();
        catalog
            .add_hit("inception", fixtures::catalog_hit("Inception", 2010))
            .await;

        let hit = catalog.lookup("inception").await.unwrap();
        assert_eq!(hit.map(|h| h.title), Some("Inception".to_string()));

        let miss = catalog.lookup("tenet").await.unwrap();
        assert!(miss.is_none());

        assert_eq!(catalog.recorded_queries().await, ["inception", "tenet"]);
    }

    #[tokio::test]
    async fn test_next_error_fails_one_lookup() {
        let catalog = MockCatalog::new();
        catalog
            .add_hit("inception", fixtures::catalog_hit("Inception", 2010))
            .await;
        catalog
            .set_next_error(CatalogError::ParseError("scripted".to_string()))
            .await;

        assert!(catalog.lookup("inception").await.is_err());
        assert!(catalog.lookup("inception").await.unwrap().is_some());
    }
}
