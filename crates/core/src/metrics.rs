//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Watchlist activity (additions, archival, restores)
//! - Persistence (best-effort save failures)
//! - Catalog lookups

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Watchlist Metrics
// =============================================================================

/// Entries added to active lists.
pub static ENTRIES_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "marquee_entries_added_total",
        "Total entries added to to-watch lists",
    )
    .unwrap()
});

/// Entries moved to archives by auto-archival.
pub static ENTRIES_ARCHIVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "marquee_entries_archived_total",
        "Total entries auto-archived after everyone watched them",
    )
    .unwrap()
});

/// Restore calls by outcome.
pub static RESTORES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_restores_total", "Total restore attempts"),
        &["result"], // "restored", "noop", "mismatch"
    )
    .unwrap()
});

// =============================================================================
// Persistence Metrics
// =============================================================================

/// Best-effort saves that failed. Writes never roll back in-memory state,
/// so a non-zero value means chats will lose changes on restart.
pub static PERSISTENCE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "marquee_persistence_failures_total",
        "Total failed best-effort state saves",
    )
    .unwrap()
});

// =============================================================================
// Catalog Metrics
// =============================================================================

/// Catalog lookups by outcome.
pub static CATALOG_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_catalog_lookups_total", "Total catalog lookups"),
        &["result"], // "hit", "miss", "error"
    )
    .unwrap()
});

/// Catalog lookup duration in seconds.
pub static CATALOG_LOOKUP_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "marquee_catalog_lookup_duration_seconds",
            "Duration of catalog lookups",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Watchlist
        Box::new(ENTRIES_ADDED.clone()),
        Box::new(ENTRIES_ARCHIVED.clone()),
        Box::new(RESTORES_TOTAL.clone()),
        // Persistence
        Box::new(PERSISTENCE_FAILURES.clone()),
        // Catalog
        Box::new(CATALOG_LOOKUPS.clone()),
        Box::new(CATALOG_LOOKUP_DURATION.clone()),
    ]
}
