//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Marquee bot:
//! - Update polling metrics (received, failures)
//! - Command dispatch counts
//! - Telegram delivery failures
//!
//! Core metrics (watchlist, catalog, persistence) are registered here too.

use once_cell::sync::Lazy;
use prometheus::{self, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Updates pulled off the long poll.
pub static UPDATES_RECEIVED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "marquee_updates_received_total",
        "Total updates received from Telegram",
    )
    .unwrap()
});

/// Commands dispatched, by command name.
pub static COMMANDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_commands_total", "Total commands dispatched"),
        &["command"],
    )
    .unwrap()
});

/// Messages and photos Telegram refused to deliver.
pub static TELEGRAM_SEND_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "marquee_telegram_send_failures_total",
        "Total failed Telegram send attempts",
    )
    .unwrap()
});

/// Failed getUpdates calls.
pub static POLL_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "marquee_poll_failures_total",
        "Total failed update polls",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(UPDATES_RECEIVED.clone()))
        .unwrap();
    registry.register(Box::new(COMMANDS_TOTAL.clone())).unwrap();
    registry
        .register(Box::new(TELEGRAM_SEND_FAILURES.clone()))
        .unwrap();
    registry.register(Box::new(POLL_FAILURES.clone())).unwrap();

    // Core metrics (watchlist, catalog, persistence)
    for metric in marquee_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
