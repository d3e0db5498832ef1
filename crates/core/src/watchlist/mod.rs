//! The shared to-watch list: entries, the three parallel lists and the
//! mutation rules that keep them consistent.

mod engine;
mod entry;

pub use engine::{
    DrawnEntry, RankedMember, WatchOutcome, WatchedSummary, Watchlist, WatchlistError,
};
pub use entry::Entry;
