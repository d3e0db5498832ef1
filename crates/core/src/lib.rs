pub mod catalog;
pub mod chats;
pub mod config;
pub mod covers;
pub mod metrics;
pub mod storage;
pub mod testing;
pub mod users;
pub mod watchlist;

pub use catalog::{Catalog, CatalogConfig, CatalogError, CatalogHit, ImdbClient};
pub use chats::{ChatId, ChatState, ChatStore};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use covers::{CoverConfig, CoverError, CoverPayload, CoverService};
pub use storage::{ChatLists, ChatStorage, JsonStorage, StorageError};
pub use users::{normalize_username, Member, Roster};
pub use watchlist::{
    DrawnEntry, Entry, RankedMember, WatchOutcome, WatchedSummary, Watchlist, WatchlistError,
};
