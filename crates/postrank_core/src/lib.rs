//! Core ranking logic for PostRank.
//! Vote-driven, time-windowed item scores over an ordered score store.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::item::{CommunityId, Item, ItemId, ItemSnapshot, RankedItem};
pub use model::vote::{InvalidVoteValue, UserId, VoteTally, VoteValue};
pub use repo::vote_ledger::VoteLedger;
pub use service::registrar::{ItemRegistrar, RegistrarError, RegistrarResult};
pub use service::score_engine::{score_delta, ScoreEngine, VoteError, VoteReceipt, VoteResult};
pub use service::window::{window_open, WindowPolicy};
pub use store::{
    KeySpace, MemoryScoreStore, OrderedScoreStore, RangeQuery, ScoredMember, SqliteScoreStore,
    StoreError, StoreKey, StoreResult, Transaction,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
