//! Ordered score store contract.
//!
//! # Responsibility
//! - Define the capability interface the ledger and services depend on:
//!   per-key ordered member→score mappings, membership sets, and atomic
//!   multi-operation transactions.
//! - Name the four logical namespaces the ranking core persists into.
//!
//! # Invariants
//! - `commit` applies every queued operation or none of them.
//! - Watches are checked before any write; one failed watch discards the
//!   whole batch with `StoreError::Conflict`.
//! - Rendered keys of different namespaces never collide.

use crate::db::DbError;
use crate::model::item::{CommunityId, ItemId};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryScoreStore;
pub use sqlite::SqliteScoreStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure surfaced by a score store implementation.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// A watched entry changed between read and commit.
    Conflict,
    Unavailable(String),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict => write!(f, "transaction aborted: watched entry changed"),
            Self::Unavailable(message) => write!(f, "score store unavailable: {message}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Conflict | Self::Unavailable(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Logical namespaces persisted by the ranking core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Item → creation time (epoch seconds).
    ItemTimes,
    /// Item → aggregate score.
    ItemScores,
    /// User → vote value, one mapping per item.
    ItemVoters(ItemId),
    /// Set of item ids, one per community.
    CommunityItems(CommunityId),
}

/// Renders `StoreKey`s under a shared prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, key: StoreKey) -> String {
        match key {
            StoreKey::ItemTimes => format!("{}post:time", self.prefix),
            StoreKey::ItemScores => format!("{}post:score", self.prefix),
            StoreKey::ItemVoters(item) => format!("{}post:voted:{item}", self.prefix),
            StoreKey::CommunityItems(community) => {
                format!("{}community:{community}", self.prefix)
            }
        }
    }
}

/// One member of an ordered mapping with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// Ordered read options. Ties are always broken by member ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeQuery {
    pub descending: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Compare-and-set guard checked at commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct Watch {
    pub key: String,
    pub member: String,
    /// `None` requires the member to be absent.
    pub expected: Option<f64>,
}

/// Write queued inside a `Transaction`.
#[derive(Debug, Clone, PartialEq)]
pub enum TxOp {
    SetScore {
        key: String,
        member: String,
        score: f64,
    },
    IncrScore {
        key: String,
        member: String,
        delta: f64,
    },
    RemoveMember {
        key: String,
        member: String,
    },
    AddToSet {
        key: String,
        member: String,
    },
}

/// Batch of guarded writes applied atomically by `OrderedScoreStore::commit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    watches: Vec<Watch>,
    ops: Vec<TxOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(mut self, key: &str, member: &str, expected: Option<f64>) -> Self {
        self.watches.push(Watch {
            key: key.to_string(),
            member: member.to_string(),
            expected,
        });
        self
    }

    pub fn set_score(mut self, key: &str, member: &str, score: f64) -> Self {
        self.ops.push(TxOp::SetScore {
            key: key.to_string(),
            member: member.to_string(),
            score,
        });
        self
    }

    pub fn incr_score(mut self, key: &str, member: &str, delta: f64) -> Self {
        self.ops.push(TxOp::IncrScore {
            key: key.to_string(),
            member: member.to_string(),
            delta,
        });
        self
    }

    pub fn remove_member(mut self, key: &str, member: &str) -> Self {
        self.ops.push(TxOp::RemoveMember {
            key: key.to_string(),
            member: member.to_string(),
        });
        self
    }

    pub fn add_to_set(mut self, key: &str, member: &str) -> Self {
        self.ops.push(TxOp::AddToSet {
            key: key.to_string(),
            member: member.to_string(),
        });
        self
    }

    pub fn watches(&self) -> &[Watch] {
        &self.watches
    }

    pub fn ops(&self) -> &[TxOp] {
        &self.ops
    }
}

/// Capability interface over an ordered score store.
///
/// Implementations are shared across threads; every method takes `&self`.
pub trait OrderedScoreStore: Send + Sync {
    /// Returns the member's score, or `None` when absent.
    fn score(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;
    fn set_score(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;
    /// Returns whether the member existed.
    fn remove_member(&self, key: &str, member: &str) -> StoreResult<bool>;
    /// Adds `delta` to the member's score (absent counts as 0); returns the new score.
    fn incr_score(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64>;
    fn range_by_score(&self, key: &str, query: RangeQuery) -> StoreResult<Vec<ScoredMember>>;
    /// Counts members with `min <= score <= max`.
    fn count_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64>;
    fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()>;
    /// Returns set members sorted ascending.
    fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;
    /// Applies the batch atomically.
    ///
    /// # Errors
    /// - `StoreError::Conflict` when any watch fails; nothing is written.
    fn commit(&self, tx: &Transaction) -> StoreResult<()>;
}

impl<S: OrderedScoreStore + ?Sized> OrderedScoreStore for std::sync::Arc<S> {
    fn score(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        (**self).score(key, member)
    }

    fn set_score(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        (**self).set_score(key, member, score)
    }

    fn remove_member(&self, key: &str, member: &str) -> StoreResult<bool> {
        (**self).remove_member(key, member)
    }

    fn incr_score(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        (**self).incr_score(key, member, delta)
    }

    fn range_by_score(&self, key: &str, query: RangeQuery) -> StoreResult<Vec<ScoredMember>> {
        (**self).range_by_score(key, query)
    }

    fn count_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64> {
        (**self).count_by_score(key, min, max)
    }

    fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
        (**self).add_to_set(key, member)
    }

    fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        (**self).set_members(key)
    }

    fn commit(&self, tx: &Transaction) -> StoreResult<()> {
        (**self).commit(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::{KeySpace, StoreKey, Transaction, TxOp};
    use crate::model::item::{CommunityId, ItemId};
    use std::collections::HashSet;

    #[test]
    fn namespaces_render_distinct_keys() {
        let space = KeySpace::new("postrank:");
        let keys: HashSet<String> = [
            StoreKey::ItemTimes,
            StoreKey::ItemScores,
            StoreKey::ItemVoters(ItemId(7)),
            StoreKey::CommunityItems(CommunityId(7)),
        ]
        .into_iter()
        .map(|key| space.key(key))
        .collect();

        assert_eq!(keys.len(), 4);
        assert!(keys.contains("postrank:post:voted:7"));
        assert!(keys.contains("postrank:community:7"));
    }

    #[test]
    fn transaction_keeps_operation_order() {
        let tx = Transaction::new()
            .watch("k", "m", None)
            .incr_score("k", "m", 2.0)
            .remove_member("k", "m");

        assert_eq!(tx.watches().len(), 1);
        assert!(matches!(tx.ops()[0], TxOp::IncrScore { delta, .. } if delta == 2.0));
        assert!(matches!(tx.ops()[1], TxOp::RemoveMember { .. }));
    }
}
