//! Per-item ledger of which user cast which vote.
//!
//! # Responsibility
//! - Read a user's current vote on an item.
//! - Queue ledger writes (and their compare-and-set guard) into a
//!   `Transaction` so they commit together with the score change.
//!
//! # Invariants
//! - At most one entry per `(item, user)`; a new vote overwrites, `Retract`
//!   removes.
//! - Stored values outside `{-1, +1}` are reported as invalid data.

use crate::model::item::ItemId;
use crate::model::vote::{UserId, VoteTally, VoteValue};
use crate::store::{
    KeySpace, OrderedScoreStore, RangeQuery, StoreError, StoreKey, StoreResult, Transaction,
};

/// Ledger view over a borrowed store.
pub struct VoteLedger<'s, S: ?Sized> {
    store: &'s S,
    keys: &'s KeySpace,
}

impl<'s, S: OrderedScoreStore + ?Sized> VoteLedger<'s, S> {
    pub fn new(store: &'s S, keys: &'s KeySpace) -> Self {
        Self { store, keys }
    }

    /// Storage key holding the voters of `item_id`.
    pub fn key(&self, item_id: ItemId) -> String {
        self.keys.key(StoreKey::ItemVoters(item_id))
    }

    /// Returns the user's current vote, `Retract` when none is recorded.
    pub fn get(&self, item_id: ItemId, user_id: &UserId) -> StoreResult<VoteValue> {
        let stored = self.store.score(&self.key(item_id), user_id.as_str())?;
        decode(user_id.as_str(), stored)
    }

    /// Lists every active voter of the item, ordered by user id.
    pub fn voters(&self, item_id: ItemId) -> StoreResult<Vec<(UserId, VoteValue)>> {
        let mut entries = self
            .store
            .range_by_score(&self.key(item_id), RangeQuery::default())?;
        entries.sort_by(|a, b| a.member.cmp(&b.member));

        entries
            .into_iter()
            .map(|entry| {
                let vote = decode(&entry.member, Some(entry.score))?;
                let user = UserId::new(entry.member.clone()).ok_or_else(|| {
                    StoreError::InvalidData("blank user id in vote ledger".to_string())
                })?;
                Ok((user, vote))
            })
            .collect()
    }

    /// Counts active up and down votes.
    pub fn tally(&self, item_id: ItemId) -> StoreResult<VoteTally> {
        let key = self.key(item_id);
        Ok(VoteTally {
            up: self.store.count_by_score(&key, 1.0, 1.0)?,
            down: self.store.count_by_score(&key, -1.0, -1.0)?,
        })
    }

    /// Guards the batch on the user's entry still being `expected`.
    pub fn guard(
        &self,
        tx: Transaction,
        item_id: ItemId,
        user_id: &UserId,
        expected: VoteValue,
    ) -> Transaction {
        tx.watch(&self.key(item_id), user_id.as_str(), expected.ledger_score())
    }

    /// Queues the write that makes `value` the user's recorded vote.
    pub fn record(
        &self,
        tx: Transaction,
        item_id: ItemId,
        user_id: &UserId,
        value: VoteValue,
    ) -> Transaction {
        let key = self.key(item_id);
        match value.ledger_score() {
            Some(score) => tx.set_score(&key, user_id.as_str(), score),
            None => tx.remove_member(&key, user_id.as_str()),
        }
    }
}

fn decode(member: &str, stored: Option<f64>) -> StoreResult<VoteValue> {
    VoteValue::from_ledger_score(stored).map_err(|err| {
        StoreError::InvalidData(format!(
            "ledger entry for user of length {} holds {err}",
            member.len()
        ))
    })
}
