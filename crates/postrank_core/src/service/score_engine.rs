//! Vote-driven score updates.
//!
//! # Responsibility
//! - Validate a vote, gate it on the voting window, and derive the score
//!   delta from the user's previous vote.
//! - Commit the score increment and the ledger write as one transaction,
//!   guarded by a compare-and-set on the user's ledger entry.
//!
//! # Invariants
//! - Each successful vote moves the score by
//!   `sign(new - old) * |new - old| * score_per_vote`.
//! - Re-submitting the current vote state is rejected, never a no-op.
//! - A conflicting commit re-executes from the window check; store failures
//!   are returned as-is and never retried.

use crate::clock::Clock;
use crate::config::{ConfigResult, EngineConfig};
use crate::model::item::{CommunityId, Item, ItemId};
use crate::model::vote::{UserId, VoteValue};
use crate::repo::vote_ledger::VoteLedger;
use crate::service::registrar::{ItemRegistrar, RegistrarResult};
use crate::service::window::WindowPolicy;
use crate::store::{KeySpace, OrderedScoreStore, StoreError, StoreKey, Transaction};
use log::{debug, error, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type VoteResult<T> = Result<T, VoteError>;

#[derive(Debug)]
pub enum VoteError {
    /// The item is unknown or its voting window has closed.
    VoteWindowExpired { item_id: ItemId },
    /// The submitted value equals the user's current vote state.
    DuplicateVote { item_id: ItemId, user_id: UserId },
    InvalidVoteValue(f64),
    InvalidUserId,
    InvalidItemId(String),
    /// Every attempt lost an optimistic-lock race.
    Contention { item_id: ItemId, attempts: u32 },
    Store(StoreError),
}

impl VoteError {
    /// Only lost races are worth re-submitting unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }
}

impl Display for VoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VoteWindowExpired { item_id } => {
                write!(f, "voting window closed for item {item_id}")
            }
            Self::DuplicateVote { item_id, .. } => {
                write!(f, "duplicate vote on item {item_id}")
            }
            Self::InvalidVoteValue(value) => {
                write!(f, "invalid vote value `{value}`; expected -1, 0 or 1")
            }
            Self::InvalidUserId => write!(f, "user id cannot be empty"),
            Self::InvalidItemId(raw) => write!(f, "invalid item id `{raw}`"),
            Self::Contention { item_id, attempts } => write!(
                f,
                "vote on item {item_id} kept conflicting after {attempts} attempts"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for VoteError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Outcome of an applied vote.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteReceipt {
    pub item_id: ItemId,
    pub previous: VoteValue,
    pub current: VoteValue,
    pub score_delta: f64,
    /// Commit attempts used, including the successful one.
    pub attempts: u32,
}

/// Signed score change for a `previous -> current` transition.
pub fn score_delta(previous: VoteValue, current: VoteValue, score_per_vote: f64) -> f64 {
    let (old, new) = (previous.as_f64(), current.as_f64());
    let diff = (old - new).abs();
    let direction = if new > old { 1.0 } else { -1.0 };
    direction * diff * score_per_vote
}

/// Stateless vote engine over a shared store.
pub struct ScoreEngine<S, C> {
    store: S,
    clock: C,
    config: EngineConfig,
    keys: KeySpace,
}

impl<S: OrderedScoreStore, C: Clock> ScoreEngine<S, C> {
    /// Builds an engine after validating `config`.
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` for a non-positive window, a
    ///   non-finite or non-positive score-per-vote, or a blank key prefix.
    pub fn new(store: S, clock: C, config: EngineConfig) -> ConfigResult<Self> {
        config.validate()?;
        let keys = KeySpace::new(config.key_prefix.clone());
        Ok(Self {
            store,
            clock,
            config,
            keys,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn ledger(&self) -> VoteLedger<'_, S> {
        VoteLedger::new(&self.store, &self.keys)
    }

    pub fn window(&self) -> WindowPolicy<'_, S> {
        WindowPolicy::new(&self.store, &self.keys, self.config.vote_window_secs)
    }

    pub fn registrar(&self) -> ItemRegistrar<'_, S, C> {
        ItemRegistrar::new(&self.store, &self.clock, &self.keys)
    }

    /// Shorthand for `registrar().create_item(..)`.
    pub fn create_item(
        &self,
        item_id: ItemId,
        community_id: CommunityId,
    ) -> RegistrarResult<Item> {
        self.registrar().create_item(item_id, community_id)
    }

    /// External entry point taking the item id in string form.
    pub fn vote_str(&self, user_id: &str, item_id: &str, value: f64) -> VoteResult<VoteReceipt> {
        let parsed = item_id
            .parse()
            .map_err(|_| VoteError::InvalidItemId(item_id.to_string()))?;
        self.vote(user_id, parsed, value)
    }

    /// Applies `value` (`-1`, `0` or `+1`) as `user_id`'s vote on `item_id`.
    ///
    /// # Errors
    /// - `InvalidVoteValue` / `InvalidUserId` before touching the store.
    /// - `VoteWindowExpired` for unknown or expired items.
    /// - `DuplicateVote` when `value` is already the user's vote state.
    /// - `Contention` after `max_conflict_retries` lost races.
    /// - `Store` for store failures, unmodified.
    pub fn vote(&self, user_id: &str, item_id: ItemId, value: f64) -> VoteResult<VoteReceipt> {
        let value =
            VoteValue::try_from(value).map_err(|invalid| VoteError::InvalidVoteValue(invalid.0))?;
        let user_id = UserId::new(user_id).ok_or(VoteError::InvalidUserId)?;
        self.cast(&user_id, item_id, value)
    }

    /// Typed form of `vote`.
    pub fn cast(
        &self,
        user_id: &UserId,
        item_id: ItemId,
        value: VoteValue,
    ) -> VoteResult<VoteReceipt> {
        let max_attempts = self.config.max_conflict_retries.saturating_add(1);

        for attempt in 1..=max_attempts {
            match self.try_cast(user_id, item_id, value, attempt) {
                Err(VoteError::Store(StoreError::Conflict)) => {
                    warn!(
                        "event=vote_conflict_retry module=score_engine status=retry item_id={item_id} attempt={attempt}"
                    );
                }
                outcome => return outcome,
            }
        }

        Err(VoteError::Contention {
            item_id,
            attempts: max_attempts,
        })
    }

    fn try_cast(
        &self,
        user_id: &UserId,
        item_id: ItemId,
        value: VoteValue,
        attempt: u32,
    ) -> VoteResult<VoteReceipt> {
        let now = self.clock.now_unix();
        if !self.window().is_voting_open(item_id, now)? {
            debug!(
                "event=vote_apply module=score_engine status=rejected item_id={item_id} error_code=window_expired"
            );
            return Err(VoteError::VoteWindowExpired { item_id });
        }

        let ledger = self.ledger();
        let previous = ledger.get(item_id, user_id)?;
        if previous == value {
            debug!(
                "event=vote_apply module=score_engine status=rejected item_id={item_id} error_code=duplicate_vote"
            );
            return Err(VoteError::DuplicateVote {
                item_id,
                user_id: user_id.clone(),
            });
        }

        let delta = score_delta(previous, value, self.config.score_per_vote);
        let tx = ledger
            .guard(Transaction::new(), item_id, user_id, previous)
            .incr_score(
                &self.keys.key(StoreKey::ItemScores),
                &item_id.to_string(),
                delta,
            );
        let tx = ledger.record(tx, item_id, user_id, value);

        match self.store.commit(&tx) {
            Ok(()) => {
                debug!(
                    "event=vote_apply module=score_engine status=ok item_id={item_id} previous={} current={} delta={delta} attempt={attempt} user_len={}",
                    previous.as_f64(),
                    value.as_f64(),
                    user_id.as_str().len()
                );
                Ok(VoteReceipt {
                    item_id,
                    previous,
                    current: value,
                    score_delta: delta,
                    attempts: attempt,
                })
            }
            Err(StoreError::Conflict) => Err(StoreError::Conflict.into()),
            Err(err) => {
                error!(
                    "event=vote_apply module=score_engine status=error item_id={item_id} error={err}"
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{score_delta, VoteError};
    use crate::model::item::ItemId;
    use crate::model::vote::VoteValue::{Down, Retract, Up};
    use crate::store::StoreError;

    #[test]
    fn delta_covers_all_six_transitions() {
        let spv = 432.0;
        assert_eq!(score_delta(Retract, Up, spv), 432.0);
        assert_eq!(score_delta(Retract, Down, spv), -432.0);
        assert_eq!(score_delta(Up, Retract, spv), -432.0);
        assert_eq!(score_delta(Down, Retract, spv), 432.0);
        assert_eq!(score_delta(Up, Down, spv), -864.0);
        assert_eq!(score_delta(Down, Up, spv), 864.0);
    }

    #[test]
    fn only_contention_is_retryable() {
        assert!(VoteError::Contention {
            item_id: ItemId(1),
            attempts: 3
        }
        .is_retryable());
        assert!(!VoteError::VoteWindowExpired { item_id: ItemId(1) }.is_retryable());
        assert!(!VoteError::Store(StoreError::Unavailable("down".to_string())).is_retryable());
    }
}
