//! Item registration and ranked reads.
//!
//! # Responsibility
//! - Create the tracked state of a new item in one transaction: creation
//!   time, seed score, community membership.
//! - Expose point and ordered reads over that state.
//!
//! # Invariants
//! - The seed score equals the creation timestamp.
//! - Registering an id twice is rejected before anything is written.

use crate::clock::Clock;
use crate::model::item::{CommunityId, Item, ItemId, ItemSnapshot, RankedItem};
use crate::store::{
    KeySpace, OrderedScoreStore, RangeQuery, ScoredMember, StoreError, StoreKey, Transaction,
};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RegistrarResult<T> = Result<T, RegistrarError>;

#[derive(Debug)]
pub enum RegistrarError {
    ItemAlreadyExists(ItemId),
    Store(StoreError),
}

impl Display for RegistrarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemAlreadyExists(id) => write!(f, "item already registered: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistrarError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ItemAlreadyExists(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for RegistrarError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Entry point for items entering the ranking.
pub struct ItemRegistrar<'s, S: ?Sized, C: ?Sized> {
    store: &'s S,
    clock: &'s C,
    keys: &'s KeySpace,
}

impl<'s, S, C> ItemRegistrar<'s, S, C>
where
    S: OrderedScoreStore + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(store: &'s S, clock: &'s C, keys: &'s KeySpace) -> Self {
        Self { store, clock, keys }
    }

    /// Registers `item_id` as created now in `community_id`.
    ///
    /// # Errors
    /// - `ItemAlreadyExists` when the id already has a creation time.
    /// - `Store` for any store failure; nothing is written in either case.
    pub fn create_item(&self, item_id: ItemId, community_id: CommunityId) -> RegistrarResult<Item> {
        let now = self.clock.now_unix();
        let member = item_id.to_string();
        let times_key = self.keys.key(StoreKey::ItemTimes);

        let tx = Transaction::new()
            .watch(&times_key, &member, None)
            .set_score(&times_key, &member, now as f64)
            .set_score(&self.keys.key(StoreKey::ItemScores), &member, now as f64)
            .add_to_set(&self.keys.key(StoreKey::CommunityItems(community_id)), &member);

        match self.store.commit(&tx) {
            Ok(()) => {
                info!(
                    "event=item_create module=registrar status=ok item_id={item_id} community_id={community_id} created_at={now}"
                );
                Ok(Item {
                    id: item_id,
                    created_at: now,
                    score: now as f64,
                    community_id,
                })
            }
            Err(StoreError::Conflict) => {
                info!(
                    "event=item_create module=registrar status=rejected item_id={item_id} error_code=item_exists"
                );
                Err(RegistrarError::ItemAlreadyExists(item_id))
            }
            Err(err) => {
                error!(
                    "event=item_create module=registrar status=error item_id={item_id} error={err}"
                );
                Err(err.into())
            }
        }
    }

    /// Reads creation time and current score; `None` for unknown items.
    pub fn get_item(&self, item_id: ItemId) -> RegistrarResult<Option<ItemSnapshot>> {
        let member = item_id.to_string();
        let Some(created) = self
            .store
            .score(&self.keys.key(StoreKey::ItemTimes), &member)?
        else {
            return Ok(None);
        };

        let score = self
            .store
            .score(&self.keys.key(StoreKey::ItemScores), &member)?
            .ok_or_else(|| {
                StoreError::InvalidData(format!("item {item_id} has a creation time but no score"))
            })?;

        Ok(Some(ItemSnapshot {
            id: item_id,
            created_at: created as i64,
            score,
        }))
    }

    /// Item ids published in a community, ascending.
    pub fn community_items(&self, community_id: CommunityId) -> RegistrarResult<Vec<ItemId>> {
        let members = self
            .store
            .set_members(&self.keys.key(StoreKey::CommunityItems(community_id)))?;
        let mut ids = members
            .iter()
            .map(|member| parse_item_id(member))
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort();
        Ok(ids)
    }

    /// Highest-scoring items first.
    pub fn top_items(&self, limit: u32, offset: u32) -> RegistrarResult<Vec<RankedItem>> {
        self.ranked(StoreKey::ItemScores, limit, offset)
    }

    /// Most recently created items first; `score` carries the creation time.
    pub fn latest_items(&self, limit: u32, offset: u32) -> RegistrarResult<Vec<RankedItem>> {
        self.ranked(StoreKey::ItemTimes, limit, offset)
    }

    fn ranked(&self, key: StoreKey, limit: u32, offset: u32) -> RegistrarResult<Vec<RankedItem>> {
        let query = RangeQuery {
            descending: true,
            limit: Some(limit),
            offset,
        };
        let entries = self.store.range_by_score(&self.keys.key(key), query)?;
        let ranked = entries
            .into_iter()
            .map(|ScoredMember { member, score }| {
                Ok(RankedItem {
                    id: parse_item_id(&member)?,
                    score,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(ranked)
    }
}

fn parse_item_id(member: &str) -> Result<ItemId, StoreError> {
    member
        .parse()
        .map_err(|_| StoreError::InvalidData(format!("invalid item id `{member}` in store")))
}
