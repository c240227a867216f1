//! Fixed voting window measured from item creation.

use crate::model::item::ItemId;
use crate::store::{KeySpace, OrderedScoreStore, StoreKey, StoreResult};

/// Returns whether a vote at `now` falls inside the window.
///
/// The window is closed on both ends: a vote exactly `window_secs` after
/// creation is still accepted.
pub fn window_open(created_at: i64, now: i64, window_secs: i64) -> bool {
    now.saturating_sub(created_at) <= window_secs
}

/// Window checks against creation times recorded in the store.
pub struct WindowPolicy<'s, S: ?Sized> {
    store: &'s S,
    keys: &'s KeySpace,
    window_secs: i64,
}

impl<'s, S: OrderedScoreStore + ?Sized> WindowPolicy<'s, S> {
    pub fn new(store: &'s S, keys: &'s KeySpace, window_secs: i64) -> Self {
        Self {
            store,
            keys,
            window_secs,
        }
    }

    /// Creation time in epoch seconds, or `None` for an unknown item.
    pub fn created_at(&self, item_id: ItemId) -> StoreResult<Option<i64>> {
        let created = self
            .store
            .score(&self.keys.key(StoreKey::ItemTimes), &item_id.to_string())?;
        Ok(created.map(|seconds| seconds as i64))
    }

    /// Last instant (epoch seconds) at which a vote is still accepted.
    pub fn closes_at(&self, item_id: ItemId) -> StoreResult<Option<i64>> {
        Ok(self
            .created_at(item_id)?
            .map(|created| created.saturating_add(self.window_secs)))
    }

    /// Unknown items are never open.
    pub fn is_voting_open(&self, item_id: ItemId, now: i64) -> StoreResult<bool> {
        Ok(self
            .created_at(item_id)?
            .is_some_and(|created| window_open(created, now, self.window_secs)))
    }
}
