//! In-process score store used as the test double.
//!
//! All state lives behind one mutex, so every `commit` is trivially
//! serializable. Commit failures can be injected to exercise
//! `StoreError::Unavailable` handling.

use super::{
    OrderedScoreStore, RangeQuery, ScoredMember, StoreError, StoreResult, Transaction, TxOp,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    sorted: HashMap<String, BTreeMap<String, f64>>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl MemoryState {
    fn score(&self, key: &str, member: &str) -> Option<f64> {
        self.sorted.get(key).and_then(|entries| entries.get(member)).copied()
    }

    fn apply(&mut self, op: &TxOp) {
        match op {
            TxOp::SetScore { key, member, score } => {
                self.sorted
                    .entry(key.clone())
                    .or_default()
                    .insert(member.clone(), *score);
            }
            TxOp::IncrScore { key, member, delta } => {
                *self
                    .sorted
                    .entry(key.clone())
                    .or_default()
                    .entry(member.clone())
                    .or_insert(0.0) += *delta;
            }
            TxOp::RemoveMember { key, member } => {
                if let Some(entries) = self.sorted.get_mut(key) {
                    entries.remove(member);
                    if entries.is_empty() {
                        self.sorted.remove(key);
                    }
                }
            }
            TxOp::AddToSet { key, member } => {
                self.sets.entry(key.clone()).or_default().insert(member.clone());
            }
        }
    }
}

/// Mutex-guarded in-memory `OrderedScoreStore`.
#[derive(Debug, Default)]
pub struct MemoryScoreStore {
    state: Mutex<MemoryState>,
    failing_commits: AtomicU32,
    commits: AtomicU64,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with `StoreError::Unavailable`
    /// without writing anything.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Number of successfully applied commits.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".to_string()))
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

impl OrderedScoreStore for MemoryScoreStore {
    fn score(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        Ok(self.lock()?.score(key, member))
    }

    fn set_score(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.lock()?.apply(&TxOp::SetScore {
            key: key.to_string(),
            member: member.to_string(),
            score,
        });
        Ok(())
    }

    fn remove_member(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let existed = state.score(key, member).is_some();
        state.apply(&TxOp::RemoveMember {
            key: key.to_string(),
            member: member.to_string(),
        });
        Ok(existed)
    }

    fn incr_score(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        let mut state = self.lock()?;
        state.apply(&TxOp::IncrScore {
            key: key.to_string(),
            member: member.to_string(),
            delta,
        });
        state
            .score(key, member)
            .ok_or_else(|| StoreError::InvalidData(format!("member `{member}` vanished")))
    }

    fn range_by_score(&self, key: &str, query: RangeQuery) -> StoreResult<Vec<ScoredMember>> {
        let state = self.lock()?;
        let mut members: Vec<ScoredMember> = state
            .sorted
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(member, score)| ScoredMember {
                        member: member.clone(),
                        score: *score,
                    })
                    .collect()
            })
            .unwrap_or_default();

        members.sort_by(|a, b| {
            let by_score = if query.descending {
                b.score.total_cmp(&a.score)
            } else {
                a.score.total_cmp(&b.score)
            };
            by_score.then_with(|| a.member.cmp(&b.member))
        });

        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(members
            .into_iter()
            .skip(query.offset as usize)
            .take(limit)
            .collect())
    }

    fn count_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64> {
        let state = self.lock()?;
        let count = state.sorted.get(key).map_or(0, |entries| {
            entries
                .values()
                .filter(|score| **score >= min && **score <= max)
                .count()
        });
        Ok(count as u64)
    }

    fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
        self.lock()?.apply(&TxOp::AddToSet {
            key: key.to_string(),
            member: member.to_string(),
        });
        Ok(())
    }

    fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .sets
            .get(key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn commit(&self, tx: &Transaction) -> StoreResult<()> {
        let mut state = self.lock()?;
        if self.take_injected_failure() {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        for watch in tx.watches() {
            if state.score(&watch.key, &watch.member) != watch.expected {
                return Err(StoreError::Conflict);
            }
        }

        for op in tx.ops() {
            state.apply(op);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
