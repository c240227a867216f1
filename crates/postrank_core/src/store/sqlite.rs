//! SQLite-backed `OrderedScoreStore`.
//!
//! # Responsibility
//! - Map sorted-set and set operations onto `sorted_set_entries` and
//!   `set_entries`.
//! - Run every `commit` inside one `BEGIN IMMEDIATE` transaction.
//!
//! # Invariants
//! - Watches are evaluated inside the write transaction, so no other writer
//!   can interleave between the check and the writes.
//! - A failed watch or statement rolls the whole batch back.

use super::{
    OrderedScoreStore, RangeQuery, ScoredMember, StoreError, StoreResult, Transaction, TxOp,
};
use crate::db::{open_db, open_db_in_memory};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Score store over a migrated SQLite connection.
pub struct SqliteScoreStore {
    conn: Mutex<Connection>,
}

impl SqliteScoreStore {
    /// Wraps a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens (or creates) a store file and applies migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }
}

impl OrderedScoreStore for SqliteScoreStore {
    fn score(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        let conn = self.lock()?;
        read_score(&conn, key, member)
    }

    fn set_score(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let conn = self.lock()?;
        write_set_score(&conn, key, member, score)
    }

    fn remove_member(&self, key: &str, member: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        write_remove_member(&conn, key, member)
    }

    fn incr_score(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        let conn = self.lock()?;
        let score = conn.query_row(
            "INSERT INTO sorted_set_entries (key, member, score)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (key, member)
             DO UPDATE SET score = sorted_set_entries.score + excluded.score
             RETURNING score;",
            params![key, member, delta],
            |row| row.get::<_, f64>(0),
        )?;
        Ok(score)
    }

    fn range_by_score(&self, key: &str, query: RangeQuery) -> StoreResult<Vec<ScoredMember>> {
        let conn = self.lock()?;
        let order = if query.descending { "DESC" } else { "ASC" };
        let limit = query.limit.map_or(-1, i64::from);
        let mut stmt = conn.prepare(&format!(
            "SELECT member, score
             FROM sorted_set_entries
             WHERE key = ?1
             ORDER BY score {order}, member ASC
             LIMIT ?2 OFFSET ?3;"
        ))?;

        let mut rows = stmt.query(params![key, limit, i64::from(query.offset)])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(ScoredMember {
                member: row.get("member")?,
                score: row.get("score")?,
            });
        }
        Ok(members)
    }

    fn count_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*)
             FROM sorted_set_entries
             WHERE key = ?1 AND score >= ?2 AND score <= ?3;",
            params![key, min, max],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative count `{count}`")))
    }

    fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        write_add_to_set(&conn, key, member)
    }

    fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT member FROM set_entries WHERE key = ?1 ORDER BY member ASC;")?;
        let mut rows = stmt.query([key])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(row.get(0)?);
        }
        Ok(members)
    }

    fn commit(&self, batch: &Transaction) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        for watch in batch.watches() {
            if read_score(&tx, &watch.key, &watch.member)? != watch.expected {
                // Dropping `tx` rolls back.
                return Err(StoreError::Conflict);
            }
        }

        for op in batch.ops() {
            match op {
                TxOp::SetScore { key, member, score } => {
                    write_set_score(&tx, key, member, *score)?;
                }
                TxOp::IncrScore { key, member, delta } => {
                    tx.execute(
                        "INSERT INTO sorted_set_entries (key, member, score)
                         VALUES (?1, ?2, ?3)
                         ON CONFLICT (key, member)
                         DO UPDATE SET score = sorted_set_entries.score + excluded.score;",
                        params![key, member, delta],
                    )?;
                }
                TxOp::RemoveMember { key, member } => {
                    write_remove_member(&tx, key, member)?;
                }
                TxOp::AddToSet { key, member } => {
                    write_add_to_set(&tx, key, member)?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}

fn read_score(conn: &Connection, key: &str, member: &str) -> StoreResult<Option<f64>> {
    let score = conn
        .query_row(
            "SELECT score FROM sorted_set_entries WHERE key = ?1 AND member = ?2;",
            params![key, member],
            |row| row.get::<_, f64>(0),
        )
        .optional()?;
    Ok(score)
}

fn write_set_score(conn: &Connection, key: &str, member: &str, score: f64) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO sorted_set_entries (key, member, score)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (key, member) DO UPDATE SET score = excluded.score;",
        params![key, member, score],
    )?;
    Ok(())
}

fn write_remove_member(conn: &Connection, key: &str, member: &str) -> StoreResult<bool> {
    let changed = conn.execute(
        "DELETE FROM sorted_set_entries WHERE key = ?1 AND member = ?2;",
        params![key, member],
    )?;
    Ok(changed > 0)
}

fn write_add_to_set(conn: &Connection, key: &str, member: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO set_entries (key, member) VALUES (?1, ?2);",
        params![key, member],
    )?;
    Ok(())
}
