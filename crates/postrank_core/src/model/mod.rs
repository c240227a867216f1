//! Domain model for ranked items and the votes cast on them.
//!
//! # Responsibility
//! - Define identifiers and value types shared by store, ledger and services.
//! - Keep the three-state vote closed over `{-1, 0, +1}`.
//!
//! # Invariants
//! - A `VoteValue` can only be built from one of the three legal values.
//! - Identifiers render without `:` so storage keys stay collision-free.

pub mod item;
pub mod vote;
