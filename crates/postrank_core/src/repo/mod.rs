//! Store-backed record keeping.
//!
//! # Responsibility
//! - Translate domain reads/writes into `OrderedScoreStore` keys and members.
//! - Keep key rendering out of the service layer.
//!
//! # Invariants
//! - Ledger entries only ever hold `-1` or `+1`; `0` is an absent entry.

pub mod vote_ledger;
