//! Ranking use-case services.
//!
//! # Responsibility
//! - Register items for ranking (`registrar`).
//! - Gate votes on the fixed post-creation window (`window`).
//! - Turn vote transitions into atomic score and ledger updates
//!   (`score_engine`).
//!
//! # Invariants
//! - Services hold no mutable state between calls; the store owns it all.

pub mod registrar;
pub mod score_engine;
pub mod window;
