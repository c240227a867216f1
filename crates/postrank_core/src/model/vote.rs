//! Vote values, voter identity and per-item tallies.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Identifier of the voting user.
///
/// Stored verbatim as a ledger member, so it must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Builds a user id; returns `None` for empty or whitespace-only input.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Three-state vote cast by one user on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    Down,
    /// No active vote. Never stored in a ledger.
    Retract,
    Up,
}

impl VoteValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Down => -1.0,
            Self::Retract => 0.0,
            Self::Up => 1.0,
        }
    }

    /// Numeric ledger form; `Retract` maps to `None` (absent entry).
    pub fn ledger_score(self) -> Option<f64> {
        match self {
            Self::Retract => None,
            other => Some(other.as_f64()),
        }
    }

    /// Reads a stored ledger score back; absence means `Retract`.
    pub fn from_ledger_score(score: Option<f64>) -> Result<Self, InvalidVoteValue> {
        match score {
            None => Ok(Self::Retract),
            Some(value) => match Self::try_from(value)? {
                Self::Retract => Err(InvalidVoteValue(value)),
                vote => Ok(vote),
            },
        }
    }
}

/// Raised for any numeric vote other than `-1`, `0` or `+1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidVoteValue(pub f64);

impl Display for InvalidVoteValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid vote value `{}`; expected -1, 0 or 1", self.0)
    }
}

impl Error for InvalidVoteValue {}

impl TryFrom<f64> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value == 1.0 {
            Ok(Self::Up)
        } else if value == 0.0 {
            Ok(Self::Retract)
        } else if value == -1.0 {
            Ok(Self::Down)
        } else {
            Err(InvalidVoteValue(value))
        }
    }
}

/// Count of active up and down votes on one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub up: u64,
    pub down: u64,
}

#[cfg(test)]
mod tests {
    use super::{InvalidVoteValue, UserId, VoteValue};

    #[test]
    fn try_from_accepts_only_three_states() {
        assert_eq!(VoteValue::try_from(1.0), Ok(VoteValue::Up));
        assert_eq!(VoteValue::try_from(-0.0), Ok(VoteValue::Retract));
        assert_eq!(VoteValue::try_from(-1.0), Ok(VoteValue::Down));
        assert_eq!(VoteValue::try_from(2.0), Err(InvalidVoteValue(2.0)));
        assert!(VoteValue::try_from(0.5).is_err());
        assert!(VoteValue::try_from(f64::NAN).is_err());
        assert!(VoteValue::try_from(f64::INFINITY).is_err());
    }

    #[test]
    fn ledger_form_never_stores_retract() {
        assert_eq!(VoteValue::Retract.ledger_score(), None);
        assert_eq!(VoteValue::Down.ledger_score(), Some(-1.0));
        assert_eq!(
            VoteValue::from_ledger_score(None).unwrap(),
            VoteValue::Retract
        );
        assert!(VoteValue::from_ledger_score(Some(0.0)).is_err());
    }

    #[test]
    fn user_id_rejects_blank_values() {
        assert!(UserId::new("  ").is_none());
        assert_eq!(UserId::new("alice").unwrap().as_str(), "alice");
    }
}
