// Copyright © 2024 Pathway

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether the arrival order of deltas for a key may influence the
/// aggregate. Chosen once per store by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Commutativity {
    /// Deltas for a key may be combined in any order; only the latest
    /// timestamp is tracked.
    Commutative,
    /// Deltas for a key are folded in increasing timestamp order.
    NonCommutative,
}

impl Commutativity {
    pub fn is_commutative(self) -> bool {
        matches!(self, Self::Commutative)
    }
}

impl Display for Commutativity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commutative => f.write_str("commutative"),
            Self::NonCommutative => f.write_str("non-commutative"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown commutativity {0:?}, expected \"commutative\" or \"non-commutative\"")]
pub struct ParseCommutativityError(pub String);

impl FromStr for Commutativity {
    type Err = ParseCommutativityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "commutative" => Ok(Self::Commutative),
            "non-commutative" | "noncommutative" => Ok(Self::NonCommutative),
            _ => Err(ParseCommutativityError(s.to_string())),
        }
    }
}
