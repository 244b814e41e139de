//! Products and the three shelf-life states a unit of product can be in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A SKU identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        ProductId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        ProductId::new(s)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        ProductId::new(s)
    }
}

/// The three shelf-life states a cohort can be in (§3).
///
/// Frozen ages from the production date with a 120-day budget. Ambient
/// continues aging from production date with a 17-day budget (it is reached
/// either directly or by a Frozen→Ambient transition that does *not* reset
/// the age). Thawed is the odd one out: a Frozen→Thawed transition resets
/// the age so the cohort's effective production date becomes the thaw date,
/// and the thawed family gets its own 14-day budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductState {
    Frozen,
    Ambient,
    Thawed,
}

impl ProductState {
    /// Shelf life in days for this state (§3 fixed constants).
    pub const FROZEN_SHELF_LIFE_DAYS: i64 = 120;
    pub const AMBIENT_SHELF_LIFE_DAYS: i64 = 17;
    pub const THAWED_SHELF_LIFE_DAYS: i64 = 14;

    pub fn shelf_life_days(self) -> i64 {
        match self {
            ProductState::Frozen => Self::FROZEN_SHELF_LIFE_DAYS,
            ProductState::Ambient => Self::AMBIENT_SHELF_LIFE_DAYS,
            ProductState::Thawed => Self::THAWED_SHELF_LIFE_DAYS,
        }
    }

    /// Whether this state can still transition (only Frozen can).
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProductState::Frozen)
    }
}

impl fmt::Display for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductState::Frozen => write!(f, "frozen"),
            ProductState::Ambient => write!(f, "ambient"),
            ProductState::Thawed => write!(f, "thawed"),
        }
    }
}
