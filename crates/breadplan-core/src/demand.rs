//! Demand forecast: `(destination, product, delivery_date) -> quantity` (§3, §6).

use crate::location::LocationId;
use crate::product::ProductId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key identifying one demand point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DemandKey {
    pub destination: LocationId,
    pub product: ProductId,
    pub date: NaiveDate,
}

/// One row of the flat forecast collaborators hand in (§6). This is the
/// wire format: a `Forecast` round-trips through JSON as `Vec<DemandEntry>`,
/// not as its internal aggregated map (struct keys don't serialize as JSON
/// object keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandEntry {
    pub destination: LocationId,
    pub product: ProductId,
    pub date: NaiveDate,
    pub quantity: f64,
}

/// Demand forecast, aggregated by key and filtered to a planning horizon.
#[derive(Debug, Clone, Default)]
pub struct Forecast {
    entries: HashMap<DemandKey, f64>,
}

impl Forecast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a forecast from flat rows, keeping only rows inside
    /// `[start, end]` and summing duplicate keys.
    pub fn from_rows(
        rows: impl IntoIterator<Item = DemandEntry>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        let mut entries = HashMap::new();
        for row in rows {
            if row.date < start || row.date > end {
                continue;
            }
            let key = DemandKey {
                destination: row.destination,
                product: row.product,
                date: row.date,
            };
            *entries.entry(key).or_insert(0.0) += row.quantity;
        }
        Self { entries }
    }

    pub fn quantity(&self, key: &DemandKey) -> f64 {
        self.entries.get(key).copied().unwrap_or(0.0)
    }

    pub fn keys(&self) -> impl Iterator<Item = &DemandKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DemandKey, &f64)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Scale every quantity by `factor` (used to build the doubling-demand
    /// monotonicity check described in the testable properties).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            entries: self.entries.iter().map(|(k, v)| (k.clone(), v * factor)).collect(),
        }
    }

    pub fn destinations(&self) -> impl Iterator<Item = &LocationId> {
        use std::collections::HashSet;
        let set: HashSet<&LocationId> = self.entries.keys().map(|k| &k.destination).collect();
        set.into_iter()
    }
}
