//! Initial inventory: `(location, product, production_date, state) -> qty`,
//! canonicalised from the 2-/3-/4-tuple forms collaborators hand in (§3, §6, §9).

use crate::error::{CoreError, CoreResult};
use crate::location::{LocationId, StorageMode};
use crate::product::{ProductId, ProductState};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fully canonicalised inventory key. The internal representation is
/// always this 4-tuple; raw collaborator input is up-converted once at the
/// boundary rather than inspected at every call site (§9: "runtime type
/// inspection of inventory tuple length -> an explicit canonicalisation
/// pass at the input boundary").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryKey {
    pub location: LocationId,
    pub product: ProductId,
    pub production_date: NaiveDate,
    pub state: ProductState,
}

/// A raw inventory row as a collaborator might supply it: 2-tuple
/// `(location, product)`, 3-tuple adding a quantity, or the full 4-tuple.
/// Missing `production_date` defaults to the snapshot date (or `start - 1`
/// if no snapshot date is given); missing `state` is inferred from the
/// location's dominant storage mode. This is the wire format for scenario
/// JSON; `InventorySnapshot`'s internal map does not derive `Serialize`
/// directly since `InventoryKey` isn't a valid JSON object key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRow {
    pub location: LocationId,
    pub product: ProductId,
    pub quantity: f64,
    pub production_date: Option<NaiveDate>,
    pub state: Option<ProductState>,
}

impl InventoryRow {
    pub fn new(location: impl Into<LocationId>, product: impl Into<ProductId>, quantity: f64) -> Self {
        Self {
            location: location.into(),
            product: product.into(),
            quantity,
            production_date: None,
            state: None,
        }
    }

    pub fn with_production_date(mut self, date: NaiveDate) -> Self {
        self.production_date = Some(date);
        self
    }

    pub fn with_state(mut self, state: ProductState) -> Self {
        self.state = Some(state);
        self
    }
}

/// Canonicalised initial inventory snapshot.
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    entries: HashMap<InventoryKey, f64>,
}

impl InventorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalise raw rows into the internal 4-tuple form.
    ///
    /// `snapshot_date` is the date the snapshot was taken; `horizon_start`
    /// is the planning horizon's first date. A row missing
    /// `production_date` is stamped with `snapshot_date` if given, else
    /// `horizon_start - 1`. A row missing `state` is inferred from
    /// `location_storage_mode`: `FrozenOnly` -> Frozen, `AmbientOnly` ->
    /// Ambient, `Both` is ambiguous and is an error (the collaborator must
    /// disambiguate at `Both` locations).
    pub fn from_rows(
        rows: impl IntoIterator<Item = InventoryRow>,
        snapshot_date: Option<NaiveDate>,
        horizon_start: NaiveDate,
        location_storage_mode: impl Fn(&LocationId) -> CoreResult<StorageMode>,
    ) -> CoreResult<Self> {
        let default_production_date =
            snapshot_date.unwrap_or_else(|| horizon_start - chrono::Duration::days(1));

        let mut entries = HashMap::new();
        for row in rows {
            if row.quantity < 0.0 {
                return Err(CoreError::NegativeQuantity {
                    context: format!("initial inventory at {}", row.location),
                    value: row.quantity,
                });
            }

            let production_date = row.production_date.unwrap_or(default_production_date);
            let state = match row.state {
                Some(state) => state,
                None => match location_storage_mode(&row.location)? {
                    StorageMode::FrozenOnly => ProductState::Frozen,
                    StorageMode::AmbientOnly => ProductState::Ambient,
                    StorageMode::Both => {
                        return Err(CoreError::Validation(format!(
                            "cannot infer storage state for {} at {} (location supports both; state must be specified)",
                            row.product, row.location
                        )))
                    }
                },
            };

            let key = InventoryKey {
                location: row.location,
                product: row.product,
                production_date,
                state,
            };
            *entries.entry(key).or_insert(0.0) += row.quantity;
        }

        Ok(Self { entries })
    }

    pub fn quantity(&self, key: &InventoryKey) -> f64 {
        self.entries.get(key).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InventoryKey, &f64)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest production date appearing in this snapshot, if any
    /// (contributes to the planning horizon's extended production-date set, §3).
    pub fn earliest_production_date(&self) -> Option<NaiveDate> {
        self.entries.keys().map(|k| k.production_date).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn two_tuple_row_defaults_production_date_and_infers_state() {
        let rows = vec![InventoryRow::new("FROZEN_DEPOT", "P1", 500.0)];
        let snapshot = InventorySnapshot::from_rows(rows, None, date(6), |_| Ok(StorageMode::FrozenOnly)).unwrap();
        let key = InventoryKey {
            location: "FROZEN_DEPOT".into(),
            product: "P1".into(),
            production_date: date(5),
            state: ProductState::Frozen,
        };
        assert_eq!(snapshot.quantity(&key), 500.0);
    }

    #[test]
    fn explicit_snapshot_date_overrides_horizon_minus_one() {
        let rows = vec![InventoryRow::new("DEPOT", "P1", 100.0)];
        let snapshot =
            InventorySnapshot::from_rows(rows, Some(date(3)), date(6), |_| Ok(StorageMode::AmbientOnly)).unwrap();
        assert_eq!(snapshot.earliest_production_date(), Some(date(3)));
    }

    #[test]
    fn both_mode_location_without_explicit_state_is_an_error() {
        let rows = vec![InventoryRow::new("STORAGE_NODE", "P1", 100.0)];
        let result = InventorySnapshot::from_rows(rows, None, date(6), |_| Ok(StorageMode::Both));
        assert!(result.is_err());
    }

    #[test]
    fn four_tuple_row_is_used_verbatim() {
        let rows = vec![InventoryRow::new("B1", "P1", 50.0)
            .with_production_date(date(1))
            .with_state(ProductState::Ambient)];
        let snapshot = InventorySnapshot::from_rows(rows, None, date(6), |_| Ok(StorageMode::AmbientOnly)).unwrap();
        let key = InventoryKey {
            location: "B1".into(),
            product: "P1".into(),
            production_date: date(1),
            state: ProductState::Ambient,
        };
        assert_eq!(snapshot.quantity(&key), 50.0);
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let rows = vec![InventoryRow::new("B1", "P1", -1.0)];
        let result = InventorySnapshot::from_rows(rows, None, date(6), |_| Ok(StorageMode::AmbientOnly));
        assert!(result.is_err());
    }
}
