//! Data model for an integrated production-distribution plan: locations,
//! routes, products, demand, labor, trucks, and initial inventory.
//!
//! This crate owns the inputs; it does not build or solve a model. See the
//! `breadplan-algo` crate for the cohort indexer and MILP builder that
//! consume these types.

pub mod calendar;
pub mod cost;
pub mod demand;
pub mod diagnostics;
pub mod error;
pub mod inventory;
pub mod location;
pub mod network;
pub mod product;
pub mod route;
pub mod trucks;

pub use calendar::{LaborCalendar, LaborDay};
pub use cost::CostStructure;
pub use demand::{DemandEntry, DemandKey, Forecast};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{CoreError, CoreResult};
pub use inventory::{InventoryKey, InventoryRow, InventorySnapshot};
pub use location::{Location, LocationId, LocationType, StorageMode, STORAGE_NODE_ID};
pub use network::NetworkGraph;
pub use product::{ProductId, ProductState};
pub use route::{Leg, Route, RouteStop, TransportMode};
pub use trucks::{DepartureType, TruckId, TruckInstance, TruckSchedule};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A closed planning horizon `[start, end]` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningHorizon {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PlanningHorizon {
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if end < start {
            return Err(CoreError::Validation(format!(
                "planning horizon end {} precedes start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// All dates in `[start, end]`, inclusive, in chronological order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut d = self.start;
        while d <= self.end {
            dates.push(d);
            d += chrono::Duration::days(1);
        }
        dates
    }

    /// The production-date set: every in-horizon date plus any earlier
    /// production dates that appear only as cohort identifiers in initial
    /// inventory (§3: "used only as cohort identifiers — there is no
    /// decision freedom before `start`").
    pub fn production_dates(&self, initial_inventory: &InventorySnapshot) -> Vec<NaiveDate> {
        let mut dates: BTreeSet<NaiveDate> = self.dates().into_iter().collect();
        for (key, _) in initial_inventory.iter() {
            dates.insert(key.production_date);
        }
        dates.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_enumerates_closed_range_inclusive() {
        let horizon = PlanningHorizon::new(
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        )
        .unwrap();
        assert_eq!(horizon.dates().len(), 7);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let result = PlanningHorizon::new(
            NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn production_dates_include_earlier_inventory_dates() {
        let horizon = PlanningHorizon::new(
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
        )
        .unwrap();
        let rows = vec![InventoryRow::new("FROZEN_DEPOT", "P1", 500.0)
            .with_production_date(NaiveDate::from_ymd_opt(2024, 12, 20).unwrap())
            .with_state(ProductState::Frozen)];
        let snapshot = InventorySnapshot::from_rows(rows, None, horizon.start, |_| Ok(StorageMode::FrozenOnly)).unwrap();
        let dates = horizon.production_dates(&snapshot);
        assert!(dates.contains(&NaiveDate::from_ymd_opt(2024, 12, 20).unwrap()));
        assert_eq!(dates.len(), 8); // 7 horizon days + 1 earlier inventory date
    }
}
