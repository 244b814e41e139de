//! A scenario bundles every collaborator input (§6) into one JSON-friendly
//! struct so the CLI can load a planning run from a file, or fall back to a
//! small built-in scenario matching S1 in the testable-properties section.

use breadplan_core::{
    CostStructure, DemandEntry, InventoryRow, LaborDay, Location, Route, TruckInstance,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub horizon_start: NaiveDate,
    pub horizon_end: NaiveDate,
    pub snapshot_date: Option<NaiveDate>,
    pub products: Vec<String>,
    pub locations: Vec<Location>,
    pub routes: Vec<Route>,
    pub demand: Vec<DemandEntry>,
    pub labor_days: Vec<(NaiveDate, LaborDay)>,
    pub trucks: Vec<TruckInstance>,
    pub initial_inventory: Vec<InventoryRow>,
    pub cost: CostStructure,
}

impl Scenario {
    /// The minimum-viable scenario (S1): one product, one breadroom, one
    /// ambient leg, one afternoon truck.
    pub fn minimum_viable() -> Self {
        use breadplan_core::{DepartureType, LocationType, StorageMode, TransportMode, TruckId};

        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();

        let locations = vec![
            Location::new("6122", "Plant", LocationType::Manufacturing, StorageMode::Both),
            Location::new("B1", "Breadroom 1", LocationType::Breadroom, StorageMode::AmbientOnly),
        ];
        let routes = vec![Route::new("6122").via("B1", 2, 0.50, TransportMode::Ambient)];

        let demand = vec![DemandEntry {
            destination: "B1".into(),
            product: "P1".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            quantity: 1000.0,
        }];

        let mut labor_days = Vec::new();
        let mut d = start;
        while d <= end {
            let day = if breadplan_core::LaborCalendar::is_weekend(d) {
                LaborDay::NonFixed {
                    non_fixed_rate: 40.0,
                    minimum_hours: 4.0,
                    max_hours: 14.0,
                }
            } else {
                LaborDay::Fixed {
                    fixed_hours: 12.0,
                    regular_rate: 20.0,
                    overtime_rate: 30.0,
                    max_hours: 14.0,
                }
            };
            labor_days.push((d, day));
            d += chrono::Duration::days(1);
        }

        let trucks = vec![TruckInstance {
            id: TruckId(0),
            destination: "B1".into(),
            intermediate_stops: Vec::new(),
            days_of_week: vec![chrono::Weekday::Wed],
            departure_type: DepartureType::Afternoon,
            unit_capacity: 14_080.0,
            pallet_capacity: 44,
            fixed_cost: 500.0,
            cost_per_unit: 0.0,
        }];

        Self {
            horizon_start: start,
            horizon_end: end,
            snapshot_date: None,
            products: vec!["P1".to_string()],
            locations,
            routes,
            demand,
            labor_days,
            trucks,
            initial_inventory: Vec::new(),
            cost: CostStructure::new(1.0),
        }
    }
}
