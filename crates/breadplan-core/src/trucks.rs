//! Truck schedule: instances, applicability, and morning/afternoon timing rules (§3).

use crate::location::LocationId;
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Timing class governing which day's production a truck may load (§3).
///
/// Morning trucks may only load production from the previous day.
/// Afternoon trucks may load the previous day's production or the same
/// day's (§4.5 items 19-20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepartureType {
    Morning,
    Afternoon,
}

/// A truck id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TruckId(pub usize);

/// One configured truck instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckInstance {
    pub id: TruckId,
    pub destination: LocationId,
    /// Intermediate stops served before `destination`, in order.
    pub intermediate_stops: Vec<LocationId>,
    pub days_of_week: Vec<Weekday>,
    pub departure_type: DepartureType,
    pub unit_capacity: f64,
    pub pallet_capacity: u32,
    pub fixed_cost: f64,
    pub cost_per_unit: f64,
}

impl TruckInstance {
    /// All stops this truck serves, in load order (intermediate stops then
    /// the final destination).
    pub fn stops(&self) -> Vec<&LocationId> {
        let mut stops: Vec<&LocationId> = self.intermediate_stops.iter().collect();
        stops.push(&self.destination);
        stops
    }

    pub fn runs_on(&self, weekday: Weekday) -> bool {
        self.days_of_week.contains(&weekday)
    }

    /// The departure date for a given delivery date, given the transit days
    /// for the leg actually driven (callers pass the transit for the stop
    /// in question; a multi-stop truck may have different transit per stop).
    pub fn departure_date(&self, delivery_date: NaiveDate, transit_days: i64) -> NaiveDate {
        delivery_date - chrono::Duration::days(transit_days)
    }

    /// Whether this truck can load production/storage dated `production_or_storage_date`
    /// given a departure on `departure_date`, per the morning/afternoon rule (§3, §4.5 items 19-20).
    pub fn can_load(&self, departure_date: NaiveDate, candidate_date: NaiveDate) -> bool {
        match self.departure_type {
            DepartureType::Morning => candidate_date == departure_date - chrono::Duration::days(1),
            DepartureType::Afternoon => {
                candidate_date == departure_date - chrono::Duration::days(1)
                    || candidate_date == departure_date
            }
        }
    }
}

/// The full set of configured truck instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TruckSchedule {
    pub trucks: Vec<TruckInstance>,
}

impl TruckSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, truck: TruckInstance) -> &mut Self {
        self.trucks.push(truck);
        self
    }

    pub fn serving(&self, destination: &LocationId) -> impl Iterator<Item = &TruckInstance> {
        self.trucks
            .iter()
            .filter(move |t| t.stops().iter().any(|s| *s == destination))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TruckInstance> {
        self.trucks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn truck(departure_type: DepartureType) -> TruckInstance {
        TruckInstance {
            id: TruckId(0),
            destination: "B1".into(),
            intermediate_stops: Vec::new(),
            days_of_week: vec![Weekday::Wed],
            departure_type,
            unit_capacity: 14_080.0,
            pallet_capacity: 44,
            fixed_cost: 500.0,
            cost_per_unit: 0.0,
        }
    }

    #[test]
    fn morning_truck_loads_only_previous_day() {
        let t = truck(DepartureType::Morning);
        let departure = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        assert!(t.can_load(departure, departure - chrono::Duration::days(1)));
        assert!(!t.can_load(departure, departure));
    }

    #[test]
    fn afternoon_truck_loads_previous_or_same_day() {
        let t = truck(DepartureType::Afternoon);
        let departure = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        assert!(t.can_load(departure, departure - chrono::Duration::days(1)));
        assert!(t.can_load(departure, departure));
        assert!(!t.can_load(departure, departure + chrono::Duration::days(1)));
    }

    #[test]
    fn runs_on_respects_configured_weekdays() {
        let t = truck(DepartureType::Afternoon);
        assert!(t.runs_on(Weekday::Wed));
        assert!(!t.runs_on(Weekday::Thu));
    }

    #[test]
    fn stops_include_intermediate_then_destination() {
        let mut t = truck(DepartureType::Morning);
        t.intermediate_stops.push("HUB".into());
        let stops = t.stops();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].as_str(), "HUB");
        assert_eq!(stops[1].as_str(), "B1");
    }
}
