//! Pure shelf-life state tracking over a chain of legs (§4.3).
//!
//! [`ShelfLifeTracker::trace`] is independent of the solver: it is used
//! both by [`crate::route_enum::RouteEnumerator`] to filter infeasible
//! paths and directly by test suites to check the transition rules in
//! isolation.

use breadplan_core::{Leg, LocationId, NetworkGraph, ProductState};
use chrono::NaiveDate;

/// Default margin (days) a destination needs left on an ambient/thawed
/// cohort's shelf life to accept a delivery — used by the route enumerator
/// (§4.2: "17-day ambient budget minus 7-day breadroom acceptance margin").
pub const DEFAULT_BREADROOM_ACCEPTANCE_MARGIN_DAYS: i64 = 7;

/// The state of a shipment at one arrival point along a route.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalTrace {
    pub location: LocationId,
    pub arrival_date: NaiveDate,
    pub state: ProductState,
    /// Effective production date for age purposes: the original production
    /// date, unless a thaw occurred upstream, in which case this is the
    /// thaw date (§9: thawed stock is a new cohort).
    pub effective_production_date: NaiveDate,
    pub age_days: i64,
    pub remaining_days: i64,
    /// Whether this arrival is a thaw event (state just became Thawed).
    pub is_thaw: bool,
    /// Whether the destination would accept this cohort given the
    /// configured acceptance margin.
    pub accepted: bool,
}

/// Pure helper tracking shelf-life state across a chain of legs.
pub struct ShelfLifeTracker;

impl ShelfLifeTracker {
    /// Trace a shipment of `initial_state` produced on `production_date`
    /// through `legs` (assumed contiguous, `legs[i].destination ==
    /// legs[i+1].origin`), returning one [`ArrivalTrace`] per leg.
    pub fn trace(
        network: &NetworkGraph,
        production_date: NaiveDate,
        initial_state: ProductState,
        legs: &[Leg],
        acceptance_margin_days: i64,
    ) -> Vec<ArrivalTrace> {
        let mut traces = Vec::with_capacity(legs.len());
        let mut current_date = production_date;
        let mut effective_production_date = production_date;
        let mut state = initial_state;

        for leg in legs {
            current_date += chrono::Duration::days(leg.transit_days);

            let arrival_state = network.arrival_state(leg);
            let is_thaw = state == ProductState::Frozen && network.is_thaw_destination(leg);

            state = if arrival_state == ProductState::Frozen {
                ProductState::Frozen
            } else if is_thaw {
                effective_production_date = current_date;
                ProductState::Thawed
            } else {
                ProductState::Ambient
            };

            let age_days = (current_date - effective_production_date).num_days();
            let remaining_days = state.shelf_life_days() - age_days;
            let accepted = remaining_days >= acceptance_margin_days;

            traces.push(ArrivalTrace {
                location: leg.destination.clone(),
                arrival_date: current_date,
                state,
                effective_production_date,
                age_days,
                remaining_days,
                is_thaw,
                accepted,
            });
        }

        traces
    }
}
