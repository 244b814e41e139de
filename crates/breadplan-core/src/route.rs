//! Routes (static configuration) and legs (derived single-hop edges).

use crate::location::LocationId;
use serde::{Deserialize, Serialize};

/// Transport mode carried by a leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Frozen,
    Ambient,
}

/// One hop of a configured multi-hop route, before decomposition into legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub location: LocationId,
    pub transit_days: i64,
    pub cost_per_unit: f64,
    pub transport_mode: TransportMode,
}

/// A static, possibly multi-hop route as configured by the network collaborator.
///
/// `origin` is the starting location; `stops` is the ordered sequence of
/// hops. [`crate::network::NetworkGraph`] decomposes this into single-hop
/// [`Leg`]s — `origin -> stops[0].location`, `stops[0].location ->
/// stops[1].location`, and so on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub origin: LocationId,
    pub stops: Vec<RouteStop>,
}

impl Route {
    pub fn new(origin: impl Into<LocationId>) -> Self {
        Self {
            origin: origin.into(),
            stops: Vec::new(),
        }
    }

    pub fn via(
        mut self,
        location: impl Into<LocationId>,
        transit_days: i64,
        cost_per_unit: f64,
        transport_mode: TransportMode,
    ) -> Self {
        self.stops.push(RouteStop {
            location: location.into(),
            transit_days,
            cost_per_unit,
            transport_mode,
        });
        self
    }

    /// Decompose this route into single-hop legs (origin -> stop1, stop1 -> stop2, ...).
    pub fn to_legs(&self) -> Vec<Leg> {
        let mut legs = Vec::with_capacity(self.stops.len());
        let mut from = self.origin.clone();
        for stop in &self.stops {
            legs.push(Leg {
                origin: from.clone(),
                destination: stop.location.clone(),
                transit_days: stop.transit_days,
                cost_per_unit: stop.cost_per_unit,
                transport_mode: stop.transport_mode,
            });
            from = stop.location.clone();
        }
        legs
    }
}

/// A single-hop directed edge in the routing graph (§3).
///
/// Legs are the unit the model builder operates on; routes exist only to
/// produce them. Every real leg whose origin is the manufacturing site is
/// rewritten by [`crate::network::NetworkGraph`] to originate at the
/// synthetic storage node instead, preserving `transit_days`,
/// `cost_per_unit` and `transport_mode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub origin: LocationId,
    pub destination: LocationId,
    pub transit_days: i64,
    pub cost_per_unit: f64,
    pub transport_mode: TransportMode,
}

impl Leg {
    pub fn key(&self) -> (LocationId, LocationId) {
        (self.origin.clone(), self.destination.clone())
    }
}
