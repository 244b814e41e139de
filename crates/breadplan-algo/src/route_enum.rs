//! Enumerate feasible multi-hop routes to each destination, shelf-life
//! filtered (§4.2).

use breadplan_core::{Diagnostics, Leg, LocationId, NetworkGraph, TransportMode};
use std::collections::HashMap;

/// Ambient-only paths must clear the destination within this many transit
/// days: the 17-day ambient budget minus a 7-day breadroom acceptance
/// margin (§4.2).
pub const AMBIENT_ONLY_MAX_TRANSIT_DAYS: i64 = 10;
/// Frozen-throughout paths, and paths into a thaw destination, may run up
/// to the frozen shelf-life budget (§4.2).
pub const FROZEN_MAX_TRANSIT_DAYS: i64 = 120;

/// Upper bound on hops explored per path, guarding against cycles in a
/// malformed network.
const MAX_HOPS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathCategory {
    AmbientOnly,
    FrozenThroughout,
    ThawDestination,
}

impl PathCategory {
    fn label(self) -> &'static str {
        match self {
            PathCategory::AmbientOnly => "ambient_only",
            PathCategory::FrozenThroughout => "frozen_throughout",
            PathCategory::ThawDestination => "thaw_destination",
        }
    }
}

/// A ranked, feasible multi-hop path to one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumeratedRoute {
    pub destination: LocationId,
    pub legs: Vec<Leg>,
    pub total_transit_days: i64,
    pub total_cost: f64,
}

/// Per-category counts from shelf-life filtering, for observability (§4.2).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShelfLifeFilterCounts {
    pub candidates_considered: usize,
    pub accepted: usize,
    pub rejected_ambient_only: usize,
    pub rejected_frozen_throughout: usize,
    pub rejected_thaw_destination: usize,
}

/// Enumerates and ranks feasible routes from the synthetic storage node to
/// each requested destination.
#[derive(Debug, Clone, Default)]
pub struct RouteEnumerator {
    routes_by_destination: HashMap<LocationId, Vec<EnumeratedRoute>>,
    filter_counts: ShelfLifeFilterCounts,
}

impl RouteEnumerator {
    /// Enumerate up to `max_paths_per_destination` feasible paths (ranked
    /// by cost, then transit) from the storage node to each destination.
    /// When `enforce_shelf_life` is false, the shelf-life category filters
    /// are skipped (used by scenario S2 to demonstrate the cliff).
    pub fn enumerate(
        network: &NetworkGraph,
        destinations: &[LocationId],
        max_paths_per_destination: usize,
        enforce_shelf_life: bool,
        diagnostics: &mut Diagnostics,
    ) -> Self {
        let origin = LocationId::storage_node();
        let mut routes_by_destination = HashMap::new();
        let mut filter_counts = ShelfLifeFilterCounts::default();

        for destination in destinations {
            let mut candidates = Vec::new();
            let mut visited = vec![origin.clone()];
            dfs(network, &origin, destination, Vec::new(), &mut visited, &mut candidates, MAX_HOPS);

            filter_counts.candidates_considered += candidates.len();

            let mut accepted: Vec<EnumeratedRoute> = candidates
                .into_iter()
                .filter(|legs| {
                    if !enforce_shelf_life {
                        return true;
                    }
                    let (ok, category) = classify(legs, network);
                    if ok {
                        true
                    } else {
                        match category {
                            PathCategory::AmbientOnly => filter_counts.rejected_ambient_only += 1,
                            PathCategory::FrozenThroughout => filter_counts.rejected_frozen_throughout += 1,
                            PathCategory::ThawDestination => filter_counts.rejected_thaw_destination += 1,
                        }
                        false
                    }
                })
                .map(|legs| {
                    let total_transit_days = legs.iter().map(|l| l.transit_days).sum();
                    let total_cost = legs.iter().map(|l| l.cost_per_unit).sum();
                    EnumeratedRoute {
                        destination: destination.clone(),
                        legs,
                        total_transit_days,
                        total_cost,
                    }
                })
                .collect();

            accepted.sort_by(|a, b| {
                a.total_cost
                    .partial_cmp(&b.total_cost)
                    .unwrap()
                    .then(a.total_transit_days.cmp(&b.total_transit_days))
            });
            accepted.truncate(max_paths_per_destination);
            filter_counts.accepted += accepted.len();

            if accepted.is_empty() {
                diagnostics.add_warning_with_entity(
                    "route_enumeration",
                    "no shelf-life-feasible route found",
                    destination.as_str(),
                );
            }

            routes_by_destination.insert(destination.clone(), accepted);
        }

        Self {
            routes_by_destination,
            filter_counts,
        }
    }

    pub fn routes_for(&self, destination: &LocationId) -> &[EnumeratedRoute] {
        self.routes_by_destination
            .get(destination)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn filter_counts(&self) -> &ShelfLifeFilterCounts {
        &self.filter_counts
    }

    pub fn has_route(&self, destination: &LocationId) -> bool {
        !self.routes_for(destination).is_empty()
    }
}

fn classify(legs: &[Leg], network: &NetworkGraph) -> (bool, PathCategory) {
    let total_transit: i64 = legs.iter().map(|l| l.transit_days).sum();
    let last = legs.last().expect("path has at least one leg");

    if network.is_thaw_destination(last) {
        (total_transit <= FROZEN_MAX_TRANSIT_DAYS, PathCategory::ThawDestination)
    } else if legs.iter().all(|l| l.transport_mode == TransportMode::Ambient) {
        (total_transit <= AMBIENT_ONLY_MAX_TRANSIT_DAYS, PathCategory::AmbientOnly)
    } else {
        (total_transit <= FROZEN_MAX_TRANSIT_DAYS, PathCategory::FrozenThroughout)
    }
}

#[allow(clippy::too_many_arguments)]
fn dfs(
    network: &NetworkGraph,
    current: &LocationId,
    destination: &LocationId,
    path_so_far: Vec<Leg>,
    visited: &mut Vec<LocationId>,
    out: &mut Vec<Vec<Leg>>,
    hops_remaining: usize,
) {
    if current == destination && !path_so_far.is_empty() {
        out.push(path_so_far);
        return;
    }
    if hops_remaining == 0 {
        return;
    }
    for leg in network.legs_from(current) {
        if visited.contains(&leg.destination) {
            continue;
        }
        visited.push(leg.destination.clone());
        let mut next_path = path_so_far.clone();
        next_path.push(leg.clone());
        dfs(network, &leg.destination, destination, next_path, visited, out, hops_remaining - 1);
        visited.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breadplan_core::{Location, LocationType, StorageMode};

    fn simple_network() -> NetworkGraph {
        let locations = vec![
            Location::new("6122", "Plant", LocationType::Manufacturing, StorageMode::Both),
            Location::new("HUB", "Hub", LocationType::Hub, StorageMode::Both),
            Location::new("BR1", "Breadroom 1", LocationType::Breadroom, StorageMode::AmbientOnly),
        ];
        let legs = vec![
            Leg {
                origin: LocationId::new("6122"),
                destination: LocationId::new("HUB"),
                transit_days: 1,
                cost_per_unit: 0.1,
                transport_mode: TransportMode::Ambient,
            },
            Leg {
                origin: LocationId::new("HUB"),
                destination: LocationId::new("BR1"),
                transit_days: 2,
                cost_per_unit: 0.2,
                transport_mode: TransportMode::Ambient,
            },
        ];
        NetworkGraph::build(locations, legs).unwrap()
    }

    #[test]
    fn finds_multi_hop_ambient_path() {
        let net = simple_network();
        let mut diag = Diagnostics::new();
        let enumerator = RouteEnumerator::enumerate(&net, &[LocationId::new("BR1")], 5, true, &mut diag);
        let routes = enumerator.routes_for(&LocationId::new("BR1"));
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].total_transit_days, 3);
    }

    #[test]
    fn ambient_path_over_budget_is_filtered_and_warns() {
        let locations = vec![
            Location::new("6122", "Plant", LocationType::Manufacturing, StorageMode::Both),
            Location::new("BR_FAR", "Far Breadroom", LocationType::Breadroom, StorageMode::AmbientOnly),
        ];
        let legs = vec![Leg {
            origin: LocationId::new("6122"),
            destination: LocationId::new("BR_FAR"),
            transit_days: 11,
            cost_per_unit: 0.1,
            transport_mode: TransportMode::Ambient,
        }];
        let net = NetworkGraph::build(locations, legs).unwrap();
        let mut diag = Diagnostics::new();
        let enumerator = RouteEnumerator::enumerate(&net, &[LocationId::new("BR_FAR")], 5, true, &mut diag);
        assert!(!enumerator.has_route(&LocationId::new("BR_FAR")));
        assert_eq!(enumerator.filter_counts().rejected_ambient_only, 1);
        assert!(diag.has_warnings());
    }

    #[test]
    fn disabling_shelf_life_enforcement_allows_the_over_budget_path() {
        let locations = vec![
            Location::new("6122", "Plant", LocationType::Manufacturing, StorageMode::Both),
            Location::new("BR_FAR", "Far Breadroom", LocationType::Breadroom, StorageMode::AmbientOnly),
        ];
        let legs = vec![Leg {
            origin: LocationId::new("6122"),
            destination: LocationId::new("BR_FAR"),
            transit_days: 11,
            cost_per_unit: 0.1,
            transport_mode: TransportMode::Ambient,
        }];
        let net = NetworkGraph::build(locations, legs).unwrap();
        let mut diag = Diagnostics::new();
        let enumerator = RouteEnumerator::enumerate(&net, &[LocationId::new("BR_FAR")], 5, false, &mut diag);
        assert!(enumerator.has_route(&LocationId::new("BR_FAR")));
    }

    #[test]
    fn routes_are_ranked_cheapest_first() {
        let locations = vec![
            Location::new("6122", "Plant", LocationType::Manufacturing, StorageMode::Both),
            Location::new("BR1", "Breadroom 1", LocationType::Breadroom, StorageMode::AmbientOnly),
        ];
        let legs = vec![
            Leg {
                origin: LocationId::new("6122"),
                destination: LocationId::new("BR1"),
                transit_days: 2,
                cost_per_unit: 0.5,
                transport_mode: TransportMode::Ambient,
            },
            Leg {
                origin: LocationId::new("6122"),
                destination: LocationId::new("BR1"),
                transit_days: 1,
                cost_per_unit: 0.3,
                transport_mode: TransportMode::Ambient,
            },
        ];
        let net = NetworkGraph::build(locations, legs).unwrap();
        let mut diag = Diagnostics::new();
        let enumerator = RouteEnumerator::enumerate(&net, &[LocationId::new("BR1")], 5, true, &mut diag);
        let routes = enumerator.routes_for(&LocationId::new("BR1"));
        assert_eq!(routes.len(), 2);
        assert!(routes[0].total_cost <= routes[1].total_cost);
    }
}
