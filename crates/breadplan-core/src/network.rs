//! NetworkGraph: locations, routes, and derived legs.
//!
//! Holds the arena of [`Location`]s and [`Leg`]s and answers the
//! reachability/transit/classification queries the rest of the planning
//! pipeline needs. Built once from immutable inputs; nothing downstream
//! mutates it.
//!
//! Nodes and edges live in a `petgraph` arena addressed by `NodeIndex` —
//! [`Location`] values never hold back-pointers to their edges, and
//! [`Leg`] values never hold a reference to the graph that owns them. This
//! mirrors how `gat-core::Network` keeps buses and branches arena-indexed
//! rather than linked by Rc/RefCell cycles.

use crate::error::{CoreError, CoreResult};
use crate::location::{Location, LocationId, LocationType, STORAGE_NODE_ID};
use crate::product::ProductState;
use crate::route::{Leg, TransportMode};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Locations, derived legs, and the manufacturing-origin rewrite (§3, §4.1).
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    graph: DiGraph<Location, Leg>,
    index: HashMap<LocationId, NodeIndex>,
    /// The leg set before the manufacturing-origin rewrite, kept only so
    /// the model builder can force the documented zero-flow constraint on
    /// them (§4.5 item 22, §9): "do not allow real manufacturing-origin
    /// legs; enforcing a zero-flow constraint on them is part of the
    /// correctness contract." No other client code should need this.
    manufacturing_origin_legs: Vec<Leg>,
}

impl NetworkGraph {
    /// Build a network from locations and routes, decomposing routes into
    /// legs and rewriting any real-manufacturing-origin leg to originate at
    /// the synthetic storage node instead.
    pub fn build(
        mut locations: Vec<Location>,
        legs: Vec<Leg>,
    ) -> CoreResult<Self> {
        if !locations.iter().any(|l| l.id.is_storage_node()) {
            locations.push(Location::storage_node());
        }

        let manufacturing_ids: Vec<LocationId> = locations
            .iter()
            .filter(|l| l.location_type == LocationType::Manufacturing)
            .map(|l| l.id.clone())
            .collect();

        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for loc in locations {
            let id = loc.id.clone();
            let idx = graph.add_node(loc);
            index.insert(id, idx);
        }

        let mut manufacturing_origin_legs = Vec::new();
        for leg in legs {
            if !index.contains_key(&leg.origin) {
                return Err(CoreError::UnknownLocation(leg.origin.to_string()));
            }
            if !index.contains_key(&leg.destination) {
                return Err(CoreError::UnknownLocation(leg.destination.to_string()));
            }
            if leg.transit_days < 0 {
                return Err(CoreError::InvalidRoute(format!(
                    "leg {} -> {} has negative transit_days",
                    leg.origin, leg.destination
                )));
            }

            let rewritten = if manufacturing_ids.contains(&leg.origin) {
                manufacturing_origin_legs.push(leg.clone());
                Leg {
                    origin: LocationId::storage_node(),
                    ..leg
                }
            } else {
                leg
            };

            let from = index[&rewritten.origin];
            let to = index[&rewritten.destination];
            graph.add_edge(from, to, rewritten);
        }

        Ok(Self {
            graph,
            index,
            manufacturing_origin_legs,
        })
    }

    pub fn location(&self, id: &LocationId) -> Option<&Location> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.graph.node_weights()
    }

    fn edge(&self, idx: EdgeIndex) -> &Leg {
        &self.graph[idx]
    }

    /// All legs departing `location`.
    pub fn legs_from(&self, location: &LocationId) -> Vec<&Leg> {
        match self.index.get(location) {
            Some(&idx) => self
                .graph
                .edges(idx)
                .map(|e| self.edge(e.id()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// All legs arriving at `location`.
    pub fn legs_to(&self, location: &LocationId) -> Vec<&Leg> {
        match self.index.get(location) {
            Some(&idx) => self
                .graph
                .edges_directed(idx, petgraph::Direction::Incoming)
                .map(|e| self.edge(e.id()))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn all_legs(&self) -> impl Iterator<Item = &Leg> {
        self.graph.edge_weights()
    }

    /// Legs whose origin was the real manufacturing site before the rewrite
    /// (§4.5 item 22). The model builder forces these to zero flow.
    pub fn manufacturing_origin_legs(&self) -> &[Leg] {
        &self.manufacturing_origin_legs
    }

    pub fn transit_days(&self, leg: &Leg) -> i64 {
        leg.transit_days
    }

    pub fn cost_per_unit(&self, leg: &Leg) -> f64 {
        leg.cost_per_unit
    }

    pub fn transport_mode(&self, leg: &Leg) -> TransportMode {
        leg.transport_mode
    }

    /// The product state a shipment arrives in, per the arrival-state rule
    /// (§3): a Frozen-mode leg into a frozen-capable storage facility stays
    /// Frozen; a Frozen-mode leg into an ambient-only breadroom thaws on
    /// arrival (re-stamped with production_date = arrival date, 14-day
    /// budget); everything else arrives Ambient.
    pub fn arrival_state(&self, leg: &Leg) -> ProductState {
        if leg.transport_mode != TransportMode::Frozen {
            return ProductState::Ambient;
        }
        match self.location(&leg.destination) {
            Some(dest) if dest.storage_mode.supports_frozen() && !dest.is_ambient_only_breadroom() => {
                ProductState::Frozen
            }
            _ => ProductState::Ambient,
        }
    }

    /// Whether a frozen shipment arriving here triggers a thaw (the arriving
    /// ambient cohort gets `production_date = arrival_date`). Identified
    /// structurally, not by hard-coded location id (§9 Open Question 1).
    pub fn is_thaw_destination(&self, leg: &Leg) -> bool {
        leg.transport_mode == TransportMode::Frozen
            && self
                .location(&leg.destination)
                .map(|dest| dest.is_ambient_only_breadroom())
                .unwrap_or(false)
    }

    pub fn is_frozen_storage(&self, location: &LocationId) -> bool {
        self.location(location).map(|l| l.is_frozen_storage()).unwrap_or(false)
    }

    pub fn is_ambient_only_breadroom(&self, location: &LocationId) -> bool {
        self.location(location)
            .map(|l| l.is_ambient_only_breadroom())
            .unwrap_or(false)
    }

    /// Shortest (minimum-transit) number of days from `origin` to `dest`
    /// following any chain of legs, or `None` if unreachable. Used by the
    /// cohort indexer's direct-leg reachability fallback (§4.4).
    pub fn min_transit_days(&self, origin: &LocationId, dest: &LocationId) -> Option<i64> {
        use std::collections::BinaryHeap;
        use std::cmp::Reverse;

        let start = *self.index.get(origin)?;
        let goal = *self.index.get(dest)?;
        let mut best: HashMap<NodeIndex, i64> = HashMap::new();
        let mut heap = BinaryHeap::new();
        heap.push(Reverse((0i64, start)));
        best.insert(start, 0);

        while let Some(Reverse((dist, node))) = heap.pop() {
            if node == goal {
                return Some(dist);
            }
            if best.get(&node).map(|&d| d < dist).unwrap_or(false) {
                continue;
            }
            for edge in self.graph.edges(node) {
                let leg = self.edge(edge.id());
                let next = dist + leg.transit_days;
                if best.get(&edge.target()).map(|&d| next < d).unwrap_or(true) {
                    best.insert(edge.target(), next);
                    heap.push(Reverse((next, edge.target())));
                }
            }
        }
        None
    }
}

pub use crate::location::STORAGE_NODE_ID as STORAGE_NODE;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::StorageMode;

    fn build_simple() -> NetworkGraph {
        let locations = vec![
            Location::new("6122", "Plant", LocationType::Manufacturing, StorageMode::Both),
            Location::new("BR1", "Breadroom 1", LocationType::Breadroom, StorageMode::AmbientOnly),
        ];
        let legs = vec![Leg {
            origin: LocationId::new("6122"),
            destination: LocationId::new("BR1"),
            transit_days: 2,
            cost_per_unit: 0.5,
            transport_mode: TransportMode::Ambient,
        }];
        NetworkGraph::build(locations, legs).unwrap()
    }

    #[test]
    fn manufacturing_origin_legs_are_rewritten_to_storage_node() {
        let net = build_simple();
        let legs: Vec<_> = net.legs_from(&LocationId::storage_node()).into_iter().collect();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].destination.as_str(), "BR1");

        // Original manufacturing-origin leg is not part of the live graph.
        assert!(net.legs_from(&LocationId::new("6122")).is_empty());
        // ...but is retained for the model builder's zero-flow constraint.
        assert_eq!(net.manufacturing_origin_legs().len(), 1);
        assert_eq!(net.manufacturing_origin_legs()[0].origin.as_str(), "6122");
    }

    #[test]
    fn arrival_state_ambient_leg_always_arrives_ambient() {
        let net = build_simple();
        let leg = net.legs_from(&LocationId::storage_node())[0].clone();
        assert_eq!(net.arrival_state(&leg), ProductState::Ambient);
        assert!(!net.is_thaw_destination(&leg));
    }

    #[test]
    fn frozen_leg_into_frozen_depot_arrives_frozen() {
        let locations = vec![
            Location::new("6122", "Plant", LocationType::Manufacturing, StorageMode::Both),
            Location::new("FROZEN", "Frozen Depot", LocationType::Storage, StorageMode::FrozenOnly),
        ];
        let legs = vec![Leg {
            origin: LocationId::new("6122"),
            destination: LocationId::new("FROZEN"),
            transit_days: 3,
            cost_per_unit: 0.3,
            transport_mode: TransportMode::Frozen,
        }];
        let net = NetworkGraph::build(locations, legs).unwrap();
        let leg = net.legs_from(&LocationId::storage_node())[0].clone();
        assert_eq!(net.arrival_state(&leg), ProductState::Frozen);
        assert!(net.is_frozen_storage(&LocationId::new("FROZEN")));
    }

    #[test]
    fn frozen_leg_into_ambient_only_breadroom_thaws() {
        let locations = vec![
            Location::new("6122", "Plant", LocationType::Manufacturing, StorageMode::Both),
            Location::new("WA", "WA Breadroom", LocationType::Breadroom, StorageMode::AmbientOnly),
        ];
        let legs = vec![Leg {
            origin: LocationId::new("6122"),
            destination: LocationId::new("WA"),
            transit_days: 5,
            cost_per_unit: 0.4,
            transport_mode: TransportMode::Frozen,
        }];
        let net = NetworkGraph::build(locations, legs).unwrap();
        let leg = net.legs_from(&LocationId::storage_node())[0].clone();
        assert_eq!(net.arrival_state(&leg), ProductState::Ambient);
        assert!(net.is_thaw_destination(&leg));
    }

    #[test]
    fn unknown_location_in_a_leg_is_an_error() {
        let locations = vec![Location::new(
            "6122",
            "Plant",
            LocationType::Manufacturing,
            StorageMode::Both,
        )];
        let legs = vec![Leg {
            origin: LocationId::new("6122"),
            destination: LocationId::new("NOPE"),
            transit_days: 1,
            cost_per_unit: 0.1,
            transport_mode: TransportMode::Ambient,
        }];
        assert!(NetworkGraph::build(locations, legs).is_err());
    }

    #[test]
    fn min_transit_days_follows_multi_hop_chains() {
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
        let net = NetworkGraph::build(locations, legs).unwrap();
        assert_eq!(
            net.min_transit_days(&LocationId::storage_node(), &LocationId::new("BR1")),
            Some(3)
        );
    }
}
