//! Sparse 4-D cohort index construction (§4.4) — the hardest subsystem.
//!
//! A dense `(location, product, production_date, current_date)` grid scales
//! as `|L|·|P|·|D|²` and is combinatorially wasteful; every set here
//! includes only tuples that could ever be non-zero, so shelf-life
//! expiration is enforced by omission rather than by a constraint that
//! fires on every date.

use crate::route_enum::RouteEnumerator;
use breadplan_core::{
    Diagnostics, InventorySnapshot, Leg, LocationId, NetworkGraph, PlanningHorizon, ProductId,
    ProductState,
};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Warn when the total materialised cohort count exceeds this (§4.4).
pub const SIZE_WARNING_THRESHOLD: usize = 200_000;

/// Index into the flat leg arena used to key [`ShipmentCohortKey`]. Clients
/// hold indices rather than references into the network's edge storage
/// (§9: arena-style ownership, no back-pointers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LegIdx(pub usize);

/// A cohort tuple shared by the frozen, ambient, freeze/thaw, and demand
/// sparse sets. `current_date` is reused as the demand date for
/// [`CohortSets::demand`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CohortKey {
    pub location: LocationId,
    pub product: ProductId,
    pub production_date: NaiveDate,
    pub current_date: NaiveDate,
}

/// A shipment cohort tuple: flow of one production cohort along one leg,
/// arriving on `delivery_date`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShipmentCohortKey {
    pub leg: LegIdx,
    pub product: ProductId,
    pub production_date: NaiveDate,
    pub delivery_date: NaiveDate,
}

/// The five sparse sets that are the domain of the cohort-indexed decision
/// variables (§4.4).
#[derive(Debug, Clone, Default)]
pub struct CohortSets {
    pub legs: Vec<Leg>,
    pub frozen: BTreeSet<CohortKey>,
    pub ambient: BTreeSet<CohortKey>,
    pub shipment: BTreeSet<ShipmentCohortKey>,
    pub demand: BTreeSet<CohortKey>,
    pub freeze_thaw: BTreeSet<CohortKey>,
}

/// Cohort set sizes, reported for observability (§4.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CohortCounts {
    pub frozen: usize,
    pub ambient: usize,
    pub shipment: usize,
    pub demand: usize,
    pub freeze_thaw: usize,
}

impl CohortCounts {
    pub fn total(&self) -> usize {
        self.frozen + self.ambient + self.shipment + self.demand + self.freeze_thaw
    }
}

pub struct CohortIndexer;

impl CohortIndexer {
    /// Build the five sparse cohort sets.
    ///
    /// `demand_keys` is the flat list of `(location, product, demand_date)`
    /// with positive demand; `products` and `locations` enumerate the
    /// model's full product and location sets.
    pub fn build(
        network: &NetworkGraph,
        horizon: &PlanningHorizon,
        production_dates: &[NaiveDate],
        products: &[ProductId],
        locations: &[LocationId],
        enumerator: &RouteEnumerator,
        initial_inventory: &InventorySnapshot,
        demand_keys: &[(LocationId, ProductId, NaiveDate)],
        diagnostics: &mut Diagnostics,
    ) -> CohortSets {
        let legs: Vec<Leg> = network.all_legs().cloned().collect();
        let horizon_dates = horizon.dates();

        let reachable = |location: &LocationId, product: &ProductId, d_prod: NaiveDate, d_cur: NaiveDate| -> bool {
            is_reachable(network, enumerator, initial_inventory, location, product, d_prod, d_cur)
        };

        let mut frozen = BTreeSet::new();
        let mut ambient = BTreeSet::new();

        for location in locations {
            let storage = match network.location(location) {
                Some(loc) => loc.storage_mode,
                None => continue,
            };
            let ambient_cap = ambient_age_cap(network, location);

            for product in products {
                for &d_prod in production_dates {
                    for &d_cur in &horizon_dates {
                        if d_cur < d_prod {
                            continue;
                        }
                        let age = (d_cur - d_prod).num_days();

                        if storage.supports_frozen()
                            && age <= ProductState::Frozen.shelf_life_days()
                            && reachable(location, product, d_prod, d_cur)
                        {
                            frozen.insert(CohortKey {
                                location: location.clone(),
                                product: product.clone(),
                                production_date: d_prod,
                                current_date: d_cur,
                            });
                        }

                        if storage.supports_ambient()
                            && age <= ambient_cap
                            && reachable(location, product, d_prod, d_cur)
                        {
                            ambient.insert(CohortKey {
                                location: location.clone(),
                                product: product.clone(),
                                production_date: d_prod,
                                current_date: d_cur,
                            });
                        }
                    }
                }
            }
        }

        let mut shipment = BTreeSet::new();
        for (idx, leg) in legs.iter().enumerate() {
            for product in products {
                for &d_deliver in &horizon_dates {
                    let d_depart = d_deliver - chrono::Duration::days(leg.transit_days);
                    for &d_prod in production_dates {
                        if d_prod > d_depart {
                            continue;
                        }
                        if reachable(&leg.origin, product, d_prod, d_depart) {
                            shipment.insert(ShipmentCohortKey {
                                leg: LegIdx(idx),
                                product: product.clone(),
                                production_date: d_prod,
                                delivery_date: d_deliver,
                            });
                        }
                    }
                }
            }
        }

        let demand: BTreeSet<CohortKey> = demand_keys
            .iter()
            .flat_map(|(location, product, d_demand)| {
                production_dates.iter().filter_map(move |&d_prod| {
                    let key = CohortKey {
                        location: location.clone(),
                        product: product.clone(),
                        production_date: d_prod,
                        current_date: *d_demand,
                    };
                    ambient.contains(&key).then_some(key)
                })
            })
            .collect();

        let mut freeze_thaw = BTreeSet::new();
        for location in locations {
            if network.is_frozen_storage(location) {
                freeze_thaw.extend(frozen.iter().filter(|k| &k.location == location).cloned());
            }
            if network.is_ambient_only_breadroom(location) && ambient_age_cap(network, location) == ProductState::Thawed.shelf_life_days() {
                freeze_thaw.extend(
                    ambient
                        .iter()
                        .filter(|k| &k.location == location && k.production_date == k.current_date)
                        .cloned(),
                );
            }
        }

        let counts = CohortCounts {
            frozen: frozen.len(),
            ambient: ambient.len(),
            shipment: shipment.len(),
            demand: demand.len(),
            freeze_thaw: freeze_thaw.len(),
        };
        if counts.total() > SIZE_WARNING_THRESHOLD {
            diagnostics.add_warning(
                "cohort_index",
                format!(
                    "cohort index materialised {} variables (> {} warning threshold)",
                    counts.total(),
                    SIZE_WARNING_THRESHOLD
                ),
            );
        }

        CohortSets {
            legs,
            frozen,
            ambient,
            shipment,
            demand,
            freeze_thaw,
        }
    }
}

/// The ambient shelf-life cap for cohorts at `location`: 14 days for a
/// location whose ambient stock is exclusively the product of a thaw
/// (an ambient-only breadroom fed by a frozen leg), 17 otherwise (§4.4).
fn ambient_age_cap(network: &NetworkGraph, location: &LocationId) -> i64 {
    let is_thaw_location = network.is_ambient_only_breadroom(location)
        && network
            .legs_to(location)
            .iter()
            .any(|leg| network.is_thaw_destination(leg));
    if is_thaw_location {
        ProductState::Thawed.shelf_life_days()
    } else {
        ProductState::Ambient.shelf_life_days()
    }
}

/// The reachability test `R(L, p, d_prod, d_cur)` gating cohort inclusion (§4.4).
fn is_reachable(
    network: &NetworkGraph,
    enumerator: &RouteEnumerator,
    initial_inventory: &InventorySnapshot,
    location: &LocationId,
    product: &ProductId,
    d_prod: NaiveDate,
    d_cur: NaiveDate,
) -> bool {
    if location.is_storage_node() {
        return true;
    }

    let has_initial_entry = initial_inventory
        .iter()
        .any(|(key, _)| &key.location == location && &key.product == product && key.production_date == d_prod);
    if has_initial_entry {
        return true;
    }

    let route_reachable = enumerator
        .routes_for(location)
        .iter()
        .any(|route| d_prod + chrono::Duration::days(route.total_transit_days) <= d_cur);
    if route_reachable {
        return true;
    }

    network
        .legs_to(location)
        .iter()
        .any(|leg| d_prod + chrono::Duration::days(leg.transit_days) <= d_cur)
}
