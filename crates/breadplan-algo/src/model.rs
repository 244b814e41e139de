//! The MILP model builder: sets, decision variables, the 23 core
//! constraints, and the cost-minimising objective (§4.5).
//!
//! Building a model is a pure function from immutable inputs to a
//! `good_lp` variable/constraint graph; nothing here talks to a solver.
//! [`crate::solution`] drives the actual solve and extracts results.

use crate::cohort_index::{CohortIndexer, CohortKey, CohortSets, LegIdx, ShipmentCohortKey};
use crate::error::{PlanningError, PlanningResult};
use crate::route_enum::RouteEnumerator;
use breadplan_core::{
    CostStructure, Diagnostics, Forecast, InventorySnapshot, LaborCalendar, LaborDay, Leg,
    LocationId, NetworkGraph, PlanningHorizon, ProductId, ProductState, TransportMode, TruckId,
    TruckSchedule,
};
use chrono::{Datelike, NaiveDate};
use good_lp::{constraint, variable, Expression, ProblemVariables, Variable};
use std::collections::HashMap;

/// Production throughput, units per labor-hour (§4.5 constraint 2).
pub const PRODUCTION_RATE_UNITS_PER_HOUR: f64 = 1400.0;
/// Units per case (§4.5 constraint 1).
pub const UNITS_PER_CASE: f64 = 10.0;
/// Units per pallet (§4.5 constraint 16).
pub const UNITS_PER_PALLET: f64 = 320.0;

/// Tunable knobs for a model build that are not themselves business data.
#[derive(Debug, Clone)]
pub struct ModelBuildConfig {
    pub enforce_shelf_life: bool,
    pub max_routes_per_destination: usize,
    pub production_rate_per_hour: f64,
    pub units_per_case: f64,
    pub units_per_pallet: f64,
    /// Whether unmet demand absorbs into a `shortage` variable (true) or is
    /// a hard infeasibility (false, used for pre-solve checks only).
    pub allow_shortage: bool,
}

impl Default for ModelBuildConfig {
    fn default() -> Self {
        Self {
            enforce_shelf_life: true,
            max_routes_per_destination: 5,
            production_rate_per_hour: PRODUCTION_RATE_UNITS_PER_HOUR,
            units_per_case: UNITS_PER_CASE,
            units_per_pallet: UNITS_PER_PALLET,
            allow_shortage: true,
        }
    }
}

/// Every decision-variable handle the solution extractor needs, keyed
/// exactly as the sparse sets that generated them (§4.5).
#[derive(Debug, Default)]
pub struct ModelVariables {
    pub production: HashMap<(NaiveDate, ProductId), Variable>,
    pub production_cases: HashMap<(NaiveDate, ProductId), Variable>,
    pub production_day: HashMap<NaiveDate, Variable>,
    pub shipment_leg: HashMap<(LegIdx, ProductId, NaiveDate), Variable>,
    pub shipment_leg_cohort: HashMap<ShipmentCohortKey, Variable>,
    pub inventory_frozen: HashMap<(LocationId, ProductId, NaiveDate), Variable>,
    pub inventory_ambient: HashMap<(LocationId, ProductId, NaiveDate), Variable>,
    pub inventory_frozen_cohort: HashMap<CohortKey, Variable>,
    pub inventory_ambient_cohort: HashMap<CohortKey, Variable>,
    pub freeze: HashMap<CohortKey, Variable>,
    pub thaw: HashMap<CohortKey, Variable>,
    pub demand_from_cohort: HashMap<CohortKey, Variable>,
    pub shortage: HashMap<(LocationId, ProductId, NaiveDate), Variable>,
    pub truck_used: HashMap<(TruckId, NaiveDate), Variable>,
    pub truck_load: HashMap<(TruckId, LocationId, ProductId, NaiveDate), Variable>,
    pub pallets_loaded: HashMap<(TruckId, LocationId, ProductId, NaiveDate), Variable>,
    pub labor_hours: HashMap<NaiveDate, Variable>,
    pub fixed_hours_used: HashMap<NaiveDate, Variable>,
    pub overtime_hours_used: HashMap<NaiveDate, Variable>,
    pub non_fixed_hours_paid: HashMap<NaiveDate, Variable>,
}

/// A fully built, unsolved model: variables, constraints, and the objective,
/// plus enough bookkeeping for [`crate::solution::SolutionExtractor`] to
/// make sense of the solved values.
pub struct BuiltModel {
    pub vars: ProblemVariables,
    pub constraints: Vec<good_lp::Constraint>,
    pub objective: Expression,
    pub variables: ModelVariables,
    pub legs: Vec<Leg>,
    pub horizon: PlanningHorizon,
    pub demand: Forecast,
    pub cohort_sets: CohortSets,
    pub diagnostics: Diagnostics,
    pub cost: CostStructure,
    pub trucks: TruckSchedule,
    pub labor: LaborCalendar,
}

/// Builds the MILP model from the immutable planning inputs.
pub struct ModelBuilder<'a> {
    pub network: &'a NetworkGraph,
    pub horizon: PlanningHorizon,
    pub products: Vec<ProductId>,
    pub locations: Vec<LocationId>,
    pub demand: Forecast,
    pub labor: &'a LaborCalendar,
    pub trucks: &'a TruckSchedule,
    pub cost: &'a CostStructure,
    pub initial_inventory: &'a InventorySnapshot,
    pub config: ModelBuildConfig,
}

impl<'a> ModelBuilder<'a> {
    pub fn build(self) -> PlanningResult<BuiltModel> {
        let mut diagnostics = Diagnostics::new();
        let horizon_dates = self.horizon.dates();
        let production_dates = self.horizon.production_dates(self.initial_inventory);

        self.check_labor_calendar(&horizon_dates, &mut diagnostics)?;

        let destinations: Vec<LocationId> = self.demand.destinations().cloned().collect();
        let enumerator = RouteEnumerator::enumerate(
            self.network,
            &destinations,
            self.config.max_routes_per_destination,
            self.config.enforce_shelf_life,
            &mut diagnostics,
        );
        for dest in &destinations {
            if !enumerator.has_route(dest) {
                return Err(PlanningError::infeasible_input(
                    format!("no shelf-life-feasible route to destination {dest}"),
                    vec![dest.to_string()],
                ));
            }
        }

        let demand_keys: Vec<(LocationId, ProductId, NaiveDate)> = self
            .demand
            .keys()
            .map(|k| (k.destination.clone(), k.product.clone(), k.date))
            .collect();

        let cohort_sets = CohortIndexer::build(
            self.network,
            &self.horizon,
            &production_dates,
            &self.products,
            &self.locations,
            &enumerator,
            self.initial_inventory,
            &demand_keys,
            &mut diagnostics,
        );

        let mut vars = ProblemVariables::new();
        let mut mv = ModelVariables::default();
        let mut constraints = Vec::new();

        self.create_production_variables(&mut vars, &mut mv, &horizon_dates);
        self.create_shipment_variables(&mut vars, &mut mv, &cohort_sets);
        self.create_inventory_variables(&mut vars, &mut mv, &horizon_dates);
        self.create_cohort_stock_variables(&mut vars, &mut mv, &cohort_sets);
        self.create_freeze_thaw_variables(&mut vars, &mut mv, &cohort_sets);
        self.create_demand_variables(&mut vars, &mut mv, &cohort_sets, &demand_keys);
        let truck_dates = self.create_truck_variables(&mut vars, &mut mv, &horizon_dates);
        self.create_labor_variables(&mut vars, &mut mv, &horizon_dates);

        self.add_case_packaging_constraints(&mut constraints, &mv, &horizon_dates);
        self.add_labor_constraints(&mut constraints, &mv, &horizon_dates)?;
        self.add_cohort_aggregation_constraints(&mut constraints, &mv, &cohort_sets);
        self.add_demand_allocation_constraints(&mut constraints, &mv, &demand_keys);
        self.add_shortage_bounds(&mut constraints, &mv, &demand_keys);
        self.add_no_direct_manufacturing_flow(&mut constraints, &mv, &cohort_sets);
        self.add_no_phantom_flow(&mut constraints, &mv, &cohort_sets, &horizon_dates);
        self.add_freeze_thaw_constraints(&mut constraints, &mv, &cohort_sets, &enumerator)?;
        self.add_frozen_ambient_balance_constraints(&mut constraints, &mv, &cohort_sets, &horizon_dates, &enumerator);
        self.add_cohort_balance_constraints(&mut constraints, &mv, &cohort_sets);
        self.add_truck_constraints(&mut constraints, &mv, &truck_dates, &enumerator);

        let objective = self.build_objective(&mv, &horizon_dates, &cohort_sets, &demand_keys);

        let legs = self.network.all_legs().cloned().collect();

        Ok(BuiltModel {
            vars,
            constraints,
            objective,
            variables: mv,
            legs,
            horizon: self.horizon,
            demand: self.demand,
            cohort_sets,
            diagnostics,
            cost: self.cost.clone(),
            trucks: self.trucks.clone(),
            labor: self.labor.clone(),
        })
    }

    fn check_labor_calendar(&self, dates: &[NaiveDate], diagnostics: &mut Diagnostics) -> PlanningResult<()> {
        for &date in dates {
            if self.labor.contains(date) {
                continue;
            }
            if LaborCalendar::is_weekend(date) {
                diagnostics.add_warning_with_entity(
                    "labor_calendar",
                    "no weekend/holiday labor entry, assuming zero capacity",
                    &date.to_string(),
                );
            } else {
                return Err(PlanningError::infeasible_input(
                    "missing labor calendar entry for a critical weekday",
                    vec![date.to_string()],
                ));
            }
        }
        Ok(())
    }

    // ---- variable creation -------------------------------------------------

    fn create_production_variables(&self, vars: &mut ProblemVariables, mv: &mut ModelVariables, dates: &[NaiveDate]) {
        for &d in dates {
            mv.production_day.insert(d, vars.add(variable().binary()));
            for p in &self.products {
                mv.production
                    .insert((d, p.clone()), vars.add(variable().min(0.0)));
                mv.production_cases
                    .insert((d, p.clone()), vars.add(variable().integer().min(0)));
            }
        }
    }

    fn create_shipment_variables(&self, vars: &mut ProblemVariables, mv: &mut ModelVariables, cohorts: &CohortSets) {
        for key in &cohorts.shipment {
            mv.shipment_leg_cohort
                .insert(key.clone(), vars.add(variable().min(0.0)));
            mv.shipment_leg
                .entry((key.leg, key.product.clone(), key.delivery_date))
                .or_insert_with(|| vars.add(variable().min(0.0)));
        }
    }

    fn create_inventory_variables(&self, vars: &mut ProblemVariables, mv: &mut ModelVariables, dates: &[NaiveDate]) {
        for location in &self.locations {
            let storage = match self.network.location(location) {
                Some(loc) => loc.storage_mode,
                None => continue,
            };
            for p in &self.products {
                for &d in dates {
                    if storage.supports_frozen() {
                        mv.inventory_frozen
                            .insert((location.clone(), p.clone(), d), vars.add(variable().min(0.0)));
                    }
                    if storage.supports_ambient() {
                        mv.inventory_ambient
                            .insert((location.clone(), p.clone(), d), vars.add(variable().min(0.0)));
                    }
                }
            }
        }
    }

    fn create_cohort_stock_variables(&self, vars: &mut ProblemVariables, mv: &mut ModelVariables, cohorts: &CohortSets) {
        for key in &cohorts.frozen {
            mv.inventory_frozen_cohort
                .insert(key.clone(), vars.add(variable().min(0.0)));
        }
        for key in &cohorts.ambient {
            mv.inventory_ambient_cohort
                .insert(key.clone(), vars.add(variable().min(0.0)));
        }
    }

    fn create_freeze_thaw_variables(&self, vars: &mut ProblemVariables, mv: &mut ModelVariables, cohorts: &CohortSets) {
        for key in &cohorts.freeze_thaw {
            if self.network.is_frozen_storage(&key.location) {
                mv.freeze.insert(key.clone(), vars.add(variable().min(0.0)));
            }
            if self.network.is_ambient_only_breadroom(&key.location) {
                mv.thaw.insert(key.clone(), vars.add(variable().min(0.0)));
            }
        }
    }

    fn create_demand_variables(
        &self,
        vars: &mut ProblemVariables,
        mv: &mut ModelVariables,
        cohorts: &CohortSets,
        demand_keys: &[(LocationId, ProductId, NaiveDate)],
    ) {
        for key in &cohorts.demand {
            mv.demand_from_cohort
                .insert(key.clone(), vars.add(variable().min(0.0)));
        }
        if self.config.allow_shortage {
            for (location, product, date) in demand_keys {
                let demand_qty = self.demand.quantity(&breadplan_core::DemandKey {
                    destination: location.clone(),
                    product: product.clone(),
                    date: *date,
                });
                mv.shortage.insert(
                    (location.clone(), product.clone(), *date),
                    vars.add(variable().min(0.0).max(demand_qty)),
                );
            }
        }
    }

    fn create_truck_variables(
        &self,
        vars: &mut ProblemVariables,
        mv: &mut ModelVariables,
        dates: &[NaiveDate],
    ) -> HashMap<(TruckId, NaiveDate), NaiveDate> {
        let mut truck_departure: HashMap<(TruckId, NaiveDate), NaiveDate> = HashMap::new();
        for truck in self.trucks.iter() {
            let transit = transit_to(self.network, &truck.destination);
            for &d in dates {
                mv.truck_used.insert((truck.id, d), vars.add(variable().binary()));
                let departure = d - chrono::Duration::days(transit);
                truck_departure.insert((truck.id, d), departure);

                for stop in truck.stops() {
                    for p in &self.products {
                        mv.truck_load.insert(
                            (truck.id, stop.clone(), p.clone(), d),
                            vars.add(variable().min(0.0)),
                        );
                        mv.pallets_loaded.insert(
                            (truck.id, stop.clone(), p.clone(), d),
                            vars.add(variable().integer().min(0)),
                        );
                    }
                }
            }
        }
        truck_departure
    }

    fn create_labor_variables(&self, vars: &mut ProblemVariables, mv: &mut ModelVariables, dates: &[NaiveDate]) {
        for &d in dates {
            mv.labor_hours.insert(d, vars.add(variable().min(0.0)));
            mv.fixed_hours_used.insert(d, vars.add(variable().min(0.0)));
            mv.overtime_hours_used.insert(d, vars.add(variable().min(0.0)));
            mv.non_fixed_hours_paid.insert(d, vars.add(variable().min(0.0)));
        }
    }

    // ---- constraints --------------------------------------------------------

    /// Constraint 1: case packaging.
    fn add_case_packaging_constraints(&self, out: &mut Vec<good_lp::Constraint>, mv: &ModelVariables, dates: &[NaiveDate]) {
        for &d in dates {
            for p in &self.products {
                let production = mv.production[&(d, p.clone())];
                let cases = mv.production_cases[&(d, p.clone())];
                out.push(constraint!(production == self.config.units_per_case * cases));
            }
        }
    }

    /// Constraints 2-6: labor accounting, the production-day binary, and
    /// the fixed/overtime/non-fixed decomposition.
    fn add_labor_constraints(&self, out: &mut Vec<good_lp::Constraint>, mv: &ModelVariables, dates: &[NaiveDate]) -> PlanningResult<()> {
        for &d in dates {
            let total_production: Expression = self.products.iter().map(|p| mv.production[&(d, p.clone())]).sum();
            let labor_hours = mv.labor_hours[&d];
            out.push(constraint!(labor_hours == total_production / self.config.production_rate_per_hour));

            let day = self.labor.get(d).cloned().unwrap_or_else(LaborDay::zero_capacity_non_fixed);
            out.push(constraint!(labor_hours <= day.max_hours()));

            let production_day = mv.production_day[&d];
            let max_daily_units = day.max_hours() * self.config.production_rate_per_hour;
            out.push(constraint!(total_production.clone() <= max_daily_units * production_day));
            out.push(constraint!(total_production >= production_day));

            let fixed_hours_used = mv.fixed_hours_used[&d];
            let overtime_hours_used = mv.overtime_hours_used[&d];
            let non_fixed_hours_paid = mv.non_fixed_hours_paid[&d];

            match day {
                LaborDay::Fixed { fixed_hours, .. } => {
                    out.push(constraint!(fixed_hours_used == fixed_hours));
                    out.push(constraint!(overtime_hours_used >= labor_hours - fixed_hours));
                    out.push(constraint!(overtime_hours_used >= 0.0));
                    out.push(constraint!(non_fixed_hours_paid == 0.0));
                }
                LaborDay::NonFixed { minimum_hours, .. } => {
                    out.push(constraint!(fixed_hours_used == 0.0));
                    out.push(constraint!(overtime_hours_used == 0.0));
                    out.push(constraint!(non_fixed_hours_paid >= labor_hours));
                    out.push(constraint!(non_fixed_hours_paid >= minimum_hours * production_day));
                }
            }
        }
        Ok(())
    }

    /// Constraint 14: cohort aggregation onto `shipment_leg`.
    fn add_cohort_aggregation_constraints(&self, out: &mut Vec<good_lp::Constraint>, mv: &ModelVariables, cohorts: &CohortSets) {
        let mut grouped: HashMap<(LegIdx, ProductId, NaiveDate), Expression> = HashMap::new();
        for key in &cohorts.shipment {
            let var = mv.shipment_leg_cohort[key];
            grouped
                .entry((key.leg, key.product.clone(), key.delivery_date))
                .and_modify(|e| *e += var)
                .or_insert_with(|| var.into());
        }
        for (leg_key, sum_expr) in grouped {
            let aggregate = mv.shipment_leg[&leg_key];
            out.push(constraint!(sum_expr == aggregate));
        }
    }

    /// Constraint 13: demand allocation, and the demand-allocation half of
    /// property 3 (cohort sum + shortage = demand). This only bounds the
    /// *sum* across cohorts; what stops an individual `demand_from_cohort`
    /// entry from outrunning the stock of its own cohort is the per-cohort
    /// balance in [`Self::add_cohort_balance_constraints`], not this method.
    fn add_demand_allocation_constraints(
        &self,
        out: &mut Vec<good_lp::Constraint>,
        mv: &ModelVariables,
        demand_keys: &[(LocationId, ProductId, NaiveDate)],
    ) {
        for (location, product, date) in demand_keys {
            let demand_qty = self.demand.quantity(&breadplan_core::DemandKey {
                destination: location.clone(),
                product: product.clone(),
                date: *date,
            });
            let mut expr: Expression = mv
                .demand_from_cohort
                .iter()
                .filter(|(k, _)| &k.location == location && &k.product == product && k.current_date == *date)
                .map(|(_, v)| *v)
                .sum();
            if let Some(&shortage) = mv.shortage.get(&(location.clone(), product.clone(), *date)) {
                expr += shortage;
            }
            out.push(constraint!(expr == demand_qty));
        }
    }

    /// Constraint 23: shortage bounds (enforced at variable creation via
    /// `.max(demand_qty)`; this adds the explicit non-negativity pair for
    /// documentation/traceability with the spec's numbered constraint).
    fn add_shortage_bounds(&self, out: &mut Vec<good_lp::Constraint>, mv: &ModelVariables, demand_keys: &[(LocationId, ProductId, NaiveDate)]) {
        for (location, product, date) in demand_keys {
            if let Some(&shortage) = mv.shortage.get(&(location.clone(), product.clone(), *date)) {
                out.push(constraint!(shortage >= 0.0));
            }
        }
    }

    /// Constraint 22: no direct manufacturing flow. `NetworkGraph::build`
    /// already rewrites every manufacturing-origin leg to originate at the
    /// synthetic storage node, so no live leg in `cohorts.legs` can
    /// originate at the real manufacturing site; this defends that
    /// invariant rather than re-deriving it (§9).
    fn add_no_direct_manufacturing_flow(&self, out: &mut Vec<good_lp::Constraint>, mv: &ModelVariables, cohorts: &CohortSets) {
        let manufacturing_ids: Vec<&LocationId> = self
            .network
            .manufacturing_origin_legs()
            .iter()
            .map(|m| &m.origin)
            .collect();

        for (idx, leg) in cohorts.legs.iter().enumerate() {
            if !manufacturing_ids.contains(&&leg.origin) {
                continue;
            }
            for p in &self.products {
                for &d in mv.shipment_leg.keys().filter(|(l, prod, _)| *l == LegIdx(idx) && prod == p).map(|(_, _, d)| d) {
                    let shipment = mv.shipment_leg[&(LegIdx(idx), p.clone(), d)];
                    out.push(constraint!(shipment == 0.0));
                }
            }
        }
    }

    /// Constraint 18: no phantom flow — a leg cannot deliver before the
    /// horizon start.
    fn add_no_phantom_flow(&self, out: &mut Vec<good_lp::Constraint>, mv: &ModelVariables, cohorts: &CohortSets, dates: &[NaiveDate]) {
        for (idx, leg) in cohorts.legs.iter().enumerate() {
            for p in &self.products {
                for &d in dates {
                    let departs = d - chrono::Duration::days(leg.transit_days);
                    if departs >= self.horizon.start {
                        continue;
                    }
                    if let Some(&shipment) = mv.shipment_leg.get(&(LegIdx(idx), p.clone(), d)) {
                        out.push(constraint!(shipment == 0.0));
                    }
                }
            }
        }
    }

    /// Constraints 11-12: automatic freeze at frozen-storage facilities and
    /// automatic thaw at ambient-only breadrooms (both hard equalities).
    fn add_freeze_thaw_constraints(
        &self,
        out: &mut Vec<good_lp::Constraint>,
        mv: &ModelVariables,
        cohorts: &CohortSets,
        _enumerator: &RouteEnumerator,
    ) -> PlanningResult<()> {
        for (key, &freeze_var) in &mv.freeze {
            let ambient_arrivals = self.ambient_arrivals_expr(mv, cohorts, &key.location, &key.product, key.production_date, key.current_date);
            out.push(constraint!(freeze_var == ambient_arrivals));
        }
        for (key, &thaw_var) in &mv.thaw {
            if key.production_date != key.current_date {
                continue;
            }
            let frozen_arrivals = self.frozen_arrivals_expr(mv, cohorts, &key.location, &key.product, key.current_date);
            out.push(constraint!(thaw_var == frozen_arrivals));
        }
        Ok(())
    }

    fn ambient_arrivals_expr(
        &self,
        mv: &ModelVariables,
        cohorts: &CohortSets,
        location: &LocationId,
        product: &ProductId,
        d_prod: NaiveDate,
        d_cur: NaiveDate,
    ) -> Expression {
        cohorts
            .shipment
            .iter()
            .filter(|k| {
                k.product == *product
                    && k.production_date == d_prod
                    && k.delivery_date == d_cur
                    && cohorts.legs[k.leg.0].destination == *location
            })
            .map(|k| mv.shipment_leg_cohort[k])
            .sum()
    }

    fn frozen_arrivals_expr(&self, mv: &ModelVariables, cohorts: &CohortSets, location: &LocationId, product: &ProductId, d_cur: NaiveDate) -> Expression {
        cohorts
            .shipment
            .iter()
            .filter(|k| {
                k.product == *product
                    && k.delivery_date == d_cur
                    && cohorts.legs[k.leg.0].destination == *location
                    && cohorts.legs[k.leg.0].transport_mode == TransportMode::Frozen
            })
            .map(|k| mv.shipment_leg_cohort[k])
            .sum()
    }

    /// Constraints 7-8: aggregate frozen/ambient inventory balance, one
    /// equation per `(location, product, date)` regardless of which
    /// production cohort the stock belongs to. The per-cohort balances
    /// (constraints 9-10) that tie `demand_from_cohort`/`freeze`/`thaw` to
    /// actual cohort stock live in [`Self::add_cohort_balance_constraints`].
    fn add_frozen_ambient_balance_constraints(
        &self,
        out: &mut Vec<good_lp::Constraint>,
        mv: &ModelVariables,
        cohorts: &CohortSets,
        dates: &[NaiveDate],
        _enumerator: &RouteEnumerator,
    ) {
        for location in &self.locations {
            let storage = match self.network.location(location) {
                Some(loc) => loc.storage_mode,
                None => continue,
            };
            for product in &self.products {
                let mut prev_frozen: Option<Variable> = None;
                let mut prev_ambient: Option<Variable> = None;
                for &d in dates {
                    if storage.supports_frozen() {
                        if let Some(&stock) = mv.inventory_frozen.get(&(location.clone(), product.clone(), d)) {
                            let arrivals = self.frozen_arrivals_expr(mv, cohorts, location, product, d);
                            let departures = self.frozen_departures_expr(mv, cohorts, location, product, d);
                            let freeze_in: Expression = mv
                                .freeze
                                .iter()
                                .filter(|(k, _)| k.location == *location && k.product == *product && k.current_date == d)
                                .map(|(_, v)| *v)
                                .sum();
                            let initial: f64 = self.initial_qty(location, product, ProductState::Frozen, d);
                            let previous: Expression = prev_frozen.map(Expression::from).unwrap_or_else(|| initial.into());
                            out.push(constraint!(stock == previous + arrivals + freeze_in - departures));
                            prev_frozen = Some(stock);
                        }
                    }
                    if storage.supports_ambient() {
                        if let Some(&stock) = mv.inventory_ambient.get(&(location.clone(), product.clone(), d)) {
                            let arrivals = self.ambient_arrivals_total_expr(mv, cohorts, location, product, d);
                            let departures = self.ambient_departures_expr(mv, cohorts, location, product, d);
                            let thaw_in: Expression = mv
                                .thaw
                                .iter()
                                .filter(|(k, _)| k.location == *location && k.product == *product && k.current_date == d)
                                .map(|(_, v)| *v)
                                .sum();
                            let freeze_out: Expression = mv
                                .freeze
                                .iter()
                                .filter(|(k, _)| k.location == *location && k.product == *product && k.current_date == d)
                                .map(|(_, v)| *v)
                                .sum();
                            let demand_out: Expression = mv
                                .demand_from_cohort
                                .iter()
                                .filter(|(k, _)| k.location == *location && k.product == *product && k.current_date == d)
                                .map(|(_, v)| *v)
                                .sum();
                            let production_in: Expression = if location.is_storage_node() {
                                mv.production.get(&(d, product.clone())).copied().map(Expression::from).unwrap_or_default()
                            } else {
                                Expression::default()
                            };
                            let initial: f64 = self.initial_qty(location, product, ProductState::Ambient, d);
                            let previous: Expression = prev_ambient.map(Expression::from).unwrap_or_else(|| initial.into());
                            out.push(constraint!(
                                stock == previous + production_in + arrivals + thaw_in - demand_out - departures - freeze_out
                            ));
                            prev_ambient = Some(stock);
                        }
                    }
                }
            }
        }
    }

    fn initial_qty(&self, location: &LocationId, product: &ProductId, state: ProductState, date: NaiveDate) -> f64 {
        if date != self.horizon.start {
            return 0.0;
        }
        self.initial_inventory
            .iter()
            .filter(|(k, _)| k.location == *location && k.product == *product && k.state == state)
            .map(|(_, qty)| *qty)
            .sum()
    }

    fn ambient_arrivals_total_expr(&self, mv: &ModelVariables, cohorts: &CohortSets, location: &LocationId, product: &ProductId, d: NaiveDate) -> Expression {
        cohorts
            .shipment
            .iter()
            .filter(|k| {
                k.product == *product
                    && k.delivery_date == d
                    && cohorts.legs[k.leg.0].destination == *location
                    && cohorts.legs[k.leg.0].transport_mode == TransportMode::Ambient
            })
            .map(|k| mv.shipment_leg_cohort[k])
            .sum()
    }

    fn frozen_departures_expr(&self, mv: &ModelVariables, cohorts: &CohortSets, location: &LocationId, product: &ProductId, d: NaiveDate) -> Expression {
        cohorts
            .shipment
            .iter()
            .filter(|k| {
                k.product == *product
                    && cohorts.legs[k.leg.0].origin == *location
                    && cohorts.legs[k.leg.0].transport_mode == TransportMode::Frozen
                    && k.delivery_date == d + chrono::Duration::days(cohorts.legs[k.leg.0].transit_days)
            })
            .map(|k| mv.shipment_leg_cohort[k])
            .sum()
    }

    fn ambient_departures_expr(&self, mv: &ModelVariables, cohorts: &CohortSets, location: &LocationId, product: &ProductId, d: NaiveDate) -> Expression {
        if location.is_storage_node() {
            // `truck_load` is keyed by delivery date, not departure date
            // (the truck departs `transit` days earlier than it delivers);
            // match `frozen_departures_expr` below and filter on the
            // load's implied departure date so units stay "in storage"
            // for the whole transit window rather than leaving on load day.
            return mv
                .truck_load
                .iter()
                .filter(|((truck_id, _, p, ld), _)| {
                    p == product
                        && self
                            .trucks
                            .iter()
                            .find(|t| t.id == *truck_id)
                            .map(|t| *ld - chrono::Duration::days(transit_to(self.network, &t.destination)) == d)
                            .unwrap_or(false)
                })
                .map(|(_, v)| *v)
                .sum();
        }
        cohorts
            .shipment
            .iter()
            .filter(|k| {
                k.product == *product
                    && cohorts.legs[k.leg.0].origin == *location
                    && cohorts.legs[k.leg.0].transport_mode == TransportMode::Ambient
                    && k.delivery_date == d + chrono::Duration::days(cohorts.legs[k.leg.0].transit_days)
            })
            .map(|k| mv.shipment_leg_cohort[k])
            .sum()
    }

    fn frozen_cohort_arrivals_expr(
        &self,
        mv: &ModelVariables,
        cohorts: &CohortSets,
        location: &LocationId,
        product: &ProductId,
        d_prod: NaiveDate,
        d_cur: NaiveDate,
    ) -> Expression {
        cohorts
            .shipment
            .iter()
            .filter(|k| {
                k.product == *product
                    && k.production_date == d_prod
                    && k.delivery_date == d_cur
                    && cohorts.legs[k.leg.0].destination == *location
                    && cohorts.legs[k.leg.0].transport_mode == TransportMode::Frozen
            })
            .map(|k| mv.shipment_leg_cohort[k])
            .sum()
    }

    fn frozen_cohort_departures_expr(
        &self,
        mv: &ModelVariables,
        cohorts: &CohortSets,
        location: &LocationId,
        product: &ProductId,
        d_prod: NaiveDate,
        d: NaiveDate,
    ) -> Expression {
        cohorts
            .shipment
            .iter()
            .filter(|k| {
                k.product == *product
                    && k.production_date == d_prod
                    && cohorts.legs[k.leg.0].origin == *location
                    && cohorts.legs[k.leg.0].transport_mode == TransportMode::Frozen
                    && k.delivery_date == d + chrono::Duration::days(cohorts.legs[k.leg.0].transit_days)
            })
            .map(|k| mv.shipment_leg_cohort[k])
            .sum()
    }

    fn ambient_cohort_departures_expr(
        &self,
        mv: &ModelVariables,
        cohorts: &CohortSets,
        location: &LocationId,
        product: &ProductId,
        d_prod: NaiveDate,
        d: NaiveDate,
    ) -> Expression {
        // Unlike the aggregate `ambient_departures_expr`, the storage node
        // needs no truck-load special case here: `shipment_leg_cohort` on
        // the virtual leg out of the storage node already carries the
        // production-date tag, so the generic shipment filter below is
        // cohort-specific on its own.
        cohorts
            .shipment
            .iter()
            .filter(|k| {
                k.product == *product
                    && k.production_date == d_prod
                    && cohorts.legs[k.leg.0].origin == *location
                    && cohorts.legs[k.leg.0].transport_mode == TransportMode::Ambient
                    && k.delivery_date == d + chrono::Duration::days(cohorts.legs[k.leg.0].transit_days)
            })
            .map(|k| mv.shipment_leg_cohort[k])
            .sum()
    }

    fn initial_cohort_qty(
        &self,
        location: &LocationId,
        product: &ProductId,
        state: ProductState,
        production_date: NaiveDate,
        date: NaiveDate,
    ) -> f64 {
        if date != self.horizon.start {
            return 0.0;
        }
        self.initial_inventory.quantity(&breadplan_core::InventoryKey {
            location: location.clone(),
            product: product.clone(),
            production_date,
            state,
        })
    }

    /// Constraints 9-10: per-cohort frozen/ambient inventory balance. This
    /// is what actually ties `demand_from_cohort`, `freeze`, and `thaw` to
    /// the physical stock of the specific production cohort they draw from
    /// or feed — the aggregate balance above only bounds the total across
    /// all cohorts at a location, which is not enough to stop demand being
    /// satisfied from a cohort that has no stock of its own (§4.4, §9).
    ///
    /// `cohorts.frozen`/`cohorts.ambient` are `BTreeSet<CohortKey>`, ordered
    /// by `(location, product, production_date, current_date)`, so a single
    /// forward pass sees every cohort's dates in order and can carry
    /// "previous day's stock of this exact cohort" forward per group.
    fn add_cohort_balance_constraints(&self, out: &mut Vec<good_lp::Constraint>, mv: &ModelVariables, cohorts: &CohortSets) {
        let mut prev_frozen: HashMap<(LocationId, ProductId, NaiveDate), Variable> = HashMap::new();
        for key in &cohorts.frozen {
            let stock = mv.inventory_frozen_cohort[key];
            let arrivals =
                self.frozen_cohort_arrivals_expr(mv, cohorts, &key.location, &key.product, key.production_date, key.current_date);
            let departures =
                self.frozen_cohort_departures_expr(mv, cohorts, &key.location, &key.product, key.production_date, key.current_date);
            let freeze_in: Expression = mv.freeze.get(key).copied().map(Expression::from).unwrap_or_default();
            let thaw_out: Expression = mv.thaw.get(key).copied().map(Expression::from).unwrap_or_default();

            let group = (key.location.clone(), key.product.clone(), key.production_date);
            let previous: Expression = match prev_frozen.get(&group) {
                Some(&v) => v.into(),
                None => self
                    .initial_cohort_qty(&key.location, &key.product, ProductState::Frozen, key.production_date, key.current_date)
                    .into(),
            };
            out.push(constraint!(stock == previous + arrivals + freeze_in - departures - thaw_out));
            prev_frozen.insert(group, stock);
        }

        let mut prev_ambient: HashMap<(LocationId, ProductId, NaiveDate), Variable> = HashMap::new();
        for key in &cohorts.ambient {
            let stock = mv.inventory_ambient_cohort[key];
            let is_fresh = key.production_date == key.current_date;

            let arrivals = self.ambient_arrivals_expr(mv, cohorts, &key.location, &key.product, key.production_date, key.current_date);
            let departures =
                self.ambient_cohort_departures_expr(mv, cohorts, &key.location, &key.product, key.production_date, key.current_date);
            let demand_out: Expression = mv.demand_from_cohort.get(key).copied().map(Expression::from).unwrap_or_default();
            let freeze_out: Expression = mv.freeze.get(key).copied().map(Expression::from).unwrap_or_default();

            let production_in: Expression = if is_fresh && key.location.is_storage_node() {
                mv.production.get(&(key.current_date, key.product.clone())).copied().map(Expression::from).unwrap_or_default()
            } else {
                Expression::default()
            };
            // A cohort stamped `production_date == current_date` is the
            // fresh landing point for every thaw that completes today,
            // regardless of which frozen cohort the thawed units came
            // from — summed across all original production dates, per the
            // thaw-input rule (§4.4 item 10).
            let thaw_in: Expression = if is_fresh {
                mv.thaw
                    .iter()
                    .filter(|(k, _)| k.location == key.location && k.product == key.product && k.current_date == key.current_date)
                    .map(|(_, v)| *v)
                    .sum()
            } else {
                Expression::default()
            };

            let group = (key.location.clone(), key.product.clone(), key.production_date);
            let previous: Expression = match prev_ambient.get(&group) {
                Some(&v) => v.into(),
                None => self
                    .initial_cohort_qty(&key.location, &key.product, ProductState::Ambient, key.production_date, key.current_date)
                    .into(),
            };
            out.push(constraint!(
                stock == previous + production_in + arrivals + thaw_in - demand_out - departures - freeze_out
            ));
            prev_ambient.insert(group, stock);
        }
    }

    /// Constraints 15-17, 19-21: truck capacity, pallet integrality,
    /// applicability, morning/afternoon timing, and the truck-to-leg link.
    fn add_truck_constraints(
        &self,
        out: &mut Vec<good_lp::Constraint>,
        mv: &ModelVariables,
        truck_departure: &HashMap<(TruckId, NaiveDate), NaiveDate>,
        _enumerator: &RouteEnumerator,
    ) {
        for truck in self.trucks.iter() {
            for &(id, d) in truck_departure.keys().filter(|(id, _)| *id == truck.id) {
                let truck_used = mv.truck_used[&(id, d)];
                let departure = truck_departure[&(id, d)];

                let load_total: Expression = truck
                    .stops()
                    .iter()
                    .flat_map(|stop| self.products.iter().map(move |p| (*stop, p)))
                    .filter_map(|(stop, p)| mv.truck_load.get(&(id, (*stop).clone(), p.clone(), d)))
                    .copied()
                    .sum();
                out.push(constraint!(load_total.clone() <= truck.unit_capacity * truck_used));

                let pallets_total: Expression = truck
                    .stops()
                    .iter()
                    .flat_map(|stop| self.products.iter().map(move |p| (*stop, p)))
                    .filter_map(|(stop, p)| mv.pallets_loaded.get(&(id, (*stop).clone(), p.clone(), d)))
                    .copied()
                    .sum();
                out.push(constraint!(pallets_total <= truck.pallet_capacity as f64 * truck_used));

                for stop in truck.stops() {
                    for p in &self.products {
                        if let (Some(&load), Some(&pallets)) = (
                            mv.truck_load.get(&(id, stop.clone(), p.clone(), d)),
                            mv.pallets_loaded.get(&(id, stop.clone(), p.clone(), d)),
                        ) {
                            out.push(constraint!(self.config.units_per_pallet * pallets >= load));
                            out.push(constraint!(self.config.units_per_pallet * pallets <= load + (self.config.units_per_pallet - 1.0)));
                        }
                    }
                }

                let applicable = truck.runs_on(departure.weekday());
                if !applicable {
                    out.push(constraint!(truck_used == 0.0));
                    continue;
                }

                let storage_node_stock_prev = mv.inventory_ambient.get(&(LocationId::storage_node(), self.products[0].clone(), departure - chrono::Duration::days(1)));
                let _ = storage_node_stock_prev;

                let prev_day_stock: Expression = self
                    .products
                    .iter()
                    .filter_map(|p| mv.inventory_ambient.get(&(LocationId::storage_node(), p.clone(), departure - chrono::Duration::days(1))))
                    .copied()
                    .sum();
                let initial_prev_stock: f64 = if departure - chrono::Duration::days(1) < self.horizon.start {
                    self.products
                        .iter()
                        .map(|p| self.initial_qty(&LocationId::storage_node(), p, ProductState::Ambient, self.horizon.start))
                        .sum()
                } else {
                    0.0
                };

                match truck.departure_type {
                    breadplan_core::DepartureType::Morning => {
                        out.push(constraint!(load_total.clone() <= prev_day_stock + initial_prev_stock));
                    }
                    breadplan_core::DepartureType::Afternoon => {
                        let same_day_production: Expression =
                            self.products.iter().filter_map(|p| mv.production.get(&(departure, p.clone()))).copied().sum();
                        out.push(constraint!(load_total <= prev_day_stock + initial_prev_stock + same_day_production));
                    }
                }
            }
        }

        // Constraint 21: truck-to-leg linkage on the virtual leg from the
        // storage node to each served destination.
        let mut by_destination: HashMap<(LocationId, ProductId, NaiveDate), Expression> = HashMap::new();
        for ((truck_id, stop, product, d), &load) in &mv.truck_load {
            let _ = truck_id;
            by_destination
                .entry((stop.clone(), product.clone(), *d))
                .and_modify(|e| *e += load)
                .or_insert_with(|| load.into());
        }
        for ((destination, product, d), truck_sum) in by_destination {
            if let Some(leg_idx) = self.leg_index_for(&destination) {
                if let Some(&shipment) = mv.shipment_leg.get(&(leg_idx, product.clone(), d)) {
                    out.push(constraint!(shipment == truck_sum));
                }
            }
        }
    }

    fn leg_index_for(&self, destination: &LocationId) -> Option<LegIdx> {
        self.network
            .all_legs()
            .enumerate()
            .find(|(_, leg)| leg.origin.is_storage_node() && leg.destination == *destination)
            .map(|(idx, _)| LegIdx(idx))
    }

    // ---- objective -----------------------------------------------------------

    fn build_objective(
        &self,
        mv: &ModelVariables,
        dates: &[NaiveDate],
        cohorts: &CohortSets,
        demand_keys: &[(LocationId, ProductId, NaiveDate)],
    ) -> Expression {
        let mut objective = Expression::default();

        for &d in dates {
            let day = self.labor.get(d).cloned().unwrap_or_else(LaborDay::zero_capacity_non_fixed);
            match day {
                LaborDay::Fixed { regular_rate, overtime_rate, .. } => {
                    objective += regular_rate * mv.fixed_hours_used[&d];
                    objective += overtime_rate * mv.overtime_hours_used[&d];
                }
                LaborDay::NonFixed { non_fixed_rate, .. } => {
                    objective += non_fixed_rate * mv.non_fixed_hours_paid[&d];
                }
            }
        }

        for (_, &production) in &mv.production {
            objective += self.cost.production_cost_per_unit * production;
        }

        for (idx, leg) in cohorts.legs.iter().enumerate() {
            for p in &self.products {
                for &d in dates {
                    if let Some(&shipment) = mv.shipment_leg.get(&(LegIdx(idx), p.clone(), d)) {
                        objective += leg.cost_per_unit * shipment;
                    }
                }
            }
        }

        for (key, &stock) in &mv.inventory_frozen_cohort {
            let _ = key;
            objective += self.cost.holding_cost_frozen_per_unit_day * stock;
        }
        for (key, &stock) in &mv.inventory_ambient_cohort {
            let _ = key;
            objective += self.cost.holding_cost_ambient_per_unit_day * stock;
        }

        for (_, &freeze_var) in &mv.freeze {
            objective += self.cost.freeze_cost_per_unit * freeze_var;
        }
        for (_, &thaw_var) in &mv.thaw {
            objective += self.cost.thaw_cost_per_unit * thaw_var;
        }

        for truck in self.trucks.iter() {
            for &d in dates {
                if let Some(&used) = mv.truck_used.get(&(truck.id, d)) {
                    objective += truck.fixed_cost * used;
                }
                for stop in truck.stops() {
                    for p in &self.products {
                        if let Some(&load) = mv.truck_load.get(&(truck.id, stop.clone(), p.clone(), d)) {
                            objective += truck.cost_per_unit * load;
                        }
                    }
                }
            }
        }

        for (location, product, date) in demand_keys {
            if let Some(&shortage) = mv.shortage.get(&(location.clone(), product.clone(), *date)) {
                objective += self.cost.shortage_penalty_per_unit * shortage;
            }
        }

        objective
    }
}

fn transit_to(network: &NetworkGraph, location: &LocationId) -> i64 {
    network
        .legs_to(location)
        .iter()
        .map(|l| l.transit_days)
        .min()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use breadplan_core::{
        CostStructure, DemandEntry, DepartureType, Forecast, InventoryRow, InventorySnapshot, LaborCalendar,
        LaborDay, Location, LocationType, Route, StorageMode, TruckInstance, TruckSchedule,
    };

    fn minimum_viable_inputs() -> (
        NetworkGraph,
        PlanningHorizon,
        Forecast,
        LaborCalendar,
        TruckSchedule,
        CostStructure,
        InventorySnapshot,
    ) {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();
        let horizon = PlanningHorizon::new(start, end).unwrap();

        let locations = vec![
            Location::new("6122", "Plant", LocationType::Manufacturing, StorageMode::Both),
            Location::new("B1", "Breadroom 1", LocationType::Breadroom, StorageMode::AmbientOnly),
        ];
        let route = Route::new("6122").via("B1", 2, 0.50, TransportMode::Ambient);
        let network = NetworkGraph::build(locations, route.to_legs()).unwrap();

        let demand_date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let demand = Forecast::from_rows(
            vec![DemandEntry {
                destination: "B1".into(),
                product: "P1".into(),
                date: demand_date,
                quantity: 1000.0,
            }],
            start,
            end,
        );

        let mut labor = LaborCalendar::new();
        let mut d = start;
        while d <= end {
            let day = if LaborCalendar::is_weekend(d) {
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
            labor.set(d, day);
            d += chrono::Duration::days(1);
        }

        let mut trucks = TruckSchedule::new();
        trucks.push(TruckInstance {
            id: TruckId(0),
            destination: "B1".into(),
            intermediate_stops: Vec::new(),
            days_of_week: vec![chrono::Weekday::Wed],
            departure_type: DepartureType::Afternoon,
            unit_capacity: 14_080.0,
            pallet_capacity: 44,
            fixed_cost: 500.0,
            cost_per_unit: 0.0,
        });

        let cost = CostStructure::new(1.0);
        let inventory = InventorySnapshot::from_rows(Vec::<InventoryRow>::new(), None, start, |_| Ok(StorageMode::Both)).unwrap();

        (network, horizon, demand, labor, trucks, cost, inventory)
    }

    #[test]
    fn builds_without_error_for_the_minimum_viable_scenario() {
        let (network, horizon, demand, labor, trucks, cost, inventory) = minimum_viable_inputs();
        let builder = ModelBuilder {
            network: &network,
            horizon,
            products: vec![ProductId::new("P1")],
            locations: vec![LocationId::storage_node(), LocationId::new("B1")],
            demand,
            labor: &labor,
            trucks: &trucks,
            cost: &cost,
            initial_inventory: &inventory,
            config: ModelBuildConfig::default(),
        };
        let built = builder.build().expect("model should build");
        assert!(!built.variables.production.is_empty());
        assert!(!built.constraints.is_empty());
    }

    #[test]
    fn missing_critical_weekday_labor_is_a_hard_error() {
        let (network, horizon, demand, mut labor, trucks, cost, inventory) = minimum_viable_inputs();
        labor = LaborCalendar::new(); // wipe it out entirely
        let builder = ModelBuilder {
            network: &network,
            horizon,
            products: vec![ProductId::new("P1")],
            locations: vec![LocationId::storage_node(), LocationId::new("B1")],
            demand,
            labor: &labor,
            trucks: &trucks,
            cost: &cost,
            initial_inventory: &inventory,
            config: ModelBuildConfig::default(),
        };
        let result = builder.build();
        assert!(matches!(result, Err(PlanningError::InfeasibleInput { .. })));
    }

    #[test]
    fn unreachable_destination_is_a_hard_error() {
        let (network, horizon, _demand, labor, trucks, cost, inventory) = minimum_viable_inputs();
        let demand_date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let unreachable_demand = Forecast::from_rows(
            vec![DemandEntry {
                destination: "NOWHERE".into(),
                product: "P1".into(),
                date: demand_date,
                quantity: 10.0,
            }],
            horizon.start,
            horizon.end,
        );
        let builder = ModelBuilder {
            network: &network,
            horizon,
            products: vec![ProductId::new("P1")],
            locations: vec![LocationId::storage_node(), LocationId::new("B1")],
            demand: unreachable_demand,
            labor: &labor,
            trucks: &trucks,
            cost: &cost,
            initial_inventory: &inventory,
            config: ModelBuildConfig::default(),
        };
        let result = builder.build();
        assert!(matches!(result, Err(PlanningError::InfeasibleInput { .. })));
    }
}
