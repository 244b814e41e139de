//! Drives the solver against a [`crate::model::BuiltModel`] and extracts a
//! human-usable plan from the raw variable values (§5, §6).

use crate::error::{PlanningError, PlanningResult};
use crate::model::{BuiltModel, ModelVariables};
use breadplan_core::{
    CostStructure, DemandKey, Forecast, Leg, LocationId, PlanningHorizon, ProductId, ProductState,
    TruckId, TruckSchedule,
};
use breadplan_core::LaborCalendar;
use chrono::NaiveDate;
use good_lp::solvers::highs::highs;
use good_lp::{Solution as GoodLpSolution, SolverModel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How the solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationCondition {
    /// The solver proved optimality (or stopped well inside its time budget).
    Optimal,
    /// The time limit was hit; `SolveResult.feasible` says whether an
    /// incumbent existed at that point.
    TimeLimit,
}

/// Cost, broken down by objective component (§4.5, §6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub labor_cost: f64,
    pub production_cost: f64,
    pub transport_cost: f64,
    pub holding_cost: f64,
    pub freeze_thaw_cost: f64,
    pub truck_cost: f64,
    pub shortage_cost: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.labor_cost
            + self.production_cost
            + self.transport_cost
            + self.holding_cost
            + self.freeze_thaw_cost
            + self.truck_cost
            + self.shortage_cost
    }
}

/// One day's production of one product, carrying a unique id and its share
/// of that day's labor — split evenly across every product produced that
/// day, since the model has no per-product labor variable to read back
/// directly (§4.6, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionBatch {
    pub id: usize,
    pub date: NaiveDate,
    pub product: ProductId,
    pub quantity: f64,
    pub allocated_labor_hours: f64,
    pub production_cost: f64,
}

/// Demand satisfied vs. short for one `(destination, product, date)` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DemandSatisfaction {
    pub demanded: f64,
    pub fulfilled: f64,
    pub shortage: f64,
}

/// The solved plan: per-date production batches, per-leg shipments, cohort
/// inventory and freeze/thaw ledgers for traceability, truck usage, demand
/// satisfaction, shortages, and the cost breakdown (§4.6, §6).
#[derive(Debug, Clone)]
pub struct SolveResult {
    pub termination: TerminationCondition,
    /// Whether a feasible incumbent was found (always true for `Optimal`).
    pub feasible: bool,
    pub cost: CostBreakdown,
    pub production: HashMap<(NaiveDate, ProductId), f64>,
    pub batches: Vec<ProductionBatch>,
    pub shipments: HashMap<(LocationId, ProductId, NaiveDate, NaiveDate), f64>,
    /// `(location, product, production_date, current_date, state) -> qty`,
    /// the per-cohort stock actually on hand, not just the aggregate.
    pub cohort_inventory: HashMap<(LocationId, ProductId, NaiveDate, NaiveDate, ProductState), f64>,
    /// `(location, product, production_date, current_date) -> qty` frozen
    /// into (or thawed out of) that exact cohort.
    pub freeze_ledger: HashMap<(LocationId, ProductId, NaiveDate, NaiveDate), f64>,
    pub thaw_ledger: HashMap<(LocationId, ProductId, NaiveDate, NaiveDate), f64>,
    pub truck_used: HashMap<(TruckId, NaiveDate), bool>,
    pub truck_loads: HashMap<(TruckId, LocationId, ProductId, NaiveDate), f64>,
    pub demand_satisfaction: HashMap<(LocationId, ProductId, NaiveDate), DemandSatisfaction>,
    pub shortages: HashMap<(LocationId, ProductId, NaiveDate), f64>,
    pub labor_hours: HashMap<NaiveDate, f64>,
    pub solve_time: Duration,
}

/// Drives the solver and converts raw variable values back into
/// domain-shaped results.
pub struct SolutionExtractor;

impl SolutionExtractor {
    /// Solve `built` with HiGHS, bounded by `time_limit_seconds` (if any).
    pub fn solve(built: BuiltModel, time_limit_seconds: Option<f64>) -> PlanningResult<SolveResult> {
        if built.diagnostics.has_errors() {
            return Err(PlanningError::infeasible_input(
                "model build produced fatal diagnostics",
                built.diagnostics.errors().map(|e| e.to_string()).collect(),
            ));
        }

        let time_limit = time_limit_seconds.unwrap_or(60.0);
        debug!(
            constraints = built.constraints.len(),
            variables = built.variables.production.len() + built.variables.shipment_leg_cohort.len(),
            time_limit_seconds = time_limit,
            "starting MILP solve"
        );

        let constraints = built.constraints;
        let mut problem = built.vars.minimise(built.objective).using(highs).set_time_limit(time_limit);
        for constraint in constraints {
            problem = problem.with(constraint);
        }

        let start = Instant::now();
        let solve_result = problem.solve();
        let elapsed = start.elapsed();

        let solution = match solve_result {
            Ok(solution) => solution,
            Err(err) => {
                let message = err.to_string().to_lowercase();
                if message.contains("infeasible") {
                    warn!(error = %err, "solver returned infeasible");
                    return Err(PlanningError::SolverReturnedInfeasible {
                        lp_dump: Some(format!("{err}")),
                    });
                }
                if message.contains("time") {
                    warn!(error = %err, "solver time limit reached with no incumbent");
                    return Err(PlanningError::TimeLimitNoIncumbent);
                }
                return Err(PlanningError::SolverReturnedInfeasible {
                    lp_dump: Some(format!("{err}")),
                });
            }
        };

        let hit_time_limit = elapsed.as_secs_f64() >= time_limit * 0.95;
        let termination = if hit_time_limit {
            TerminationCondition::TimeLimit
        } else {
            TerminationCondition::Optimal
        };

        let production: HashMap<(NaiveDate, ProductId), f64> = built
            .variables
            .production
            .iter()
            .map(|(key, &var)| (key.clone(), solution.value(var)))
            .collect();

        let mut shipments: HashMap<(LocationId, ProductId, NaiveDate, NaiveDate), f64> = HashMap::new();
        for (key, &var) in &built.variables.shipment_leg_cohort {
            let value = solution.value(var);
            if value <= 1e-6 {
                continue;
            }
            let leg = &built.legs[key.leg.0];
            let entry = shipments
                .entry((leg.destination.clone(), key.product.clone(), key.production_date, key.delivery_date))
                .or_insert(0.0);
            *entry += value;
        }

        let shortages: HashMap<(LocationId, ProductId, NaiveDate), f64> = built
            .variables
            .shortage
            .iter()
            .map(|(key, &var)| (key.clone(), solution.value(var)))
            .filter(|(_, qty)| *qty > 1e-6)
            .collect();

        let labor_hours: HashMap<NaiveDate, f64> = built
            .variables
            .labor_hours
            .iter()
            .map(|(&date, &var)| (date, solution.value(var)))
            .collect();

        for (key, qty) in &shortages {
            warn!(location = %key.0, product = %key.1, date = %key.2, quantity = qty, "unmet demand");
        }

        let mut cohort_inventory: HashMap<(LocationId, ProductId, NaiveDate, NaiveDate, ProductState), f64> = HashMap::new();
        for (key, &var) in &built.variables.inventory_frozen_cohort {
            let qty = solution.value(var);
            if qty > 1e-6 {
                cohort_inventory.insert(
                    (key.location.clone(), key.product.clone(), key.production_date, key.current_date, ProductState::Frozen),
                    qty,
                );
            }
        }
        for (key, &var) in &built.variables.inventory_ambient_cohort {
            let qty = solution.value(var);
            if qty > 1e-6 {
                cohort_inventory.insert(
                    (key.location.clone(), key.product.clone(), key.production_date, key.current_date, ProductState::Ambient),
                    qty,
                );
            }
        }

        let freeze_ledger: HashMap<(LocationId, ProductId, NaiveDate, NaiveDate), f64> = built
            .variables
            .freeze
            .iter()
            .map(|(key, &var)| ((key.location.clone(), key.product.clone(), key.production_date, key.current_date), solution.value(var)))
            .filter(|(_, qty)| *qty > 1e-6)
            .collect();
        let thaw_ledger: HashMap<(LocationId, ProductId, NaiveDate, NaiveDate), f64> = built
            .variables
            .thaw
            .iter()
            .map(|(key, &var)| ((key.location.clone(), key.product.clone(), key.production_date, key.current_date), solution.value(var)))
            .filter(|(_, qty)| *qty > 1e-6)
            .collect();

        let truck_used: HashMap<(TruckId, NaiveDate), bool> = built
            .variables
            .truck_used
            .iter()
            .map(|(&key, &var)| (key, solution.value(var) > 0.5))
            .collect();
        let truck_loads: HashMap<(TruckId, LocationId, ProductId, NaiveDate), f64> = built
            .variables
            .truck_load
            .iter()
            .map(|(key, &var)| (key.clone(), solution.value(var)))
            .filter(|(_, qty)| *qty > 1e-6)
            .collect();

        let batches = production_batches(&built.variables, &built.cost, &built.horizon, &solution);

        let demand_satisfaction = demand_satisfaction_report(&built.demand, &built.variables, &solution);

        let cost = cost_breakdown(
            &built.variables,
            &built.legs,
            &built.cost,
            &built.trucks,
            &built.labor,
            &built.horizon,
            &solution,
        );

        info!(
            termination = ?termination,
            objective = cost.total(),
            shortages = shortages.len(),
            solve_time_ms = elapsed.as_millis() as u64,
            "solve finished"
        );

        Ok(SolveResult {
            termination,
            feasible: true,
            cost,
            production,
            batches,
            shipments,
            cohort_inventory,
            freeze_ledger,
            thaw_ledger,
            truck_used,
            truck_loads,
            demand_satisfaction,
            shortages,
            labor_hours,
            solve_time: elapsed,
        })
    }
}

/// Re-derives each objective component from solved variable values, mirroring
/// [`crate::model::ModelBuilder::build_objective`] term by term. Takes
/// individual fields rather than `&BuiltModel` since by the time this runs
/// `built.vars`/`built.objective`/`built.constraints` have already been
/// moved into the solver.
#[allow(clippy::too_many_arguments)]
fn cost_breakdown(
    variables: &ModelVariables,
    legs: &[Leg],
    cost: &CostStructure,
    trucks: &TruckSchedule,
    labor: &LaborCalendar,
    horizon: &PlanningHorizon,
    solution: &impl GoodLpSolution,
) -> CostBreakdown {
    let labor_cost = labor_cost_by_day(horizon, labor, variables, solution);

    let production_cost: f64 = variables
        .production
        .values()
        .map(|&var| cost.production_cost_per_unit * solution.value(var))
        .sum();

    let transport_cost: f64 = variables
        .shipment_leg
        .iter()
        .map(|((leg_idx, _, _), &var)| legs[leg_idx.0].cost_per_unit * solution.value(var))
        .sum();

    let holding_cost: f64 = variables
        .inventory_frozen_cohort
        .values()
        .map(|&var| cost.holding_cost_frozen_per_unit_day * solution.value(var))
        .sum::<f64>()
        + variables
            .inventory_ambient_cohort
            .values()
            .map(|&var| cost.holding_cost_ambient_per_unit_day * solution.value(var))
            .sum::<f64>();

    let freeze_thaw_cost: f64 = variables
        .freeze
        .values()
        .map(|&var| cost.freeze_cost_per_unit * solution.value(var))
        .sum::<f64>()
        + variables
            .thaw
            .values()
            .map(|&var| cost.thaw_cost_per_unit * solution.value(var))
            .sum::<f64>();

    let mut truck_cost = 0.0;
    for truck in trucks.iter() {
        for (&(id, _date), &used) in &variables.truck_used {
            if id == truck.id {
                truck_cost += truck.fixed_cost * solution.value(used);
            }
        }
        for (key, &load) in &variables.truck_load {
            if key.0 == truck.id {
                truck_cost += truck.cost_per_unit * solution.value(load);
            }
        }
    }

    let shortage_cost: f64 = variables
        .shortage
        .values()
        .map(|&var| cost.shortage_penalty_per_unit * solution.value(var))
        .sum();

    CostBreakdown {
        labor_cost,
        production_cost,
        transport_cost,
        holding_cost,
        freeze_thaw_cost,
        truck_cost,
        shortage_cost,
    }
}

fn labor_cost_by_day(
    horizon: &PlanningHorizon,
    labor: &LaborCalendar,
    variables: &ModelVariables,
    solution: &impl GoodLpSolution,
) -> f64 {
    use breadplan_core::LaborDay;

    let mut total = 0.0;
    for date in horizon.dates() {
        let day = labor.get(date).cloned().unwrap_or_else(LaborDay::zero_capacity_non_fixed);
        match day {
            LaborDay::Fixed { regular_rate, overtime_rate, .. } => {
                if let Some(&fixed_var) = variables.fixed_hours_used.get(&date) {
                    total += regular_rate * solution.value(fixed_var);
                }
                if let Some(&overtime_var) = variables.overtime_hours_used.get(&date) {
                    total += overtime_rate * solution.value(overtime_var);
                }
            }
            LaborDay::NonFixed { non_fixed_rate, .. } => {
                if let Some(&non_fixed_var) = variables.non_fixed_hours_paid.get(&date) {
                    total += non_fixed_rate * solution.value(non_fixed_var);
                }
            }
        }
    }
    total
}

/// One batch per `(date, product)` with nonzero production, labor split
/// evenly across every product produced that day (§4.6).
fn production_batches(
    variables: &ModelVariables,
    cost: &CostStructure,
    horizon: &PlanningHorizon,
    solution: &impl GoodLpSolution,
) -> Vec<ProductionBatch> {
    let mut produced_by_day: HashMap<NaiveDate, Vec<(&ProductId, f64)>> = HashMap::new();
    for ((date, product), &var) in &variables.production {
        let qty = solution.value(var);
        if qty > 1e-6 {
            produced_by_day.entry(*date).or_default().push((product, qty));
        }
    }

    let mut batches = Vec::new();
    let mut next_id = 0usize;
    for date in horizon.dates() {
        let Some(products) = produced_by_day.get(&date) else {
            continue;
        };
        let labor_hours = variables.labor_hours.get(&date).map(|&var| solution.value(var)).unwrap_or(0.0);
        let allocated_labor_hours = labor_hours / products.len() as f64;
        for (product, qty) in products {
            batches.push(ProductionBatch {
                id: next_id,
                date,
                product: (*product).clone(),
                quantity: *qty,
                allocated_labor_hours,
                production_cost: cost.production_cost_per_unit * qty,
            });
            next_id += 1;
        }
    }
    batches
}

/// Demanded vs. fulfilled vs. short, per `(destination, product, date)`
/// (§6). Fulfilled is read back from the solved `demand_from_cohort`
/// variables rather than `demanded - shortage`, so this report stays
/// correct even when shortage is disallowed (`allow_shortage = false`).
fn demand_satisfaction_report(
    demand: &Forecast,
    variables: &ModelVariables,
    solution: &impl GoodLpSolution,
) -> HashMap<(LocationId, ProductId, NaiveDate), DemandSatisfaction> {
    let mut report = HashMap::new();
    for key in demand.keys() {
        let destination = key.destination.clone();
        let product = key.product.clone();
        let date = key.date;
        let demanded = demand.quantity(&DemandKey {
            destination: destination.clone(),
            product: product.clone(),
            date,
        });
        let fulfilled: f64 = variables
            .demand_from_cohort
            .iter()
            .filter(|(k, _)| k.location == destination && k.product == product && k.current_date == date)
            .map(|(_, &var)| solution.value(var))
            .sum();
        let shortage = variables
            .shortage
            .get(&(destination.clone(), product.clone(), date))
            .map(|&var| solution.value(var))
            .unwrap_or_else(|| (demanded - fulfilled).max(0.0));
        report.insert((destination, product, date), DemandSatisfaction { demanded, fulfilled, shortage });
    }
    report
}
