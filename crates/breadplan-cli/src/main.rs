//! Command-line entry point wiring a scenario through the planning
//! pipeline: `NetworkGraph` -> `ModelBuilder` -> HiGHS -> `SolutionExtractor`.
//!
//! Not a replacement for the UI/workflow orchestration layers that own
//! spreadsheet parsing, persistence, and rolling-horizon re-planning; this
//! is the harness that makes the core runnable end to end.

mod scenario;

use anyhow::{Context, Result};
use breadplan_algo::model::{ModelBuildConfig, ModelBuilder};
use breadplan_algo::solution::SolutionExtractor;
use breadplan_core::{
    InventorySnapshot, LaborCalendar, LocationId, LocationType, NetworkGraph, PlanningHorizon,
    ProductId, StorageMode, TruckSchedule,
};
use clap::Parser;
use scenario::Scenario;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "breadplan", about = "Cost-minimal production/distribution planning")]
struct Cli {
    /// Path to a scenario JSON file. Falls back to a small built-in
    /// scenario when omitted.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Solver time limit, in seconds.
    #[arg(long, default_value_t = 60.0)]
    time_limit: f64,

    /// Whether to filter candidate routes by shelf-life feasibility.
    #[arg(long, default_value_t = true)]
    enforce_shelf_life: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let scenario = match &cli.scenario {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading scenario file {}", path.display()))?;
            serde_json::from_str(&raw).context("parsing scenario JSON")?
        }
        None => {
            info!("no --scenario given, using the built-in minimum-viable scenario");
            Scenario::minimum_viable()
        }
    };

    let report = solve_scenario(scenario, cli.time_limit, cli.enforce_shelf_life)?;
    println!("{report}");
    Ok(())
}

fn solve_scenario(scenario: Scenario, time_limit: f64, enforce_shelf_life: bool) -> Result<String> {
    let horizon = PlanningHorizon::new(scenario.horizon_start, scenario.horizon_end)
        .context("invalid planning horizon")?;

    let storage_mode_by_id: HashMap<LocationId, StorageMode> = scenario
        .locations
        .iter()
        .map(|l| (l.id.clone(), l.storage_mode))
        .collect();

    let legs = scenario.routes.iter().flat_map(|r| r.to_legs()).collect();
    let network = NetworkGraph::build(scenario.locations.clone(), legs)
        .context("building network graph")?;

    let demand = breadplan_core::Forecast::from_rows(scenario.demand, horizon.start, horizon.end);

    let mut labor = LaborCalendar::new();
    for (date, day) in scenario.labor_days {
        labor.set(date, day);
    }

    let mut trucks = TruckSchedule::new();
    for truck in scenario.trucks {
        trucks.push(truck);
    }

    let initial_inventory = InventorySnapshot::from_rows(
        scenario.initial_inventory,
        scenario.snapshot_date,
        horizon.start,
        |id| {
            storage_mode_by_id
                .get(id)
                .copied()
                .ok_or_else(|| breadplan_core::CoreError::UnknownLocation(id.as_str().to_string()))
        },
    )
    .context("canonicalising initial inventory")?;

    let products: Vec<ProductId> = scenario.products.iter().map(|p| ProductId::new(p.as_str())).collect();
    let locations: Vec<LocationId> = std::iter::once(LocationId::storage_node())
        .chain(
            storage_mode_by_id
                .keys()
                .filter(|id| {
                    network
                        .location(id)
                        .map(|l| l.location_type != LocationType::Manufacturing)
                        .unwrap_or(true)
                })
                .cloned(),
        )
        .collect();

    let config = ModelBuildConfig {
        enforce_shelf_life,
        ..ModelBuildConfig::default()
    };

    let built = ModelBuilder {
        network: &network,
        horizon,
        products,
        locations,
        demand,
        labor: &labor,
        trucks: &trucks,
        cost: &scenario.cost,
        initial_inventory: &initial_inventory,
        config,
    }
    .build()
    .context("building MILP model")?;

    let result = SolutionExtractor::solve(built, Some(time_limit)).context("solving MILP model")?;

    let mut report = String::new();
    report.push_str(&format!("termination: {:?}\n", result.termination));
    report.push_str(&format!("feasible: {}\n", result.feasible));
    report.push_str(&format!("total cost: {:.2}\n", result.cost.total()));
    report.push_str(&format!(
        "  labor={:.2} production={:.2} transport={:.2} holding={:.2} freeze/thaw={:.2} truck={:.2} shortage={:.2}\n",
        result.cost.labor_cost,
        result.cost.production_cost,
        result.cost.transport_cost,
        result.cost.holding_cost,
        result.cost.freeze_thaw_cost,
        result.cost.truck_cost,
        result.cost.shortage_cost,
    ));
    report.push_str(&format!("solve time: {:?}\n", result.solve_time));
    report.push_str(&format!("unmet demand points: {}\n", result.shortages.len()));

    Ok(report)
}
