//! Cost rates feeding the objective (§4.5, §6).

use serde::{Deserialize, Serialize};

/// Unit cost rates. Transport and truck costs live on [`crate::route::Leg`]
/// and [`crate::trucks::TruckInstance`] respectively; this struct holds the
/// rates that are global to the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostStructure {
    pub production_cost_per_unit: f64,
    pub holding_cost_frozen_per_unit_day: f64,
    pub holding_cost_ambient_per_unit_day: f64,
    pub freeze_cost_per_unit: f64,
    pub thaw_cost_per_unit: f64,
    pub shortage_penalty_per_unit: f64,
}

impl CostStructure {
    pub fn new(production_cost_per_unit: f64) -> Self {
        Self {
            production_cost_per_unit,
            holding_cost_frozen_per_unit_day: 0.0,
            holding_cost_ambient_per_unit_day: 0.0,
            freeze_cost_per_unit: 0.05,
            thaw_cost_per_unit: 0.05,
            shortage_penalty_per_unit: 1_000_000.0,
        }
    }

    pub fn with_holding_costs(mut self, frozen: f64, ambient: f64) -> Self {
        self.holding_cost_frozen_per_unit_day = frozen;
        self.holding_cost_ambient_per_unit_day = ambient;
        self
    }

    pub fn with_freeze_thaw_costs(mut self, freeze: f64, thaw: f64) -> Self {
        self.freeze_cost_per_unit = freeze;
        self.thaw_cost_per_unit = thaw;
        self
    }

    pub fn with_shortage_penalty(mut self, penalty: f64) -> Self {
        self.shortage_penalty_per_unit = penalty;
        self
    }
}
