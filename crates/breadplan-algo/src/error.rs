//! Errors raised while indexing cohorts, building the model, or interpreting
//! the solver's outcome (§7).
//!
//! Pre-solve validation failures ([`PlanningError::InfeasibleInput`],
//! [`PlanningError::ShelfLifeViolation`], [`PlanningError::InvalidInventory`])
//! are raised by the builder before a solver is ever invoked.
//! [`PlanningError::SolverReturnedInfeasible`] is reserved for the case
//! where the solver disagrees with our own pre-solve checks — evidence of a
//! modelling bug rather than a genuinely infeasible instance. A plain
//! time-limit stop is not a hard error: it is surfaced through
//! [`crate::solution::SolveResult`] with `termination = TimeLimit` and
//! `feasible` reflecting whether an incumbent existed when the clock ran
//! out; [`PlanningError::TimeLimitNoIncumbent`] exists only for callers that
//! asked to treat "no feasible solution within the limit" as fatal.

use breadplan_core::CoreError;
use thiserror::Error;

/// Errors from cohort indexing, model building, and solve interpretation.
#[derive(Error, Debug, Clone)]
pub enum PlanningError {
    /// A pre-solve check found demand that cannot possibly be covered:
    /// no route to a demanded destination, total demand exceeding total
    /// capacity, or shelf-life filtering that emptied a destination's
    /// route set.
    #[error("infeasible input: {reason} (first offenders: {offending_keys:?})")]
    InfeasibleInput {
        reason: String,
        offending_keys: Vec<String>,
    },

    /// A thaw was requested for a cohort outside `[0, 120]` days old.
    #[error("shelf-life violation: {location}/{product} produced {production_date}, age {age_days} days at thaw")]
    ShelfLifeViolation {
        location: String,
        product: String,
        production_date: chrono::NaiveDate,
        age_days: i64,
    },

    /// Negative quantity or unknown location discovered while indexing
    /// inventory or cohorts (wraps the data-model layer's own validation
    /// when it surfaces this late instead of at construction time).
    #[error("invalid inventory: {reason} (first offenders: {offending_keys:?})")]
    InvalidInventory {
        reason: String,
        offending_keys: Vec<String>,
    },

    /// The solver terminated infeasible despite passing every pre-solve
    /// check. Indicative of a modelling bug; the LP dump (if captured) is
    /// attached for debugging.
    #[error("solver returned infeasible despite passing pre-solve checks")]
    SolverReturnedInfeasible { lp_dump: Option<String> },

    /// The solver was stopped by its time limit and never found a feasible
    /// incumbent.
    #[error("solver time limit reached with no feasible incumbent")]
    TimeLimitNoIncumbent,

    /// A validation failure from the data-model layer.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PlanningError {
    pub fn infeasible_input(reason: impl Into<String>, offending_keys: Vec<String>) -> Self {
        let mut offending_keys = offending_keys;
        offending_keys.truncate(5);
        PlanningError::InfeasibleInput {
            reason: reason.into(),
            offending_keys,
        }
    }

    pub fn invalid_inventory(reason: impl Into<String>, offending_keys: Vec<String>) -> Self {
        let mut offending_keys = offending_keys;
        offending_keys.truncate(5);
        PlanningError::InvalidInventory {
            reason: reason.into(),
            offending_keys,
        }
    }
}

pub type PlanningResult<T> = Result<T, PlanningError>;
