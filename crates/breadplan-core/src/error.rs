//! Unified error type for the data-model layer.
//!
//! [`CoreError`] covers validation failures that can be detected while
//! constructing the immutable input structures (§3 of the planning model):
//! unknown locations, negative quantities, malformed routes. Errors raised
//! once the model builder starts combining these inputs (infeasible demand,
//! shelf-life violations, solver outcomes) live in `breadplan_algo::error`
//! instead — this crate only owns the shapes of the data, not the solve.

use thiserror::Error;

/// Errors raised while constructing or validating core data-model types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A location id was referenced that was never declared.
    #[error("unknown location: {0}")]
    UnknownLocation(String),

    /// A quantity that must be non-negative was negative.
    #[error("negative quantity for {context}: {value}")]
    NegativeQuantity { context: String, value: f64 },

    /// A route or leg referenced a transport mode/storage combination that
    /// cannot occur (e.g. a leg with transit_days < 0).
    #[error("invalid route: {0}")]
    InvalidRoute(String),

    /// Generic validation failure with a free-form message.
    #[error("validation error: {0}")]
    Validation(String),
}

/// Convenience alias for [`CoreError`] results.
pub type CoreResult<T> = Result<T, CoreError>;
