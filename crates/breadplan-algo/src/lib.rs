//! Cohort indexing and MILP model construction for an integrated
//! production-distribution plan.
//!
//! Data flows strictly leaves-first:
//!
//! ```text
//! NetworkGraph -> RouteEnumerator -> CohortIndexer -> ModelBuilder -> (external solver) -> SolutionExtractor
//! ```
//!
//! `NetworkGraph` lives in `breadplan-core`; everything downstream of it
//! lives here. Building a model is a deterministic, pure function from
//! inputs to a constraint graph: the solver call is the only blocking,
//! cancellable boundary (a time limit, not a thread, governs cancellation).

pub mod cohort_index;
pub mod error;
pub mod model;
pub mod route_enum;
pub mod shelf_life;
pub mod solution;

pub use cohort_index::{CohortCounts, CohortIndexer, CohortKey, CohortSets};
pub use error::{PlanningError, PlanningResult};
pub use model::{ModelBuilder, ModelBuildConfig};
pub use route_enum::{EnumeratedRoute, RouteEnumerator, ShelfLifeFilterCounts};
pub use shelf_life::{ArrivalTrace, ShelfLifeTracker};
pub use solution::{
    CostBreakdown, DemandSatisfaction, ProductionBatch, SolutionExtractor, SolveResult, TerminationCondition,
};
