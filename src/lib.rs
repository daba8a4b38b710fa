//! mission-planner
//!
//! Turns pending transport requests (sources, destinations with cargo, a
//! fleet and drivers) into priced, sequenced missions. The local pipeline is
//! deterministic; a remote AI planner can run in front of it with the local
//! pipeline as fallback.

pub mod ai_plan;
pub mod assembler;
pub mod config;
pub mod cost;
pub mod error;
pub mod gemini;
pub mod haversine;
pub mod matrix;
pub mod model;
pub mod osrm;
pub mod polyline;
pub mod route_cache;
pub mod sequencer;
pub mod solver;
pub mod splitter;
pub mod traits;

pub use config::PlannerConfig;
pub use error::PlannerError;
pub use model::{MissionPlan, OptimizationOutcome, OptimizationProblem};
pub use solver::{FallbackOptimizer, LocalOptimizer, SolveOptions, optimizer_from_config, solve};
pub use traits::MissionOptimizer;
