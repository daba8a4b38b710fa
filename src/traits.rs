//! Seams between the planning engine and its collaborators.
//!
//! These are intentionally minimal. The HTTP clients in this crate implement
//! them, and tests swap in stubs.

use crate::error::{AiError, PlannerError, RoadServiceError};
use crate::model::{GeoPoint, OptimizationOutcome, OptimizationProblem};
use crate::polyline::Polyline;

/// Pairwise road distances as returned by a table query.
///
/// Indexed by the order of the points passed in. `None` marks a pair the
/// service could not route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadTable {
    /// Meters.
    pub distances: Vec<Vec<Option<f64>>>,
    /// Seconds.
    pub durations: Vec<Vec<Option<f64>>>,
}

impl RoadTable {
    pub fn distance_m(&self, from: usize, to: usize) -> Option<f64> {
        lookup(&self.distances, from, to)
    }

    pub fn duration_s(&self, from: usize, to: usize) -> Option<f64> {
        lookup(&self.durations, from, to)
    }
}

fn lookup(grid: &[Vec<Option<f64>>], from: usize, to: usize) -> Option<f64> {
    grid.get(from)
        .and_then(|row| row.get(to))
        .copied()
        .flatten()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

/// A single road route through ordered waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadRoute {
    /// Meters.
    pub distance_m: f64,
    /// Seconds.
    pub duration_s: f64,
    pub geometry: Polyline,
}

/// A road-network routing service.
pub trait RoadRoutingService {
    fn table(&self, points: &[GeoPoint]) -> Result<RoadTable, RoadServiceError>;

    fn route(&self, waypoints: &[GeoPoint]) -> Result<RoadRoute, RoadServiceError>;
}

/// A remote text-completion model.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

/// Anything that turns a problem into mission plans.
///
/// The local deterministic pipeline and the remote AI planner both implement
/// this; [`crate::solver::FallbackOptimizer`] composes them.
pub trait MissionOptimizer {
    fn optimize(&self, problem: &OptimizationProblem) -> Result<OptimizationOutcome, PlannerError>;
}

impl<T: RoadRoutingService + ?Sized> RoadRoutingService for &T {
    fn table(&self, points: &[GeoPoint]) -> Result<RoadTable, RoadServiceError> {
        (**self).table(points)
    }

    fn route(&self, waypoints: &[GeoPoint]) -> Result<RoadRoute, RoadServiceError> {
        (**self).route(waypoints)
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    fn generate(&self, prompt: &str) -> Result<String, AiError> {
        (**self).generate(prompt)
    }
}

impl<T: MissionOptimizer + ?Sized> MissionOptimizer for &T {
    fn optimize(&self, problem: &OptimizationProblem) -> Result<OptimizationOutcome, PlannerError> {
        (**self).optimize(problem)
    }
}

impl<T: MissionOptimizer + ?Sized> MissionOptimizer for Box<T> {
    fn optimize(&self, problem: &OptimizationProblem) -> Result<OptimizationOutcome, PlannerError> {
        (**self).optimize(problem)
    }
}
