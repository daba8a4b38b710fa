//! Mission planning pipeline.
//!
//! `solve` runs the deterministic local pipeline: distance matrix, strategy,
//! split and sequence, then assembly. [`LocalOptimizer`] and
//! [`FallbackOptimizer`] wrap it behind [`MissionOptimizer`].

use tracing::{info, warn};

use crate::ai_plan::AiOptimizer;
use crate::assembler::{AssemblerOptions, MissionAssembler, summarize};
use crate::config::PlannerConfig;
use crate::cost::{CostModel, CostParameters};
use crate::error::PlannerError;
use crate::gemini::GeminiClient;
use crate::haversine::{DEFAULT_SPEED_KMH, HaversineEstimator};
use crate::matrix::MatrixBuilder;
use crate::model::{GeoPoint, MissionPlan, OptimizationOutcome, OptimizationProblem, PlanOrigin};
use crate::osrm::OsrmClient;
use crate::route_cache::{InMemoryRouteCache, RouteCache, RouteGeometryResolver};
use crate::sequencer::{Sequencer, SequencerOptions};
use crate::splitter::{RouteSplitter, SplitThresholds, analyze_cargo, select_strategy};
use crate::traits::{MissionOptimizer, RoadRoutingService};

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Speed used wherever travel time is estimated from straight lines.
    pub fallback_speed_kmh: f64,
    pub thresholds: SplitThresholds,
    pub sequencer: SequencerOptions,
    pub cost: CostParameters,
    pub assembler: AssemblerOptions,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            fallback_speed_kmh: DEFAULT_SPEED_KMH,
            thresholds: SplitThresholds::default(),
            sequencer: SequencerOptions::default(),
            cost: CostParameters::default(),
            assembler: AssemblerOptions::default(),
        }
    }
}

impl SolveOptions {
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            fallback_speed_kmh: config.fallback_speed_kmh,
            thresholds: config.thresholds.clone(),
            sequencer: config.sequencer.clone(),
            cost: config.cost.clone(),
            assembler: config.assembler.clone(),
        }
    }

    pub fn estimator(&self) -> HaversineEstimator {
        HaversineEstimator::new(self.fallback_speed_kmh)
    }

    pub fn assembler(&self) -> MissionAssembler {
        MissionAssembler::new(CostModel::new(self.cost.clone()), self.assembler.clone())
    }
}

/// Plans `problem` locally. Only missing input is an error.
pub fn solve<S: RoadRoutingService>(
    problem: &OptimizationProblem,
    road: Option<S>,
    options: &SolveOptions,
) -> Result<OptimizationOutcome, PlannerError> {
    problem.validate()?;
    let vehicles = problem.available_vehicles();

    let matrix = MatrixBuilder::new(road, options.estimator()).build(&problem.points());

    let analysis = analyze_cargo(&problem.destinations);
    let decision = select_strategy(&analysis, &vehicles, &options.thresholds);

    let sequencer = Sequencer::new(options.sequencer.clone());
    let splitter = RouteSplitter::new(problem, &vehicles, &matrix, &sequencer, &options.thresholds);
    let routes = splitter.split(decision.strategy);

    let plans = options
        .assembler()
        .assemble(routes, &vehicles, &problem.drivers, PlanOrigin::Local);
    let summary = summarize(&plans, decision.strategy.as_str(), decision.reason);
    info!(
        missions = summary.total_missions,
        distance_km = summary.total_distance_km,
        cost = summary.total_cost,
        "local optimization finished"
    );

    Ok(OptimizationOutcome {
        plans,
        summary,
        origin: PlanOrigin::Local,
    })
}

/// The local pipeline as a [`MissionOptimizer`], optionally attaching road
/// geometry from a route cache.
pub struct LocalOptimizer<S, C> {
    road: Option<S>,
    cache: Option<C>,
    options: SolveOptions,
}

impl<S: RoadRoutingService> LocalOptimizer<S, InMemoryRouteCache> {
    pub fn new(road: Option<S>, options: SolveOptions) -> Self {
        Self {
            road,
            cache: None,
            options,
        }
    }
}

impl<S: RoadRoutingService, C: RouteCache> LocalOptimizer<S, C> {
    pub fn with_cache<D: RouteCache>(self, cache: D) -> LocalOptimizer<S, D> {
        LocalOptimizer {
            road: self.road,
            cache: Some(cache),
            options: self.options,
        }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    fn attach_geometry(&self, plans: &mut [MissionPlan]) {
        let Some(cache) = &self.cache else { return };
        let resolver = RouteGeometryResolver::new(self.road.as_ref(), cache, self.options.estimator());
        for plan in plans {
            let waypoints: Vec<GeoPoint> = plan
                .route
                .source
                .usable_location()
                .into_iter()
                .chain(plan.route.destinations.iter().filter_map(|d| d.usable_location()))
                .collect();
            if waypoints.len() >= 2 {
                plan.geometry = Some(resolver.resolve(&waypoints));
            }
        }
    }
}

impl<S: RoadRoutingService, C: RouteCache> MissionOptimizer for LocalOptimizer<S, C> {
    fn optimize(&self, problem: &OptimizationProblem) -> Result<OptimizationOutcome, PlannerError> {
        let mut outcome = solve(problem, self.road.as_ref(), &self.options)?;
        self.attach_geometry(&mut outcome.plans);
        Ok(outcome)
    }
}

/// Runs `primary`, and `fallback` whenever `primary` fails for any reason
/// other than unusable input.
pub struct FallbackOptimizer<P, F> {
    primary: P,
    fallback: F,
}

impl<P: MissionOptimizer, F: MissionOptimizer> FallbackOptimizer<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: MissionOptimizer, F: MissionOptimizer> MissionOptimizer for FallbackOptimizer<P, F> {
    fn optimize(&self, problem: &OptimizationProblem) -> Result<OptimizationOutcome, PlannerError> {
        match self.primary.optimize(problem) {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_input_error() => Err(err),
            Err(err) => {
                warn!(error = %err, "primary optimizer failed, using fallback");
                Ok(self.fallback.optimize(problem)?.into_fallback())
            }
        }
    }
}

/// Wires the optimizers a configuration asks for.
///
/// The AI planner, when configured, runs first with the local pipeline as
/// fallback. A client that cannot be built is logged and left out.
pub fn optimizer_from_config(config: &PlannerConfig) -> Box<dyn MissionOptimizer> {
    let options = SolveOptions::from_config(config);

    let road = if config.use_road_service {
        OsrmClient::new(config.osrm.clone())
            .inspect_err(|err| warn!(error = %err, "OSRM client unavailable, using haversine only"))
            .ok()
    } else {
        None
    };
    let local = LocalOptimizer::new(road, options.clone()).with_cache(InMemoryRouteCache::new());

    let Some(gemini) = &config.gemini else {
        return Box::new(local);
    };
    match GeminiClient::new(gemini.clone()) {
        Ok(client) => {
            let remote = AiOptimizer::new(client, options.assembler(), options.estimator());
            Box::new(FallbackOptimizer::new(remote, local))
        }
        Err(err) => {
            warn!(error = %err, "AI optimizer unavailable, planning locally");
            Box::new(local)
        }
    }
}
