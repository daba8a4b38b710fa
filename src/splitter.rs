//! Cargo-aware splitting of destinations into vehicle routes.
//!
//! A fixed decision tree picks one of four strategies. Whatever the
//! strategy, every input destination ends up in exactly one route.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::haversine::haversine_km;
use crate::matrix::DistanceMatrix;
use crate::model::{Destination, GeoPoint, MissionType, OptimizationProblem, Route, RouteMethod, Vehicle};
use crate::sequencer::Sequencer;

/// Decision-tree and clustering knobs.
///
/// The defaults are carried over as-is; none of them has been tuned.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SplitThresholds {
    pub small_route_max_destinations: usize,
    /// Share of the largest vehicle a small load may use.
    pub small_load_ratio: f64,
    /// Below this spread (degrees) everything goes on one route.
    pub compact_spread_degrees: f64,
    /// Above this spread (degrees) destinations are clustered.
    pub dispersed_spread_degrees: f64,
    pub max_clusters: usize,
    pub kmeans_rounds: usize,
    pub kmeans_seed: u64,
}

impl Default for SplitThresholds {
    fn default() -> Self {
        Self {
            small_route_max_destinations: 3,
            small_load_ratio: 0.8,
            compact_spread_degrees: 0.5,
            dispersed_spread_degrees: 1.0,
            max_clusters: 4,
            kmeans_rounds: 10,
            kmeans_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingStrategy {
    SingleRoute,
    CapacitySplit,
    GeographicClustering,
    Balanced,
}

impl RoutingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStrategy::SingleRoute => "single_optimized_route",
            RoutingStrategy::CapacitySplit => "capacity_based_splitting",
            RoutingStrategy::GeographicClustering => "geographical_clustering",
            RoutingStrategy::Balanced => "balanced_optimization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyDecision {
    pub strategy: RoutingStrategy,
    pub reason: &'static str,
}

/// Aggregate cargo and geography of a destination set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CargoAnalysis {
    pub total_weight: f64,
    pub total_volume: f64,
    pub pickup_count: usize,
    pub delivery_count: usize,
    pub destination_count: usize,
    pub geographic_spread: f64,
    pub avg_weight_per_destination: f64,
    pub avg_volume_per_destination: f64,
}

pub fn analyze_cargo(destinations: &[Destination]) -> CargoAnalysis {
    let total_weight: f64 = destinations.iter().map(|d| d.cargo.total_weight).sum();
    let total_volume: f64 = destinations.iter().map(|d| d.cargo.total_volume).sum();
    let count = destinations.len();
    let per = |total: f64| if count == 0 { 0.0 } else { total / count as f64 };

    CargoAnalysis {
        total_weight,
        total_volume,
        pickup_count: destinations
            .iter()
            .filter(|d| d.mission_type == MissionType::Pickup)
            .count(),
        delivery_count: destinations
            .iter()
            .filter(|d| d.mission_type == MissionType::Delivery)
            .count(),
        destination_count: count,
        geographic_spread: geographic_spread(destinations),
        avg_weight_per_destination: per(total_weight),
        avg_volume_per_destination: per(total_volume),
    }
}

/// Average of the latitude range and the longitude range, in degrees.
pub fn geographic_spread(destinations: &[Destination]) -> f64 {
    let points: Vec<GeoPoint> = destinations
        .iter()
        .filter_map(Destination::usable_location)
        .collect();
    if points.is_empty() {
        return 0.0;
    }
    let range = |values: Vec<f64>| {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        max - min
    };
    let lat_range = range(points.iter().map(|p| p.latitude).collect());
    let lng_range = range(points.iter().map(|p| p.longitude).collect());
    (lat_range + lng_range) / 2.0
}

/// Walks the decision tree in its fixed order.
pub fn select_strategy(
    analysis: &CargoAnalysis,
    vehicles: &[Vehicle],
    thresholds: &SplitThresholds,
) -> StrategyDecision {
    let max_weight = vehicles.iter().map(|v| v.max_payload).fold(0.0, f64::max);
    let max_volume = vehicles.iter().map(|v| v.cargo_volume).fold(0.0, f64::max);

    let decision = if analysis.destination_count <= thresholds.small_route_max_destinations
        && analysis.total_weight <= max_weight * thresholds.small_load_ratio
        && analysis.total_volume <= max_volume * thresholds.small_load_ratio
    {
        StrategyDecision {
            strategy: RoutingStrategy::SingleRoute,
            reason: "Small cargo load with few destinations - single route is most efficient",
        }
    } else if analysis.geographic_spread < thresholds.compact_spread_degrees {
        StrategyDecision {
            strategy: RoutingStrategy::SingleRoute,
            reason: "Destinations are geographically close - single route optimal",
        }
    } else if analysis.total_weight > max_weight || analysis.total_volume > max_volume {
        StrategyDecision {
            strategy: RoutingStrategy::CapacitySplit,
            reason: "Cargo exceeds single vehicle capacity - split by weight/volume",
        }
    } else if analysis.geographic_spread > thresholds.dispersed_spread_degrees {
        StrategyDecision {
            strategy: RoutingStrategy::GeographicClustering,
            reason: "Destinations are geographically dispersed - cluster by location",
        }
    } else {
        StrategyDecision {
            strategy: RoutingStrategy::Balanced,
            reason: "Mixed factors - use balanced approach",
        }
    };

    info!(
        strategy = decision.strategy.as_str(),
        total_weight = analysis.total_weight,
        total_volume = analysis.total_volume,
        spread = analysis.geographic_spread,
        "routing strategy selected"
    );
    decision
}

#[derive(Debug, Clone, Copy, Default)]
struct Load {
    weight: f64,
    volume: f64,
}

impl Load {
    fn of(destinations: &[Destination], members: &[usize]) -> Self {
        members.iter().fold(Self::default(), |load, &i| load.plus(&destinations[i]))
    }

    fn plus(self, destination: &Destination) -> Self {
        Self {
            weight: self.weight + destination.cargo.total_weight,
            volume: self.volume + destination.cargo.total_volume,
        }
    }

    fn fits(&self, vehicle: &Vehicle) -> bool {
        self.weight <= vehicle.max_payload && self.volume <= vehicle.cargo_volume
    }
}

/// Greedy first-fit grouping of `members` onto successive vehicles.
///
/// The fleet is cycled until every destination is placed. A destination no
/// vehicle can take on its own gets a group of its own.
pub fn capacity_groups(destinations: &[Destination], members: &[usize], vehicles: &[Vehicle]) -> Vec<Vec<usize>> {
    if vehicles.is_empty() {
        return if members.is_empty() { Vec::new() } else { vec![members.to_vec()] };
    }

    let mut remaining = members.to_vec();
    let mut groups = Vec::new();
    let mut cursor = 0;
    let mut misses = 0;

    while !remaining.is_empty() {
        let vehicle = &vehicles[cursor % vehicles.len()];
        cursor += 1;

        let mut load = Load::default();
        let mut group = Vec::new();
        remaining.retain(|&i| {
            let next = load.plus(&destinations[i]);
            if next.fits(vehicle) {
                load = next;
                group.push(i);
                false
            } else {
                true
            }
        });

        if !group.is_empty() {
            misses = 0;
            groups.push(group);
            continue;
        }

        misses += 1;
        if misses >= vehicles.len() {
            let oversized = remaining.remove(0);
            warn!(
                destination = destinations[oversized].id,
                weight = destinations[oversized].cargo.total_weight,
                volume = destinations[oversized].cargo.total_volume,
                "destination exceeds every vehicle, placing it alone"
            );
            groups.push(vec![oversized]);
            misses = 0;
        }
    }
    groups
}

/// Seeded k-means over destination coordinates.
///
/// Returns groups of destination indices. With no more destinations than
/// clusters, each destination is its own group. Destinations without
/// coordinates join the first group.
pub fn cluster_destinations(destinations: &[Destination], k: usize, rounds: usize, seed: u64) -> Vec<Vec<usize>> {
    let located: Vec<(usize, GeoPoint)> = destinations
        .iter()
        .enumerate()
        .filter_map(|(i, d)| d.usable_location().map(|p| (i, p)))
        .collect();
    let unlocated: Vec<usize> = destinations
        .iter()
        .enumerate()
        .filter(|(_, d)| d.usable_location().is_none())
        .map(|(i, _)| i)
        .collect();

    let mut clusters: Vec<Vec<usize>> = if k == 0 {
        vec![located.iter().map(|(i, _)| *i).collect()]
    } else if located.len() <= k {
        located.iter().map(|(i, _)| vec![*i]).collect()
    } else {
        kmeans(&located, k, rounds, seed)
    };
    clusters.retain(|c| !c.is_empty());

    if !unlocated.is_empty() {
        match clusters.first_mut() {
            Some(first) => first.extend(unlocated),
            None => clusters.push(unlocated),
        }
    }
    clusters
}

fn kmeans(located: &[(usize, GeoPoint)], k: usize, rounds: usize, seed: u64) -> Vec<Vec<usize>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids: Vec<GeoPoint> = rand::seq::index::sample(&mut rng, located.len(), k)
        .into_iter()
        .map(|i| located[i].1)
        .collect();
    let mut assignment = vec![usize::MAX; located.len()];

    for round in 0..rounds {
        let mut changed = false;
        for (slot, (_, point)) in located.iter().enumerate() {
            let nearest = nearest_centroid(*point, &centroids);
            if assignment[slot] != nearest {
                assignment[slot] = nearest;
                changed = true;
            }
        }

        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<GeoPoint> = located
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .map(|((_, p), _)| *p)
                .collect();
            if !members.is_empty() {
                let n = members.len() as f64;
                *centroid = GeoPoint::new(
                    members.iter().map(|p| p.latitude).sum::<f64>() / n,
                    members.iter().map(|p| p.longitude).sum::<f64>() / n,
                );
            }
        }

        if !changed {
            debug!(rounds = round + 1, "k-means converged");
            break;
        }
    }

    let mut clusters = vec![Vec::new(); k];
    for ((index, _), cluster) in located.iter().zip(&assignment) {
        if let Some(members) = clusters.get_mut(*cluster) {
            members.push(*index);
        }
    }
    clusters
}

fn nearest_centroid(point: GeoPoint, centroids: &[GeoPoint]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let distance = haversine_km(point, *centroid);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// 100 when the average distance per stop is within 20 km, minus two points
/// per extra km.
pub fn efficiency_score(total_distance_km: f64, destination_count: usize) -> f64 {
    const IDEAL_KM_PER_STOP: f64 = 20.0;
    if destination_count == 0 {
        return 0.0;
    }
    let per_stop = total_distance_km / destination_count as f64;
    if per_stop <= IDEAL_KM_PER_STOP {
        100.0
    } else {
        (100.0 - (per_stop - IDEAL_KM_PER_STOP) * 2.0).clamp(0.0, 100.0)
    }
}

/// Turns a problem into sequenced routes for one strategy.
pub struct RouteSplitter<'a> {
    problem: &'a OptimizationProblem,
    vehicles: &'a [Vehicle],
    matrix: &'a DistanceMatrix,
    sequencer: &'a Sequencer,
    thresholds: &'a SplitThresholds,
    usable_sources: Vec<usize>,
}

impl<'a> RouteSplitter<'a> {
    pub fn new(
        problem: &'a OptimizationProblem,
        vehicles: &'a [Vehicle],
        matrix: &'a DistanceMatrix,
        sequencer: &'a Sequencer,
        thresholds: &'a SplitThresholds,
    ) -> Self {
        let mut usable_sources: Vec<usize> = problem
            .sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.usable_location().is_some())
            .map(|(i, _)| i)
            .collect();
        if usable_sources.is_empty() && !problem.sources.is_empty() {
            usable_sources.push(0);
        }
        Self {
            problem,
            vehicles,
            matrix,
            sequencer,
            thresholds,
            usable_sources,
        }
    }

    pub fn split(&self, strategy: RoutingStrategy) -> Vec<Route> {
        if self.problem.destinations.is_empty() || self.usable_sources.is_empty() {
            return Vec::new();
        }
        let all: Vec<usize> = (0..self.problem.destinations.len()).collect();

        let routes = match strategy {
            RoutingStrategy::SingleRoute => {
                vec![self.build_route(self.usable_sources[0], &all, RouteMethod::SingleRoute)]
            }
            RoutingStrategy::CapacitySplit => self.capacity_routes(&all),
            RoutingStrategy::GeographicClustering => self.cluster_routes(),
            RoutingStrategy::Balanced => self.balanced_routes(),
        };
        info!(routes = routes.len(), strategy = strategy.as_str(), "routes created");
        routes
    }

    fn capacity_routes(&self, members: &[usize]) -> Vec<Route> {
        capacity_groups(&self.problem.destinations, members, self.vehicles)
            .iter()
            .enumerate()
            .map(|(n, group)| {
                let source = self.usable_sources[n % self.usable_sources.len()];
                self.build_route(source, group, RouteMethod::CapacitySplit)
            })
            .collect()
    }

    fn clusters(&self) -> Vec<Vec<usize>> {
        let k = self
            .vehicles
            .len()
            .min(self.problem.destinations.len())
            .min(self.thresholds.max_clusters);
        cluster_destinations(
            &self.problem.destinations,
            k,
            self.thresholds.kmeans_rounds,
            self.thresholds.kmeans_seed,
        )
    }

    fn cluster_routes(&self) -> Vec<Route> {
        self.clusters()
            .iter()
            .enumerate()
            .map(|(n, members)| {
                let source = self.best_source(members);
                self.build_route(source, members, RouteMethod::GeographicCluster(n + 1))
            })
            .collect()
    }

    fn balanced_routes(&self) -> Vec<Route> {
        let destinations = &self.problem.destinations;
        let mut routes = Vec::new();
        for (n, members) in self.clusters().iter().enumerate() {
            let source = self.best_source(members);
            let load = Load::of(destinations, members);
            if self.vehicles.iter().any(|v| load.fits(v)) {
                routes.push(self.build_route(source, members, RouteMethod::GeographicCluster(n + 1)));
                continue;
            }
            debug!(cluster = n + 1, weight = load.weight, "cluster exceeds every vehicle, splitting");
            for group in capacity_groups(destinations, members, self.vehicles) {
                routes.push(self.build_route(source, &group, RouteMethod::BalancedCapacitySplit));
            }
        }
        routes
    }

    /// Source with the fewest unknown legs, then the least total distance.
    fn best_source(&self, members: &[usize]) -> usize {
        let mut best = self.usable_sources[0];
        let mut best_key = (usize::MAX, f64::INFINITY);
        for &source in &self.usable_sources {
            let mut missing = 0;
            let mut total = 0.0;
            for &member in members {
                match self.matrix.distance(source, self.problem.destination_point(member)) {
                    Some(d) => total += d,
                    None => missing += 1,
                }
            }
            if missing < best_key.0 || (missing == best_key.0 && total < best_key.1) {
                best = source;
                best_key = (missing, total);
            }
        }
        best
    }

    fn build_route(&self, source: usize, members: &[usize], method: RouteMethod) -> Route {
        let destinations = &self.problem.destinations;
        let offset = self.problem.sources.len();
        let stops: Vec<usize> = members
            .iter()
            .map(|&m| self.problem.destination_point(m))
            .collect();
        let sequence = self.sequencer.sequence(source, &stops, self.matrix);

        let ordered: Vec<Destination> = sequence
            .order
            .iter()
            .enumerate()
            .map(|(position, &point)| {
                let mut destination = destinations[point - offset].clone();
                destination.sequence = position as u32 + 1;
                destination
            })
            .collect();
        let load = Load::of(destinations, members);

        Route {
            source: self.problem.sources[source].clone(),
            efficiency_score: efficiency_score(sequence.total_distance_km, ordered.len()),
            fallback: false,
            destinations: ordered,
            legs: sequence.legs,
            total_distance_km: sequence.total_distance_km,
            total_duration_hours: sequence.total_duration_hours,
            cargo_weight: load.weight,
            cargo_volume: load.volume,
            method,
        }
    }
}
