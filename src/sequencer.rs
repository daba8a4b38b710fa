//! Stop sequencing: nearest-neighbor construction followed by 2-opt.
//!
//! Works purely on absolute matrix point indices. The output order is
//! always a permutation of the input stops; when construction cannot place
//! every stop, the input order is returned unchanged.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::matrix::DistanceMatrix;
use crate::model::Leg;

/// Minimum strict improvement accepted by 2-opt.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequencerOptions {
    /// Maximum number of full 2-opt passes.
    pub two_opt_max_passes: usize,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            two_opt_max_passes: 50,
        }
    }
}

/// An ordered set of stops with its travel figures.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Point indices in visiting order.
    pub order: Vec<usize>,
    /// One per stop, source→first leg first. Unknown legs are zero.
    pub legs: Vec<Leg>,
    pub total_distance_km: f64,
    pub total_duration_hours: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    options: SequencerOptions,
}

impl Sequencer {
    pub fn new(options: SequencerOptions) -> Self {
        Self { options }
    }

    /// Orders `stops` starting from `source`.
    pub fn sequence(&self, source: usize, stops: &[usize], matrix: &DistanceMatrix) -> Sequence {
        let order = if stops.len() < 2 {
            stops.to_vec()
        } else {
            let constructed = nearest_neighbor(source, stops, matrix);
            two_opt(source, constructed, matrix, self.options.two_opt_max_passes)
        };
        metrics(source, order, matrix)
    }
}

/// Greedy construction from `source`.
///
/// Ties keep the first candidate in input order. Candidates without a matrix
/// entry are skipped for the current step; if no candidate is reachable, all
/// remaining stops are appended in input order.
pub fn nearest_neighbor(source: usize, stops: &[usize], matrix: &DistanceMatrix) -> Vec<usize> {
    let mut unvisited = stops.to_vec();
    let mut route = Vec::with_capacity(stops.len());
    let mut current = source;

    for _ in 0..stops.len() {
        if unvisited.is_empty() {
            break;
        }

        let mut best: Option<(usize, f64)> = None;
        for (position, &candidate) in unvisited.iter().enumerate() {
            let Some(distance) = matrix.distance(current, candidate) else {
                continue;
            };
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((position, distance));
            }
        }

        match best {
            Some((position, _)) => {
                current = unvisited.remove(position);
                route.push(current);
            }
            None => {
                warn!(
                    from = current,
                    remaining = unvisited.len(),
                    "no reachable stop, appending the rest in input order"
                );
                route.append(&mut unvisited);
                break;
            }
        }
    }

    if route.len() != stops.len() {
        warn!(
            expected = stops.len(),
            actual = route.len(),
            "nearest neighbor lost stops, keeping input order"
        );
        return stops.to_vec();
    }
    route
}

/// Open-path distance `source → order[0] → … → order[n-1]`.
///
/// `None` when any leg is unknown.
pub fn route_distance(source: usize, order: &[usize], matrix: &DistanceMatrix) -> Option<f64> {
    let mut total = 0.0;
    let mut current = source;
    for &point in order {
        total += matrix.distance(current, point)?;
        current = point;
    }
    Some(total)
}

/// First-improvement 2-opt over segment reversals.
///
/// Only engages for four or more stops and when every leg of the starting
/// route is known; candidate orders with unknown legs are rejected.
pub fn two_opt(source: usize, order: Vec<usize>, matrix: &DistanceMatrix, max_passes: usize) -> Vec<usize> {
    let n = order.len();
    if n < 4 {
        return order;
    }
    let Some(mut best_distance) = route_distance(source, &order, matrix) else {
        debug!("route has unknown legs, skipping 2-opt");
        return order;
    };

    let mut route = order;
    let mut candidate = route.clone();
    for pass in 0..max_passes {
        let mut improved = false;
        for i in 0..n - 1 {
            for j in i + 1..n {
                candidate.copy_from_slice(&route);
                candidate[i..=j].reverse();
                if let Some(distance) = route_distance(source, &candidate, matrix) {
                    if distance < best_distance - IMPROVEMENT_EPSILON {
                        route.copy_from_slice(&candidate);
                        best_distance = distance;
                        improved = true;
                    }
                }
            }
        }
        if !improved {
            debug!(passes = pass + 1, distance_km = best_distance, "2-opt converged");
            break;
        }
    }
    route
}

/// Legs and totals along `order`. Unknown legs contribute nothing.
pub fn metrics(source: usize, order: Vec<usize>, matrix: &DistanceMatrix) -> Sequence {
    let mut legs = Vec::with_capacity(order.len());
    let mut current = source;
    for &point in &order {
        let leg = matrix
            .get(current, point)
            .map(|entry| Leg {
                distance_km: entry.distance_km,
                duration_hours: entry.duration_hours,
            })
            .unwrap_or_default();
        legs.push(leg);
        current = point;
    }
    let total_distance_km = legs.iter().map(|leg| leg.distance_km).sum();
    let total_duration_hours = legs.iter().map(|leg| leg.duration_hours).sum();
    Sequence {
        order,
        legs,
        total_distance_km,
        total_duration_hours,
    }
}
