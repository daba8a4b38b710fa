//! Binds routes to vehicles and drivers and prices them.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cost::CostModel;
use crate::model::{
    CapacityUtilization, Driver, MissionPlan, OptimizationSummary, PlanOrigin, Route, StopSchedule, Vehicle,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssemblerOptions {
    /// Average of weight and volume utilization the vehicle choice aims for.
    pub target_utilization: f64,
    pub departure_hour: u32,
    /// Added to the departure of each successive mission.
    pub departure_stagger_minutes: u32,
    /// Time on site when a destination does not state its own.
    pub default_service_minutes: u32,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            target_utilization: 0.7,
            departure_hour: 8,
            departure_stagger_minutes: 30,
            default_service_minutes: 30,
        }
    }
}

fn ratio(load: f64, capacity: f64) -> f64 {
    if capacity > 0.0 { load / capacity } else { 0.0 }
}

fn fits(vehicle: &Vehicle, weight: f64, volume: f64) -> bool {
    vehicle.max_payload >= weight && vehicle.cargo_volume >= volume
}

/// Picks the vehicle whose average utilization lands closest to `target`.
///
/// When nothing can carry the load, the largest payload is returned with the
/// overload flag set. `None` only for an empty candidate list.
pub fn select_vehicle<'v>(
    weight: f64,
    volume: f64,
    candidates: &[&'v Vehicle],
    target: f64,
) -> Option<(&'v Vehicle, bool)> {
    let mut best: Option<(&Vehicle, f64)> = None;
    for vehicle in candidates.iter().copied().filter(|v| fits(v, weight, volume)) {
        let average = (ratio(weight, vehicle.max_payload) + ratio(volume, vehicle.cargo_volume)) / 2.0;
        let gap = (average - target).abs();
        if best.is_none_or(|(_, best_gap)| gap < best_gap) {
            best = Some((vehicle, gap));
        }
    }
    if let Some((vehicle, _)) = best {
        return Some((vehicle, false));
    }

    let largest = candidates
        .iter()
        .copied()
        .reduce(|a, b| if b.max_payload > a.max_payload { b } else { a })?;
    warn!(
        vehicle = largest.id,
        weight,
        volume,
        "no vehicle can carry the route, using the largest payload"
    );
    Some((largest, true))
}

pub fn utilization(weight: f64, volume: f64, vehicle: &Vehicle) -> CapacityUtilization {
    let percent = |load: f64, capacity: f64| (ratio(load, capacity) * 100.0).clamp(0.0, 100.0);
    CapacityUtilization {
        weight_percentage: percent(weight, vehicle.max_payload),
        volume_percentage: percent(volume, vehicle.cargo_volume),
        overloaded: !fits(vehicle, weight, volume),
    }
}

pub fn mission_name(route: &Route) -> String {
    match route.destinations.as_slice() {
        [] => "Empty mission".to_string(),
        [only] => format!("Deliver to {}", only.name),
        [first, second] => format!("Deliver to {} and {}", first.name, second.name),
        many => format!("Multi-stop delivery ({} stops)", many.len()),
    }
}

pub fn mission_id(number: usize) -> String {
    format!("M{number:03}")
}

/// Arrival and departure of every stop, in minutes since midnight.
pub fn stop_schedule(route: &Route, departure_minute: u32, default_service_minutes: u32) -> Vec<StopSchedule> {
    let mut clock = departure_minute;
    route
        .destinations
        .iter()
        .enumerate()
        .map(|(i, destination)| {
            let travel = route
                .legs
                .get(i)
                .map(|leg| (leg.duration_hours.max(0.0) * 60.0).round() as u32)
                .unwrap_or(0);
            let arrival_minute = clock + travel;
            let departure_minute =
                arrival_minute + destination.service_duration.unwrap_or(default_service_minutes);
            clock = departure_minute;
            StopSchedule {
                destination_id: destination.id,
                arrival_minute,
                departure_minute,
            }
        })
        .collect()
}

pub fn summarize(plans: &[MissionPlan], strategy: &str, reason: &str) -> OptimizationSummary {
    let vehicles: HashSet<u64> = plans.iter().map(|p| p.vehicle.id).collect();
    let optimization_score = if plans.is_empty() {
        0.0
    } else {
        plans.iter().map(|p| p.route.efficiency_score).sum::<f64>() / plans.len() as f64
    };
    OptimizationSummary {
        total_missions: plans.len(),
        total_vehicles_used: vehicles.len(),
        total_distance_km: plans.iter().map(|p| p.route.total_distance_km).sum(),
        total_cost: plans.iter().map(|p| p.cost.total).sum(),
        total_duration_hours: plans.iter().map(|p| p.route.total_duration_hours).sum(),
        optimization_score,
        strategy: strategy.to_string(),
        reason: reason.to_string(),
    }
}

/// Turns routes into priced, staffed and scheduled missions.
#[derive(Debug, Clone, Default)]
pub struct MissionAssembler {
    cost: CostModel,
    options: AssemblerOptions,
}

impl MissionAssembler {
    pub fn new(cost: CostModel, options: AssemblerOptions) -> Self {
        Self { cost, options }
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    /// Heaviest routes pick first. Each vehicle serves once until the pool
    /// runs dry, then the pool refills for further trips. A route no free
    /// vehicle can carry goes to a fitting vehicle from the whole fleet.
    pub fn assemble(
        &self,
        mut routes: Vec<Route>,
        vehicles: &[Vehicle],
        drivers: &[Driver],
        origin: PlanOrigin,
    ) -> Vec<MissionPlan> {
        if vehicles.is_empty() {
            warn!(routes = routes.len(), "no vehicles to assign");
            return Vec::new();
        }
        routes.sort_by(|a, b| b.cargo_weight.total_cmp(&a.cargo_weight));

        let mut used = vec![false; vehicles.len()];
        let mut plans = Vec::with_capacity(routes.len());

        for (n, route) in routes.into_iter().enumerate() {
            if used.iter().all(|u| *u) {
                debug!(mission = n + 1, "vehicle pool exhausted, reusing fleet");
                used.iter_mut().for_each(|u| *u = false);
            }
            let mut pool: Vec<&Vehicle> = vehicles
                .iter()
                .zip(&used)
                .filter(|(_, u)| !**u)
                .map(|(v, _)| v)
                .collect();
            if !pool.iter().any(|v| fits(v, route.cargo_weight, route.cargo_volume)) {
                debug!(mission = n + 1, "no free vehicle fits, drawing from the whole fleet");
                pool = vehicles.iter().collect();
            }
            let Some((vehicle, _)) = select_vehicle(
                route.cargo_weight,
                route.cargo_volume,
                &pool,
                self.options.target_utilization,
            ) else {
                continue;
            };
            if let Some(slot) = vehicles.iter().position(|v| std::ptr::eq(v, vehicle)) {
                used[slot] = true;
            }

            let driver = if drivers.is_empty() {
                None
            } else {
                Some(drivers[n % drivers.len()].clone())
            };
            plans.push(self.plan(n, route, vehicle.clone(), driver, origin));
        }

        info!(missions = plans.len(), "missions assembled");
        plans
    }

    /// Prices and schedules one route on an already chosen vehicle.
    pub fn plan(
        &self,
        index: usize,
        route: Route,
        vehicle: Vehicle,
        driver: Option<Driver>,
        origin: PlanOrigin,
    ) -> MissionPlan {
        let departure_minute =
            self.options.departure_hour * 60 + self.options.departure_stagger_minutes * index as u32;
        let cost = self
            .cost
            .breakdown(route.total_distance_km, route.total_duration_hours, Some(&vehicle), None);
        let utilization = utilization(route.cargo_weight, route.cargo_volume, &vehicle);
        if utilization.overloaded {
            warn!(
                vehicle = vehicle.id,
                weight = route.cargo_weight,
                payload = vehicle.max_payload,
                "mission exceeds vehicle capacity"
            );
        }

        MissionPlan {
            mission_id: mission_id(index + 1),
            name: mission_name(&route),
            schedule: stop_schedule(&route, departure_minute, self.options.default_service_minutes),
            vehicle,
            driver,
            cost,
            utilization,
            departure_minute,
            route,
            origin,
            geometry: None,
        }
    }
}
