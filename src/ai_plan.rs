//! Whole-problem planning by a remote text model.
//!
//! The model only decides grouping, order and staffing. Distances fall back
//! to haversine where it gives none, and every plan is priced locally.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assembler::{MissionAssembler, summarize};
use crate::error::{AiError, PlannerError, truncate_for_log};
use crate::haversine::HaversineEstimator;
use crate::model::{
    Destination, GeoPoint, Leg, MissionPlan, OptimizationOutcome, OptimizationProblem, PlanOrigin, Route,
    RouteMethod, Source, Vehicle,
};
use crate::splitter::{analyze_cargo, efficiency_score};
use crate::traits::{MissionOptimizer, TextGenerator};

const RESPONSE_SCHEMA: &str = r#"{
  "optimization_summary": {
    "total_missions_created": <number>,
    "total_estimated_distance_km": <number>,
    "optimization_score": <0-100>
  },
  "optimized_missions": [
    {
      "mission_id": "M001",
      "mission_name": "Descriptive mission name",
      "assigned_vehicle": { "vehicle_id": <vehicle id from input> },
      "assigned_driver": { "driver_id": <driver id from input> },
      "source_location": { "source_id": <source id from input> },
      "destinations": [
        { "destination_id": <destination id from input>, "sequence": 1 }
      ],
      "route_optimization": {
        "total_distance_km": <number>,
        "estimated_duration_hours": <number>
      }
    }
  ]
}"#;

/// Renders the request for the model.
pub fn build_prompt(problem: &OptimizationProblem) -> Result<String, AiError> {
    let analysis = analyze_cargo(&problem.destinations);
    let data = serde_json::to_string_pretty(problem).map_err(|err| AiError::InvalidJson(err.to_string()))?;

    Ok(format!(
        "# TRANSPORT MISSION OPTIMIZATION\n\n\
         You are an expert transport logistics optimizer. Group the destinations into missions, \
         assign one vehicle, one source and at most one driver to each, and order the stops.\n\n\
         ## INPUT SUMMARY\n\
         - Sources: {sources}\n\
         - Destinations: {destinations} ({pickups} pickups, {deliveries} deliveries)\n\
         - Vehicles: {vehicles}\n\
         - Total weight: {weight:.1} kg\n\
         - Total volume: {volume:.2} m3\n\n\
         ## INPUT DATA\n{data}\n\n\
         ## CONSTRAINTS\n\
         - Use only ids present in the input data.\n\
         - Every destination appears in exactly one mission.\n\
         - Respect max_payload and cargo_volume of each vehicle.\n\n\
         ## OUTPUT\n\
         Return only a JSON object with this structure:\n{schema}\n",
        sources = problem.sources.len(),
        destinations = analysis.destination_count,
        pickups = analysis.pickup_count,
        deliveries = analysis.delivery_count,
        vehicles = problem.available_vehicles().len(),
        weight = analysis.total_weight,
        volume = analysis.total_volume,
        schema = RESPONSE_SCHEMA,
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPlanResponse {
    #[serde(default)]
    pub optimization_summary: Option<AiSummary>,
    #[serde(default)]
    pub optimized_missions: Vec<AiMission>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AiSummary {
    pub total_missions_created: Option<f64>,
    pub total_estimated_distance_km: Option<f64>,
    pub optimization_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMission {
    #[serde(default)]
    pub mission_id: Option<String>,
    #[serde(default)]
    pub mission_name: Option<String>,
    pub assigned_vehicle: AiVehicleRef,
    #[serde(default)]
    pub assigned_driver: Option<AiDriverRef>,
    pub source_location: AiSourceRef,
    pub destinations: Vec<AiStop>,
    #[serde(default)]
    pub route_optimization: Option<AiRouteTotals>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiVehicleRef {
    pub vehicle_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiDriverRef {
    pub driver_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiSourceRef {
    pub source_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiStop {
    pub destination_id: u64,
    #[serde(default)]
    pub sequence: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AiRouteTotals {
    pub total_distance_km: Option<f64>,
    pub estimated_duration_hours: Option<f64>,
}

/// Parses the model's text, repairing the usual damage first if needed:
/// markdown fences, prose around the object and trailing commas.
pub fn parse_plan(text: &str) -> Result<AiPlanResponse, AiError> {
    if let Ok(plan) = serde_json::from_str(text.trim()) {
        return Ok(plan);
    }
    debug!("AI response is not clean JSON, attempting repair");

    let unfenced = strip_fences(text);
    let object = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => {
            warn!(text = truncate_for_log(text), "AI response holds no JSON object");
            return Err(AiError::InvalidJson("no JSON object in response".to_string()));
        }
    };
    let repaired = strip_trailing_commas(object);
    serde_json::from_str(&repaired).map_err(|err| {
        warn!(error = %err, text = truncate_for_log(text), "AI response unparseable after repair");
        AiError::InvalidJson(err.to_string())
    })
}

fn strip_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json").or_else(|| text.strip_prefix("```")) {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Drops commas directly before `}` or `]`, leaving string contents alone.
fn strip_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Checks ids against the problem and that every destination is planned
/// exactly once.
pub fn validate_plan(plan: &AiPlanResponse, problem: &OptimizationProblem) -> Result<(), AiError> {
    if plan.optimized_missions.is_empty() {
        return Err(AiError::Schema("no missions".to_string()));
    }

    let mut seen: HashMap<u64, usize> = problem.destinations.iter().map(|d| (d.id, 0)).collect();
    for (n, mission) in plan.optimized_missions.iter().enumerate() {
        let vehicle_id = mission.assigned_vehicle.vehicle_id;
        match problem.vehicles.iter().find(|v| v.id == vehicle_id) {
            None => {
                return Err(AiError::Schema(format!("mission {} uses unknown vehicle {vehicle_id}", n + 1)));
            }
            Some(vehicle) if !vehicle.available => {
                return Err(AiError::Schema(format!(
                    "mission {} uses unavailable vehicle {vehicle_id}",
                    n + 1
                )));
            }
            Some(_) => {}
        }
        let source_id = mission.source_location.source_id;
        if !problem.sources.iter().any(|s| s.id == source_id) {
            return Err(AiError::Schema(format!("mission {} uses unknown source {source_id}", n + 1)));
        }
        if let Some(driver_id) = mission.assigned_driver.and_then(|d| d.driver_id) {
            if !problem.drivers.iter().any(|d| d.id == driver_id) {
                return Err(AiError::Schema(format!("mission {} uses unknown driver {driver_id}", n + 1)));
            }
        }
        if mission.destinations.is_empty() {
            return Err(AiError::Schema(format!("mission {} has no destinations", n + 1)));
        }
        for stop in &mission.destinations {
            let count = seen
                .get_mut(&stop.destination_id)
                .ok_or_else(|| AiError::Schema(format!("unknown destination {}", stop.destination_id)))?;
            *count += 1;
        }
    }

    if let Some((id, count)) = seen.iter().find(|(_, count)| **count != 1) {
        return Err(AiError::Schema(format!("destination {id} planned {count} times")));
    }
    Ok(())
}

/// Optimizer backed by a [`TextGenerator`].
pub struct AiOptimizer<G> {
    generator: G,
    assembler: MissionAssembler,
    estimator: HaversineEstimator,
}

impl<G: TextGenerator> AiOptimizer<G> {
    pub fn new(generator: G, assembler: MissionAssembler, estimator: HaversineEstimator) -> Self {
        Self {
            generator,
            assembler,
            estimator,
        }
    }

    fn to_plans(&self, plan: &AiPlanResponse, problem: &OptimizationProblem) -> Vec<MissionPlan> {
        let by_id: HashMap<u64, &Destination> = problem.destinations.iter().map(|d| (d.id, d)).collect();

        let mut plans = Vec::with_capacity(plan.optimized_missions.len());
        for (n, mission) in plan.optimized_missions.iter().enumerate() {
            let (Some(source), Some(vehicle)) = (
                problem.sources.iter().find(|s| s.id == mission.source_location.source_id),
                problem
                    .vehicles
                    .iter()
                    .find(|v| v.available && v.id == mission.assigned_vehicle.vehicle_id),
            ) else {
                continue;
            };
            let driver = mission
                .assigned_driver
                .and_then(|d| d.driver_id)
                .and_then(|id| problem.drivers.iter().find(|d| d.id == id))
                .cloned();

            let mut stops = mission.destinations.clone();
            stops.sort_by_key(|s| s.sequence.unwrap_or(u32::MAX));
            let destinations: Vec<Destination> = stops
                .iter()
                .filter_map(|s| by_id.get(&s.destination_id))
                .enumerate()
                .map(|(i, d)| Destination {
                    sequence: i as u32 + 1,
                    ..(*d).clone()
                })
                .collect();

            let route = self.route(source.clone(), destinations, mission.route_optimization, vehicle);
            let mut mission_plan = self.assembler.plan(n, route, vehicle.clone(), driver, PlanOrigin::RemoteAi);
            if let Some(name) = mission.mission_name.as_deref().filter(|s| !s.trim().is_empty()) {
                mission_plan.name = name.to_string();
            }
            plans.push(mission_plan);
        }
        plans
    }

    fn route(
        &self,
        source: Source,
        destinations: Vec<Destination>,
        totals: Option<AiRouteTotals>,
        vehicle: &Vehicle,
    ) -> Route {
        let mut previous: Option<GeoPoint> = source.usable_location();
        let legs: Vec<Leg> = destinations
            .iter()
            .map(|d| {
                let here = d.usable_location();
                let leg = match (previous, here) {
                    (Some(from), Some(to)) => {
                        let (distance_km, duration_hours) = self.estimator.estimate(from, to);
                        Leg {
                            distance_km,
                            duration_hours,
                        }
                    }
                    _ => Leg::default(),
                };
                if here.is_some() {
                    previous = here;
                }
                leg
            })
            .collect();

        let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
        let totals = totals.unwrap_or_default();
        let total_distance_km =
            positive(totals.total_distance_km).unwrap_or_else(|| legs.iter().map(|l| l.distance_km).sum());
        let total_duration_hours = positive(totals.estimated_duration_hours)
            .unwrap_or_else(|| legs.iter().map(|l| l.duration_hours).sum());
        let cargo_weight = destinations.iter().map(|d| d.cargo.total_weight).sum();
        let cargo_volume = destinations.iter().map(|d| d.cargo.total_volume).sum();
        debug!(vehicle = vehicle.id, stops = destinations.len(), total_distance_km, "AI route priced");

        Route {
            source,
            efficiency_score: efficiency_score(total_distance_km, destinations.len()),
            fallback: false,
            destinations,
            legs,
            total_distance_km,
            total_duration_hours,
            cargo_weight,
            cargo_volume,
            method: RouteMethod::RemoteAi,
        }
    }
}

impl<G: TextGenerator> MissionOptimizer for AiOptimizer<G> {
    fn optimize(&self, problem: &OptimizationProblem) -> Result<OptimizationOutcome, PlannerError> {
        problem.validate()?;

        let prompt = build_prompt(problem)?;
        let text = self.generator.generate(&prompt)?;
        let plan = parse_plan(&text)?;
        validate_plan(&plan, problem).inspect_err(|err| warn!(error = %err, "AI plan rejected"))?;

        let plans = self.to_plans(&plan, problem);
        let reason = match plan.optimization_summary.as_ref().and_then(|s| s.optimization_score) {
            Some(score) => format!("Remote plan (model score {score:.0})"),
            None => "Remote plan".to_string(),
        };
        let summary = summarize(&plans, RouteMethod::RemoteAi.tag().as_str(), &reason);
        info!(missions = plans.len(), "AI optimization accepted");

        Ok(OptimizationOutcome {
            plans,
            summary,
            origin: PlanOrigin::RemoteAi,
        })
    }
}
