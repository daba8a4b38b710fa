//! Typed planning records.
//!
//! Everything the engine reads is validated once here, at ingestion, rather
//! than re-checked at every access.

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Zero is the "unset" sentinel coming from upstream records, so a point
    /// only takes part in distance math when both parts are non-zero.
    pub fn is_usable(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude != 0.0
            && self.longitude != 0.0
    }
}

/// Where a mission starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

impl Source {
    pub fn usable_location(&self) -> Option<GeoPoint> {
        self.location.filter(GeoPoint::is_usable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionType {
    Pickup,
    #[default]
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Individual,
    #[default]
    Pallet,
}

/// Cargo carried to or from one destination.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cargo {
    /// Kilograms.
    #[serde(default)]
    pub total_weight: f64,
    /// Cubic meters.
    #[serde(default)]
    pub total_volume: f64,
    #[serde(default)]
    pub package_type: PackageType,
    #[serde(default)]
    pub requires_signature: bool,
    #[serde(default)]
    pub special_instructions: String,
}

/// A stop on a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub mission_type: MissionType,
    #[serde(default)]
    pub cargo: Cargo,
    /// 1-based position in the planned route; 0 until sequenced.
    #[serde(default)]
    pub sequence: u32,
    /// Minutes spent on site.
    #[serde(default)]
    pub service_duration: Option<u32>,
    #[serde(default)]
    pub expected_arrival_time: Option<String>,
}

impl Destination {
    pub fn usable_location(&self) -> Option<GeoPoint> {
        self.location.filter(GeoPoint::is_usable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub license_plate: String,
    /// Kilograms.
    pub max_payload: f64,
    /// Cubic meters.
    pub cargo_volume: f64,
    /// Liters per 100 km.
    #[serde(default)]
    pub fuel_consumption: Option<f64>,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: u64,
    pub name: String,
}

/// One optimization request.
///
/// Matrix point indices follow the order sources first, then destinations:
/// source `i` is point `i`, destination `j` is point `sources.len() + j`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationProblem {
    pub sources: Vec<Source>,
    pub destinations: Vec<Destination>,
    pub vehicles: Vec<Vehicle>,
    #[serde(default)]
    pub drivers: Vec<Driver>,
}

impl OptimizationProblem {
    /// Rejects requests no optimizer could plan.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if !self.sources.iter().any(|s| s.usable_location().is_some()) {
            return Err(PlannerError::NoSources);
        }
        if !self
            .destinations
            .iter()
            .any(|d| d.usable_location().is_some())
        {
            return Err(PlannerError::NoDestinations);
        }
        if self.available_vehicles().is_empty() {
            return Err(PlannerError::NoVehicles);
        }
        Ok(())
    }

    pub fn available_vehicles(&self) -> Vec<Vehicle> {
        self.vehicles.iter().filter(|v| v.available).cloned().collect()
    }

    /// All points in matrix order; `None` marks a point without coordinates.
    pub fn points(&self) -> Vec<Option<GeoPoint>> {
        self.sources
            .iter()
            .map(Source::usable_location)
            .chain(self.destinations.iter().map(Destination::usable_location))
            .collect()
    }

    pub fn destination_point(&self, destination_index: usize) -> usize {
        self.sources.len() + destination_index
    }
}

/// How a route was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteMethod {
    SingleRoute,
    CapacitySplit,
    GeographicCluster(usize),
    BalancedCapacitySplit,
    RemoteAi,
}

impl RouteMethod {
    pub fn tag(&self) -> String {
        match self {
            RouteMethod::SingleRoute => "single_route_tsp_2opt".to_string(),
            RouteMethod::CapacitySplit => "capacity_based_tsp".to_string(),
            RouteMethod::GeographicCluster(n) => format!("geographical_cluster_{n}"),
            RouteMethod::BalancedCapacitySplit => "capacity_split".to_string(),
            RouteMethod::RemoteAi => "remote_ai".to_string(),
        }
    }
}

/// Travel between two consecutive points of a route.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Leg {
    pub distance_km: f64,
    pub duration_hours: f64,
}

/// An ordered trip from one source through its destinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub source: Source,
    /// Sequenced copies of the input destinations, `sequence` set 1..=n.
    pub destinations: Vec<Destination>,
    /// One leg per destination, source→d1 first. Unknown legs are zero.
    pub legs: Vec<Leg>,
    pub total_distance_km: f64,
    pub total_duration_hours: f64,
    pub cargo_weight: f64,
    pub cargo_volume: f64,
    pub method: RouteMethod,
    pub efficiency_score: f64,
    /// Produced by the local pipeline after the primary planner failed.
    #[serde(default)]
    pub fallback: bool,
}

impl Route {
    /// `fallback_` prefixed when the route stands in for a failed planner.
    pub fn method_tag(&self) -> String {
        if self.fallback {
            format!("fallback_{}", self.method.tag())
        } else {
            self.method.tag()
        }
    }
}

/// Money figures for one mission. All components are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub base: f64,
    pub fuel: f64,
    pub driver: f64,
    pub maintenance: f64,
    pub toll: f64,
    pub overhead: f64,
    pub total: f64,
}

/// Cargo relative to the assigned vehicle, clamped to [0, 100] for display.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CapacityUtilization {
    pub weight_percentage: f64,
    pub volume_percentage: f64,
    /// Set when the cargo does not fit the vehicle; the percentages alone
    /// would hide it.
    pub overloaded: bool,
}

/// Which optimizer produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOrigin {
    Local,
    RemoteAi,
    Fallback,
}

/// Timing of one stop, in minutes since midnight of the mission day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopSchedule {
    pub destination_id: u64,
    pub arrival_minute: u32,
    pub departure_minute: u32,
}

/// The terminal artifact of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionPlan {
    pub mission_id: String,
    pub name: String,
    pub vehicle: Vehicle,
    pub driver: Option<Driver>,
    pub route: Route,
    pub cost: CostBreakdown,
    pub utilization: CapacityUtilization,
    pub departure_minute: u32,
    pub schedule: Vec<StopSchedule>,
    pub origin: PlanOrigin,
    #[serde(default)]
    pub geometry: Option<crate::route_cache::CachedRoute>,
}

impl MissionPlan {
    pub fn source(&self) -> &Source {
        &self.route.source
    }
}

/// Roll-up over every plan of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub total_missions: usize,
    pub total_vehicles_used: usize,
    pub total_distance_km: f64,
    pub total_cost: f64,
    pub total_duration_hours: f64,
    pub optimization_score: f64,
    pub strategy: String,
    pub reason: String,
}

/// What an optimizer hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub plans: Vec<MissionPlan>,
    pub summary: OptimizationSummary,
    pub origin: PlanOrigin,
}

impl OptimizationOutcome {
    /// Marks every plan as produced by a fallback path.
    pub fn into_fallback(mut self) -> Self {
        self.origin = PlanOrigin::Fallback;
        for plan in &mut self.plans {
            plan.origin = PlanOrigin::Fallback;
            plan.route.fallback = true;
        }
        self
    }
}
