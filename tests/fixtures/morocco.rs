//! Moroccan locations and builders.
//!
//! City-center coordinates rounded to four decimals. They are routable with
//! an OSRM extract of `africa/morocco`.

use mission_planner::model::{
    Cargo, Destination, Driver, GeoPoint, MissionType, OptimizationProblem, Source, Vehicle,
};

/// A named location with coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Place {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Place {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

// Warehouses (sources)

pub const CASABLANCA_PORT: Place = Place::new("Casablanca Port Warehouse", 33.6060, -7.6130);
pub const TANGER_MED: Place = Place::new("Tanger Med Logistics Zone", 35.8850, -5.5030);
pub const AGADIR_HUB: Place = Place::new("Agadir Distribution Hub", 30.4200, -9.5980);

// Destinations around Casablanca, all within a few kilometers

pub const CASABLANCA_LOCAL: &[Place] = &[
    Place::new("Maarif", 33.5850, -7.6320),
    Place::new("Ain Sebaa", 33.6080, -7.5330),
    Place::new("Sidi Maarouf", 33.5330, -7.6430),
    Place::new("Hay Hassani", 33.5650, -7.6700),
    Place::new("Bouskoura", 33.4490, -7.6490),
];

// Destinations spread across the country

pub const NATIONAL: &[Place] = &[
    Place::new("Rabat", 34.0209, -6.8416),
    Place::new("Kenitra", 34.2610, -6.5802),
    Place::new("Fes", 34.0181, -5.0078),
    Place::new("Meknes", 33.8935, -5.5473),
    Place::new("Marrakech", 31.6295, -7.9811),
    Place::new("Tangier", 35.7595, -5.8340),
    Place::new("Tetouan", 35.5785, -5.3684),
    Place::new("Oujda", 34.6814, -1.9086),
    Place::new("Agadir", 30.4278, -9.5981),
    Place::new("El Jadida", 33.2316, -8.5007),
];

pub fn source(id: u64, place: Place) -> Source {
    Source {
        id,
        name: place.name.to_string(),
        address: format!("{}, Morocco", place.name),
        location: Some(place.point()),
    }
}

pub fn destination(id: u64, place: Place, weight: f64, volume: f64) -> Destination {
    Destination {
        id,
        name: place.name.to_string(),
        address: format!("{}, Morocco", place.name),
        location: Some(place.point()),
        mission_type: MissionType::Delivery,
        cargo: Cargo {
            total_weight: weight,
            total_volume: volume,
            ..Cargo::default()
        },
        sequence: 0,
        service_duration: None,
        expected_arrival_time: None,
    }
}

pub fn destinations(places: &[Place], weight: f64, volume: f64) -> Vec<Destination> {
    places
        .iter()
        .enumerate()
        .map(|(i, place)| destination(100 + i as u64, *place, weight, volume))
        .collect()
}

pub fn vehicle(id: u64, max_payload: f64, cargo_volume: f64) -> Vehicle {
    Vehicle {
        id,
        name: format!("Truck {id}"),
        license_plate: format!("{id}-A-{}", 10 + id),
        max_payload,
        cargo_volume,
        fuel_consumption: Some(28.0),
        equipment: Vec::new(),
        available: true,
    }
}

pub fn drivers() -> Vec<Driver> {
    ["Amina", "Youssef", "Karim"]
        .iter()
        .enumerate()
        .map(|(i, name)| Driver {
            id: i as u64 + 1,
            name: name.to_string(),
        })
        .collect()
}

pub fn problem(sources: Vec<Source>, destinations: Vec<Destination>, vehicles: Vec<Vehicle>) -> OptimizationProblem {
    OptimizationProblem {
        sources,
        destinations,
        vehicles,
        drivers: drivers(),
    }
}

/// Ids of every planned destination, sorted.
pub fn planned_ids(plans: &[mission_planner::MissionPlan]) -> Vec<u64> {
    let mut ids: Vec<u64> = plans
        .iter()
        .flat_map(|p| p.route.destinations.iter().map(|d| d.id))
        .collect();
    ids.sort_unstable();
    ids
}
