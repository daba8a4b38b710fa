//! OSRM HTTP adapter for distance tables and road routes.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{RoadServiceError, truncate_for_log};
use crate::model::GeoPoint;
use crate::polyline::Polyline;
use crate::traits::{RoadRoute, RoadRoutingService, RoadTable};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, RoadServiceError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                body = truncate_for_log(&body),
                "OSRM request failed"
            );
            return Err(RoadServiceError::Status {
                code: status.as_u16().to_string(),
                message: truncate_for_log(&body).to_string(),
            });
        }

        serde_json::from_str(&body).map_err(|err| {
            warn!(error = %err, body = truncate_for_log(&body), "OSRM payload malformed");
            RoadServiceError::Malformed(err.to_string())
        })
    }
}

fn coordinate_path(points: &[GeoPoint]) -> String {
    points
        .iter()
        .map(|p| format!("{:.6},{:.6}", p.longitude, p.latitude))
        .collect::<Vec<_>>()
        .join(";")
}

fn check_code(code: Option<String>, message: Option<String>) -> Result<(), RoadServiceError> {
    match code.as_deref() {
        Some("Ok") => Ok(()),
        other => Err(RoadServiceError::Status {
            code: other.unwrap_or("missing").to_string(),
            message: message.unwrap_or_else(|| "Unknown error".to_string()),
        }),
    }
}

impl RoadRoutingService for OsrmClient {
    fn table(&self, points: &[GeoPoint]) -> Result<RoadTable, RoadServiceError> {
        if points.is_empty() {
            return Ok(RoadTable::default());
        }

        let url = format!(
            "{}/table/v1/{}/{}?annotations=distance,duration",
            self.config.base_url,
            self.config.profile,
            coordinate_path(points)
        );
        debug!(points = points.len(), "requesting OSRM table");

        let body: OsrmTableResponse = self.get(&url)?;
        check_code(body.code, body.message)?;

        let distances = body
            .distances
            .ok_or_else(|| RoadServiceError::Malformed("table has no distances".to_string()))?;

        Ok(RoadTable {
            distances,
            durations: body.durations.unwrap_or_default(),
        })
    }

    fn route(&self, waypoints: &[GeoPoint]) -> Result<RoadRoute, RoadServiceError> {
        let url = format!(
            "{}/route/v1/{}/{}?overview=full&geometries=polyline",
            self.config.base_url,
            self.config.profile,
            coordinate_path(waypoints)
        );
        debug!(waypoints = waypoints.len(), "requesting OSRM route");

        let body: OsrmRouteResponse = self.get(&url)?;
        check_code(body.code, body.message)?;

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RoadServiceError::Malformed("no routes returned".to_string()))?;
        let geometry = match route.geometry.as_deref() {
            Some(encoded) => Polyline::decode(encoded)
                .ok_or_else(|| RoadServiceError::Malformed("undecodable geometry".to_string()))?,
            None => Polyline::default(),
        };

        Ok(RoadRoute {
            distance_m: route.distance,
            duration_s: route.duration,
            geometry,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    code: Option<String>,
    message: Option<String>,
    distances: Option<Vec<Vec<Option<f64>>>>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: Option<String>,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
    geometry: Option<String>,
}
