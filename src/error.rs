//! Error taxonomy for the planner.
//!
//! Only [`PlannerError`] reaches callers. Road-service and AI failures are
//! recovered locally unless no fallback exists.

use thiserror::Error;

/// Conditions that make a request impossible to plan.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("cannot optimize: no source with usable coordinates")]
    NoSources,
    #[error("cannot optimize: no destination with usable coordinates")]
    NoDestinations,
    #[error("cannot optimize: no vehicles available")]
    NoVehicles,
    #[error("remote optimizer failed: {0}")]
    Remote(#[from] AiError),
}

impl PlannerError {
    /// Input errors cannot be fixed by switching to another optimizer.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PlannerError::NoSources | PlannerError::NoDestinations | PlannerError::NoVehicles
        )
    }
}

/// Failures talking to the road-routing service.
#[derive(Debug, Error)]
pub enum RoadServiceError {
    #[error("road service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("road service answered {code}: {message}")]
    Status { code: String, message: String },
    #[error("road service payload malformed: {0}")]
    Malformed(String),
}

/// Failures of the generative-AI optimizer.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service is not configured (missing API key)")]
    NotConfigured,
    #[error("AI request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AI service rate limited the request")]
    RateLimited,
    #[error("AI service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("AI response has no candidate text")]
    MissingCandidate,
    #[error("AI response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("AI plan violates the response schema: {0}")]
    Schema(String),
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
    #[error("invalid configuration document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Cuts a payload down to something safe to log.
pub(crate) fn truncate_for_log(payload: &str) -> &str {
    const LIMIT: usize = 500;
    if payload.len() <= LIMIT {
        return payload;
    }
    let mut end = LIMIT;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    &payload[..end]
}
