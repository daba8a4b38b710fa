//! Planner configuration.
//!
//! Every field has a default. Documents and environment variables only need
//! to name what they change.

use std::str::FromStr;

use serde::Deserialize;

use crate::assembler::AssemblerOptions;
use crate::cost::CostParameters;
use crate::error::ConfigError;
use crate::gemini::GeminiConfig;
use crate::haversine::DEFAULT_SPEED_KMH;
use crate::osrm::OsrmConfig;
use crate::sequencer::SequencerOptions;
use crate::splitter::SplitThresholds;

pub const ENV_PREFIX: &str = "MISSION_PLANNER_";
pub const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// When false the matrix is haversine-only and no geometry is fetched.
    pub use_road_service: bool,
    pub osrm: OsrmConfig,
    /// `None` disables the remote optimizer.
    pub gemini: Option<GeminiConfig>,
    pub fallback_speed_kmh: f64,
    pub cost: CostParameters,
    pub thresholds: SplitThresholds,
    pub sequencer: SequencerOptions,
    pub assembler: AssemblerOptions,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            use_road_service: true,
            osrm: OsrmConfig::default(),
            gemini: None,
            fallback_speed_kmh: DEFAULT_SPEED_KMH,
            cost: CostParameters::default(),
            thresholds: SplitThresholds::default(),
            sequencer: SequencerOptions::default(),
            assembler: AssemblerOptions::default(),
        }
    }
}

impl PlannerConfig {
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Reads `MISSION_PLANNER_*` variables and `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`PlannerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let vars = Vars { lookup: &lookup };

        vars.set("USE_ROAD_SERVICE", &mut config.use_road_service)?;
        vars.set("OSRM_URL", &mut config.osrm.base_url)?;
        vars.set("OSRM_PROFILE", &mut config.osrm.profile)?;
        vars.set("OSRM_TIMEOUT_SECS", &mut config.osrm.timeout_secs)?;
        vars.set("FALLBACK_SPEED_KMH", &mut config.fallback_speed_kmh)?;

        let cost = &mut config.cost;
        vars.set("FUEL_PRICE_PER_LITER", &mut cost.fuel_price_per_liter)?;
        vars.set("DRIVER_COST_PER_HOUR", &mut cost.driver_cost_per_hour)?;
        vars.set("MAINTENANCE_COST_PER_KM", &mut cost.maintenance_cost_per_km)?;
        vars.set("TOLL_COST_PER_KM", &mut cost.toll_cost_per_km)?;
        vars.set("BASE_MISSION_COST", &mut cost.base_mission_cost)?;
        vars.set("OVERHEAD_PERCENTAGE", &mut cost.overhead_percentage)?;
        vars.set("DEFAULT_FUEL_CONSUMPTION", &mut cost.default_fuel_consumption)?;

        let thresholds = &mut config.thresholds;
        vars.set("SMALL_ROUTE_MAX_DESTINATIONS", &mut thresholds.small_route_max_destinations)?;
        vars.set("SMALL_LOAD_RATIO", &mut thresholds.small_load_ratio)?;
        vars.set("COMPACT_SPREAD_DEGREES", &mut thresholds.compact_spread_degrees)?;
        vars.set("DISPERSED_SPREAD_DEGREES", &mut thresholds.dispersed_spread_degrees)?;
        vars.set("MAX_CLUSTERS", &mut thresholds.max_clusters)?;
        vars.set("KMEANS_ROUNDS", &mut thresholds.kmeans_rounds)?;
        vars.set("KMEANS_SEED", &mut thresholds.kmeans_seed)?;

        vars.set("TWO_OPT_MAX_PASSES", &mut config.sequencer.two_opt_max_passes)?;
        vars.set("TARGET_UTILIZATION", &mut config.assembler.target_utilization)?;
        vars.set("DEPARTURE_HOUR", &mut config.assembler.departure_hour)?;

        if let Some(key) = lookup(GEMINI_KEY_VAR).filter(|k| !k.trim().is_empty()) {
            let mut gemini = GeminiConfig {
                api_key: Some(key),
                ..GeminiConfig::default()
            };
            vars.set("GEMINI_MODEL", &mut gemini.model)?;
            vars.set("GEMINI_TIMEOUT_SECS", &mut gemini.timeout_secs)?;
            config.gemini = Some(gemini);
        }

        Ok(config)
    }
}

struct Vars<'a, F> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn set<T: FromStr>(&self, name: &str, target: &mut T) -> Result<(), ConfigError> {
        let key = format!("{ENV_PREFIX}{name}");
        let Some(raw) = (self.lookup)(&key) else {
            return Ok(());
        };
        *target = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert!(config.use_road_service);
        assert!(config.gemini.is_none());
        assert_eq!(config.fallback_speed_kmh, 50.0);
        assert_eq!(config.thresholds.max_clusters, 4);
        assert_eq!(config.sequencer.two_opt_max_passes, 50);
    }

    #[test]
    fn test_partial_json_document() {
        let config = PlannerConfig::from_json_str(
            r#"{"cost": {"fuel_price_per_liter": 14.5}, "thresholds": {"kmeans_seed": 7}, "gemini": {"api_key": "k"}}"#,
        )
        .expect("config");
        assert_eq!(config.cost.fuel_price_per_liter, 14.5);
        assert_eq!(config.cost.base_mission_cost, 50.0);
        assert_eq!(config.thresholds.kmeans_seed, 7);
        let gemini = config.gemini.expect("gemini section");
        assert_eq!(gemini.timeout_secs, 90);
        assert_eq!(gemini.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_bad_document() {
        assert!(matches!(
            PlannerConfig::from_json_str("{not json"),
            Err(ConfigError::Document(_))
        ));
    }

    #[test]
    fn test_lookup_overrides_and_gemini_key() {
        let config = PlannerConfig::from_lookup(lookup(&[
            ("MISSION_PLANNER_OSRM_URL", "http://localhost:5000"),
            ("MISSION_PLANNER_TOLL_COST_PER_KM", " 0.5 "),
            ("MISSION_PLANNER_USE_ROAD_SERVICE", "false"),
            ("GEMINI_API_KEY", "secret"),
            ("MISSION_PLANNER_GEMINI_MODEL", "gemini-pro"),
        ]))
        .expect("config");

        assert_eq!(config.osrm.base_url, "http://localhost:5000");
        assert_eq!(config.cost.toll_cost_per_km, 0.5);
        assert!(!config.use_road_service);
        let gemini = config.gemini.expect("gemini enabled");
        assert_eq!(gemini.api_key.as_deref(), Some("secret"));
        assert_eq!(gemini.model, "gemini-pro");
    }

    #[test]
    fn test_lookup_rejects_unparseable_numbers() {
        let err = PlannerConfig::from_lookup(lookup(&[("MISSION_PLANNER_MAX_CLUSTERS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MISSION_PLANNER_MAX_CLUSTERS"));
    }
}
