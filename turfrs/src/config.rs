//! Runtime configuration.

use serde::{Deserialize, Serialize};
use turfcore::{
    DEFAULT_CELL_SIZE_DEG, DEFAULT_MAX_CLAIM_CELLS, SessionConfig, TerritoryGrid, TurfError,
};

use crate::error::{AppError, AppResult};

/// Prefix for environment overrides, e.g. `TURF_DB_PATH`.
pub const ENV_PREFIX: &str = "TURF_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurfConfig {
    /// SQLite database file
    pub db_path: String,
    /// Nominatim-compatible geocoder base URL
    pub geocoder_url: String,
    /// OSRM-compatible router base URL
    pub routing_url: String,
    pub user_agent: String,
    pub http_timeout_secs: u64,
    /// Territory cell side in degrees
    pub cell_size_deg: f64,
    /// Largest bounding box, in cells, a single area claim may cover
    pub max_claim_cells: u64,
    /// Samples with worse accuracy are dropped (m, 0 disables)
    pub max_accuracy_m: f64,
    pub geocode_cache_size: usize,
}

impl Default for TurfConfig {
    fn default() -> Self {
        Self {
            db_path: "turf.db".to_string(),
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            routing_url: "https://router.project-osrm.org".to_string(),
            user_agent: concat!("turfrs/", env!("CARGO_PKG_VERSION")).to_string(),
            http_timeout_secs: 30,
            cell_size_deg: DEFAULT_CELL_SIZE_DEG,
            max_claim_cells: DEFAULT_MAX_CLAIM_CELLS,
            max_accuracy_m: 50.0,
            geocode_cache_size: 256,
        }
    }
}

impl TurfConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `TURF_*` environment variables.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `TURF_*` key.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let mut config = Self::default();

        if let Some(v) = get("DB_PATH") {
            config.db_path = v;
        }
        if let Some(v) = get("GEOCODER_URL") {
            config.geocoder_url = v;
        }
        if let Some(v) = get("ROUTING_URL") {
            config.routing_url = v;
        }
        if let Some(v) = get("USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = get("HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = parse_var("HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("CELL_SIZE_DEG") {
            config.cell_size_deg = parse_var("CELL_SIZE_DEG", &v)?;
        }
        if let Some(v) = get("MAX_CLAIM_CELLS") {
            config.max_claim_cells = parse_var("MAX_CLAIM_CELLS", &v)?;
        }
        if let Some(v) = get("MAX_ACCURACY_M") {
            config.max_accuracy_m = parse_var("MAX_ACCURACY_M", &v)?;
        }
        if let Some(v) = get("GEOCODE_CACHE_SIZE") {
            config.geocode_cache_size = parse_var("GEOCODE_CACHE_SIZE", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if !(self.cell_size_deg.is_finite() && self.cell_size_deg > 0.0) {
            return Err(invalid("cell_size_deg must be positive"));
        }
        if self.max_claim_cells == 0 {
            return Err(invalid("max_claim_cells must be at least 1"));
        }
        if self.http_timeout_secs == 0 {
            return Err(invalid("http_timeout_secs must be positive"));
        }
        if self.geocode_cache_size == 0 {
            return Err(invalid("geocode_cache_size must be at least 1"));
        }
        if self.max_accuracy_m.is_nan() || self.max_accuracy_m < 0.0 {
            return Err(invalid("max_accuracy_m must not be negative"));
        }
        Ok(())
    }

    pub fn grid(&self) -> TerritoryGrid {
        TerritoryGrid::new(self.cell_size_deg)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_accuracy_m: self.max_accuracy_m,
        }
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    TurfError::config(message).into()
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> AppResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("{}{} has invalid value '{}'", ENV_PREFIX, name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppError;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = TurfConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.db_path, "turf.db");
        assert_eq!(config.cell_size_deg, 0.0003);
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.max_claim_cells, DEFAULT_MAX_CLAIM_CELLS);
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            TurfConfig::from_json(r#"{"db_path":"/tmp/x.db","geocode_cache_size":8}"#).unwrap();
        assert_eq!(config.db_path, "/tmp/x.db");
        assert_eq!(config.geocode_cache_size, 8);
        assert_eq!(config.max_accuracy_m, 50.0);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        let err = TurfConfig::from_json(r#"{"cell_size_deg":0.0}"#).unwrap_err();
        assert!(matches!(err, AppError::Core(TurfError::Config { .. })));
        assert!(TurfConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TURF_DB_PATH", "runs.db"),
            ("TURF_HTTP_TIMEOUT_SECS", "5"),
            ("TURF_MAX_ACCURACY_M", "0"),
        ]
        .into_iter()
        .collect();
        let config = TurfConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.db_path, "runs.db");
        assert_eq!(config.http_timeout_secs, 5);
        assert_eq!(config.max_accuracy_m, 0.0);
        assert_eq!(config.routing_url, TurfConfig::default().routing_url);
    }

    #[test]
    fn test_from_lookup_bad_number() {
        let err = TurfConfig::from_lookup(|k| {
            (k == "TURF_GEOCODE_CACHE_SIZE").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("TURF_GEOCODE_CACHE_SIZE"));

        let err = TurfConfig::from_lookup(|k| {
            (k == "TURF_GEOCODE_CACHE_SIZE").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("geocode_cache_size"));
    }

    #[test]
    fn test_max_claim_cells() {
        let lookup = |k: &str| (k == "TURF_MAX_CLAIM_CELLS").then(|| "500".to_string());
        let config = TurfConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.max_claim_cells, 500);

        let err = TurfConfig::from_json(r#"{"max_claim_cells":0}"#).unwrap_err();
        assert!(err.to_string().contains("max_claim_cells"));
    }
}
