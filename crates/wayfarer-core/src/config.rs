use crate::error::{Result, WayfarerError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for the correlation engine.
///
/// Precedence: defaults < TOML file < `WAYFARER_*` environment
/// variables < CLI overrides (supplied by the CLI layer).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Radius for assigning photos/reviews to a region center
    pub region_radius_miles: ConfigValue<f64>,
    /// Tight radius for linking a photo to a specific place
    pub place_radius_miles: ConfigValue<f64>,
    /// Tolerance for fuzzy review-to-place matching
    pub review_tolerance_miles: ConfigValue<f64>,
    /// Same-region events closer than this collapse to one visit
    pub dedup_window_hours: ConfigValue<i64>,
    /// Cache entries older than this are treated as misses
    pub cache_ttl_days: ConfigValue<i64>,
    /// Base URL of the reverse-geocoding service
    pub geocoder_endpoint: ConfigValue<String>,
    /// User-Agent sent on upstream requests
    pub user_agent: ConfigValue<String>,
    /// Minimum spacing between upstream geocoder calls
    pub rate_limit_secs: ConfigValue<f64>,
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            region_radius_miles: ConfigValue::new(10.0, ConfigSource::Default),
            place_radius_miles: ConfigValue::new(0.1, ConfigSource::Default),
            review_tolerance_miles: ConfigValue::new(0.25, ConfigSource::Default),
            dedup_window_hours: ConfigValue::new(24, ConfigSource::Default),
            cache_ttl_days: ConfigValue::new(30, ConfigSource::Default),
            geocoder_endpoint: ConfigValue::new(
                "https://nominatim.openstreetmap.org".to_string(),
                ConfigSource::Default,
            ),
            user_agent: ConfigValue::new("wayfarer/0.1".to_string(), ConfigSource::Default),
            rate_limit_secs: ConfigValue::new(1.0, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| WayfarerError::ConfigInvalid {
            key: "file".to_string(),
            reason: format!("Failed to read config file: {}", e),
        })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| WayfarerError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(v) = file_config.region_radius_miles {
            self.region_radius_miles.update(v, ConfigSource::File);
        }
        if let Some(v) = file_config.place_radius_miles {
            self.place_radius_miles.update(v, ConfigSource::File);
        }
        if let Some(v) = file_config.review_tolerance_miles {
            self.review_tolerance_miles.update(v, ConfigSource::File);
        }
        if let Some(v) = file_config.dedup_window_hours {
            self.dedup_window_hours.update(v, ConfigSource::File);
        }
        if let Some(v) = file_config.cache_ttl_days {
            self.cache_ttl_days.update(v, ConfigSource::File);
        }
        if let Some(v) = file_config.geocoder_endpoint {
            self.geocoder_endpoint.update(v, ConfigSource::File);
        }
        if let Some(v) = file_config.user_agent {
            self.user_agent.update(v, ConfigSource::File);
        }
        if let Some(v) = file_config.rate_limit_secs {
            self.rate_limit_secs.update(v, ConfigSource::File);
        }

        self.validate()?;
        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Result<Self> {
        if let Ok(raw) = env::var("WAYFARER_REGION_RADIUS_MILES") {
            match raw.parse::<f64>() {
                Ok(v) => self.region_radius_miles.update(v, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid WAYFARER_REGION_RADIUS_MILES value '{}': expected a number",
                    raw
                ),
            }
        }

        if let Ok(raw) = env::var("WAYFARER_PLACE_RADIUS_MILES") {
            match raw.parse::<f64>() {
                Ok(v) => self.place_radius_miles.update(v, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid WAYFARER_PLACE_RADIUS_MILES value '{}': expected a number",
                    raw
                ),
            }
        }

        if let Ok(raw) = env::var("WAYFARER_REVIEW_TOLERANCE_MILES") {
            match raw.parse::<f64>() {
                Ok(v) => self
                    .review_tolerance_miles
                    .update(v, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid WAYFARER_REVIEW_TOLERANCE_MILES value '{}': expected a number",
                    raw
                ),
            }
        }

        if let Ok(raw) = env::var("WAYFARER_DEDUP_WINDOW_HOURS") {
            match raw.parse::<i64>() {
                Ok(v) => self.dedup_window_hours.update(v, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid WAYFARER_DEDUP_WINDOW_HOURS value '{}': expected whole hours",
                    raw
                ),
            }
        }

        if let Ok(raw) = env::var("WAYFARER_CACHE_TTL_DAYS") {
            match raw.parse::<i64>() {
                Ok(v) => self.cache_ttl_days.update(v, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid WAYFARER_CACHE_TTL_DAYS value '{}': expected whole days",
                    raw
                ),
            }
        }

        if let Ok(v) = env::var("WAYFARER_GEOCODER_ENDPOINT") {
            self.geocoder_endpoint.update(v, ConfigSource::Environment);
        }

        if let Ok(v) = env::var("WAYFARER_USER_AGENT") {
            self.user_agent.update(v, ConfigSource::Environment);
        }

        if let Ok(raw) = env::var("WAYFARER_RATE_LIMIT_SECS") {
            match raw.parse::<f64>() {
                Ok(v) => self.rate_limit_secs.update(v, ConfigSource::Environment),
                Err(_) => tracing::warn!(
                    "Invalid WAYFARER_RATE_LIMIT_SECS value '{}': expected seconds",
                    raw
                ),
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(v) = overrides.region_radius_miles {
            self.region_radius_miles.update(v, ConfigSource::Cli);
        }
        if let Some(v) = overrides.place_radius_miles {
            self.place_radius_miles.update(v, ConfigSource::Cli);
        }
        if let Some(v) = overrides.review_tolerance_miles {
            self.review_tolerance_miles.update(v, ConfigSource::Cli);
        }
        if let Some(v) = overrides.dedup_window_hours {
            self.dedup_window_hours.update(v, ConfigSource::Cli);
        }
        if let Some(v) = overrides.cache_ttl_days {
            self.cache_ttl_days.update(v, ConfigSource::Cli);
        }
        if let Some(v) = overrides.geocoder_endpoint {
            self.geocoder_endpoint.update(v, ConfigSource::Cli);
        }
        if let Some(v) = overrides.user_agent {
            self.user_agent.update(v, ConfigSource::Cli);
        }
        if let Some(v) = overrides.rate_limit_secs {
            self.rate_limit_secs.update(v, ConfigSource::Cli);
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.region_radius_miles.value <= 0.0 {
            return Err(WayfarerError::ConfigInvalid {
                key: "region_radius_miles".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.place_radius_miles.value <= 0.0 {
            return Err(WayfarerError::ConfigInvalid {
                key: "place_radius_miles".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.dedup_window_hours.value < 0 {
            return Err(WayfarerError::ConfigInvalid {
                key: "dedup_window_hours".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        if self.cache_ttl_days.value < 0 {
            return Err(WayfarerError::ConfigInvalid {
                key: "cache_ttl_days".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        if self.rate_limit_secs.value < 0.0 {
            return Err(WayfarerError::ConfigInvalid {
                key: "rate_limit_secs".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "region_radius_miles".to_string(),
            (
                self.region_radius_miles.value.to_string(),
                self.region_radius_miles.source,
            ),
        );
        map.insert(
            "place_radius_miles".to_string(),
            (
                self.place_radius_miles.value.to_string(),
                self.place_radius_miles.source,
            ),
        );
        map.insert(
            "review_tolerance_miles".to_string(),
            (
                self.review_tolerance_miles.value.to_string(),
                self.review_tolerance_miles.source,
            ),
        );
        map.insert(
            "dedup_window_hours".to_string(),
            (
                self.dedup_window_hours.value.to_string(),
                self.dedup_window_hours.source,
            ),
        );
        map.insert(
            "cache_ttl_days".to_string(),
            (
                self.cache_ttl_days.value.to_string(),
                self.cache_ttl_days.source,
            ),
        );
        map.insert(
            "geocoder_endpoint".to_string(),
            (
                self.geocoder_endpoint.value.clone(),
                self.geocoder_endpoint.source,
            ),
        );
        map.insert(
            "user_agent".to_string(),
            (self.user_agent.value.clone(), self.user_agent.source),
        );
        map.insert(
            "rate_limit_secs".to_string(),
            (
                self.rate_limit_secs.value.to_string(),
                self.rate_limit_secs.source,
            ),
        );

        map
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    region_radius_miles: Option<f64>,
    place_radius_miles: Option<f64>,
    review_tolerance_miles: Option<f64>,
    dedup_window_hours: Option<i64>,
    cache_ttl_days: Option<i64>,
    geocoder_endpoint: Option<String>,
    user_agent: Option<String>,
    rate_limit_secs: Option<f64>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub region_radius_miles: Option<f64>,
    pub place_radius_miles: Option<f64>,
    pub review_tolerance_miles: Option<f64>,
    pub dedup_window_hours: Option<i64>,
    pub cache_ttl_days: Option<i64>,
    pub geocoder_endpoint: Option<String>,
    pub user_agent: Option<String>,
    pub rate_limit_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::with_defaults();
        assert_eq!(config.region_radius_miles.value, 10.0);
        assert_eq!(config.place_radius_miles.value, 0.1);
        assert_eq!(config.dedup_window_hours.value, 24);
        assert_eq!(config.cache_ttl_days.value, 30);
        assert_eq!(config.rate_limit_secs.value, 1.0);
        assert_eq!(config.region_radius_miles.source, ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_precedence() {
        let mut value = ConfigValue::new(100, ConfigSource::Default);

        value.update(200, ConfigSource::File);
        assert_eq!(value.value, 200);
        assert_eq!(value.source, ConfigSource::File);

        value.update(300, ConfigSource::Environment);
        assert_eq!(value.value, 300);

        value.update(400, ConfigSource::Cli);
        assert_eq!(value.value, 400);

        // Lower precedence should not override
        value.update(500, ConfigSource::File);
        assert_eq!(value.value, 400);
        assert_eq!(value.source, ConfigSource::Cli);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
region_radius_miles = 25.0
dedup_window_hours = 48
user_agent = "wayfarer-test/0.0"
"#
        )
        .unwrap();

        let config = EngineConfig::with_defaults()
            .load_from_file(file.path())
            .unwrap();

        assert_eq!(config.region_radius_miles.value, 25.0);
        assert_eq!(config.region_radius_miles.source, ConfigSource::File);
        assert_eq!(config.dedup_window_hours.value, 48);
        assert_eq!(config.user_agent.value, "wayfarer-test/0.0");
        // Untouched keys keep their defaults.
        assert_eq!(config.place_radius_miles.source, ConfigSource::Default);
    }

    #[test]
    fn test_load_from_file_rejects_bad_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "region_radius_miles = -1.0").unwrap();

        let result = EngineConfig::with_defaults().load_from_file(file.path());
        assert!(matches!(
            result,
            Err(WayfarerError::ConfigInvalid { ref key, .. }) if key == "region_radius_miles"
        ));
    }

    #[test]
    fn test_env_layer_applies_and_validates() {
        // One test owns both env vars so parallel test runs never see a
        // half-set environment.
        env::set_var("WAYFARER_USER_AGENT", "wayfarer-env/0.0");
        let config = EngineConfig::with_defaults().load_from_env().unwrap();
        env::remove_var("WAYFARER_USER_AGENT");

        assert_eq!(config.user_agent.value, "wayfarer-env/0.0");
        assert_eq!(config.user_agent.source, ConfigSource::Environment);

        env::set_var("WAYFARER_REGION_RADIUS_MILES", "-1");
        let result = EngineConfig::with_defaults().load_from_env();
        env::remove_var("WAYFARER_REGION_RADIUS_MILES");

        assert!(matches!(
            result,
            Err(WayfarerError::ConfigInvalid { ref key, .. }) if key == "region_radius_miles"
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = EngineConfig::with_defaults();

        let overrides = CliConfigOverrides {
            region_radius_miles: Some(5.0),
            cache_ttl_days: Some(7),
            ..Default::default()
        };

        config.update_from_cli(overrides);

        assert_eq!(config.region_radius_miles.value, 5.0);
        assert_eq!(config.region_radius_miles.source, ConfigSource::Cli);
        assert_eq!(config.cache_ttl_days.value, 7);
        assert_eq!(config.dedup_window_hours.source, ConfigSource::Default);
    }

    #[test]
    fn test_inspection_map() {
        let config = EngineConfig::with_defaults();
        let map = config.to_inspection_map();

        assert!(map.contains_key("region_radius_miles"));
        assert!(map.contains_key("user_agent"));

        let (value, source) = &map["dedup_window_hours"];
        assert_eq!(value, "24");
        assert_eq!(*source, ConfigSource::Default);
    }
}
