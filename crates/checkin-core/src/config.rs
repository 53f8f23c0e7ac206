use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable overriding `backend.url`
pub const ENV_BACKEND_URL: &str = "CHECKIN_BACKEND_URL";
/// Environment variable overriding `backend.anon_key`
pub const ENV_ANON_KEY: &str = "CHECKIN_ANON_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Hosted backend (REST, auth and realtime share one base URL)
    pub backend: BackendConfig,

    /// Live feed settings
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Weather settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`
    pub url: String,

    /// Public anonymous API key sent as `apikey` on every request
    #[serde(default)]
    pub anon_key: String,
}

impl BackendConfig {
    /// Base URL for table access (`/rest/v1/`)
    pub fn rest_url(&self) -> Result<Url> {
        self.join("rest/v1/")
    }

    /// Base URL for the auth API (`/auth/v1/`)
    pub fn auth_url(&self) -> Result<Url> {
        self.join("auth/v1/")
    }

    /// Websocket endpoint for the realtime service.
    ///
    /// The scheme follows the base URL (`http` -> `ws`, `https` -> `wss`).
    pub fn realtime_url(&self) -> Result<Url> {
        let mut url = self.join("realtime/v1/websocket")?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("Cannot convert {} to a websocket URL", self.url))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }

    fn join(&self, path: &str) -> Result<Url> {
        let mut base = Url::parse(&self.url)
            .with_context(|| format!("Invalid backend URL: {}", self.url))?;
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .with_context(|| format!("Failed to build {} URL", path))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Seconds between websocket heartbeats
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Number of recent check-ins kept in the live feed
    #[serde(default = "default_feed_limit")]
    pub feed_limit: usize,
}

fn default_heartbeat_secs() -> u64 {
    25
}

fn default_feed_limit() -> usize {
    20
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            feed_limit: default_feed_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Location shown when none is given on the command line
    #[serde(default = "default_location")]
    pub default_location: String,
}

fn default_location() -> String {
    "San Francisco".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            default_location: default_location(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("checkin");

        Self {
            config_dir,
            backend: BackendConfig {
                url: "http://localhost:54321".to_string(), // local hosted-stack default
                anon_key: String::new(),
            },
            realtime: RealtimeConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist.
    ///
    /// Environment overrides are applied after the file is read.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit path, writing defaults if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Override backend settings from `CHECKIN_BACKEND_URL` / `CHECKIN_ANON_KEY`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_BACKEND_URL) {
            tracing::debug!("Using backend URL from {}", ENV_BACKEND_URL);
            self.backend.url = url;
        }
        if let Ok(key) = std::env::var(ENV_ANON_KEY) {
            self.backend.anon_key = key;
        }
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.backend.url, "backend.url", &mut result);

        if self.backend.anon_key.trim().is_empty() {
            result.add_warning(
                "backend.anon_key",
                format!("Anon key not configured - set it in config.toml or {}", ENV_ANON_KEY),
            );
        }

        if self.realtime.feed_limit == 0 {
            result.add_error("realtime.feed_limit", "Feed limit must be greater than 0");
        } else if self.realtime.feed_limit > 1000 {
            result.add_warning("realtime.feed_limit", "Feed limit is unusually large (>1000)");
        }

        if self.realtime.heartbeat_secs == 0 {
            result.add_error("realtime.heartbeat_secs", "Heartbeat interval must be greater than 0");
        } else if self.realtime.heartbeat_secs > 60 {
            result.add_warning(
                "realtime.heartbeat_secs",
                "Heartbeat interval above 60s may let the server drop the connection",
            );
        }

        if self.weather.default_location.trim().is_empty() {
            result.add_warning("weather.default_location", "Default location is empty");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("checkin");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        // Default config should be valid (only warnings, no errors)
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_missing_anon_key_is_warning() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "backend.anon_key"));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.backend.url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "backend.url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.backend.url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_feed_limit() {
        let mut config = Config::default();
        config.realtime.feed_limit = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "realtime.feed_limit"));
    }

    #[test]
    fn test_endpoint_urls() {
        let backend = BackendConfig {
            url: "https://demo.example.co".to_string(),
            anon_key: "anon".to_string(),
        };
        assert_eq!(backend.rest_url().unwrap().as_str(), "https://demo.example.co/rest/v1/");
        assert_eq!(backend.auth_url().unwrap().as_str(), "https://demo.example.co/auth/v1/");
        assert_eq!(
            backend.realtime_url().unwrap().as_str(),
            "wss://demo.example.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn test_realtime_url_plain_http() {
        let backend = BackendConfig {
            url: "http://localhost:54321".to_string(),
            anon_key: "k".to_string(),
        };
        assert!(backend.realtime_url().unwrap().as_str().starts_with("ws://localhost:54321/"));
    }

    #[test]
    fn test_load_from_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.realtime.feed_limit, 20);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.backend.url, config.backend.url);
    }

    #[test]
    fn test_partial_file_uses_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
config_dir = "/tmp/checkin"

[backend]
url = "https://demo.example.co"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.backend.anon_key, "");
        assert_eq!(config.realtime.heartbeat_secs, 25);
        assert_eq!(config.weather.default_location, "San Francisco");
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
