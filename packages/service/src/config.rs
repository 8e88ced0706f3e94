//! Service configuration.
//!
//! One [`ServiceConfig`] is loaded at startup (TOML file plus environment
//! overrides) and injected into the services that need it. There are no
//! global singletons; tests construct their own configs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aforo_aggregate::AggregateOptions;
use aforo_client::{ClientConfig, Endpoints, TUNNEL_BYPASS_HEADER};
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Environment variable overriding the configured base URL.
pub const ENV_BASE_URL: &str = "AFORO_BASE_URL";
/// Environment variable overriding the remote/local source flag.
pub const ENV_USE_REMOTE: &str = "AFORO_USE_REMOTE";

/// Where the bundled-or-configured datasets come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetPaths {
    /// Path to the person registry JSON. `None` uses the bundled dataset
    /// when `bundled` is set, otherwise no local registry exists.
    pub persons: Option<PathBuf>,
    /// Path to the detections JSON (MongoDB extended-JSON export).
    pub detections: Option<PathBuf>,
    /// Path to the zone visitor samples JSON.
    pub visits: Option<PathBuf>,
}

/// Top-level configuration of the analytics layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the remote API.
    pub base_url: String,
    /// Headers attached to every remote request.
    pub headers: BTreeMap<String, String>,
    /// Cache time-to-live in milliseconds.
    pub cache_ttl_ms: u64,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Whether the remote API is consulted at all.
    pub use_remote: bool,
    /// Whether missing dataset paths fall back to the bundled datasets.
    pub bundled_datasets: bool,
    /// Minute width of detection timeline groups.
    pub detection_group_minutes: u32,
    /// Remote endpoint paths.
    pub endpoints: Endpoints,
    /// Aggregation behavior knobs.
    pub aggregate: AggregateOptions,
    /// Dataset locations.
    pub datasets: DatasetPaths,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(TUNNEL_BYPASS_HEADER.to_owned(), "true".to_owned());
        Self {
            base_url: "http://localhost:8080/api".to_owned(),
            headers,
            cache_ttl_ms: 30_000,
            timeout_ms: 10_000,
            use_remote: true,
            bundled_datasets: true,
            detection_group_minutes: 5,
            endpoints: Endpoints::default(),
            aggregate: AggregateOptions::default(),
            datasets: DatasetPaths::default(),
        }
    }
}

impl ServiceConfig {
    /// Parses a configuration from TOML text. Missing keys take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] when the text is not valid TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ServiceError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Io`] when the file cannot be read and
    /// [`ServiceError::Config`] when it is not valid TOML.
    pub fn from_path(path: &Path) -> Result<Self, ServiceError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Applies environment overrides: `AFORO_BASE_URL` replaces the base
    /// URL and `AFORO_USE_REMOTE` (`true`/`false`/`1`/`0`) the source flag.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base_url) = std::env::var(ENV_BASE_URL)
            && !base_url.is_empty()
        {
            self.base_url = base_url;
        }
        if let Ok(flag) = std::env::var(ENV_USE_REMOTE) {
            match flag.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.use_remote = true,
                "false" | "0" | "no" => self.use_remote = false,
                other => log::warn!("ignoring unrecognized {ENV_USE_REMOTE}={other}"),
            }
        }
        self
    }

    /// The cache time-to-live.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Builds the HTTP client configuration for this service config.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.base_url)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_endpoints(self.endpoints.clone());
        for (name, value) in &self.headers {
            config = config.with_header(name, value);
        }
        config
    }
}
