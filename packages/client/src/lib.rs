#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote HTTP data source for the visitor analytics API.
//!
//! [`ApiClient`] performs one GET per call against a configured base URL,
//! attaching the configured headers (the tunnel-bypass header among them)
//! and a per-request timeout. It does not cache; the service layer owns
//! that.
//!
//! Failures split into a transport/status family and a body-format family
//! so the caller can treat both as "remote unavailable" while still
//! logging what actually went wrong.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use aforo_models::{CountsPayload, DetectionsResponse, TimestampsResponse};

/// Header that tells an ngrok tunnel to skip its browser interstitial.
pub const TUNNEL_BYPASS_HEADER: &str = "ngrok-skip-browser-warning";

/// Default per-request timeout. The original dashboard had none and could
/// hang on a stalled tunnel indefinitely.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur talking to the remote API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport call failed (connect, timeout, TLS, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// The status code received.
        status: StatusCode,
        /// The URL that was requested.
        url: String,
    },

    /// The response body was not the structured data we asked for.
    #[error("malformed response from {url}: {message}")]
    Format {
        /// The URL that was requested.
        url: String,
        /// What was wrong with the body.
        message: String,
    },

    /// A configured header name or value is not a valid HTTP header.
    #[error("invalid header `{name}`")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },
}

impl ClientError {
    /// Whether this is a body-format failure rather than a transport or
    /// status one.
    #[must_use]
    pub const fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}

/// Endpoint paths of the visitor analytics API, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Pre-aggregated counts.
    pub counts: String,
    /// Available detection capture instants.
    pub timestamps: String,
    /// Detections filtered by capture second.
    pub detections: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            counts: "/datos".to_owned(),
            timestamps: "/detecciones/timestamps".to_owned(),
            detections: "/detecciones".to_owned(),
        }
    }
}

/// Configuration for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API (e.g. an ngrok tunnel URL ending in `/api`).
    pub base_url: String,
    /// Headers attached to every request.
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Endpoint paths.
    pub endpoints: Endpoints,
}

impl ClientConfig {
    /// Creates a config for the given base URL with the tunnel-bypass
    /// header and the default timeout and endpoints.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(TUNNEL_BYPASS_HEADER.to_owned(), "true".to_owned());
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            headers,
            timeout: DEFAULT_TIMEOUT,
            endpoints: Endpoints::default(),
        }
    }

    /// Adds a header attached to every request.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the endpoint paths.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

/// HTTP client for the visitor analytics API.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    /// Builds the underlying HTTP client with the configured headers and
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidHeader`] when a configured header is
    /// not a valid HTTP header, or [`ClientError::Http`] when the client
    /// cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| ClientError::InvalidHeader {
                    name: name.clone(),
                })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| ClientError::InvalidHeader {
                    name: name.clone(),
                })?;
            headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { http, config })
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Fetches the pre-aggregated counts payload.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or body-format
    /// failure.
    pub async fn fetch_counts(&self) -> Result<CountsPayload, ClientError> {
        let path = self.config.endpoints.counts.clone();
        self.get_json(&path, &[]).await
    }

    /// Fetches the available detection capture instants.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or body-format
    /// failure.
    pub async fn fetch_timestamps(&self) -> Result<TimestampsResponse, ClientError> {
        let path = self.config.endpoints.timestamps.clone();
        self.get_json(&path, &[]).await
    }

    /// Fetches the detections captured at the given second.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport, status, or body-format
    /// failure.
    pub async fn fetch_detections(&self, second: &str) -> Result<DetectionsResponse, ClientError> {
        let path = self.config.endpoints.detections.clone();
        self.get_json(&path, &[("segundo", second)]).await
    }

    /// Lightweight reachability probe against the counts endpoint. Never
    /// fails; an unreachable or misbehaving remote reports `false`.
    pub async fn probe(&self) -> bool {
        match self.fetch_counts().await {
            Ok(_) => true,
            Err(err) => {
                log::debug!("probe against {} failed: {err}", self.config.base_url);
                false
            }
        }
    }

    /// Performs one GET and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.config.base_url);

        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status { status, url });
        }

        // A tunnel interstitial or error page announces itself by content
        // type before it ruins the JSON parse.
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !content_type.contains("json") {
            return Err(ClientError::Format {
                url,
                message: format!("expected JSON, got content type `{content_type}`"),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| ClientError::Format {
            url,
            message: err.to_string(),
        })
    }
}
