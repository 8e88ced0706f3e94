#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hybrid source selection for the visitor analytics dashboard.
//!
//! [`DashboardService`] is the layer the rendering code talks to: it asks
//! the remote API for pre-aggregated counts (through the time-windowed
//! cache), and on any remote failure degrades to the local registry
//! dataset, then to the hard-coded default dataset. Remote failures are
//! logged, never surfaced — the dashboard always renders something.
//!
//! The detection feed follows the same pattern for the camera endpoints,
//! behind the [`DetectionSource`] seam so a bundled dataset can stand in
//! for the live API.

pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod detections;
pub mod visits;

pub use config::ServiceConfig;
pub use dashboard::DashboardService;
pub use dataset::default_dataset;
pub use detections::{DetectionFeed, DetectionSource, LocalDetections, RemoteDetections};
pub use visits::VisitDataset;

pub use aforo_models::{Series, SeriesPoint};

use aforo_client::ClientError;
use aforo_models::ValidationError;

/// Errors surfaced by the service layer.
///
/// Remote failures never appear here — they are converted into fallback
/// paths internally. What remains is startup trouble (config, datasets,
/// client construction) and the one fail-loud case: a malformed counts
/// payload.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The aggregation boundary rejected a counts payload.
    #[error("malformed counts payload: {0}")]
    Validation(#[from] ValidationError),

    /// The HTTP client could not be constructed.
    #[error("client setup failed: {0}")]
    Client(#[from] ClientError),

    /// A configuration or dataset file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// A bundled or configured dataset is not valid JSON.
    #[error("dataset parse error: {0}")]
    Dataset(#[from] serde_json::Error),
}
