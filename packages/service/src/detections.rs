//! Camera detection feed: timestamps, per-second detections, heatmap
//! coordinates, and the timeline grouping.
//!
//! [`DetectionSource`] is the seam between the live API and the bundled
//! dataset. Both implementations are infallible by contract: a source that
//! cannot answer returns the `success: false` empty shapes, so the map
//! view always has something to draw.

use std::collections::BTreeMap;

use aforo_aggregate::{TimeReference, samples};
use aforo_cache::TimedCache;
use aforo_client::ApiClient;
use aforo_models::{DetectionRecord, DetectionsResponse, TimestampsResponse, ext_json};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::dataset::load_detections;
use crate::{ServiceConfig, ServiceError};

const TIMESTAMPS_KEY: &str = "timestamps";

/// A provider of detection timestamps and per-second detection records.
#[async_trait]
pub trait DetectionSource: Send + Sync {
    /// The available capture instants.
    async fn timestamps(&self) -> TimestampsResponse;

    /// The detections captured at the given second.
    async fn detections_at(&self, second: &str) -> DetectionsResponse;
}

/// Live detection source backed by the remote API.
///
/// Timestamps are cached under the service TTL; per-second detections are
/// cached without expiry — a capture instant's detections never change.
pub struct RemoteDetections {
    client: ApiClient,
    timestamps: Mutex<TimedCache<&'static str, TimestampsResponse>>,
    detections: Mutex<TimedCache<String, DetectionsResponse>>,
}

impl RemoteDetections {
    /// Builds the source from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Client`] when the HTTP client cannot be
    /// built.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ApiClient::new(config.client_config())?,
            timestamps: Mutex::new(TimedCache::new(config.cache_ttl())),
            detections: Mutex::new(TimedCache::new(config.cache_ttl())),
        })
    }
}

#[async_trait]
impl DetectionSource for RemoteDetections {
    async fn timestamps(&self) -> TimestampsResponse {
        let mut cache = self.timestamps.lock().await;
        if let Some(hit) = cache.get(&TIMESTAMPS_KEY) {
            return hit.clone();
        }

        match self.client.fetch_timestamps().await {
            Ok(response) => {
                cache.put(TIMESTAMPS_KEY, response.clone());
                response
            }
            Err(err) => {
                if let Some(stale) = cache.get_stale(&TIMESTAMPS_KEY) {
                    log::warn!("timestamps refresh failed, serving stale list: {err}");
                    return stale.clone();
                }
                log::warn!("timestamps unavailable: {err}");
                TimestampsResponse::default()
            }
        }
    }

    async fn detections_at(&self, second: &str) -> DetectionsResponse {
        {
            let cache = self.detections.lock().await;
            // Detections for a past instant are immutable; any stored
            // answer is good.
            if let Some(hit) = cache.get_stale(&second.to_owned()) {
                return hit.clone();
            }
        }

        match self.client.fetch_detections(second).await {
            Ok(response) => {
                self.detections
                    .lock()
                    .await
                    .put(second.to_owned(), response.clone());
                response
            }
            Err(err) => {
                log::warn!("detections for {second} unavailable: {err}");
                DetectionsResponse::empty_for(second)
            }
        }
    }
}

/// Detection source backed by the bundled (or configured) dataset.
pub struct LocalDetections {
    records: Vec<DetectionRecord>,
}

impl LocalDetections {
    /// Loads the dataset per the config's dataset paths.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the dataset cannot be read or parsed.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let records =
            load_detections(config.datasets.detections.as_deref(), config.bundled_datasets)?;
        Ok(Self { records })
    }

    /// Wraps an explicit record set.
    #[must_use]
    pub const fn from_records(records: Vec<DetectionRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl DetectionSource for LocalDetections {
    async fn timestamps(&self) -> TimestampsResponse {
        let mut instants: Vec<DateTime<Utc>> =
            self.records.iter().map(|record| record.timestamp).collect();
        instants.sort_unstable();
        instants.dedup();

        let timestamps: Vec<String> = instants
            .iter()
            .map(DateTime::to_rfc3339)
            .collect();
        TimestampsResponse {
            success: true,
            total: timestamps.len() as u64,
            timestamps,
        }
    }

    async fn detections_at(&self, second: &str) -> DetectionsResponse {
        let Ok(target) = ext_json::parse_instant(second) else {
            log::warn!("unparseable detection timestamp `{second}`");
            return DetectionsResponse::empty_for(second);
        };

        let detecciones: Vec<DetectionRecord> = self
            .records
            .iter()
            .filter(|record| record.timestamp == target)
            .cloned()
            .collect();
        DetectionsResponse {
            success: true,
            parametro: Some(second.to_owned()),
            total_encontradas: detecciones.len() as u64,
            detecciones,
        }
    }
}

/// Chart-facing helpers over a [`DetectionSource`].
pub struct DetectionFeed<S> {
    source: S,
    group_minutes: u32,
    time_reference: TimeReference,
}

impl<S: DetectionSource> DetectionFeed<S> {
    /// Wraps a source with the configured timeline grouping.
    #[must_use]
    pub const fn new(source: S, group_minutes: u32, time_reference: TimeReference) -> Self {
        Self {
            source,
            group_minutes,
            time_reference,
        }
    }

    /// Distinct capture instants, most recent first.
    pub async fn unique_timestamps(&self) -> Vec<String> {
        let response = self.source.timestamps().await;
        if !response.success {
            return Vec::new();
        }
        let mut unique = response.timestamps;
        unique.sort_unstable();
        unique.dedup();
        unique.reverse();
        unique
    }

    /// Capture instants grouped into the configured minute intervals.
    pub async fn grouped(&self) -> BTreeMap<String, u64> {
        let response = self.source.timestamps().await;
        if !response.success {
            return BTreeMap::new();
        }

        let instants: Vec<DateTime<Utc>> = response
            .timestamps
            .iter()
            .filter_map(|text| ext_json::parse_instant(text).ok())
            .collect();
        samples::group_timestamps(&instants, self.group_minutes, self.time_reference)
    }

    /// All detected coordinates at the given instant, or at the most
    /// recent instant when `at` is `None`. Empty when nothing is
    /// available.
    pub async fn heatmap_coordinates(&self, at: Option<&str>) -> Vec<[f64; 2]> {
        let target = match at {
            Some(second) => second.to_owned(),
            None => match self.unique_timestamps().await.into_iter().next() {
                Some(latest) => latest,
                None => return Vec::new(),
            },
        };

        let response = self.source.detections_at(&target).await;
        if !response.success {
            return Vec::new();
        }
        response
            .detecciones
            .into_iter()
            .flat_map(|record| record.coordenadas)
            .collect()
    }
}
