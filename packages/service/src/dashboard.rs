//! The hybrid source selector behind the dashboard's charts.
//!
//! Every accessor follows the same ladder: fresh cache, remote fetch,
//! stale cache, local registry, default dataset. Only a malformed payload
//! (a [`aforo_models::ValidationError`]) climbs back out as an error.

use std::sync::atomic::{AtomicBool, Ordering};

use aforo_aggregate::{AggregateOptions, counts, records};
use aforo_cache::TimedCache;
use aforo_client::ApiClient;
use aforo_models::{CountsPayload, CrossTable, PersonRecord, Series};
use tokio::sync::Mutex;

use crate::dataset::{default_dataset, load_persons};
use crate::{ServiceConfig, ServiceError};

const COUNTS_KEY: &str = "datos";

/// Chooses between the remote counts API and the local registry dataset,
/// falling back on remote failure.
pub struct DashboardService {
    client: ApiClient,
    /// The async mutex is held across the refresh await, so concurrent
    /// callers of the same key get at most one in-flight fetch; followers
    /// wake up to a fresh cache hit.
    cache: Mutex<TimedCache<&'static str, CountsPayload>>,
    registry: Vec<PersonRecord>,
    options: AggregateOptions,
    use_remote: AtomicBool,
}

impl DashboardService {
    /// Builds the service from configuration, loading the local registry
    /// dataset per the config's dataset paths.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the HTTP client cannot be built or
    /// the registry dataset cannot be read or parsed.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let registry = load_persons(config.datasets.persons.as_deref(), config.bundled_datasets)?;
        Self::with_registry(config, registry)
    }

    /// Builds the service with an explicit registry dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Client`] when the HTTP client cannot be
    /// built.
    pub fn with_registry(
        config: &ServiceConfig,
        registry: Vec<PersonRecord>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ApiClient::new(config.client_config())?,
            cache: Mutex::new(TimedCache::new(config.cache_ttl())),
            registry,
            options: config.aggregate,
            use_remote: AtomicBool::new(config.use_remote),
        })
    }

    /// Switches between the remote API and the local registry at runtime.
    pub fn set_source(&self, use_remote: bool) {
        log::info!(
            "data source set to {}",
            if use_remote { "remote" } else { "local" }
        );
        self.use_remote.store(use_remote, Ordering::Relaxed);
    }

    /// Whether the remote API is currently consulted.
    #[must_use]
    pub fn uses_remote(&self) -> bool {
        self.use_remote.load(Ordering::Relaxed)
    }

    /// Age range series.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] on a malformed counts payload.
    pub async fn age_series(&self) -> Result<Series, ServiceError> {
        if self.uses_remote() {
            match self.remote_counts().await {
                Ok(payload) => return Ok(counts::ages(&payload)?),
                Err(err) => log::warn!("remote age data unavailable, using local data: {err}"),
            }
        }
        if self.registry.is_empty() {
            return Ok(counts::ages(&self.last_resort())?);
        }
        Ok(records::ages(&self.registry))
    }

    /// Hourly visitor series.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] on a malformed counts payload.
    pub async fn hourly_series(&self) -> Result<Series, ServiceError> {
        if self.uses_remote() {
            match self.remote_counts().await {
                Ok(payload) => return Ok(counts::hours(&payload, &self.options)?),
                Err(err) => log::warn!("remote hourly data unavailable, using local data: {err}"),
            }
        }
        if self.registry.is_empty() {
            return Ok(counts::hours(&self.last_resort(), &self.options)?);
        }
        Ok(records::hours(&self.registry, &self.options))
    }

    /// Gender series.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] on a malformed counts payload.
    pub async fn gender_series(&self) -> Result<Series, ServiceError> {
        if self.uses_remote() {
            match self.remote_counts().await {
                Ok(payload) => return Ok(counts::genders(&payload)?),
                Err(err) => log::warn!("remote gender data unavailable, using local data: {err}"),
            }
        }
        if self.registry.is_empty() {
            return Ok(counts::genders(&self.last_resort())?);
        }
        Ok(records::genders(&self.registry))
    }

    /// Visitor type series, optionally filtered by an exact gender match.
    ///
    /// The remote counts carry no per-gender breakdown, so a non-empty
    /// filter only applies on the local path.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] on a malformed counts payload.
    pub async fn type_series(&self, gender_filter: &str) -> Result<Series, ServiceError> {
        if self.uses_remote() {
            match self.remote_counts().await {
                Ok(payload) => {
                    if !gender_filter.is_empty() {
                        log::debug!("gender filter `{gender_filter}` ignored on remote type data");
                    }
                    return Ok(counts::types(&payload, &self.options)?);
                }
                Err(err) => log::warn!("remote type data unavailable, using local data: {err}"),
            }
        }
        if self.registry.is_empty() {
            return Ok(counts::types(&self.last_resort(), &self.options)?);
        }
        Ok(records::types(&self.registry, gender_filter, &self.options))
    }

    /// The age-by-type cross table. API-only: the registry has no
    /// equivalent, so remote failure degrades straight to the default
    /// dataset.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] on a malformed counts payload.
    pub async fn cross_table(&self) -> Result<CrossTable, ServiceError> {
        if self.uses_remote() {
            match self.remote_counts().await {
                Ok(payload) => return Ok(counts::cross_table(&payload)?),
                Err(err) => {
                    log::warn!("remote cross table unavailable, using default dataset: {err}");
                }
            }
        }
        Ok(counts::cross_table(&self.last_resort())?)
    }

    /// Lightweight reachability probe. Never fails.
    pub async fn check_remote_status(&self) -> bool {
        self.client.probe().await
    }

    /// Drops every cached payload.
    pub async fn invalidate_cache(&self) {
        self.cache.lock().await.invalidate(None);
    }

    /// Fetches the counts payload through the cache: fresh hit, else
    /// refresh, else stale hit.
    async fn remote_counts(&self) -> Result<CountsPayload, aforo_client::ClientError> {
        let mut cache = self.cache.lock().await;
        if let Some(hit) = cache.get(&COUNTS_KEY) {
            log::debug!("serving counts from cache");
            return Ok(hit.clone());
        }

        match self.client.fetch_counts().await {
            Ok(payload) => {
                cache.put(COUNTS_KEY, payload.clone());
                Ok(payload)
            }
            Err(err) => {
                if let Some(stale) = cache.get_stale(&COUNTS_KEY) {
                    log::warn!("counts refresh failed, serving stale payload: {err}");
                    return Ok(stale.clone());
                }
                Err(err)
            }
        }
    }

    /// Remote failed, cache empty, registry empty: hand out the default
    /// dataset rather than nothing.
    fn last_resort(&self) -> CountsPayload {
        log::warn!("no local registry available, serving default dataset");
        default_dataset()
    }
}
