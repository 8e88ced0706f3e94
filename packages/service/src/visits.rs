//! Zone visitor dataset behind the map and stats views.
//!
//! A thin, synchronous wrapper: the samples are loaded once and every
//! accessor delegates to the pure aggregations.

use aforo_aggregate::samples::{self, HeatmapPoint, OverallStats, ZoneSummary};
use aforo_models::{Series, SeriesPoint, VisitorSample};

use crate::dataset::load_visits;
use crate::{ServiceConfig, ServiceError};

/// The zone visitor samples and their rollups.
pub struct VisitDataset {
    samples: Vec<VisitorSample>,
}

impl VisitDataset {
    /// Loads the dataset per the config's dataset paths.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the dataset cannot be read or parsed.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let samples = load_visits(config.datasets.visits.as_deref(), config.bundled_datasets)?;
        Ok(Self { samples })
    }

    /// Wraps an explicit sample set.
    #[must_use]
    pub const fn from_samples(samples: Vec<VisitorSample>) -> Self {
        Self { samples }
    }

    /// Every sample, unaggregated.
    #[must_use]
    pub fn all(&self) -> &[VisitorSample] {
        &self.samples
    }

    /// Per-zone rollups.
    #[must_use]
    pub fn zones(&self) -> Vec<ZoneSummary> {
        samples::zones(&self.samples)
    }

    /// Visitors per hour across all zones, as a chart series.
    #[must_use]
    pub fn hourly(&self) -> Series {
        samples::hourly_totals(&self.samples)
            .into_iter()
            .map(|(hour, total)| SeriesPoint::new(hour.to_string(), total))
            .collect()
    }

    /// Dashboard overview statistics. `None` when the dataset is empty.
    #[must_use]
    pub fn stats(&self) -> Option<OverallStats> {
        samples::overall_stats(&self.samples)
    }

    /// Samples whose hour falls in `start..=end`.
    #[must_use]
    pub fn filter_by_hours(&self, start: u8, end: u8) -> Vec<VisitorSample> {
        samples::filter_by_hours(&self.samples, start, end)
    }

    /// One weighted point per zone for the heatmap overlay.
    #[must_use]
    pub fn heatmap(&self) -> Vec<HeatmapPoint> {
        samples::heatmap(&self.samples)
    }
}
