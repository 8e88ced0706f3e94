//! Aggregation over zone visitor samples and detection timelines.
//!
//! Zone samples are the park-style dataset behind the dashboard's map and
//! stats cards: one row per zone per hour with a demographics breakdown.

use std::collections::BTreeMap;

use aforo_models::{SeriesPoint, VisitorBreakdown, VisitorSample};
use chrono::{DateTime, FixedOffset, Offset as _, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::TimeReference;

/// Per-zone rollup of every sample observed in that zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSummary {
    /// Zone identifier.
    pub zone: String,
    /// Human-readable zone name.
    pub zone_name: String,
    /// `[lat, lng]` of the zone.
    pub coordinates: [f64; 2],
    /// Total visitors across all hours.
    pub total_visitors: u64,
    /// Summed demographics across all hours.
    pub demographics: VisitorBreakdown,
    /// Per-hour visitor totals, in sample order.
    pub hourly: Vec<SeriesPoint>,
}

/// One weighted point for the heatmap overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    /// `[lat, lng]` of the point.
    pub location: [f64; 2],
    /// Weight of the point (total visitors in the zone).
    pub intensity: u64,
    /// Human-readable zone name.
    pub zone: String,
}

/// Dashboard-wide statistics over the full sample set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    /// Total visitors across all samples.
    pub total_visitors: u64,
    /// Summed demographics.
    pub demographics: VisitorBreakdown,
    /// Rounded percentage of adult visitors.
    pub adult_percentage: u64,
    /// Rounded percentage of child visitors.
    pub children_percentage: u64,
    /// Rounded percentage of male visitors.
    pub male_percentage: u64,
    /// Rounded percentage of female visitors.
    pub female_percentage: u64,
    /// Hour with the most visitors (first such hour on ties).
    pub peak_hour: u8,
    /// Visitors in the peak hour.
    pub peak_hour_visitors: u64,
    /// Name of the zone with the most visitors (first such zone on ties).
    pub most_popular_zone: String,
    /// Visitors in the most popular zone.
    pub most_popular_zone_visitors: u64,
    /// Rounded mean visitors per hour of the 17-hour operating window.
    pub average_visitors_per_hour: u64,
}

/// Rolls samples up per zone, in zone-identifier order.
#[must_use]
pub fn zones(samples: &[VisitorSample]) -> Vec<ZoneSummary> {
    let mut by_zone: BTreeMap<&str, ZoneSummary> = BTreeMap::new();
    for sample in samples {
        let summary = by_zone
            .entry(&sample.zone)
            .or_insert_with(|| ZoneSummary {
                zone: sample.zone.clone(),
                zone_name: sample.zone_name.clone(),
                coordinates: sample.coordinates,
                total_visitors: 0,
                demographics: VisitorBreakdown::default(),
                hourly: Vec::new(),
            });
        summary.total_visitors += sample.visitors.total;
        summary.demographics.total += sample.visitors.total;
        summary.demographics.adults += sample.visitors.adults;
        summary.demographics.children += sample.visitors.children;
        summary.demographics.male += sample.visitors.male;
        summary.demographics.female += sample.visitors.female;
        summary
            .hourly
            .push(SeriesPoint::new(sample.hour.to_string(), sample.visitors.total));
    }
    by_zone.into_values().collect()
}

/// Sums visitors per hour across all zones, ascending by hour.
#[must_use]
pub fn hourly_totals(samples: &[VisitorSample]) -> Vec<(u8, u64)> {
    let mut by_hour: BTreeMap<u8, u64> = BTreeMap::new();
    for sample in samples {
        *by_hour.entry(sample.hour).or_default() += sample.visitors.total;
    }
    by_hour.into_iter().collect()
}

/// Computes the dashboard's overview statistics. Returns `None` for an
/// empty sample set (there is no meaningful peak hour or percentage).
#[must_use]
pub fn overall_stats(samples: &[VisitorSample]) -> Option<OverallStats> {
    if samples.is_empty() {
        return None;
    }

    let mut demographics = VisitorBreakdown::default();
    for sample in samples {
        demographics.total += sample.visitors.total;
        demographics.adults += sample.visitors.adults;
        demographics.children += sample.visitors.children;
        demographics.male += sample.visitors.male;
        demographics.female += sample.visitors.female;
    }
    let total = demographics.total;

    let (peak_hour, peak_hour_visitors) = hourly_totals(samples)
        .into_iter()
        .fold((0_u8, 0_u64), |best, (hour, visitors)| {
            if visitors > best.1 { (hour, visitors) } else { best }
        });

    let (most_popular_zone, most_popular_zone_visitors) = zones(samples)
        .into_iter()
        .fold((String::new(), 0_u64), |best, zone| {
            if zone.total_visitors > best.1 {
                (zone.zone_name, zone.total_visitors)
            } else {
                best
            }
        });

    Some(OverallStats {
        total_visitors: total,
        adult_percentage: percent(demographics.adults, total),
        children_percentage: percent(demographics.children, total),
        male_percentage: percent(demographics.male, total),
        female_percentage: percent(demographics.female, total),
        demographics,
        peak_hour,
        peak_hour_visitors,
        most_popular_zone,
        most_popular_zone_visitors,
        average_visitors_per_hour: div_round(total, 17),
    })
}

/// Keeps samples whose hour falls in `start..=end`.
#[must_use]
pub fn filter_by_hours(samples: &[VisitorSample], start: u8, end: u8) -> Vec<VisitorSample> {
    samples
        .iter()
        .filter(|sample| sample.hour >= start && sample.hour <= end)
        .cloned()
        .collect()
}

/// One weighted point per zone for the heatmap overlay.
#[must_use]
pub fn heatmap(samples: &[VisitorSample]) -> Vec<HeatmapPoint> {
    zones(samples)
        .into_iter()
        .map(|zone| HeatmapPoint {
            location: zone.coordinates,
            intensity: zone.total_visitors,
            zone: zone.zone_name,
        })
        .collect()
}

/// Groups detection capture instants into fixed minute intervals for the
/// timeline view.
///
/// Keys are `YYYY-MM-DDTHH:MM` with the minute floored to the interval,
/// rendered under the given [`TimeReference`]. A zero or out-of-range
/// interval falls back to 1 minute.
#[must_use]
pub fn group_timestamps(
    instants: &[DateTime<Utc>],
    interval_minutes: u32,
    reference: TimeReference,
) -> BTreeMap<String, u64> {
    let interval = interval_minutes.clamp(1, 60);
    let offset = match reference {
        TimeReference::Utc => Utc.fix(),
        TimeReference::OffsetMinutes(minutes) => {
            FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
        }
    };

    let mut groups: BTreeMap<String, u64> = BTreeMap::new();
    for instant in instants {
        let local = instant.with_timezone(&offset);
        let floored_minute = local.minute() - local.minute() % interval;
        let key = format!("{}:{floored_minute:02}", local.format("%Y-%m-%dT%H"));
        *groups.entry(key).or_default() += 1;
    }
    groups
}

const fn percent(part: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        div_round(part * 100, total)
    }
}

/// Integer division rounding half up.
const fn div_round(numerator: u64, denominator: u64) -> u64 {
    (2 * numerator + denominator) / (2 * denominator)
}
