#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pure aggregation functions for the visitor analytics layer.
//!
//! Two input shapes feed the same chart-ready [`Series`] output: flat record
//! lists (bucketed and deduplicated by id here) and the remote API's
//! pre-aggregated count maps (validated and passed through). The choices the
//! API revisions disagreed on — hour zero-fill, time reference for hour
//! extraction, type-label casing — are explicit [`AggregateOptions`] instead
//! of hard-coded behavior.
//!
//! Everything in this crate is deterministic and does no I/O.

pub mod counts;
pub mod records;
pub mod samples;

use aforo_models::Series;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The three fixed age buckets, lowest range first. Ages under 18 fall in
/// no bucket and are excluded from age aggregation.
pub const AGE_BUCKETS: &[&str] = &["18 -25", "25 - 32", "32 o mas"];

/// Library operating hours used as the default zero-fill range.
pub const OPERATING_HOURS: (u8, u8) = (6, 22);

/// How the hourly series handles hours with no observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HourFill {
    /// Emit every hour in `start..=end` with zero-filled gaps; observations
    /// outside the range are dropped.
    Range {
        /// First hour of the axis (inclusive).
        start: u8,
        /// Last hour of the axis (inclusive).
        end: u8,
    },
    /// Emit only hours that have observations, ascending.
    Sparse,
}

impl Default for HourFill {
    fn default() -> Self {
        Self::Range {
            start: OPERATING_HOURS.0,
            end: OPERATING_HOURS.1,
        }
    }
}

/// Which wall clock the hour of a timestamp is read from.
///
/// The API revisions mixed UTC and local-time hour accessors; the reference
/// is configuration here, defaulting to UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeReference {
    /// Hours read in UTC.
    #[default]
    Utc,
    /// Hours read at a fixed offset from UTC, in minutes (e.g. `-300` for
    /// UTC-5).
    OffsetMinutes(i32),
}

impl TimeReference {
    /// Extracts the hour-of-day of `instant` under this reference.
    #[must_use]
    pub fn hour_of(self, instant: DateTime<Utc>) -> u8 {
        let hour = match self {
            Self::Utc => instant.hour(),
            Self::OffsetMinutes(minutes) => FixedOffset::east_opt(minutes * 60)
                .map_or_else(|| instant.hour(), |off| instant.with_timezone(&off).hour()),
        };
        u8::try_from(hour).unwrap_or(0)
    }
}

/// Normalization applied to visitor type labels.
///
/// The source revisions emitted both `"Estudiante"` and `"estudiante"`; one
/// casing is applied uniformly to both input shapes so chart legends never
/// split a category.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LabelCasing {
    /// All lower-case (the later API revision).
    #[default]
    Lower,
    /// First letter upper-case, rest lower.
    Capitalized,
}

impl LabelCasing {
    /// Applies this casing to a label.
    #[must_use]
    pub fn apply(self, label: &str) -> String {
        match self {
            Self::Lower => label.to_lowercase(),
            Self::Capitalized => capitalize(label),
        }
    }
}

/// Capitalizes the first character of a label and lower-cases the rest.
#[must_use]
pub fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
    })
}

/// Behavior knobs shared by the aggregation functions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateOptions {
    /// Hourly series fill policy.
    pub hour_fill: HourFill,
    /// Wall clock for hour extraction from record timestamps.
    pub time_reference: TimeReference,
    /// Visitor type label normalization.
    pub label_casing: LabelCasing,
}

/// Reindexes an hour -> count map into an ordered series per the fill
/// policy.
fn hour_series(by_hour: &std::collections::BTreeMap<u8, u64>, fill: HourFill) -> Series {
    match fill {
        HourFill::Range { start, end } => (start..=end)
            .map(|hour| {
                aforo_models::SeriesPoint::new(
                    hour.to_string(),
                    by_hour.get(&hour).copied().unwrap_or(0),
                )
            })
            .collect(),
        HourFill::Sparse => by_hour
            .iter()
            .map(|(hour, total)| aforo_models::SeriesPoint::new(hour.to_string(), *total))
            .collect(),
    }
}

/// Leading numeric component of an age range label, used for semantic
/// ordering (`"18 -25"` -> 18). Labels without one sort last.
fn leading_number(label: &str) -> i64 {
    label
        .split(|c: char| c == '-' || c.is_whitespace())
        .find(|part| !part.is_empty())
        .and_then(|part| part.parse().ok())
        .map_or(i64::MAX, |n: i64| n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_reference_reads_utc_hours() {
        let instant = "2024-06-12T14:30:00Z".parse().unwrap();
        assert_eq!(TimeReference::Utc.hour_of(instant), 14);
    }

    #[test]
    fn offset_reference_shifts_hours() {
        let instant = "2024-06-12T03:30:00Z".parse().unwrap();
        assert_eq!(TimeReference::OffsetMinutes(-300).hour_of(instant), 22);
    }

    #[test]
    fn casing_is_uniform() {
        assert_eq!(LabelCasing::Lower.apply("Estudiante"), "estudiante");
        assert_eq!(LabelCasing::Capitalized.apply("eSTUDIANTE"), "Estudiante");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn leading_number_orders_age_labels() {
        assert_eq!(leading_number("18 -25"), 18);
        assert_eq!(leading_number("25 - 32"), 25);
        assert_eq!(leading_number("32 o mas"), 32);
        assert_eq!(leading_number("sin rango"), i64::MAX);
    }
}
