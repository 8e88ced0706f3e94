#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the aforo visitor analytics layer.
//!
//! Defines the three raw input shapes (library registry records, camera
//! detection records, and the remote counts payload), the normalized series
//! types handed to the rendering layer, and the boundary validation that
//! rejects malformed counts before they reach aggregation.

pub mod ext_json;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A count map received at the aggregation boundary (counts may be negative
/// only when the remote contract is broken; [`CountsPayload::validate`]
/// rejects that).
pub type RawCounts = BTreeMap<String, i64>;

/// A validated two-dimensional count table: age range -> type -> count.
pub type CrossTable = BTreeMap<String, BTreeMap<String, u64>>;

/// The aggregator received malformed counts. This indicates a broken API
/// contract, not a transient condition, so it propagates to the caller
/// instead of triggering a fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A count value was negative.
    #[error("negative count {value} for bucket `{bucket}` in `{dimension}`")]
    NegativeCount {
        /// The dimension the count came from (e.g. `conteo_edad`).
        dimension: String,
        /// The bucket key within the dimension.
        bucket: String,
        /// The offending value.
        value: i64,
    },

    /// A bucket key that must be numeric (an hour-of-day) was not.
    #[error("non-numeric hour key `{key}` in `{dimension}`")]
    NonNumericHour {
        /// The dimension the key came from.
        dimension: String,
        /// The offending key.
        key: String,
    },
}

/// One point of a normalized series: a bucket key and its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Bucket key (an hour-of-day, an age range label, a gender label, ...).
    pub bucket: String,
    /// Count of distinct visitors in this bucket.
    pub total: u64,
}

impl SeriesPoint {
    /// Creates a series point from a key and count.
    #[must_use]
    pub fn new(bucket: impl Into<String>, total: u64) -> Self {
        Self {
            bucket: bucket.into(),
            total,
        }
    }
}

/// An ordered, chart-ready sequence of `(bucket, count)` pairs.
///
/// Created fresh on every aggregation call and never mutated afterwards;
/// ownership transfers to the rendering layer.
pub type Series = Vec<SeriesPoint>;

/// A flat record from the library visitor registry dataset.
///
/// Every field except `id` is optional in the source data. A record missing
/// `timestamp` is excluded from hour bucketing; a record missing `edad` is
/// excluded from age bucketing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Unique visitor identifier. Aggregations dedup by this value.
    #[serde(deserialize_with = "ext_json::id_string")]
    pub id: String,
    /// When the visitor was registered.
    #[serde(default, deserialize_with = "ext_json::opt_date_time")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Visitor age in years.
    #[serde(default)]
    pub edad: Option<u32>,
    /// Reported sex label (e.g. `"Femenino"`).
    #[serde(default)]
    pub sexo: Option<String>,
    /// Visitor type label (e.g. `"estudiante"`).
    #[serde(default)]
    pub tipo: Option<String>,
    /// Gender label used by the type filter.
    #[serde(default)]
    pub genero: Option<String>,
}

/// A camera detection record.
///
/// Accepts both the plain API shape and the MongoDB extended-JSON export
/// shape (`{"$oid": ...}` identifiers and `{"$date": ...}` timestamps).
/// `coordenadas` length need not equal `personas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Unique detection identifier.
    #[serde(alias = "_id", deserialize_with = "ext_json::id_string")]
    pub id: String,
    /// Capture instant of the detection frame.
    #[serde(deserialize_with = "ext_json::date_time")]
    pub timestamp: DateTime<Utc>,
    /// Number of people detected in the frame.
    #[serde(default)]
    pub personas: u64,
    /// Detected `[x, y]` positions. May be shorter or longer than `personas`.
    #[serde(default)]
    pub coordenadas: Vec<[f64; 2]>,
}

/// Pre-aggregated counts returned by the remote `/datos` endpoint.
///
/// Missing dimensions deserialize to empty maps, never null. The `conte_*`
/// aliases accept the older API revision's field spellings. Counts are kept
/// as `i64` so that a negative value survives deserialization and is
/// reported by [`CountsPayload::validate`] as a contract violation rather
/// than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountsPayload {
    /// Age range label -> count.
    #[serde(default, alias = "conte_edad")]
    pub conteo_edad: RawCounts,
    /// Hour-of-day key (`"0"`..`"23"`) -> count.
    #[serde(default, alias = "conte_hora")]
    pub conteo_hora: RawCounts,
    /// Sex label -> count.
    #[serde(default, alias = "conte_sexo")]
    pub conteo_sexo: RawCounts,
    /// Visitor type label -> count.
    #[serde(default, alias = "conte_tipo")]
    pub conteo_tipo: RawCounts,
    /// Age range label -> type label -> count.
    #[serde(default, alias = "tabla_cruzada")]
    pub tabla_cruzada_tipo_edad: BTreeMap<String, RawCounts>,
}

impl CountsPayload {
    /// Checks that every count in every dimension is non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NegativeCount`] naming the first offending
    /// dimension, bucket, and value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_counts("conteo_edad", &self.conteo_edad)?;
        validate_counts("conteo_hora", &self.conteo_hora)?;
        validate_counts("conteo_sexo", &self.conteo_sexo)?;
        validate_counts("conteo_tipo", &self.conteo_tipo)?;
        for (age, row) in &self.tabla_cruzada_tipo_edad {
            validate_counts(&format!("tabla_cruzada_tipo_edad[{age}]"), row)?;
        }
        Ok(())
    }

    /// Returns `true` when every dimension is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conteo_edad.is_empty()
            && self.conteo_hora.is_empty()
            && self.conteo_sexo.is_empty()
            && self.conteo_tipo.is_empty()
            && self.tabla_cruzada_tipo_edad.is_empty()
    }
}

fn validate_counts(dimension: &str, counts: &RawCounts) -> Result<(), ValidationError> {
    for (bucket, value) in counts {
        if *value < 0 {
            return Err(ValidationError::NegativeCount {
                dimension: dimension.to_owned(),
                bucket: bucket.clone(),
                value: *value,
            });
        }
    }
    Ok(())
}

/// Response of the `/detecciones/timestamps` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampsResponse {
    /// Whether the query succeeded server-side.
    pub success: bool,
    /// Number of timestamps returned.
    #[serde(default)]
    pub total: u64,
    /// ISO-8601 capture instants, most recent first.
    #[serde(default)]
    pub timestamps: Vec<String>,
}

impl Default for TimestampsResponse {
    /// The `success: false` empty shape returned when the remote feed and
    /// the cache are both unavailable.
    fn default() -> Self {
        Self {
            success: false,
            total: 0,
            timestamps: Vec::new(),
        }
    }
}

/// Response of the `/detecciones?segundo=...` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionsResponse {
    /// Whether the query succeeded server-side.
    pub success: bool,
    /// The `segundo` parameter the query was filtered by.
    #[serde(default)]
    pub parametro: Option<String>,
    /// Number of matching detections.
    #[serde(default)]
    pub total_encontradas: u64,
    /// The matching detection records.
    #[serde(default)]
    pub detecciones: Vec<DetectionRecord>,
}

impl DetectionsResponse {
    /// The `success: false` empty shape for a given query parameter.
    #[must_use]
    pub fn empty_for(parameter: &str) -> Self {
        Self {
            success: false,
            parametro: Some(parameter.to_owned()),
            total_encontradas: 0,
            detecciones: Vec::new(),
        }
    }
}

/// Per-category visitor demographics of one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorBreakdown {
    /// Total visitors observed.
    pub total: u64,
    /// Adult visitors.
    pub adults: u64,
    /// Child visitors.
    pub children: u64,
    /// Male visitors.
    pub male: u64,
    /// Female visitors.
    pub female: u64,
}

/// One zone-and-hour sample of the park-style visitor dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorSample {
    /// Sample identifier (`"<zone>_<hour>"` in the bundled dataset).
    pub id: String,
    /// Sample instant.
    #[serde(deserialize_with = "ext_json::date_time")]
    pub timestamp: DateTime<Utc>,
    /// Hour of day the sample covers.
    pub hour: u8,
    /// Zone identifier (e.g. `"entrada_norte"`).
    pub zone: String,
    /// Human-readable zone name.
    pub zone_name: String,
    /// `[lat, lng]` of the zone.
    pub coordinates: [f64; 2],
    /// Visitor counts for this zone and hour.
    pub visitors: VisitorBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_payload_defaults_missing_dimensions_to_empty_maps() {
        let payload: CountsPayload = serde_json::from_str(r#"{"conteo_sexo": {"Femenino": 3}}"#)
            .expect("payload should parse");
        assert!(payload.conteo_edad.is_empty());
        assert!(payload.conteo_hora.is_empty());
        assert_eq!(payload.conteo_sexo.get("Femenino"), Some(&3));
        assert!(payload.tabla_cruzada_tipo_edad.is_empty());
    }

    #[test]
    fn counts_payload_accepts_older_field_spellings() {
        let payload: CountsPayload =
            serde_json::from_str(r#"{"conte_edad": {"18 -25": 4}, "conte_hora": {"9": 2}}"#)
                .expect("payload should parse");
        assert_eq!(payload.conteo_edad.get("18 -25"), Some(&4));
        assert_eq!(payload.conteo_hora.get("9"), Some(&2));
    }

    #[test]
    fn validate_rejects_negative_counts() {
        let payload: CountsPayload = serde_json::from_str(r#"{"conteo_tipo": {"Docente": -1}}"#)
            .expect("payload should parse");
        let err = payload.validate().expect_err("negative count must fail");
        assert_eq!(
            err,
            ValidationError::NegativeCount {
                dimension: "conteo_tipo".to_owned(),
                bucket: "Docente".to_owned(),
                value: -1,
            }
        );
    }

    #[test]
    fn validate_accepts_consistent_payload() {
        let payload: CountsPayload = serde_json::from_str(
            r#"{
                "conteo_edad": {"18 -25": 7},
                "tabla_cruzada_tipo_edad": {"18 -25": {"Docente": 7}}
            }"#,
        )
        .expect("payload should parse");
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn detection_record_parses_extended_json() {
        let record: DetectionRecord = serde_json::from_str(
            r#"{
                "_id": {"$oid": "66b1f1b2a3c4d5e6f7a8b9c0"},
                "timestamp": {"$date": "2024-06-12T14:30:05.000Z"},
                "personas": 3,
                "coordenadas": [[120.5, 340.0], [88.0, 410.5]]
            }"#,
        )
        .expect("record should parse");
        assert_eq!(record.id, "66b1f1b2a3c4d5e6f7a8b9c0");
        assert_eq!(record.personas, 3);
        assert_eq!(record.coordenadas.len(), 2);
        assert_eq!(record.timestamp.to_rfc3339(), "2024-06-12T14:30:05+00:00");
    }

    #[test]
    fn detection_record_parses_plain_shape() {
        let record: DetectionRecord = serde_json::from_str(
            r#"{"id": "d-17", "timestamp": "2024-06-12T09:00:00Z", "personas": 1}"#,
        )
        .expect("record should parse");
        assert_eq!(record.id, "d-17");
        assert!(record.coordenadas.is_empty());
    }

    #[test]
    fn person_record_tolerates_missing_fields() {
        let record: PersonRecord =
            serde_json::from_str(r#"{"id": 42, "sexo": "Masculino"}"#).expect("should parse");
        assert_eq!(record.id, "42");
        assert!(record.timestamp.is_none());
        assert!(record.edad.is_none());
        assert_eq!(record.sexo.as_deref(), Some("Masculino"));
    }

    #[test]
    fn detections_response_empty_shape_is_marked_unsuccessful() {
        let empty = DetectionsResponse::empty_for("2024-06-12T14:30:05");
        assert!(!empty.success);
        assert_eq!(empty.parametro.as_deref(), Some("2024-06-12T14:30:05"));
        assert_eq!(empty.total_encontradas, 0);
    }
}
