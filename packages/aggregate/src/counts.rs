//! Aggregation over the remote API's pre-aggregated count maps.
//!
//! The remote already did the bucketing, so these functions validate at the
//! boundary and reshape: every count map passes through
//! [`CountsPayload::validate`] first, and a malformed payload fails loud
//! instead of being silently defaulted away.

use std::collections::BTreeMap;

use aforo_models::{CountsPayload, CrossTable, Series, SeriesPoint, ValidationError};

use crate::{AggregateOptions, hour_series, leading_number};

/// Passes `conteo_hora` through as an hourly series.
///
/// Keys must be numeric hour-of-day strings (`"0"`..`"23"`); ordering is
/// numeric ascending and gaps follow the configured [`crate::HourFill`].
///
/// # Errors
///
/// Returns [`ValidationError`] on a negative count or a non-numeric hour
/// key.
pub fn hours(payload: &CountsPayload, options: &AggregateOptions) -> Result<Series, ValidationError> {
    payload.validate()?;

    let mut by_hour: BTreeMap<u8, u64> = BTreeMap::new();
    for (key, value) in &payload.conteo_hora {
        let hour: u8 = key
            .trim()
            .parse()
            .map_err(|_| ValidationError::NonNumericHour {
                dimension: "conteo_hora".to_owned(),
                key: key.clone(),
            })?;
        *by_hour.entry(hour).or_default() += unsigned(*value);
    }

    Ok(hour_series(&by_hour, options.hour_fill))
}

/// Passes `conteo_edad` through, sorted by each label's leading numeric
/// value ascending (lowest age range first).
///
/// # Errors
///
/// Returns [`ValidationError`] on a negative count.
pub fn ages(payload: &CountsPayload) -> Result<Series, ValidationError> {
    payload.validate()?;

    let mut series: Series = payload
        .conteo_edad
        .iter()
        .map(|(range, value)| SeriesPoint::new(range.clone(), unsigned(*value)))
        .collect();
    series.sort_by_key(|point| leading_number(&point.bucket));
    Ok(series)
}

/// Passes `conteo_sexo` through unchanged, in category order.
///
/// # Errors
///
/// Returns [`ValidationError`] on a negative count.
pub fn genders(payload: &CountsPayload) -> Result<Series, ValidationError> {
    payload.validate()?;

    Ok(payload
        .conteo_sexo
        .iter()
        .map(|(label, value)| SeriesPoint::new(label.clone(), unsigned(*value)))
        .collect())
}

/// Passes `conteo_tipo` through with labels normalized per the configured
/// [`crate::LabelCasing`]; labels that collide after normalization merge.
///
/// The remote does not support a gender filter on type counts, so there is
/// no filter parameter here — callers that need one fall back to record
/// aggregation.
///
/// # Errors
///
/// Returns [`ValidationError`] on a negative count.
pub fn types(payload: &CountsPayload, options: &AggregateOptions) -> Result<Series, ValidationError> {
    payload.validate()?;

    let mut by_label: BTreeMap<String, u64> = BTreeMap::new();
    for (label, value) in &payload.conteo_tipo {
        *by_label
            .entry(options.label_casing.apply(label))
            .or_default() += unsigned(*value);
    }

    Ok(by_label
        .into_iter()
        .map(|(label, total)| SeriesPoint::new(label, total))
        .collect())
}

/// Passes `tabla_cruzada_tipo_edad` through unchanged.
///
/// The cross table is API-only: it is never computed from flat records.
///
/// # Errors
///
/// Returns [`ValidationError`] on a negative count.
pub fn cross_table(payload: &CountsPayload) -> Result<CrossTable, ValidationError> {
    payload.validate()?;

    Ok(payload
        .tabla_cruzada_tipo_edad
        .iter()
        .map(|(age, row)| {
            let row = row
                .iter()
                .map(|(tipo, value)| (tipo.clone(), unsigned(*value)))
                .collect();
            (age.clone(), row)
        })
        .collect())
}

/// Converts a validated count. Callers run [`CountsPayload::validate`]
/// first, so a negative value can no longer occur here.
fn unsigned(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use aforo_models::CountsPayload;

    use super::*;
    use crate::HourFill;

    fn payload(json: &str) -> CountsPayload {
        serde_json::from_str(json).expect("payload should parse")
    }

    #[test]
    fn hours_zero_fill_covers_the_configured_range() {
        let payload = payload(r#"{"conteo_hora": {"7": 3, "12": 4, "22": 4}}"#);
        let options = AggregateOptions::default();

        let series = hours(&payload, &options).unwrap();
        assert_eq!(series.len(), 17); // 6..=22
        assert_eq!((series[0].bucket.as_str(), series[0].total), ("6", 0));
        assert_eq!((series[1].bucket.as_str(), series[1].total), ("7", 3));
        assert_eq!((series[6].bucket.as_str(), series[6].total), ("12", 4));
        assert_eq!((series[16].bucket.as_str(), series[16].total), ("22", 4));
    }

    #[test]
    fn hours_sparse_keeps_numeric_order() {
        let payload = payload(r#"{"conteo_hora": {"12": 4, "7": 3, "22": 4, "8": 2}}"#);
        let options = AggregateOptions {
            hour_fill: HourFill::Sparse,
            ..AggregateOptions::default()
        };

        let series = hours(&payload, &options).unwrap();
        let buckets: Vec<&str> = series.iter().map(|p| p.bucket.as_str()).collect();
        assert_eq!(buckets, ["7", "8", "12", "22"]);
    }

    #[test]
    fn hours_reject_non_numeric_keys() {
        let payload = payload(r#"{"conteo_hora": {"mediodia": 4}}"#);
        let err = hours(&payload, &AggregateOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            aforo_models::ValidationError::NonNumericHour { .. }
        ));
    }

    #[test]
    fn ages_sort_by_leading_range_value() {
        let payload =
            payload(r#"{"conteo_edad": {"32 o mas": 2, "18 -25": 7, "25 - 32": 4}}"#);
        let series = ages(&payload).unwrap();
        let buckets: Vec<&str> = series.iter().map(|p| p.bucket.as_str()).collect();
        assert_eq!(buckets, ["18 -25", "25 - 32", "32 o mas"]);
        assert_eq!(series[0].total, 7);
    }

    #[test]
    fn genders_pass_through_unchanged() {
        let payload = payload(r#"{"conteo_sexo": {"Femenino": 7, "Masculino": 6}}"#);
        let series = genders(&payload).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!((series[0].bucket.as_str(), series[0].total), ("Femenino", 7));
    }

    #[test]
    fn types_merge_labels_that_collide_after_casing() {
        let payload = payload(r#"{"conteo_tipo": {"Docente": 3, "docente": 2, "Externo": 1}}"#);
        let series = types(&payload, &AggregateOptions::default()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!((series[0].bucket.as_str(), series[0].total), ("docente", 5));
        assert_eq!((series[1].bucket.as_str(), series[1].total), ("externo", 1));
    }

    #[test]
    fn cross_table_is_a_pure_passthrough() {
        let payload =
            payload(r#"{"tabla_cruzada_tipo_edad": {"18 -25": {"Docente": 2, "Estudiante": 3}}}"#);
        let table = cross_table(&payload).unwrap();
        assert_eq!(table.len(), 1);
        let row = &table["18 -25"];
        assert_eq!(row["Docente"], 2);
        assert_eq!(row["Estudiante"], 3);
    }

    #[test]
    fn negative_counts_fail_loud() {
        let payload = payload(r#"{"conteo_edad": {"18 -25": -3}}"#);
        assert!(ages(&payload).is_err());
        assert!(cross_table(&payload).is_err());
    }

    #[test]
    fn empty_payload_yields_empty_series() {
        let payload = CountsPayload::default();
        assert!(ages(&payload).unwrap().is_empty());
        assert!(genders(&payload).unwrap().is_empty());
        assert!(types(&payload, &AggregateOptions::default()).unwrap().is_empty());
        assert!(cross_table(&payload).unwrap().is_empty());

        let sparse = AggregateOptions {
            hour_fill: HourFill::Sparse,
            ..AggregateOptions::default()
        };
        assert!(hours(&payload, &sparse).unwrap().is_empty());
    }
}
