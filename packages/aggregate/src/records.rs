//! Aggregation over flat registry records.
//!
//! Record-based series deduplicate by visitor id: two rows sharing an id in
//! the same bucket count once. Type counting is the exception — it counts
//! rows, matching the dashboard's original behavior.

use std::collections::{BTreeMap, BTreeSet};

use aforo_models::{PersonRecord, Series, SeriesPoint};

use crate::{AGE_BUCKETS, AggregateOptions, capitalize, hour_series};

/// Buckets records by the hour of their timestamp.
///
/// Records without a timestamp are excluded. Counts are distinct ids per
/// hour, ordered ascending and filled per the configured [`crate::HourFill`].
#[must_use]
pub fn hours(records: &[PersonRecord], options: &AggregateOptions) -> Series {
    let mut ids_by_hour: BTreeMap<u8, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        let Some(timestamp) = record.timestamp else {
            continue;
        };
        let hour = options.time_reference.hour_of(timestamp);
        ids_by_hour.entry(hour).or_default().insert(&record.id);
    }

    let by_hour = ids_by_hour
        .into_iter()
        .map(|(hour, ids)| (hour, ids.len() as u64))
        .collect();
    hour_series(&by_hour, options.hour_fill)
}

/// Buckets records into the three fixed age ranges.
///
/// Ages under 18 and records without an age are excluded. Counts are
/// distinct ids per range; buckets appear lowest range first, and empty
/// buckets are omitted.
#[must_use]
pub fn ages(records: &[PersonRecord]) -> Series {
    let mut ids_by_range: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        let Some(range) = record.edad.and_then(age_bucket) else {
            continue;
        };
        ids_by_range.entry(range).or_default().insert(&record.id);
    }

    AGE_BUCKETS
        .iter()
        .filter_map(|range| {
            ids_by_range
                .get(range)
                .map(|ids| SeriesPoint::new(*range, ids.len() as u64))
        })
        .collect()
}

/// Counts distinct ids per sex label.
///
/// Records without a label fall into `"No especificado"`. Labels are
/// capitalized and the series is ordered by count descending (label
/// ascending on ties) the way the dashboard's gender chart expects.
#[must_use]
pub fn genders(records: &[PersonRecord]) -> Series {
    let mut ids_by_label: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        let label = record.sexo.as_deref().unwrap_or("No especificado");
        ids_by_label.entry(label).or_default().insert(&record.id);
    }

    let mut series: Series = ids_by_label
        .into_iter()
        .map(|(label, ids)| SeriesPoint::new(capitalize(label), ids.len() as u64))
        .collect();
    series.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.bucket.cmp(&b.bucket)));
    series
}

/// Counts records per visitor type label, optionally filtered by an exact
/// gender match.
///
/// An empty `gender_filter` matches every record. Labels are normalized per
/// the configured [`crate::LabelCasing`]; labels that collide after
/// normalization merge into one bucket.
#[must_use]
pub fn types(records: &[PersonRecord], gender_filter: &str, options: &AggregateOptions) -> Series {
    let mut count_by_label: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        let Some(tipo) = record.tipo.as_deref() else {
            continue;
        };
        if !gender_filter.is_empty() && record.genero.as_deref() != Some(gender_filter) {
            continue;
        }
        *count_by_label
            .entry(options.label_casing.apply(tipo))
            .or_default() += 1;
    }

    count_by_label
        .into_iter()
        .map(|(label, total)| SeriesPoint::new(label, total))
        .collect()
}

const fn age_bucket(age: u32) -> Option<&'static str> {
    match age {
        18..=25 => Some(AGE_BUCKETS[0]),
        26..=32 => Some(AGE_BUCKETS[1]),
        33.. => Some(AGE_BUCKETS[2]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use aforo_models::PersonRecord;

    use super::*;
    use crate::HourFill;

    fn record(id: &str) -> PersonRecord {
        PersonRecord {
            id: id.to_owned(),
            timestamp: None,
            edad: None,
            sexo: None,
            tipo: None,
            genero: None,
        }
    }

    fn aged(id: &str, edad: u32) -> PersonRecord {
        PersonRecord {
            edad: Some(edad),
            ..record(id)
        }
    }

    #[test]
    fn ages_use_fixed_buckets_and_exclude_minors() {
        let records: Vec<PersonRecord> = [17, 18, 25, 26, 32, 33]
            .iter()
            .enumerate()
            .map(|(i, &edad)| aged(&format!("p{i}"), edad))
            .collect();

        let series = ages(&records);
        assert_eq!(series.len(), 3);
        assert_eq!((series[0].bucket.as_str(), series[0].total), ("18 -25", 2));
        assert_eq!((series[1].bucket.as_str(), series[1].total), ("25 - 32", 2));
        assert_eq!((series[2].bucket.as_str(), series[2].total), ("32 o mas", 1));
    }

    #[test]
    fn ages_dedup_by_id() {
        let records = vec![aged("same", 20), aged("same", 21), aged("other", 22)];
        let series = ages(&records);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].total, 2);
    }

    #[test]
    fn genders_bucket_per_label_and_sum_to_distinct_ids() {
        let mut records = vec![record("a"), record("b"), record("c"), record("d")];
        records[0].sexo = Some("femenino".to_owned());
        records[1].sexo = Some("femenino".to_owned());
        records[2].sexo = Some("Masculino".to_owned());
        // records[3] has no label.

        let series = genders(&records);
        assert_eq!(series.len(), 3);

        let labeled: u64 = series
            .iter()
            .filter(|p| p.bucket != "No especificado")
            .map(|p| p.total)
            .sum();
        assert_eq!(labeled, 3);
        assert_eq!(series[0].bucket, "Femenino");
        assert_eq!(series[0].total, 2);
    }

    #[test]
    fn hours_dedup_by_id_and_zero_fill_range() {
        let mut a = record("a");
        a.timestamp = Some("2024-06-12T09:15:00Z".parse().unwrap());
        let mut a_again = record("a");
        a_again.timestamp = Some("2024-06-12T09:45:00Z".parse().unwrap());
        let mut b = record("b");
        b.timestamp = Some("2024-06-12T09:05:00Z".parse().unwrap());
        let unstamped = record("c");

        let options = AggregateOptions {
            hour_fill: HourFill::Range { start: 8, end: 10 },
            ..AggregateOptions::default()
        };
        let series = hours(&[a, a_again, b, unstamped], &options);

        assert_eq!(series.len(), 3);
        assert_eq!((series[0].bucket.as_str(), series[0].total), ("8", 0));
        assert_eq!((series[1].bucket.as_str(), series[1].total), ("9", 2));
        assert_eq!((series[2].bucket.as_str(), series[2].total), ("10", 0));
    }

    #[test]
    fn hours_sparse_emits_only_observed_hours() {
        let mut a = record("a");
        a.timestamp = Some("2024-06-12T23:15:00Z".parse().unwrap());

        let options = AggregateOptions {
            hour_fill: HourFill::Sparse,
            ..AggregateOptions::default()
        };
        let series = hours(&[a], &options);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].bucket, "23");
    }

    #[test]
    fn types_filter_by_gender_and_normalize_casing() {
        let mut rows = vec![record("a"), record("b"), record("c")];
        rows[0].tipo = Some("Estudiante".to_owned());
        rows[0].genero = Some("Femenino".to_owned());
        rows[1].tipo = Some("estudiante".to_owned());
        rows[1].genero = Some("Masculino".to_owned());
        rows[2].tipo = Some("Docente".to_owned());
        rows[2].genero = Some("Femenino".to_owned());

        let options = AggregateOptions::default();
        let all = types(&rows, "", &options);
        assert_eq!(all.len(), 2);
        assert_eq!((all[1].bucket.as_str(), all[1].total), ("estudiante", 2));

        let filtered = types(&rows, "Femenino", &options);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| p.total == 1));
    }

    #[test]
    fn empty_input_yields_empty_series() {
        let options = AggregateOptions {
            hour_fill: HourFill::Sparse,
            ..AggregateOptions::default()
        };
        assert!(ages(&[]).is_empty());
        assert!(genders(&[]).is_empty());
        assert!(types(&[], "", &AggregateOptions::default()).is_empty());
        assert!(hours(&[], &options).is_empty());
    }
}
