//! Bundled datasets and the hard-coded default payload.
//!
//! The default payload is the absolute last resort: remote down, cache
//! empty, no local registry. It is shape-identical to a real counts
//! payload and self-consistent — every dimension describes the same 13
//! visitors — so consumers are never handed something they cannot chart.

use std::path::Path;

use aforo_models::{CountsPayload, DetectionRecord, PersonRecord, VisitorSample};

use crate::ServiceError;

/// Bundled library registry records.
pub const BUNDLED_PERSONS: &str = include_str!("../data/registro_personas.json");
/// Bundled camera detections (MongoDB extended-JSON export).
pub const BUNDLED_DETECTIONS: &str = include_str!("../data/detecciones.json");
/// Bundled zone visitor samples.
pub const BUNDLED_VISITS: &str = include_str!("../data/visitas_parque.json");

/// The hard-coded fallback payload.
///
/// All four dimension totals sum to 13, the cross table rows sum to
/// `conteo_edad` and its columns to `conteo_tipo`.
#[must_use]
pub fn default_dataset() -> CountsPayload {
    let json = serde_json::json!({
        "conteo_edad": {
            "18 -25": 7,
            "25 - 32": 4,
            "32 o mas": 2
        },
        "conteo_hora": {
            "7": 3,
            "8": 2,
            "12": 4,
            "22": 4
        },
        "conteo_sexo": {
            "Femenino": 7,
            "Masculino": 6
        },
        "conteo_tipo": {
            "Administrativo": 1,
            "Docente": 3,
            "Estudiante": 6,
            "Externo": 3
        },
        "tabla_cruzada_tipo_edad": {
            "18 -25": { "Administrativo": 0, "Docente": 2, "Estudiante": 3, "Externo": 2 },
            "25 - 32": { "Administrativo": 1, "Docente": 0, "Estudiante": 2, "Externo": 1 },
            "32 o mas": { "Administrativo": 0, "Docente": 1, "Estudiante": 1, "Externo": 0 }
        }
    });
    serde_json::from_value(json).unwrap_or_default()
}

/// Loads person registry records from `path`, or the bundled dataset when
/// `path` is `None` and `bundled` is set, or nothing at all.
///
/// # Errors
///
/// Returns [`ServiceError::Io`] when the file cannot be read and
/// [`ServiceError::Dataset`] when its JSON does not parse.
pub fn load_persons(
    path: Option<&Path>,
    bundled: bool,
) -> Result<Vec<PersonRecord>, ServiceError> {
    load_records(path, bundled.then_some(BUNDLED_PERSONS))
}

/// Loads detection records, same resolution as [`load_persons`].
///
/// # Errors
///
/// Returns [`ServiceError::Io`] when the file cannot be read and
/// [`ServiceError::Dataset`] when its JSON does not parse.
pub fn load_detections(
    path: Option<&Path>,
    bundled: bool,
) -> Result<Vec<DetectionRecord>, ServiceError> {
    load_records(path, bundled.then_some(BUNDLED_DETECTIONS))
}

/// Loads zone visitor samples, same resolution as [`load_persons`].
///
/// # Errors
///
/// Returns [`ServiceError::Io`] when the file cannot be read and
/// [`ServiceError::Dataset`] when its JSON does not parse.
pub fn load_visits(
    path: Option<&Path>,
    bundled: bool,
) -> Result<Vec<VisitorSample>, ServiceError> {
    load_records(path, bundled.then_some(BUNDLED_VISITS))
}

fn load_records<T: serde::de::DeserializeOwned>(
    path: Option<&Path>,
    bundled: Option<&str>,
) -> Result<Vec<T>, ServiceError> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => match bundled {
            Some(text) => text.to_owned(),
            None => return Ok(Vec::new()),
        },
    };
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(counts: &aforo_models::RawCounts) -> i64 {
        counts.values().sum()
    }

    #[test]
    fn default_dataset_dimensions_agree() {
        let payload = default_dataset();
        assert!(payload.validate().is_ok());
        assert!(!payload.is_empty());

        let total = sum(&payload.conteo_edad);
        assert_eq!(total, 13);
        assert_eq!(sum(&payload.conteo_hora), total);
        assert_eq!(sum(&payload.conteo_sexo), total);
        assert_eq!(sum(&payload.conteo_tipo), total);

        let cross_total: i64 = payload
            .tabla_cruzada_tipo_edad
            .values()
            .map(sum)
            .sum();
        assert_eq!(cross_total, total);
    }

    #[test]
    fn default_dataset_cross_rows_match_age_counts() {
        let payload = default_dataset();
        for (age, row) in &payload.tabla_cruzada_tipo_edad {
            assert_eq!(sum(row), payload.conteo_edad[age], "row {age}");
        }
    }

    #[test]
    fn default_dataset_cross_columns_match_type_counts() {
        let payload = default_dataset();
        for (tipo, expected) in &payload.conteo_tipo {
            let column: i64 = payload
                .tabla_cruzada_tipo_edad
                .values()
                .filter_map(|row| row.get(tipo))
                .sum();
            assert_eq!(column, *expected, "column {tipo}");
        }
    }

    #[test]
    fn bundled_persons_parse() {
        let persons = load_persons(None, true).unwrap();
        assert!(!persons.is_empty());
        assert!(persons.iter().all(|p| !p.id.is_empty()));
    }

    #[test]
    fn bundled_detections_unwrap_extended_json() {
        let detections = load_detections(None, true).unwrap();
        assert!(!detections.is_empty());
        assert!(detections.iter().all(|d| !d.id.is_empty()));
    }

    #[test]
    fn bundled_visits_parse() {
        let visits = load_visits(None, true).unwrap();
        assert!(!visits.is_empty());
    }

    #[test]
    fn no_path_no_bundle_means_no_records() {
        let persons = load_persons(None, false).unwrap();
        assert!(persons.is_empty());
    }
}
