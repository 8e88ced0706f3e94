//! Deserialization helpers for heterogeneous source shapes.
//!
//! The bundled detection dataset is a MongoDB extended-JSON export, so
//! identifiers arrive as `{"$oid": "..."}` and timestamps as
//! `{"$date": "..."}` (or epoch milliseconds). The live API returns plain
//! strings for both. These helpers unwrap whichever shape shows up.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de};

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Wrapped {
        #[serde(rename = "$oid")]
        oid: String,
    },
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateInner {
    Text(String),
    Millis(i64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateRepr {
    Wrapped {
        #[serde(rename = "$date")]
        date: DateInner,
    },
    Text(String),
    Millis(i64),
}

/// Deserializes an identifier from a plain string, a JSON number, or a
/// `{"$oid": ...}` wrapper.
///
/// # Errors
///
/// Fails when the value matches none of the accepted shapes.
pub fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Wrapped { oid } => oid,
        IdRepr::Text(text) => text,
        IdRepr::Number(n) => n.to_string(),
    })
}

/// Deserializes a timestamp from an ISO-8601 string, epoch milliseconds, or
/// a `{"$date": ...}` wrapper around either.
///
/// # Errors
///
/// Fails when the value matches none of the accepted shapes or the string
/// is not a parseable instant.
pub fn date_time<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match DateRepr::deserialize(deserializer)? {
        DateRepr::Wrapped {
            date: DateInner::Text(text),
        }
        | DateRepr::Text(text) => parse_instant(&text).map_err(de::Error::custom),
        DateRepr::Wrapped {
            date: DateInner::Millis(ms),
        }
        | DateRepr::Millis(ms) => from_millis(ms).map_err(de::Error::custom),
    }
}

/// Like [`date_time`], but tolerates `null` and unparseable values by
/// yielding `None`. Registry records with a broken timestamp are still
/// usable for every non-hour aggregation.
///
/// # Errors
///
/// Fails only when the value is structurally none of the accepted shapes.
pub fn opt_date_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(repr) = Option::<DateRepr>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(match repr {
        DateRepr::Wrapped {
            date: DateInner::Text(text),
        }
        | DateRepr::Text(text) => parse_instant(&text).ok(),
        DateRepr::Wrapped {
            date: DateInner::Millis(ms),
        }
        | DateRepr::Millis(ms) => from_millis(ms).ok(),
    })
}

/// Parses an ISO-8601 instant, reading offsetless timestamps as UTC.
///
/// # Errors
///
/// Returns a description of the parse failure.
pub fn parse_instant(text: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("invalid timestamp `{text}`: {err}"))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| format!("epoch millis out of range: {ms}"))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Stamped {
        #[serde(deserialize_with = "super::date_time")]
        at: chrono::DateTime<chrono::Utc>,
    }

    #[derive(Deserialize)]
    struct MaybeStamped {
        #[serde(default, deserialize_with = "super::opt_date_time")]
        at: Option<chrono::DateTime<chrono::Utc>>,
    }

    #[test]
    fn unwraps_date_wrapper() {
        let stamped: Stamped =
            serde_json::from_str(r#"{"at": {"$date": "2024-06-12T06:00:00Z"}}"#).unwrap();
        assert_eq!(stamped.at.to_rfc3339(), "2024-06-12T06:00:00+00:00");
    }

    #[test]
    fn unwraps_epoch_millis_wrapper() {
        let stamped: Stamped =
            serde_json::from_str(r#"{"at": {"$date": 1718172000000}}"#).unwrap();
        assert_eq!(stamped.at.timestamp_millis(), 1_718_172_000_000);
    }

    #[test]
    fn reads_offsetless_timestamps_as_utc() {
        let stamped: Stamped =
            serde_json::from_str(r#"{"at": "2024-06-12T14:30:05.250"}"#).unwrap();
        assert_eq!(stamped.at.to_rfc3339(), "2024-06-12T14:30:05.250+00:00");
    }

    #[test]
    fn optional_timestamp_swallows_garbage() {
        let stamped: MaybeStamped = serde_json::from_str(r#"{"at": "ayer"}"#).unwrap();
        assert!(stamped.at.is_none());

        let stamped: MaybeStamped = serde_json::from_str(r#"{"at": null}"#).unwrap();
        assert!(stamped.at.is_none());

        let stamped: MaybeStamped = serde_json::from_str("{}").unwrap();
        assert!(stamped.at.is_none());
    }
}
