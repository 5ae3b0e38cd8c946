use bson::{Bson, Document};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AgentError;

/// Converts typed records to and from the datastore's document form.
///
/// Two rules apply on top of plain serialization:
/// - every `.` in a map key is rewritten to the configured placeholder on
///   write and restored on read (the key namespace forbids literal dots);
/// - a document carries only the fields its type declares; no
///   type-discriminator metadata is ever written.
///
/// A mapper must be finalized before first use; encoding or decoding with
/// an unfinalized mapper is a programming error and panics.
#[derive(Debug, Clone)]
pub struct DocumentMapper {
    placeholder: char,
    finalized: bool,
}

impl DocumentMapper {
    pub fn new(placeholder: char) -> Self {
        Self {
            placeholder,
            finalized: false,
        }
    }

    /// Validates the configuration and marks the mapper ready for use.
    pub fn finalize(mut self) -> Self {
        assert!(
            self.placeholder != '.' && self.placeholder != '$',
            "key placeholder must not be a character the key namespace reserves"
        );
        self.finalized = true;
        self
    }

    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Document, AgentError> {
        assert!(self.finalized, "DocumentMapper used before finalize()");

        let document = bson::to_document(value).map_err(|error| AgentError::Mapping {
            detail: error.to_string(),
        })?;
        Ok(rewrite_keys(document, '.', self.placeholder))
    }

    pub fn decode<T: DeserializeOwned>(&self, document: Document) -> Result<T, AgentError> {
        assert!(self.finalized, "DocumentMapper used before finalize()");

        let document = rewrite_keys(document, self.placeholder, '.');
        bson::from_document(document).map_err(|error| AgentError::Mapping {
            detail: error.to_string(),
        })
    }
}

fn rewrite_keys(document: Document, from: char, to: char) -> Document {
    document
        .into_iter()
        .map(|(key, value)| (key.replace(from, &to.to_string()), rewrite_value(value, from, to)))
        .collect()
}

fn rewrite_value(value: Bson, from: char, to: char) -> Bson {
    match value {
        Bson::Document(inner) => Bson::Document(rewrite_keys(inner, from, to)),
        Bson::Array(items) => Bson::Array(
            items
                .into_iter()
                .map(|item| rewrite_value(item, from, to))
                .collect(),
        ),
        other => other,
    }
}

/// Converts a stored textual timestamp into a date-time value. Total over
/// absent input: `None` in, `None` out.
pub fn parse_datetime(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, AgentError> {
    match raw {
        None => Ok(None),
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|error| AgentError::Mapping {
                detail: format!("cannot convert `{}` to a date-time: {}", text, error),
            }),
    }
}

/// Converts a stored textual calendar date into a date value. Total over
/// absent input: `None` in, `None` out. Stored as midnight when written.
pub fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AgentError> {
    match raw {
        None => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|error| AgentError::Mapping {
                detail: format!("cannot convert `{}` to a date: {}", text, error),
            }),
    }
}

/// Field codec for date-time values: written as a native date-time leaf,
/// read back from either a native value or a legacy string representation.
pub mod datetime_field {
    use bson::Bson;
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    use super::parse_datetime;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bson::DateTime::from_chrono(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Bson::deserialize(deserializer)? {
            Bson::DateTime(stored) => Ok(stored.to_chrono()),
            Bson::String(text) => parse_datetime(Some(&text))
                .map_err(de::Error::custom)?
                .ok_or_else(|| de::Error::custom("empty date-time value")),
            other => Err(de::Error::custom(format!(
                "expected a date-time, found {}",
                other
            ))),
        }
    }
}

/// Field codec for optional calendar dates: written as a native date-time
/// leaf at midnight, read back from a native value, a legacy string, or
/// null (null in, null out).
pub mod date_field {
    use bson::Bson;
    use chrono::{NaiveDate, NaiveTime};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    use super::parse_date;

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            None => serializer.serialize_none(),
            Some(date) => {
                let midnight = date.and_time(NaiveTime::MIN).and_utc();
                bson::DateTime::from_chrono(midnight).serialize(serializer)
            }
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Bson::deserialize(deserializer)? {
            Bson::Null => Ok(None),
            Bson::DateTime(stored) => Ok(Some(stored.to_chrono().date_naive())),
            Bson::String(text) => parse_date(Some(&text)).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!("expected a date, found {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bson::doc;
    use chrono::{NaiveTime, TimeZone};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Tagged {
        name: String,
        #[serde(with = "datetime_field")]
        seen_at: DateTime<Utc>,
        #[serde(with = "date_field", default)]
        released_on: Option<NaiveDate>,
        attributes: HashMap<String, String>,
    }

    fn mapper() -> DocumentMapper {
        DocumentMapper::new('#').finalize()
    }

    fn sample() -> Tagged {
        let mut attributes = HashMap::new();
        attributes.insert("geo.region".to_string(), "north".to_string());
        Tagged {
            name: "specimen".to_string(),
            seen_at: Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 15).unwrap(),
            released_on: Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
            attributes,
        }
    }

    #[test]
    fn dotted_map_keys_are_escaped_and_restored() {
        let mapper = mapper();
        let encoded = mapper.encode(&sample()).unwrap();

        let attributes = encoded.get_document("attributes").unwrap();
        assert!(attributes.contains_key("geo#region"));
        assert!(!attributes.contains_key("geo.region"));

        let decoded: Tagged = mapper.decode(encoded).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn escaping_reaches_documents_nested_in_arrays() {
        let document = doc! {
            "entries": [ { "a.b": 1 }, { "plain": 2 } ],
            "outer.key": true,
        };
        let escaped = rewrite_keys(document, '.', '#');

        assert!(escaped.contains_key("outer#key"));
        let entries = escaped.get_array("entries").unwrap();
        let first = entries[0].as_document().unwrap();
        assert!(first.contains_key("a#b"));

        let restored = rewrite_keys(escaped, '#', '.');
        assert!(restored.contains_key("outer.key"));
    }

    #[test]
    fn no_type_discriminator_is_written() {
        let encoded = mapper().encode(&sample()).unwrap();
        let keys: Vec<&str> = encoded.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "seen_at", "released_on", "attributes"]);
    }

    #[test]
    fn date_time_round_trips_at_storage_precision() {
        let mapper = mapper();
        let original = sample();

        let decoded: Tagged = mapper.decode(mapper.encode(&original).unwrap()).unwrap();
        assert_eq!(decoded.seen_at, original.seen_at);

        // Native storage keeps millisecond precision.
        let millis = Utc.timestamp_millis_opt(1_709_632_215_123).unwrap();
        let record = Tagged {
            seen_at: millis,
            ..sample()
        };
        let decoded: Tagged = mapper.decode(mapper.encode(&record).unwrap()).unwrap();
        assert_eq!(decoded.seen_at, millis);
    }

    #[test]
    fn dates_are_stored_as_native_midnight_leaves() {
        let encoded = mapper().encode(&sample()).unwrap();
        match encoded.get("released_on") {
            Some(Bson::DateTime(stored)) => {
                let chrono = stored.to_chrono();
                assert_eq!(chrono.time(), NaiveTime::MIN);
                assert_eq!(chrono.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
            }
            other => panic!("expected a native date-time leaf, found {:?}", other),
        }
    }

    #[test]
    fn legacy_string_values_decode_through_the_converters() {
        let document = doc! {
            "name": "specimen",
            "seen_at": "2024-03-05T10:30:15Z",
            "released_on": "2024-06-01",
            "attributes": {},
        };

        let decoded: Tagged = mapper().decode(document).unwrap();
        assert_eq!(
            decoded.seen_at,
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 15).unwrap()
        );
        assert_eq!(
            decoded.released_on,
            Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        );
    }

    #[test]
    fn null_and_absent_dates_decode_to_none() {
        let with_null = doc! {
            "name": "specimen",
            "seen_at": "2024-03-05T10:30:15Z",
            "released_on": Bson::Null,
            "attributes": {},
        };
        let decoded: Tagged = mapper().decode(with_null).unwrap();
        assert_eq!(decoded.released_on, None);

        let absent = doc! {
            "name": "specimen",
            "seen_at": "2024-03-05T10:30:15Z",
            "attributes": {},
        };
        let decoded: Tagged = mapper().decode(absent).unwrap();
        assert_eq!(decoded.released_on, None);
    }

    #[test]
    fn converters_are_total_over_absent_input() {
        assert_eq!(parse_datetime(None).unwrap(), None);
        assert_eq!(parse_date(None).unwrap(), None);
    }

    #[test]
    fn malformed_stored_values_are_mapping_errors() {
        let error = parse_datetime(Some("yesterday-ish")).unwrap_err();
        assert!(matches!(error, AgentError::Mapping { .. }));
        assert!(error.to_string().contains("yesterday-ish"));

        let error = parse_date(Some("01/06/2024")).unwrap_err();
        assert!(matches!(error, AgentError::Mapping { .. }));

        let document = doc! {
            "name": "specimen",
            "seen_at": "not a timestamp",
            "attributes": {},
        };
        let error = mapper().decode::<Tagged>(document).unwrap_err();
        assert!(matches!(error, AgentError::Mapping { .. }));
    }

    #[test]
    #[should_panic(expected = "finalize")]
    fn unfinalized_mapper_cannot_encode() {
        let mapper = DocumentMapper::new('#');
        let _ = mapper.encode(&sample());
    }

    #[test]
    #[should_panic(expected = "placeholder")]
    fn dot_placeholder_is_rejected_at_finalization() {
        let _ = DocumentMapper::new('.').finalize();
    }
}
