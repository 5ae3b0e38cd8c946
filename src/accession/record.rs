use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::storage::bulk::StoredDocument;
use crate::storage::mapping::{date_field, datetime_field, parse_date};
use crate::utils::constants::COLLECTION_NAME_RECORDS;

/// The kinds of document this agent stores, each mapped explicitly to its
/// collection name. Call sites resolve the name through this enum instead
/// of inferring it from a value's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    ArchiveRecord,
}

impl DocumentKind {
    pub fn collection_name(&self) -> &'static str {
        match self {
            Self::ArchiveRecord => COLLECTION_NAME_RECORDS,
        }
    }
}

/// An accessioned archive record. The accession string is the document
/// identifier; free-form attributes keep whatever namespaced keys the
/// submitter used, dots included; the mapper rewrites them for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    #[serde(rename = "_id")]
    pub accession: String,
    pub title: String,
    pub submitter: String,
    #[serde(with = "datetime_field")]
    pub accessioned_at: DateTime<Utc>,
    #[serde(with = "date_field", default, skip_serializing_if = "Option::is_none")]
    pub released_on: Option<NaiveDate>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl StoredDocument for ArchiveRecord {
    fn id(&self) -> &str {
        &self.accession
    }
}

/// One row of the batch input file.
#[derive(Debug, Deserialize)]
pub struct CsvRecord {
    pub accession: String,
    pub title: String,
    pub submitter: String,
    pub accessioned_at: DateTime<Utc>,
    pub released_on: Option<String>,
}

impl CsvRecord {
    /// Converts the flat row into an archive record, stamping the source
    /// file as a provenance attribute. The release date goes through the
    /// same scalar converter the mapper uses for stored strings.
    pub fn into_record(self, source: &str) -> Result<ArchiveRecord, AgentError> {
        let released_on = parse_date(
            self.released_on
                .as_deref()
                .filter(|value| !value.is_empty()),
        )?;

        let mut attributes = HashMap::new();
        attributes.insert("load.source".to_string(), source.to_string());

        Ok(ArchiveRecord {
            accession: self.accession,
            title: self.title,
            submitter: self.submitter,
            accessioned_at: self.accessioned_at,
            released_on,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn csv_row(released_on: Option<&str>) -> CsvRecord {
        CsvRecord {
            accession: "ERS0001".to_string(),
            title: "Soil metagenome".to_string(),
            submitter: "field-lab".to_string(),
            accessioned_at: Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 15).unwrap(),
            released_on: released_on.map(str::to_string),
        }
    }

    #[test]
    fn kinds_map_to_collection_names() {
        assert_eq!(DocumentKind::ArchiveRecord.collection_name(), "records");
    }

    #[test]
    fn rows_convert_with_provenance_attribute() {
        let record = csv_row(Some("2024-06-01")).into_record("batch-07.csv").unwrap();

        assert_eq!(record.accession, "ERS0001");
        assert_eq!(
            record.released_on,
            Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        );
        assert_eq!(
            record.attributes.get("load.source").map(String::as_str),
            Some("batch-07.csv")
        );
    }

    #[test]
    fn empty_and_absent_release_dates_convert_to_none() {
        let record = csv_row(None).into_record("batch.csv").unwrap();
        assert_eq!(record.released_on, None);

        let record = csv_row(Some("")).into_record("batch.csv").unwrap();
        assert_eq!(record.released_on, None);
    }

    #[test]
    fn malformed_release_dates_are_rejected() {
        let error = csv_row(Some("June 1st")).into_record("batch.csv").unwrap_err();
        assert!(matches!(error, AgentError::Mapping { .. }));
    }

    #[test]
    fn records_round_trip_through_the_mapper() {
        use crate::storage::mapping::DocumentMapper;

        let mut record = csv_row(Some("2024-06-01")).into_record("batch.csv").unwrap();
        record
            .attributes
            .insert("geo.site".to_string(), "N54".to_string());

        let mapper = DocumentMapper::new('#').finalize();
        let encoded = mapper.encode(&record).unwrap();
        assert_eq!(encoded.get_str("_id").unwrap(), "ERS0001");
        assert!(encoded.get_document("attributes").unwrap().contains_key("geo#site"));

        let decoded: ArchiveRecord = mapper.decode(encoded).unwrap();
        assert_eq!(decoded, record);
    }
}
