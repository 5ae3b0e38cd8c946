use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use csv::Writer;
use log::{error, info, warn};

use crate::accession::record::{ArchiveRecord, CsvRecord};
use crate::accession::service::AccessionRegistry;
use crate::config::properties::Properties;
use crate::error::ConfigError;
use crate::storage::environment::Environment;
use crate::utils::constants::{ENV_INPUT_FILE, ENV_PROPERTIES_FILE, REPORT_DIRECTORY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordStatus {
    Inserted,
    Existing,
    Invalid,
}

impl RecordStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Existing => "existing",
            Self::Invalid => "invalid",
        }
    }
}

/// One batch job run: read the input file, register every record through
/// the accessioning service, and write a per-record status report.
pub struct Loader {
    environment: Environment,
    input_path: PathBuf,
    statuses: HashMap<String, RecordStatus>,
}

impl Loader {
    /// Builds the datastore environment (full construction path) from the
    /// properties file named by `AGENT_PROPERTIES`; the input file comes
    /// from `AGENT_INPUT`.
    pub async fn new() -> Result<Self, Box<dyn Error>> {
        let properties_path = env::var(ENV_PROPERTIES_FILE)
            .map_err(|_| ConfigError::MissingKey(ENV_PROPERTIES_FILE.to_string()))?;
        let input_path = env::var(ENV_INPUT_FILE)
            .map_err(|_| ConfigError::MissingKey(ENV_INPUT_FILE.to_string()))?;

        let properties = Properties::from_file(&properties_path)?;
        let environment = Environment::connect_with_services(&properties, &AccessionRegistry).await?;

        Ok(Self {
            environment,
            input_path: PathBuf::from(input_path),
            statuses: HashMap::new(),
        })
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn Error>> {
        let (records, invalid) = parse_input(&self.input_path)?;
        for accession in invalid {
            self.statuses.insert(accession, RecordStatus::Invalid);
        }

        if records.is_empty() {
            warn!("No loadable records in {}", self.input_path.display());
        } else {
            let services = self
                .environment
                .services()
                .ok_or("accessioning services not configured")?;

            let outcome = services.accessions.register(records).await?;
            for accession in outcome.inserted {
                self.statuses.insert(accession, RecordStatus::Inserted);
            }
            for accession in outcome.existing {
                self.statuses.insert(accession, RecordStatus::Existing);
            }
        }

        self.display_statuses();
        self.save_report()?;

        Ok(())
    }

    fn display_statuses(&self) {
        for (accession, status) in &self.statuses {
            match status {
                RecordStatus::Inserted => info!("Accession '{}' registered.", accession),
                RecordStatus::Existing => info!("Accession '{}' already present.", accession),
                RecordStatus::Invalid => error!("Accession '{}' rejected as invalid.", accession),
            }
        }
    }

    fn save_report(&self) -> Result<(), Box<dyn Error>> {
        let now = Local::now();
        let date = now.format("%Y-%m-%d").to_string();
        let hour = now.format("%H-%M-%S").to_string();
        let folder_path = format!("{}/{}", REPORT_DIRECTORY, date);
        let file_path = format!("{}/{}.csv", folder_path, hour);

        fs::create_dir_all(&folder_path)?;

        let mut writer = Writer::from_path(&file_path)?;
        writer.write_record(["accession", "status"])?;
        for (accession, status) in &self.statuses {
            writer.write_record([accession.as_str(), status.as_str()])?;
        }
        writer.flush()?;

        info!("Report saved to: {}", file_path);

        Ok(())
    }
}

/// Reads the batch input file. Rows that cannot be read or converted are
/// logged and reported, not fatal; the accessions of rejected rows come
/// back alongside the loadable records.
fn parse_input(path: &Path) -> Result<(Vec<ArchiveRecord>, Vec<String>), csv::Error> {
    let source = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    let mut invalid = Vec::new();

    for row in reader.deserialize::<CsvRecord>() {
        let row = match row {
            Ok(row) => row,
            Err(error) => {
                error!("Skipping unreadable input row: {}", error);
                continue;
            }
        };

        let accession = row.accession.clone();
        match row.into_record(&source) {
            Ok(record) => records.push(record),
            Err(error) => {
                error!("Skipping record '{}': {}", accession, error);
                invalid.push(accession);
            }
        }
    }

    Ok((records, invalid))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn input_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_loadable_rows_and_collects_rejects() {
        let file = input_file(
            "accession,title,submitter,accessioned_at,released_on\n\
             ERS0001,Soil metagenome,field-lab,2024-03-05T10:30:15Z,2024-06-01\n\
             ERS0002,Water sample,field-lab,2024-03-06T08:00:00Z,not-a-date\n\
             ERS0003,Air filter,city-lab,2024-03-07T09:15:00Z,\n",
        );

        let (records, invalid) = parse_input(file.path()).unwrap();

        assert_eq!(invalid, vec!["ERS0002".to_string()]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].accession, "ERS0001");
        assert_eq!(records[1].accession, "ERS0003");
        assert_eq!(records[1].released_on, None);

        let source = records[0].attributes.get("load.source").unwrap();
        assert!(source.ends_with(".csv"));
    }

    #[test]
    fn missing_input_file_is_fatal() {
        assert!(parse_input(Path::new("/no/such/batch.csv")).is_err());
    }
}
