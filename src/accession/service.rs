use log::info;
use mongodb::bson::{doc, Document};
use mongodb::{Collection, Database};

use crate::accession::record::{ArchiveRecord, DocumentKind};
use crate::error::AgentError;
use crate::storage::bulk::{self, BulkOutcome};
use crate::storage::environment::{DomainServices, ServiceRegistry};
use crate::storage::mapping::DocumentMapper;

/// Accessioning operations bound to one environment's connection. Reads
/// are limited to existence checks and single-record lookups; the write
/// path is the insert-if-absent bulk load.
pub struct AccessionService {
    records: Collection<Document>,
    mapper: DocumentMapper,
}

impl AccessionService {
    pub fn new(database: &Database, mapper: DocumentMapper) -> Self {
        let records = database.collection(DocumentKind::ArchiveRecord.collection_name());
        Self { records, mapper }
    }

    /// Registers a batch of records, inserting only those whose accession
    /// is not already present. Already-registered accessions keep their
    /// stored contents untouched.
    pub async fn register(&self, records: Vec<ArchiveRecord>) -> Result<BulkOutcome, AgentError> {
        let outcome = bulk::insert_new_documents(&self.records, &self.mapper, records).await?;
        info!(
            "Registered {} new accessions ({} already present)",
            outcome.inserted.len(),
            outcome.existing.len()
        );
        Ok(outcome)
    }

    pub async fn is_registered(&self, accession: &str) -> Result<bool, AgentError> {
        let found = self
            .records
            .find_one(doc! { "_id": accession })
            .await
            .map_err(AgentError::Datastore)?;
        Ok(found.is_some())
    }

    pub async fn find(&self, accession: &str) -> Result<Option<ArchiveRecord>, AgentError> {
        let found = self
            .records
            .find_one(doc! { "_id": accession })
            .await
            .map_err(AgentError::Datastore)?;

        match found {
            Some(document) => Ok(Some(self.mapper.decode(document)?)),
            None => Ok(None),
        }
    }
}

/// The default service registry: binds the accessioning service to the
/// environment's connection during full construction.
pub struct AccessionRegistry;

impl ServiceRegistry for AccessionRegistry {
    fn resolve(&self, database: &Database, mapper: &DocumentMapper) -> DomainServices {
        DomainServices {
            accessions: AccessionService::new(database, mapper.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::options::{ClientOptions, ServerAddress};
    use mongodb::Client;

    use super::*;

    // Client handles are lazy, so service wiring is checkable offline.
    #[tokio::test]
    async fn registry_binds_services_to_the_given_database() {
        let options = ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: "localhost".to_string(),
                port: Some(27017),
            }])
            .build();
        let client = Client::with_options(options).unwrap();
        let database = client.database("accessions");
        let mapper = DocumentMapper::new('#').finalize();

        let services = AccessionRegistry.resolve(&database, &mapper);
        assert_eq!(services.accessions.records.name(), "records");
    }
}
