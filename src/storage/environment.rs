use log::info;
use mongodb::bson::Document;
use mongodb::{Client, Collection, Database};

use crate::accession::service::AccessionService;
use crate::config::properties::Properties;
use crate::config::settings::ConnectionSettings;
use crate::error::AgentError;
use crate::storage::bulk::{self, StoredDocument};
use crate::storage::connection;
use crate::storage::mapping::DocumentMapper;
use crate::utils::constants::KEY_DOT_PLACEHOLDER;

/// Domain services resolved against one environment's connection.
pub struct DomainServices {
    pub accessions: AccessionService,
}

/// Resolves domain services against a freshly built connection and mapper.
/// Injected into the full construction path so service wiring stays out of
/// this module; the client and mapper are assembled identically either way.
pub trait ServiceRegistry {
    fn resolve(&self, database: &Database, mapper: &DocumentMapper) -> DomainServices;
}

/// An isolated datastore environment: one live connection, one document
/// mapper, and optionally the domain services bound to that connection.
///
/// Environments are plain values with no shared global state, so several
/// (production, staging, ...) can coexist in one process, each built from
/// its own properties source. A handle is never mutated after
/// construction; dropping it or calling [`Environment::close`] releases
/// the connection, and the mapper needs no teardown.
pub struct Environment {
    client: Client,
    database: Database,
    mapper: DocumentMapper,
    services: Option<DomainServices>,
}

impl Environment {
    /// Direct construction path: properties to connection to mapper, with
    /// no domain services attached. For data-access-only callers.
    ///
    /// Construction is idempotent over the same properties source: calling
    /// it again yields an independent, equivalently configured handle.
    pub async fn connect(properties: &Properties) -> Result<Self, AgentError> {
        Self::assemble(properties, None).await
    }

    /// Full construction path: same client and mapper assembly as
    /// [`Environment::connect`], plus domain services resolved by the
    /// injected registry against the new connection.
    pub async fn connect_with_services(
        properties: &Properties,
        registry: &dyn ServiceRegistry,
    ) -> Result<Self, AgentError> {
        Self::assemble(properties, Some(registry)).await
    }

    async fn assemble(
        properties: &Properties,
        registry: Option<&dyn ServiceRegistry>,
    ) -> Result<Self, AgentError> {
        let settings = ConnectionSettings::from_properties(properties)?;
        let client = connection::connect(&settings).await?;
        let database = client.database(&settings.database);
        let mapper = DocumentMapper::new(KEY_DOT_PLACEHOLDER).finalize();
        let services = registry.map(|registry| registry.resolve(&database, &mapper));

        info!(
            "Datastore environment ready for database '{}'",
            settings.database
        );

        Ok(Self {
            client,
            database,
            mapper,
            services,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn mapper(&self) -> &DocumentMapper {
        &self.mapper
    }

    /// Domain services, present only on handles built through the full
    /// construction path.
    pub fn services(&self) -> Option<&DomainServices> {
        self.services.as_ref()
    }

    /// Resolves a collection by explicit name. Collection naming is always
    /// a call-site decision; nothing here infers it from a value's type.
    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection(name)
    }

    /// Bulk insert-if-absent into the named collection: candidates whose
    /// identifier already exists are left untouched, the rest are written
    /// in one batched insert. See [`bulk::insert_new_documents`].
    pub async fn insert_new_documents<T: StoredDocument>(
        &self,
        collection_name: &str,
        candidates: Vec<T>,
    ) -> Result<(), AgentError> {
        let collection = self.collection(collection_name);
        bulk::insert_new_documents(&collection, &self.mapper, candidates).await?;
        Ok(())
    }

    /// Releases the underlying connection. The mapper and any services
    /// need no explicit teardown.
    pub async fn close(self) {
        self.client.shutdown().await;
    }
}
