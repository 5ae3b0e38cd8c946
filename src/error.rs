use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while turning a properties source into connection
/// settings. None of these are retried; environment construction aborts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required property `{0}`")]
    MissingKey(String),

    #[error("invalid value `{value}` for property `{key}`: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown read preference `{0}`")]
    UnknownReadPreference(String),

    #[error("cannot read properties file `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed properties file `{}`", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Crate-wide error taxonomy. Every failure propagates to the caller with
/// the offending key or identifiers attached; nothing is retried here.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Network or authentication failure while establishing the connection.
    /// The caller owns the retry policy.
    #[error("failed to reach the datastore: {0}")]
    Connectivity(#[source] mongodb::error::Error),

    /// Uniqueness violation during the insert step of a bulk load, caused
    /// by a concurrent writer landing between the existence check and the
    /// insert. The listed identifiers conflicted.
    #[error("insert conflicted with existing identifiers {ids:?}")]
    WriteConflict {
        ids: Vec<String>,
        #[source]
        source: mongodb::error::Error,
    },

    /// A stored value could not be converted by a registered scalar
    /// converter. Treated as a data-integrity signal, not routine.
    #[error("cannot map stored value: {detail}")]
    Mapping { detail: String },

    /// Any other driver failure surfaced by a normal operation.
    #[error("datastore operation failed: {0}")]
    Datastore(#[source] mongodb::error::Error),
}
