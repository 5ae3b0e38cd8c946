use std::fmt;
use std::str::FromStr;

use crate::config::properties::Properties;
use crate::error::ConfigError;
use crate::utils::constants::{
    PROPERTY_DATABASE_AUTH_SOURCE, PROPERTY_DATABASE_HOST, PROPERTY_DATABASE_NAME,
    PROPERTY_DATABASE_PASSWORD, PROPERTY_DATABASE_PORT, PROPERTY_DATABASE_READ_PREFERENCE,
    PROPERTY_DATABASE_USER,
};

/// The credential as read from the properties source. Debug output renders
/// a placeholder so settings can be logged without leaking the secret.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Hands the raw value to the connection handshake. Only the
    /// connection builder should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// The enumerated read-preference names the datastore accepts. Parsing is
/// closed over this set; anything else fails configuration before any
/// connection attempt is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPreferenceSetting {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl ReadPreferenceSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::PrimaryPreferred => "primaryPreferred",
            Self::Secondary => "secondary",
            Self::SecondaryPreferred => "secondaryPreferred",
            Self::Nearest => "nearest",
        }
    }
}

impl FromStr for ReadPreferenceSetting {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "primary" => Ok(Self::Primary),
            "primaryPreferred" => Ok(Self::PrimaryPreferred),
            "secondary" => Ok(Self::Secondary),
            "secondaryPreferred" => Ok(Self::SecondaryPreferred),
            "nearest" => Ok(Self::Nearest),
            other => Err(ConfigError::UnknownReadPreference(other.to_string())),
        }
    }
}

/// Typed connection parameters for one datastore environment.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Secret,
    pub auth_database: String,
    pub read_preference: ReadPreferenceSetting,
}

impl ConnectionSettings {
    /// Parses the required connection properties. Every key must be present
    /// and non-empty; the port must parse and the read preference must name
    /// one of the enumerated values.
    pub fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        let host = properties.require(PROPERTY_DATABASE_HOST)?.to_string();

        let raw_port = properties.require(PROPERTY_DATABASE_PORT)?;
        let port: u16 = raw_port.parse().map_err(|_| ConfigError::InvalidValue {
            key: PROPERTY_DATABASE_PORT.to_string(),
            value: raw_port.to_string(),
            reason: "not a valid port number".to_string(),
        })?;

        let database = properties.require(PROPERTY_DATABASE_NAME)?.to_string();
        let username = properties.require(PROPERTY_DATABASE_USER)?.to_string();
        let password = Secret::new(properties.require(PROPERTY_DATABASE_PASSWORD)?);
        let auth_database = properties.require(PROPERTY_DATABASE_AUTH_SOURCE)?.to_string();
        let read_preference = properties
            .require(PROPERTY_DATABASE_READ_PREFERENCE)?
            .parse()?;

        Ok(Self {
            host,
            port,
            database,
            username,
            password,
            auth_database,
            read_preference,
        })
    }
}
