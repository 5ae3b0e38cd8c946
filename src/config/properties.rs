use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;

/// A flat key-value properties source, loaded once into an owned map.
///
/// Nothing here touches the process environment, so any number of
/// `Properties` values (production, staging, ...) can coexist in one
/// process and each builds its own datastore environment.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    /// Reads a `KEY=VALUE` properties file from disk.
    ///
    /// The underlying I/O failure is preserved as the error source rather
    /// than being collapsed into a generic message.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path).map_err(|error| read_error(path, error))?;

        let mut values = HashMap::new();
        for entry in entries {
            let (key, value) = entry.map_err(|error| read_error(path, error))?;
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    /// Builds a properties source directly from key-value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the value for `key`, treating an absent or empty value as a
    /// missing property.
    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }
}

fn read_error(path: &Path, error: dotenvy::Error) -> ConfigError {
    match error {
        dotenvy::Error::Io(source) => ConfigError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => ConfigError::Malformed {
            path: path.to_path_buf(),
            source: other,
        },
    }
}
