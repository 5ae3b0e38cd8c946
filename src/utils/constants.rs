pub const LOG_DIRECTORY: &str = "logs";
pub const REPORT_DIRECTORY: &str = "reports";

pub const APP_NAME: &str = "accession-agent";

pub const COLLECTION_NAME_RECORDS: &str = "records";

// MongoDB forbids literal dots in document keys; map keys are rewritten
// with this placeholder on write and restored on read.
pub const KEY_DOT_PLACEHOLDER: char = '#';

// Required keys of the connection properties file.
pub const PROPERTY_DATABASE_HOST: &str = "DATABASE_HOST";
pub const PROPERTY_DATABASE_PORT: &str = "DATABASE_PORT";
pub const PROPERTY_DATABASE_NAME: &str = "DATABASE_NAME";
pub const PROPERTY_DATABASE_USER: &str = "DATABASE_USER";
pub const PROPERTY_DATABASE_PASSWORD: &str = "DATABASE_PASSWORD";
pub const PROPERTY_DATABASE_AUTH_SOURCE: &str = "DATABASE_AUTH_SOURCE";
pub const PROPERTY_DATABASE_READ_PREFERENCE: &str = "DATABASE_READ_PREFERENCE";

// Process-level knobs for the loader binary.
pub const ENV_PROPERTIES_FILE: &str = "AGENT_PROPERTIES";
pub const ENV_INPUT_FILE: &str = "AGENT_INPUT";
