use log::info;
use mongodb::bson::doc;
use mongodb::options::{
    ClientOptions, Credential, ReadConcern, ReadPreference, SelectionCriteria, ServerAddress,
    WriteConcern,
};
use mongodb::Client;

use crate::config::settings::{ConnectionSettings, ReadPreferenceSetting};
use crate::error::AgentError;
use crate::utils::constants::APP_NAME;

/// Builds a client from the parsed settings and verifies it can reach the
/// datastore before returning.
///
/// Every connection built here carries the same fixed durability policy:
/// writes acknowledged by a majority of replica members, reads observing a
/// majority-committed snapshot, read distribution per the configured
/// preference. Callers cannot override any of it.
///
/// The connection is eager: a ping runs against the configured database so
/// that network or authentication failures surface here rather than on the
/// first operation. Failures are not retried; the caller owns that policy.
pub async fn connect(settings: &ConnectionSettings) -> Result<Client, AgentError> {
    let address = ServerAddress::Tcp {
        host: settings.host.clone(),
        port: Some(settings.port),
    };

    let credential = Credential::builder()
        .username(settings.username.clone())
        .password(settings.password.expose().to_string())
        .source(settings.auth_database.clone())
        .build();

    let options = ClientOptions::builder()
        .hosts(vec![address])
        .app_name(APP_NAME.to_string())
        .credential(credential)
        .write_concern(WriteConcern::majority())
        .read_concern(ReadConcern::majority())
        .selection_criteria(selection_criteria(settings.read_preference))
        .build();

    let client = Client::with_options(options).map_err(AgentError::Connectivity)?;

    client
        .database(&settings.database)
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(AgentError::Connectivity)?;

    info!(
        "Connected to datastore at {}:{} (database '{}', read preference '{}')",
        settings.host,
        settings.port,
        settings.database,
        settings.read_preference.as_str()
    );

    Ok(client)
}

fn selection_criteria(setting: ReadPreferenceSetting) -> SelectionCriteria {
    let read_preference = match setting {
        ReadPreferenceSetting::Primary => ReadPreference::Primary,
        ReadPreferenceSetting::PrimaryPreferred => ReadPreference::PrimaryPreferred {
            options: Default::default(),
        },
        ReadPreferenceSetting::Secondary => ReadPreference::Secondary {
            options: Default::default(),
        },
        ReadPreferenceSetting::SecondaryPreferred => ReadPreference::SecondaryPreferred {
            options: Default::default(),
        },
        ReadPreferenceSetting::Nearest => ReadPreference::Nearest {
            options: Default::default(),
        },
    };
    SelectionCriteria::ReadPreference(read_preference)
}
