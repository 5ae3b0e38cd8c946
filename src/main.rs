use log::{error, info};

use accession_agent::config;
use accession_agent::core::loader::Loader;

#[tokio::main]
async fn main() {
    config::logger::Logger::init().expect("Failed to initialize logger");

    info!("Starting accession agent");

    let mut loader = match Loader::new().await {
        Ok(loader) => loader,
        Err(e) => {
            error!("Failed to build datastore environment: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = loader.run().await {
        error!("Batch load failed: {}", e);
        std::process::exit(1);
    }

    info!("Accession agent completed");
}
