use chrono::Local;
use fern::Dispatch;
use log::LevelFilter;
use std::fs::create_dir_all;

use crate::utils::constants::LOG_DIRECTORY;

pub struct Logger;

impl Logger {
    pub fn init() -> Result<(), fern::InitError> {
        create_dir_all(LOG_DIRECTORY)?;

        let log_file = format!(
            "{}/agent-{}.log",
            LOG_DIRECTORY,
            Local::now().format("%Y-%m-%d")
        );

        Dispatch::new()
            .chain(std::io::stdout())
            .chain(fern::log_file(log_file)?)
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{} [{}] - {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    message
                ))
            })
            .level(LevelFilter::Info)
            // The driver's topology chatter drowns the job log at info level.
            .level_for("mongodb", LevelFilter::Warn)
            .apply()?;

        Ok(())
    }
}
