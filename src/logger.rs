use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};

use crate::config::Config;


pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Logger { level }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{}] [{}] {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}


/// Installs the logger. With a Sentry DSN, errors are also reported to Sentry
/// and lower levels are kept as breadcrumbs. Keep the returned guard alive.
pub fn init(config: &Config) -> Result<Option<sentry::ClientInitGuard>, SetLoggerError> {
    let logger = Logger::new(config.log_level);

    let guard = match &config.sentry_dsn {
        Some(dsn) => {
            let guard = sentry::init((dsn.as_str(), sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            }));
            log::set_boxed_logger(Box::new(sentry_log::SentryLogger::with_dest(logger)))?;
            Some(guard)
        },
        None => {
            log::set_boxed_logger(Box::new(logger))?;
            None
        },
    };

    log::set_max_level(config.log_level);
    Ok(guard)
}
