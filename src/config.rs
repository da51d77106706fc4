use std::{
    env,
    fmt::Display,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};
use log::LevelFilter;

use crate::error::{AgentError, AgentResult};


pub struct Config {
    pub database_url: String,
    pub storage_url: String,
    pub storage_key: String,
    pub storage_bucket: String,
    pub queue_path: PathBuf,
    pub probe_url: String,
    pub probe_period: Duration,
    pub offline_probe_period: Duration,
    pub probe_timeout: Duration,
    pub scheduler_tick: Duration,
    pub sentry_dsn: Option<String>,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn from_env() -> AgentResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AgentResult<Self> where
        F: Fn(&str) -> Option<String> {

        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage_url = required(&var, "STORAGE_URL")?;

        Ok(Config {
            database_url: required(&var, "DATABASE_URL")?,
            storage_key: required(&var, "STORAGE_KEY")?,
            storage_bucket: var("STORAGE_BUCKET").unwrap_or_else(|| "hazard-photos".into()),
            queue_path: var("QUEUE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/pending_reports.json")),
            probe_url: var("PROBE_URL").unwrap_or_else(|| storage_url.clone()),
            probe_period: Duration::from_secs(try_load(&var, "PROBE_PERIOD_SECS", "30")?),
            offline_probe_period: Duration::from_secs(
                try_load(&var, "OFFLINE_PROBE_PERIOD_SECS", "5")?),
            probe_timeout: Duration::from_secs(try_load(&var, "PROBE_TIMEOUT_SECS", "5")?),
            scheduler_tick: Duration::from_millis(
                try_load(&var, "SCHEDULER_TICK_MILLIS", "500")?),
            sentry_dsn: var("SENTRY_DSN"),
            log_level: try_load(&var, "LOG_LEVEL", "info")?,
            storage_url,
        })
    }
}


fn required<F>(var: &F, key: &str) -> AgentResult<String> where
    F: Fn(&str) -> Option<String> {

    var(key).ok_or_else(|| AgentError::Config(format!("{} must be set", key)))
}

fn try_load<T, F>(var: &F, key: &str, default: &str) -> AgentResult<T> where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String> {

    var(key)
        .unwrap_or_else(|| default.to_owned())
        .parse()
        .map_err(|err| AgentError::Config(format!("Invalid {} value: {}", key, err)))
}
