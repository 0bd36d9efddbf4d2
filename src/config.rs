use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const DEF_DATABASE_URL: &str = "sqlite:./db/inventory.sqlite3";
const DEF_MAX_CONNECTIONS: u32 = 1;
const DEF_BUSY_TIMEOUT_SECS: u64 = 5;
const DEF_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEF_COLLECT_TIMEOUT_SECS: u64 = 15;
const DEF_CUPS_PRINTERS_CONF: &str = "/etc/cups/printers.conf";
const DEF_SYSFS_ROOT: &str = "/sys";

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub collector: CollectorConfig,
}

/// Everything the store needs to open its pool.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    // how long a writer waits on the database lock before giving up
    pub busy_timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub timeout: Duration,
    pub cups_printers_conf: PathBuf,
    pub sysfs_root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEF_DATABASE_URL.to_owned(),
            max_connections: DEF_MAX_CONNECTIONS,
            busy_timeout: Duration::from_secs(DEF_BUSY_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEF_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEF_COLLECT_TIMEOUT_SECS),
            cups_printers_conf: PathBuf::from(DEF_CUPS_PRINTERS_CONF),
            sysfs_root: PathBuf::from(DEF_SYSFS_ROOT),
        }
    }
}

impl StoreConfig {
    /// Single-connection in-memory store, used by tests.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_owned(),
            max_connections: 1,
            ..Self::default()
        }
    }
}

impl Config {
    /// Reads `PROBE_*` variables, honouring a `.env` file if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = StoreConfig {
            database_url: lookup("PROBE_DATABASE_URL").unwrap_or_else(|| DEF_DATABASE_URL.to_owned()),
            max_connections: parse_or(&lookup, "PROBE_MAX_CONNECTIONS", DEF_MAX_CONNECTIONS)?,
            busy_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PROBE_BUSY_TIMEOUT_SECS",
                DEF_BUSY_TIMEOUT_SECS,
            )?),
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PROBE_CONNECT_TIMEOUT_SECS",
                DEF_CONNECT_TIMEOUT_SECS,
            )?),
        };

        let collector = CollectorConfig {
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "PROBE_COLLECT_TIMEOUT_SECS",
                DEF_COLLECT_TIMEOUT_SECS,
            )?),
            cups_printers_conf: lookup("PROBE_CUPS_PRINTERS_CONF")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEF_CUPS_PRINTERS_CONF)),
            sysfs_root: lookup("PROBE_SYSFS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEF_SYSFS_ROOT)),
        };

        if store.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "PROBE_MAX_CONNECTIONS",
                value: "0".to_owned(),
            });
        }

        Ok(Config { store, collector })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
