use std::time::Duration;

use thiserror::Error;

use crate::inventory::DeviceCategory;

/// Failure of one backend query. Never escapes the assembler.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{0} is not supported on this host")]
    Unsupported(DeviceCategory),

    #[error("{category} query failed: {message}")]
    Query {
        category: DeviceCategory,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

impl SourceError {
    pub fn query(category: DeviceCategory, message: impl Into<String>) -> Self {
        SourceError::Query {
            category,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // a new row would take a key another machine already holds
    #[error("could not reconcile machine identity (name: {machine_name}, bios serial: {bios_serial:?})")]
    IdentityConflict {
        machine_name: String,
        bios_serial: Option<String>,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("failed to render snapshot: {0}")]
    Render(#[from] serde_json::Error),
}
