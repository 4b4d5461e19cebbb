use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("failed to parse event file {path}: {message}")]
    EventFile { path: PathBuf, message: String },
    #[error("missing required configuration field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid configuration for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("configuration error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("notification manager is no longer running")]
    Stopped,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{backend}: i/o failure on {path}")]
    Io {
        backend: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{backend}: failed to spawn `{command}`")]
    Spawn {
        backend: &'static str,
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{backend}: presentation failed: {message}")]
    Presentation {
        backend: &'static str,
        message: String,
    },
}
