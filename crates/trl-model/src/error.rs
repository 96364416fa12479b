use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingEnv(&'static str),

    #[error("{name} must be a well-formed absolute URL: {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("{0} must be a non-negative integer")]
    InvalidTimeout(&'static str),

    #[error("{0} must be a valid port number")]
    InvalidPort(String),

    #[error("failed to open config file at {}: {reason}", .path.display())]
    FileRead { path: PathBuf, reason: String },

    #[error("failed to parse config file at {}: {source}", .path.display())]
    FileParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config file at {} contains no task runners", .0.display())]
    NoRunners(PathBuf),

    #[error(
        "config file at {} does not contain requested runner type: {runner_type}",
        .path.display()
    )]
    UnknownRunnerType { path: PathBuf, runner_type: String },

    #[error("runner {0}: health-check-server-port is required with multiple runners")]
    MissingHealthPort(String),

    #[error("runner {runner_type}: health-check-server-port {port} conflicts with {service}")]
    ReservedPort {
        runner_type: String,
        port: u16,
        service: &'static str,
    },

    #[error("runners {first} and {second} cannot use the same health-check-server-port {port}")]
    DuplicatePort {
        first: String,
        second: String,
        port: u16,
    },

    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ConfigError>),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Collapse a batch of validation failures into a single error.
    ///
    /// Panics if the batch is empty; callers only build one from a non-empty
    /// list.
    pub(crate) fn join(mut errs: Vec<ConfigError>) -> ConfigError {
        if errs.len() == 1 {
            errs.remove(0)
        } else {
            ConfigError::Multiple(errs)
        }
    }
}
