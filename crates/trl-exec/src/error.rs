use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("runner command is empty")]
    EmptyCommand,

    #[error("configured working directory does not exist: {}", .0.display())]
    WorkDirMissing(PathBuf),

    #[error("failed to start runner process `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("failed to wait on runner process: {0}")]
    Wait(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
