use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Logger already initialized")]
    AlreadyInitialized,
}
