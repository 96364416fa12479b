use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::logger::LoggerError;

/// Wrapper around a `tracing_subscriber::EnvFilter` expression.
///
/// Stores the raw filter string (e.g. `"info"`, `"trl_core=debug,info"`),
/// validated at construction so conversion can never fail later.
#[derive(Debug, Clone)]
pub struct LoggerLevel(String);

impl LoggerLevel {
    /// Create a `LoggerLevel` from a string-like value, validating it as an
    /// `EnvFilter` expression.
    pub fn new(s: impl Into<String>) -> Result<Self, LoggerError> {
        let s = s.into();
        match EnvFilter::try_new(&s) {
            Ok(_) => Ok(LoggerLevel(s)),
            Err(e) => Err(LoggerError::InvalidLevel(format!("{s}: {e}"))),
        }
    }

    /// The underlying filter string, exactly as configured.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the actual `EnvFilter`.
    pub fn to_env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(self.as_str()).expect("LoggerLevel is always valid after construction")
    }
}

impl Default for LoggerLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
