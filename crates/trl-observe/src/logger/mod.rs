mod error;
mod level;

pub use error::LoggerError;
pub use level::LoggerLevel;

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Log level filter expression (e.g. "info", "trl_core=debug,info").
    pub level: LoggerLevel,

    /// Whether coloured output is allowed at all. `NO_COLOR` turns this off.
    pub use_color: bool,
}

impl LoggerConfig {
    /// Colour is used only when allowed by config and stdout is a terminal.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}

/// Install the global tracing subscriber.
///
/// Once initialized, all `tracing` macros use this configuration.
pub fn init_logger(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = cfg.level.to_env_filter();
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(cfg.should_use_color())
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::{LoggerConfig, LoggerLevel};

    #[test]
    fn colour_respects_the_config_switch() {
        let cfg = LoggerConfig {
            level: LoggerLevel::default(),
            use_color: false,
        };
        assert!(!cfg.should_use_color());
    }
}
