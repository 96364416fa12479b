mod logger;
mod reporting;

pub use logger::{init_logger, LoggerConfig, LoggerError, LoggerLevel};
pub use reporting::init_reporting;
