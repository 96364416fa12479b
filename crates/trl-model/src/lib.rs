mod config;
mod domain;
mod error;

pub use config::{
    load_launcher_config, BaseConfig, EnvLookup, FileLookup, LauncherConfig, MapLookup,
    ProcessEnv, RunnerConfig, SentryConfig,
};
pub use domain::constants;
pub use domain::{Env, KeyValue};
pub use error::{ConfigError, ConfigResult};
