mod load;
mod lookup;
mod types;

pub use load::load_launcher_config;
pub use lookup::{EnvLookup, FileLookup, MapLookup, ProcessEnv};
pub use types::{BaseConfig, LauncherConfig, RunnerConfig, SentryConfig};
