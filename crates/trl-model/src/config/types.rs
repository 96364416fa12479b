use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Process-wide launcher configuration, immutable after load.
#[derive(Debug, Clone)]
pub struct BaseConfig {
    /// Log level filter for the launcher itself.
    pub log_level: String,

    /// Auth token sent to the task broker in exchange for single-use grant
    /// tokens.
    pub auth_token: String,

    /// How long (in seconds) a runner may be idle before shutting itself
    /// down. Passed through to the runner as an env var, hence a string.
    pub auto_shutdown_timeout: String,

    /// Max time (in seconds) a task may run before it is aborted. Passed
    /// through to the runner as an env var, hence a string.
    pub task_timeout: String,

    /// URI of the task broker server.
    pub task_broker_uri: String,

    /// Port for the launcher's own health check server.
    pub health_check_server_port: u16,

    /// Host for all runners' health check servers.
    pub runner_health_check_host: String,

    /// Path the runner configs were loaded from.
    pub config_path: PathBuf,

    /// Crash reporting configuration.
    pub sentry: SentryConfig,
}

/// Crash reporting configuration, read from the environment.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    /// Disabled when no DSN is set.
    pub enabled: bool,
    pub dsn: String,
    pub release: String,
    pub environment: String,
    pub deployment_name: String,
}

/// Configuration for a single task runner type, immutable after load.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Type of task runner, e.g. "javascript" or "python".
    pub runner_type: String,

    /// Dir the runner process is started in.
    pub workdir: PathBuf,

    /// Command to start the runner.
    pub command: String,

    /// Arguments for the command.
    pub args: Vec<String>,

    /// Port for the runner's health check server. Unique per runner.
    pub health_check_server_port: u16,

    /// Env vars the launcher passes from its own environment to the runner.
    pub allowed_env: Vec<String>,

    /// Env vars the launcher sets directly on the runner.
    pub env_overrides: BTreeMap<String, String>,
}

/// Full launcher configuration: one [`BaseConfig`] plus the runner configs
/// for each requested runner type, keyed by type.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub base: BaseConfig,
    pub runners: HashMap<String, RunnerConfig>,
}
