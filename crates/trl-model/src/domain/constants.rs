//! Well-known env var names, defaults, and reserved ports.
//!
//! Keeping them here avoids scattering magic strings throughout the codebase.
//! The launcher-input names (read from the launcher's own environment) and the
//! runner-output names (written into the child's environment) are listed
//! separately because they form two different contracts.

// ------------------------
//     launcher input
// ------------------------

/// Auth token sent by the launcher to the task broker in exchange for a
/// single-use grant token.
pub const ENV_AUTH_TOKEN: &str = "AUTH_TOKEN";

/// URI of the task broker server.
pub const ENV_TASK_BROKER_URI: &str = "TASK_BROKER_URI";

/// Log level for the launcher.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// How long (in seconds) a runner may be idle before shutting itself down.
pub const ENV_AUTO_SHUTDOWN_TIMEOUT: &str = "AUTO_SHUTDOWN_TIMEOUT";

/// Max time (in seconds) a task may run before it is aborted.
pub const ENV_TASK_TIMEOUT: &str = "TASK_TIMEOUT";

/// Port for the launcher's own health check server.
pub const ENV_LAUNCHER_HEALTH_CHECK_PORT: &str = "LAUNCHER_HEALTH_CHECK_PORT";

/// Host for all runners' health check servers.
pub const ENV_RUNNER_HEALTH_CHECK_HOST: &str = "RUNNER_HEALTH_CHECK_HOST";

/// Path to the runner config file.
pub const ENV_CONFIG_PATH: &str = "CONFIG_PATH";

/// Sentry DSN. If unset, crash reporting is disabled.
pub const ENV_SENTRY_DSN: &str = "SENTRY_DSN";

/// Release tag attached to crash reports.
pub const ENV_N8N_VERSION: &str = "N8N_VERSION";

/// Environment tag attached to crash reports.
pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";

/// Server name attached to crash reports.
pub const ENV_DEPLOYMENT_NAME: &str = "DEPLOYMENT_NAME";

/// When set, disables ANSI colours in all launcher output.
pub const ENV_NO_COLOR: &str = "NO_COLOR";

// ------------------------
//     runner output
// ------------------------

/// Tells the runner to start its health check server.
pub const ENV_HEALTH_CHECK_SERVER_ENABLED: &str = "HEALTH_CHECK_SERVER_ENABLED";

/// Port the runner's health check server must listen on.
pub const ENV_HEALTH_CHECK_SERVER_PORT: &str = "HEALTH_CHECK_SERVER_PORT";

/// Single-use grant token the runner uses to authenticate with the broker.
pub const ENV_GRANT_TOKEN: &str = "GRANT_TOKEN";

/// Env vars the launcher always sets on the runner. They cannot be suppressed
/// by `allowed-env` or overridden by `env-overrides`.
pub const REQUIRED_RUNTIME_ENV: &[&str] = &[
    ENV_TASK_BROKER_URI,
    ENV_HEALTH_CHECK_SERVER_ENABLED,
    ENV_HEALTH_CHECK_SERVER_PORT,
    ENV_GRANT_TOKEN,
];

/// Env vars passed through to the runner even without an `allowed-env` entry.
pub const DEFAULT_ALLOWED_ENV: &[&str] = &["LANG", "PATH", "TZ", "TERM"];

// ------------------------
//        defaults
// ------------------------

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_TASK_BROKER_URI: &str = "http://127.0.0.1:5679";
pub const DEFAULT_AUTO_SHUTDOWN_TIMEOUT: &str = "15";
pub const DEFAULT_TASK_TIMEOUT: &str = "60";
pub const DEFAULT_LAUNCHER_HEALTH_CHECK_PORT: u16 = 5680;
pub const DEFAULT_RUNNER_HEALTH_CHECK_HOST: &str = "127.0.0.1";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/n8n-task-runners.json";

/// Default health check port when exactly one runner type is configured.
pub const DEFAULT_RUNNER_HEALTH_CHECK_PORT: u16 = 5681;

/// Ports no runner health check server may use, with the service each one
/// belongs to.
pub const RESERVED_PORTS: &[(u16, &str)] = &[
    (5678, "main server"),
    (5679, "task broker server"),
    (5680, "launcher health check server"),
];
