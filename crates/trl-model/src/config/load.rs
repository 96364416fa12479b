use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::lookup::EnvLookup;
use crate::config::types::{BaseConfig, LauncherConfig, RunnerConfig, SentryConfig};
use crate::domain::constants::{
    DEFAULT_AUTO_SHUTDOWN_TIMEOUT, DEFAULT_CONFIG_PATH, DEFAULT_LAUNCHER_HEALTH_CHECK_PORT,
    DEFAULT_LOG_LEVEL, DEFAULT_RUNNER_HEALTH_CHECK_HOST, DEFAULT_RUNNER_HEALTH_CHECK_PORT,
    DEFAULT_TASK_BROKER_URI, DEFAULT_TASK_TIMEOUT, ENV_AUTH_TOKEN, ENV_AUTO_SHUTDOWN_TIMEOUT,
    ENV_CONFIG_PATH, ENV_DEPLOYMENT_NAME, ENV_ENVIRONMENT, ENV_LAUNCHER_HEALTH_CHECK_PORT,
    ENV_LOG_LEVEL, ENV_N8N_VERSION, ENV_RUNNER_HEALTH_CHECK_HOST, ENV_SENTRY_DSN,
    ENV_TASK_BROKER_URI, ENV_TASK_TIMEOUT, RESERVED_PORTS,
};
use crate::error::{ConfigError, ConfigResult};

/// Load the launcher's base config from the environment and the runner
/// configs for the requested runner types from the file at `CONFIG_PATH`.
///
/// All validation failures are collected and reported together.
pub fn load_launcher_config(
    runner_types: &[String],
    lookup: &dyn EnvLookup,
) -> ConfigResult<LauncherConfig> {
    let mut errs = Vec::new();

    let auth_token = match lookup.lookup(ENV_AUTH_TOKEN) {
        Some(token) if !token.is_empty() => token,
        _ => {
            errs.push(ConfigError::MissingEnv(ENV_AUTH_TOKEN));
            String::new()
        }
    };

    let task_broker_uri = var_or(lookup, ENV_TASK_BROKER_URI, DEFAULT_TASK_BROKER_URI);
    if let Err(e) = validate_url(ENV_TASK_BROKER_URI, &task_broker_uri) {
        errs.push(e);
    }

    let log_level = var_or(lookup, ENV_LOG_LEVEL, DEFAULT_LOG_LEVEL);

    let auto_shutdown_timeout = var_or(
        lookup,
        ENV_AUTO_SHUTDOWN_TIMEOUT,
        DEFAULT_AUTO_SHUTDOWN_TIMEOUT,
    );
    match auto_shutdown_timeout.parse::<i64>() {
        Ok(secs) if secs >= 0 => {}
        _ => errs.push(ConfigError::InvalidTimeout(ENV_AUTO_SHUTDOWN_TIMEOUT)),
    }

    let task_timeout = var_or(lookup, ENV_TASK_TIMEOUT, DEFAULT_TASK_TIMEOUT);

    let health_check_server_port = match lookup.lookup(ENV_LAUNCHER_HEALTH_CHECK_PORT) {
        None => DEFAULT_LAUNCHER_HEALTH_CHECK_PORT,
        Some(raw) => parse_port(&raw).unwrap_or_else(|| {
            errs.push(ConfigError::InvalidPort(
                ENV_LAUNCHER_HEALTH_CHECK_PORT.to_string(),
            ));
            DEFAULT_LAUNCHER_HEALTH_CHECK_PORT
        }),
    };

    let runner_health_check_host = var_or(
        lookup,
        ENV_RUNNER_HEALTH_CHECK_HOST,
        DEFAULT_RUNNER_HEALTH_CHECK_HOST,
    );

    let config_path = PathBuf::from(var_or(lookup, ENV_CONFIG_PATH, DEFAULT_CONFIG_PATH));

    let sentry = load_sentry_config(lookup, &mut errs);

    let runners = match read_runner_configs(&config_path, runner_types) {
        Ok(runners) => runners,
        Err(e) => {
            errs.push(e);
            HashMap::new()
        }
    };

    if !errs.is_empty() {
        return Err(ConfigError::join(errs));
    }

    Ok(LauncherConfig {
        base: BaseConfig {
            log_level,
            auth_token,
            auto_shutdown_timeout,
            task_timeout,
            task_broker_uri,
            health_check_server_port,
            runner_health_check_host,
            config_path,
            sentry,
        },
        runners,
    })
}

fn var_or(lookup: &dyn EnvLookup, key: &str, default: &str) -> String {
    lookup
        .lookup(key)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn validate_url(name: &'static str, value: &str) -> ConfigResult<()> {
    match Url::parse(value) {
        Ok(_) => Ok(()),
        Err(_) => Err(ConfigError::InvalidUrl {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok().filter(|port| *port > 0)
}

fn load_sentry_config(lookup: &dyn EnvLookup, errs: &mut Vec<ConfigError>) -> SentryConfig {
    let dsn = lookup.lookup(ENV_SENTRY_DSN).unwrap_or_default();
    if dsn.is_empty() {
        return SentryConfig::default();
    }

    if let Err(e) = validate_url(ENV_SENTRY_DSN, &dsn) {
        errs.push(e);
        return SentryConfig::default();
    }

    SentryConfig {
        enabled: true,
        dsn,
        release: var_or(lookup, ENV_N8N_VERSION, "unknown"),
        environment: var_or(lookup, ENV_ENVIRONMENT, "unknown"),
        deployment_name: var_or(lookup, ENV_DEPLOYMENT_NAME, "unknown"),
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "task-runners")]
    task_runners: Vec<RunnerConfigFile>,
}

/// On-disk shape of a runner config. Converted into [`RunnerConfig`] once the
/// health port is resolved and validated.
#[derive(Debug, Deserialize)]
struct RunnerConfigFile {
    #[serde(rename = "runner-type")]
    runner_type: String,
    workdir: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(rename = "health-check-server-port", default)]
    health_check_server_port: Option<String>,
    #[serde(rename = "allowed-env", default)]
    allowed_env: Vec<String>,
    #[serde(rename = "env-overrides", default)]
    env_overrides: BTreeMap<String, String>,
}

/// Read the config file and return the runner configs for the requested
/// runner types.
fn read_runner_configs(
    path: &Path,
    runner_types: &[String],
) -> ConfigResult<HashMap<String, RunnerConfig>> {
    let data = fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let file: ConfigFile = serde_json::from_str(&data).map_err(|source| ConfigError::FileParse {
        path: path.to_path_buf(),
        source,
    })?;

    if file.task_runners.is_empty() {
        return Err(ConfigError::NoRunners(path.to_path_buf()));
    }

    let mut selected: Vec<&RunnerConfigFile> = Vec::new();
    for runner_type in runner_types {
        if selected.iter().any(|r| &r.runner_type == runner_type) {
            continue;
        }
        let found = file
            .task_runners
            .iter()
            .find(|r| &r.runner_type == runner_type)
            .ok_or_else(|| ConfigError::UnknownRunnerType {
                path: path.to_path_buf(),
                runner_type: runner_type.clone(),
            })?;
        selected.push(found);
    }

    // The port default only applies when a single runner type is requested;
    // with multiple runners every port must be explicit.
    let single = selected.len() == 1;
    let mut runners = HashMap::new();
    for &found in &selected {
        let port = resolve_health_port(found, single)?;
        runners.insert(
            found.runner_type.clone(),
            RunnerConfig {
                runner_type: found.runner_type.clone(),
                workdir: PathBuf::from(&found.workdir),
                command: found.command.clone(),
                args: found.args.clone(),
                health_check_server_port: port,
                allowed_env: found.allowed_env.clone(),
                env_overrides: found.env_overrides.clone(),
            },
        );
    }

    validate_runner_ports(runner_types, &runners)?;

    match file.task_runners.len() {
        1 => debug!("Loaded config file with a single runner config"),
        n => debug!("Loaded config file with {n} runner configs"),
    }

    Ok(runners)
}

fn resolve_health_port(config: &RunnerConfigFile, single: bool) -> ConfigResult<u16> {
    let raw = match &config.health_check_server_port {
        Some(raw) => raw.clone(),
        None if single => return Ok(DEFAULT_RUNNER_HEALTH_CHECK_PORT),
        None => return Err(ConfigError::MissingHealthPort(config.runner_type.clone())),
    };

    parse_port(&raw).ok_or_else(|| {
        ConfigError::InvalidPort(format!(
            "runner {}: health-check-server-port",
            config.runner_type
        ))
    })
}

fn validate_runner_ports(
    runner_types: &[String],
    runners: &HashMap<String, RunnerConfig>,
) -> ConfigResult<()> {
    let mut used: HashMap<u16, &str> = HashMap::new();
    let mut seen: Vec<&str> = Vec::new();

    for runner_type in runner_types {
        if seen.contains(&runner_type.as_str()) {
            continue;
        }
        seen.push(runner_type);
        let Some(config) = runners.get(runner_type) else {
            continue;
        };
        let port = config.health_check_server_port;

        if let Some((_, service)) = RESERVED_PORTS.iter().find(|(p, _)| *p == port) {
            return Err(ConfigError::ReservedPort {
                runner_type: runner_type.clone(),
                port,
                service,
            });
        }

        if let Some(first) = used.get(&port) {
            return Err(ConfigError::DuplicatePort {
                first: first.to_string(),
                second: runner_type.clone(),
                port,
            });
        }

        used.insert(port, runner_type);
    }

    Ok(())
}
