use tracing::{debug, warn};

use trl_model::constants::{
    DEFAULT_ALLOWED_ENV, ENV_AUTO_SHUTDOWN_TIMEOUT, ENV_HEALTH_CHECK_SERVER_ENABLED,
    ENV_HEALTH_CHECK_SERVER_PORT, ENV_TASK_BROKER_URI, ENV_TASK_TIMEOUT, REQUIRED_RUNTIME_ENV,
};
use trl_model::{BaseConfig, Env, RunnerConfig};

/// Build the static portion of a runner's environment.
///
/// Pure over its inputs: the snapshot is the caller's view of the launcher's
/// environment, never read from the process here. The grant token is not part
/// of the result; the supervision loop appends a fresh one per launch.
///
/// Override entries naming a required runtime variable are dropped with a
/// warning; the contract with the runner is not negotiable.
pub fn build_runner_env(snapshot: &Env, base: &BaseConfig, runner: &RunnerConfig) -> Env {
    let mut allowed: Vec<&str> = DEFAULT_ALLOWED_ENV
        .iter()
        .copied()
        .chain(runner.allowed_env.iter().map(String::as_str))
        .collect();
    allowed.sort_unstable();
    allowed.dedup();

    let mut included: Vec<(&str, &str)> = Vec::new();
    let mut excluded: Vec<&str> = Vec::new();
    for kv in snapshot.iter() {
        if allowed.binary_search(&kv.key()).is_ok() {
            included.push((kv.key(), kv.value()));
        } else {
            excluded.push(kv.key());
        }
    }
    included.sort_unstable();
    excluded.sort_unstable();

    debug!(
        included = included.len(),
        excluded = excluded.len(),
        "Filtered launcher environment through allow-list"
    );

    // The runtime contract owns these names; a passthrough must not sneak in
    // a conflicting binding.
    included.retain(|(key, _)| !REQUIRED_RUNTIME_ENV.contains(key));

    let mut env: Env = included.into_iter().collect();

    env.set(ENV_TASK_BROKER_URI, base.task_broker_uri.as_str());
    env.set(ENV_HEALTH_CHECK_SERVER_ENABLED, "true");
    env.set(
        ENV_HEALTH_CHECK_SERVER_PORT,
        runner.health_check_server_port.to_string(),
    );

    // Still passed implicitly during the deprecation period.
    env.set(
        ENV_AUTO_SHUTDOWN_TIMEOUT,
        base.auto_shutdown_timeout.as_str(),
    );
    env.set(ENV_TASK_TIMEOUT, base.task_timeout.as_str());
    for legacy in [ENV_AUTO_SHUTDOWN_TIMEOUT, ENV_TASK_TIMEOUT] {
        if !runner.allowed_env.iter().any(|key| key == legacy) {
            warn!(
                "Passing {legacy} to the runner implicitly is deprecated, add it to allowed-env"
            );
        }
    }

    for (key, value) in &runner.env_overrides {
        if REQUIRED_RUNTIME_ENV.contains(&key.as_str()) {
            warn!("Disregarded env-override for required runtime variable: {key}");
            continue;
        }
        env.set(key.as_str(), value.as_str());
    }

    env
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use trl_model::constants::{
        ENV_GRANT_TOKEN, ENV_HEALTH_CHECK_SERVER_ENABLED, ENV_HEALTH_CHECK_SERVER_PORT,
        ENV_TASK_BROKER_URI,
    };
    use trl_model::{BaseConfig, Env, RunnerConfig, SentryConfig};

    use super::build_runner_env;

    fn base_config() -> BaseConfig {
        BaseConfig {
            log_level: "info".to_string(),
            auth_token: "auth".to_string(),
            auto_shutdown_timeout: "15".to_string(),
            task_timeout: "60".to_string(),
            task_broker_uri: "http://127.0.0.1:5679".to_string(),
            health_check_server_port: 5680,
            runner_health_check_host: "127.0.0.1".to_string(),
            config_path: PathBuf::from("/etc/n8n-task-runners.json"),
            sentry: SentryConfig::default(),
        }
    }

    fn runner_config() -> RunnerConfig {
        RunnerConfig {
            runner_type: "javascript".to_string(),
            workdir: PathBuf::from("/tmp"),
            command: "node".to_string(),
            args: vec![],
            health_check_server_port: 5681,
            allowed_env: vec![],
            env_overrides: BTreeMap::new(),
        }
    }

    fn snapshot(entries: &[(&str, &str)]) -> Env {
        entries.iter().copied().collect()
    }

    #[test]
    fn default_passthrough_names_are_included() {
        let snapshot = snapshot(&[
            ("PATH", "/usr/bin"),
            ("LANG", "en_US.UTF-8"),
            ("SECRET", "nope"),
        ]);

        let env = build_runner_env(&snapshot, &base_config(), &runner_config());

        assert_eq!(env.get("PATH"), Some("/usr/bin"));
        assert_eq!(env.get("LANG"), Some("en_US.UTF-8"));
        assert!(env.get("SECRET").is_none());
    }

    #[test]
    fn allowed_env_extends_the_default_allow_list() {
        let snapshot = snapshot(&[("NODE_OPTIONS", "--max-old-space-size=512")]);
        let mut runner = runner_config();
        runner.allowed_env = vec!["NODE_OPTIONS".to_string()];

        let env = build_runner_env(&snapshot, &base_config(), &runner);
        assert_eq!(env.get("NODE_OPTIONS"), Some("--max-old-space-size=512"));
    }

    #[test]
    fn required_runtime_bindings_are_present_exactly_once() {
        let snapshot = snapshot(&[("PATH", "/usr/bin")]);
        let env = build_runner_env(&snapshot, &base_config(), &runner_config());

        for key in [
            ENV_TASK_BROKER_URI,
            ENV_HEALTH_CHECK_SERVER_ENABLED,
            ENV_HEALTH_CHECK_SERVER_PORT,
        ] {
            let count = env.keys().iter().filter(|k| **k == key).count();
            assert_eq!(count, 1, "expected exactly one binding for {key}");
        }

        assert_eq!(env.get(ENV_TASK_BROKER_URI), Some("http://127.0.0.1:5679"));
        assert_eq!(env.get(ENV_HEALTH_CHECK_SERVER_ENABLED), Some("true"));
        assert_eq!(env.get(ENV_HEALTH_CHECK_SERVER_PORT), Some("5681"));
    }

    #[test]
    fn passthrough_cannot_smuggle_required_names() {
        let snapshot = snapshot(&[(ENV_TASK_BROKER_URI, "http://evil:1")]);
        let mut runner = runner_config();
        runner.allowed_env = vec![ENV_TASK_BROKER_URI.to_string()];

        let env = build_runner_env(&snapshot, &base_config(), &runner);
        assert_eq!(env.get(ENV_TASK_BROKER_URI), Some("http://127.0.0.1:5679"));
    }

    #[test]
    fn overrides_replace_passthrough_values() {
        let snapshot = snapshot(&[("TZ", "UTC")]);
        let mut runner = runner_config();
        runner.env_overrides = BTreeMap::from([("TZ".to_string(), "Europe/Berlin".to_string())]);

        let env = build_runner_env(&snapshot, &base_config(), &runner);
        assert_eq!(env.get("TZ"), Some("Europe/Berlin"));
        assert_eq!(env.keys().iter().filter(|k| **k == "TZ").count(), 1);
    }

    #[test]
    fn override_of_required_runtime_var_is_disregarded() {
        let mut runner = runner_config();
        runner.env_overrides = BTreeMap::from([
            (ENV_GRANT_TOKEN.to_string(), "bogus".to_string()),
            (ENV_TASK_BROKER_URI.to_string(), "http://evil:1".to_string()),
        ]);

        let env = build_runner_env(&Env::new(), &base_config(), &runner);

        assert!(env.get(ENV_GRANT_TOKEN).is_none());
        assert_eq!(env.get(ENV_TASK_BROKER_URI), Some("http://127.0.0.1:5679"));
    }

    #[test]
    fn legacy_timeout_bindings_are_always_passed() {
        let env = build_runner_env(&Env::new(), &base_config(), &runner_config());
        assert_eq!(env.get("AUTO_SHUTDOWN_TIMEOUT"), Some("15"));
        assert_eq!(env.get("TASK_TIMEOUT"), Some("60"));
    }

    #[test]
    fn builder_is_deterministic() {
        let snapshot = snapshot(&[("TZ", "UTC"), ("PATH", "/bin"), ("LANG", "C")]);
        let a = build_runner_env(&snapshot, &base_config(), &runner_config());
        let b = build_runner_env(&snapshot, &base_config(), &runner_config());
        assert_eq!(a, b);

        // Included passthrough entries come out sorted regardless of
        // snapshot order.
        let reversed = snapshot.iter().collect::<Vec<_>>();
        let shuffled: Env = reversed
            .into_iter()
            .rev()
            .map(|kv| (kv.key(), kv.value()))
            .collect();
        let c = build_runner_env(&shuffled, &base_config(), &runner_config());
        assert_eq!(a, c);
    }
}
