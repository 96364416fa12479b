//! Per-runner supervision loop.
//!
//! Responsibilities:
//! - drive the repeating session: broker readiness, grant tokens, handshake,
//!   runner launch, health monitoring;
//! - classify runner exits and restart the loop;
//! - treat transient broker loss during the handshake as a reconnect, not a
//!   failure.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use trl_broker::{
    fetch_grant_token, handshake, wait_for_broker_ready, BrokerError, HandshakeConfig,
};
use trl_exec::subprocess::{ensure_workdir, spawn_runner, RunnerProcess, RunnerProcessConfig};
use trl_exec::{build_runner_env, ExecError};
use trl_model::constants::ENV_GRANT_TOKEN;
use trl_model::{Env, LauncherConfig, RunnerConfig};

use crate::error::CoreError;
use crate::monitor::{monitor_runner_health, HealthMonitorConfig};

/// Pause before reconnecting after the broker drops the handshake.
const BROKER_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Process-wide settings shared by all supervision tasks.
#[derive(Debug, Clone, Default)]
pub struct SupervisorOptions {
    /// Whether runner output decoration may use ANSI colours.
    pub use_color: bool,

    /// Health monitor timings.
    pub monitor: HealthMonitorConfig,
}

/// How one runner session ended.
enum RunnerExit {
    /// Terminated by the health monitor.
    Killed,
    /// Exited zero: the runner shut itself down after idling.
    IdleTimeout,
    /// Exited non-zero or could not be awaited.
    Failed(String),
}

/// Run one supervision task per configured runner type and wait for them.
///
/// The tasks share nothing beyond the immutable config. A fatal error in one
/// runner type is logged without tearing down the others.
pub async fn run_supervisor(config: Arc<LauncherConfig>, snapshot: Env, opts: SupervisorOptions) {
    let mut tasks = JoinSet::new();

    for runner in config.runners.values().cloned() {
        let config = Arc::clone(&config);
        let snapshot = snapshot.clone();
        let opts = opts.clone();
        let runner_type = runner.runner_type.clone();

        tasks.spawn(async move {
            if let Err(err) = supervise_runner(config, runner, snapshot, opts).await {
                error!(runner_type = %runner_type, "Supervision loop failed: {err}");
            }
        });
    }

    while tasks.join_next().await.is_some() {}
}

/// Supervise one runner type forever.
///
/// Each iteration waits for broker readiness, performs the handshake with a
/// fresh grant token, fetches a second grant token for the runner, launches
/// the runner, and monitors its health until it exits. Broker loss during
/// the handshake restarts the iteration after a short pause; any other
/// handshake or token-exchange failure is fatal for this runner type.
pub async fn supervise_runner(
    config: Arc<LauncherConfig>,
    runner: RunnerConfig,
    snapshot: Env,
    opts: SupervisorOptions,
) -> Result<(), CoreError> {
    info!(runner_type = %runner.runner_type, "Starting supervision loop");

    ensure_workdir(&runner.workdir)?;

    let base = &config.base;
    let client = Client::new();

    let runner_uri = format!(
        "http://{}:{}",
        base.runner_health_check_host, runner.health_check_server_port
    );
    let process_cfg = RunnerProcessConfig {
        runner_type: runner.runner_type.clone(),
        command: runner.command.clone(),
        args: runner.args.clone(),
        workdir: runner.workdir.clone(),
        use_color: opts.use_color,
    };

    // Static portion of the child env; the grant token is appended per
    // iteration and stripped again after the child exits.
    let mut env = build_runner_env(&snapshot, base, &runner);

    loop {
        wait_for_broker_ready(&client, &base.task_broker_uri).await?;

        let launcher_token =
            fetch_grant_token(&client, &base.task_broker_uri, &base.auth_token).await?;
        debug!("Fetched grant token for launcher");

        let handshake_cfg = HandshakeConfig::new(
            runner.runner_type.as_str(),
            base.task_broker_uri.as_str(),
            launcher_token,
        );
        match handshake(&handshake_cfg).await {
            Ok(()) => {}
            Err(BrokerError::ServerDown) => {
                warn!("Task broker is down, launcher will try to reconnect...");
                tokio::time::sleep(BROKER_RECONNECT_DELAY).await;
                continue;
            }
            Err(err) => return Err(err.into()),
        }

        let runner_token =
            fetch_grant_token(&client, &base.task_broker_uri, &base.auth_token).await?;
        debug!("Fetched grant token for runner");
        env.set(ENV_GRANT_TOKEN, runner_token);

        debug!("Task ready for pickup, launching runner...");
        let mut process = spawn_runner(&process_cfg, &env)?;

        let cancel = CancellationToken::new();
        let (kill_tx, kill_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor_runner_health(
            opts.monitor,
            client.clone(),
            runner_uri.clone(),
            cancel.clone(),
            kill_tx,
        ));

        let exit = wait_for_exit(&mut process, kill_rx).await;
        cancel.cancel();
        let _ = monitor.await;

        match exit {
            RunnerExit::Killed => warn!("Unresponsive runner process was terminated"),
            RunnerExit::Failed(reason) => error!("Runner process exited with error: {reason}"),
            RunnerExit::IdleTimeout => info!("Runner process exited on idle timeout"),
        }

        // The next runner must get a freshly issued token.
        env.remove(ENV_GRANT_TOKEN);
    }
}

/// Wait for the child to exit, honoring a kill request from the monitor.
async fn wait_for_exit(
    process: &mut RunnerProcess,
    mut kill_rx: oneshot::Receiver<()>,
) -> RunnerExit {
    tokio::select! {
        status = process.wait() => classify_exit(status),
        requested = &mut kill_rx => match requested {
            Ok(()) => {
                process.kill().await;
                let _ = process.wait().await;
                RunnerExit::Killed
            }
            // Monitor went away without requesting a kill; keep waiting.
            Err(_) => classify_exit(process.wait().await),
        }
    }
}

fn classify_exit(status: Result<ExitStatus, ExecError>) -> RunnerExit {
    match status {
        Ok(status) if status.success() => RunnerExit::IdleTimeout,
        Ok(status) => RunnerExit::Failed(status.to_string()),
        Err(err) => RunnerExit::Failed(err.to_string()),
    }
}
