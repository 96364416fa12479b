use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tracing::{debug, trace};

use trl_model::Env;

use crate::error::ExecError;
use crate::subprocess::logger::{
    forward_lines, runner_prefix, RunnerWriter, COLOR_CYAN, COLOR_RED,
};

/// Parameters for one runner process launch.
#[derive(Debug, Clone)]
pub struct RunnerProcessConfig {
    /// Type of task runner, used for log prefixes.
    pub runner_type: String,
    /// Command to start the runner.
    pub command: String,
    /// Arguments for the command.
    pub args: Vec<String>,
    /// Working directory for the runner process.
    pub workdir: PathBuf,
    /// Whether output decoration may use ANSI colours.
    pub use_color: bool,
}

impl RunnerProcessConfig {
    /// Validate the configuration before spawning.
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.command.trim().is_empty() {
            return Err(ExecError::EmptyCommand);
        }
        ensure_workdir(&self.workdir)
    }
}

/// Check that a configured working directory exists.
pub fn ensure_workdir(path: &Path) -> Result<(), ExecError> {
    if !path.is_dir() {
        return Err(ExecError::WorkDirMissing(path.to_path_buf()));
    }
    Ok(())
}

/// A spawned runner process with its output routed through prefixed writers.
#[derive(Debug)]
pub struct RunnerProcess {
    child: Child,
}

impl RunnerProcess {
    /// OS process id, if the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the runner to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus, ExecError> {
        self.child
            .wait()
            .await
            .map_err(|e| ExecError::Wait(e.to_string()))
    }

    /// Forcibly terminate the runner and reap it.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("Failed to kill runner process: {e}");
        }
    }
}

/// Spawn a runner with exactly the prepared environment.
///
/// stdout and stderr are piped through line-oriented writers that prepend a
/// timestamp, level tag, colour, and `[runner:<type>]` prefix. The pump tasks
/// end on their own when the child closes its pipes.
pub fn spawn_runner(cfg: &RunnerProcessConfig, env: &Env) -> Result<RunnerProcess, ExecError> {
    cfg.validate()?;

    trace!(
        command = %cfg.command,
        args = ?cfg.args,
        workdir = %cfg.workdir.display(),
        "Spawning runner process"
    );

    let mut command = Command::new(&cfg.command);
    command
        .args(&cfg.args)
        .current_dir(&cfg.workdir)
        .env_clear()
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for kv in env.iter() {
        command.env(kv.key(), kv.value());
    }

    let mut child = command.spawn().map_err(|e| ExecError::Spawn {
        command: cfg.command.clone(),
        reason: e.to_string(),
    })?;

    let prefix = runner_prefix(&cfg.runner_type);
    if let Some(stdout) = child.stdout.take() {
        let writer = RunnerWriter::new(
            std::io::stdout(),
            prefix.clone(),
            "DEBUG",
            COLOR_CYAN,
            cfg.use_color,
        );
        tokio::spawn(async move {
            let _ = forward_lines(stdout, writer).await;
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let writer = RunnerWriter::new(std::io::stderr(), prefix, "ERROR", COLOR_RED, cfg.use_color);
        tokio::spawn(async move {
            let _ = forward_lines(stderr, writer).await;
        });
    }

    Ok(RunnerProcess { child })
}
