mod logger;
mod runner;

pub use logger::{forward_lines, runner_prefix, RunnerWriter};
pub use runner::{ensure_workdir, spawn_runner, RunnerProcess, RunnerProcessConfig};
