mod error;
mod monitor;
mod supervisor;

pub use error::CoreError;
pub use monitor::{monitor_runner_health, HealthMonitorConfig};
pub use supervisor::{run_supervisor, supervise_runner, SupervisorOptions};
