use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use trl_core::{run_supervisor, HealthMonitorConfig, SupervisorOptions};
use trl_model::constants::ENV_NO_COLOR;
use trl_model::{load_launcher_config, Env, FileLookup, ProcessEnv};
use trl_observe::{init_logger, init_reporting, LoggerConfig, LoggerLevel};

#[derive(Debug, Parser)]
#[command(name = "launcher", about = "Supervisor for on-demand task runners")]
struct Cli {
    /// Runner types to supervise, e.g. "javascript" or "python".
    #[arg(value_name = "runnerType", required = true)]
    runner_types: Vec<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;

            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let lookup = FileLookup::new(ProcessEnv);
    let config = match load_launcher_config(&cli.runner_types, &lookup) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load launcher config: {err}");
            return ExitCode::FAILURE;
        }
    };

    let use_color = std::env::var_os(ENV_NO_COLOR).is_none();
    let level = match LoggerLevel::new(config.base.log_level.as_str()) {
        Ok(level) => level,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logger(&LoggerConfig { level, use_color }) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let _sentry_guard = init_reporting(&config.base.sentry);

    info!("Starting launcher for runner types: {:?}", cli.runner_types);

    let health_port = config.base.health_check_server_port;
    tokio::spawn(async move {
        if let Err(err) = trl_api::serve_health(health_port).await {
            // The launcher is useless without its liveness endpoint.
            error!("{err}");
            std::process::exit(1);
        }
    });

    let snapshot: Env = std::env::vars().collect();
    let opts = SupervisorOptions {
        use_color,
        monitor: HealthMonitorConfig::default(),
    };
    run_supervisor(Arc::new(config), snapshot, opts).await;

    ExitCode::SUCCESS
}
