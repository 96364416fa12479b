use tracing::info;

use trl_model::SentryConfig;

/// Initialize Sentry crash reporting from config.
///
/// Returns `None` when reporting is disabled (no DSN configured). The guard
/// must be held for the process lifetime; dropping it flushes pending events.
pub fn init_reporting(cfg: &SentryConfig) -> Option<sentry::ClientInitGuard> {
    if !cfg.enabled {
        return None;
    }

    info!("Initializing Sentry");

    Some(sentry::init((
        cfg.dsn.as_str(),
        sentry::ClientOptions {
            release: Some(cfg.release.clone().into()),
            environment: Some(cfg.environment.clone().into()),
            server_name: Some(cfg.deployment_name.clone().into()),
            ..Default::default()
        },
    )))
}
