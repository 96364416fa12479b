use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::sync::oneshot;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Timing knobs for the runner health monitor.
#[derive(Debug, Clone, Copy)]
pub struct HealthMonitorConfig {
    /// Wait before the first probe, to give the runner time to start up.
    pub initial_startup_delay: Duration,

    /// Interval between probes.
    pub check_interval: Duration,

    /// Time limit for a single probe request.
    pub check_timeout: Duration,

    /// How long probes may fail continuously before the runner is killed.
    pub max_unhealthy_time: Duration,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            initial_startup_delay: Duration::from_secs(3),
            check_interval: Duration::from_secs(10),
            check_timeout: Duration::from_secs(5),
            max_unhealthy_time: Duration::from_secs(30),
        }
    }
}

/// Probe the runner's health endpoint until cancelled.
///
/// A successful probe resets the failure clock; the first failure starts it.
/// Once failures persist for longer than `max_unhealthy_time`, a kill request
/// is sent over `kill` and the monitor exits. The supervision loop cancels
/// `cancel` as soon as the child exits on its own, so the monitor never
/// outlives the session.
pub async fn monitor_runner_health(
    cfg: HealthMonitorConfig,
    client: Client,
    runner_uri: String,
    cancel: CancellationToken,
    kill: oneshot::Sender<()>,
) {
    tokio::select! {
        _ = sleep(cfg.initial_startup_delay) => {}
        _ = cancel.cancelled() => return,
    }

    let url = format!("{}/healthz", runner_uri.trim_end_matches('/'));
    let mut ticker = interval(cfg.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut first_failure: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        match send_runner_health_check(&client, &url, cfg.check_timeout).await {
            Ok(()) => {
                first_failure = None;
                debug!("Runner is healthy");
            }
            Err(reason) => match first_failure {
                None => {
                    first_failure = Some(Instant::now());
                    debug!("Runner is unresponsive: {reason}");
                }
                Some(since) if since.elapsed() > cfg.max_unhealthy_time => {
                    warn!(
                        "Runner unresponsive for over {:?}, terminating...",
                        cfg.max_unhealthy_time
                    );
                    let _ = kill.send(());
                    return;
                }
                Some(_) => debug!("Runner is still unresponsive: {reason}"),
            },
        }
    }
}

async fn send_runner_health_check(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<(), String> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| format!("failed to send health check request to runner: {e}"))?;

    if response.status() != StatusCode::OK {
        return Err(format!(
            "runner health check returned status code {}",
            response.status().as_u16()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::routing::get;
    use axum::Router;
    use reqwest::StatusCode;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_util::sync::CancellationToken;

    use super::{monitor_runner_health, HealthMonitorConfig};

    fn fast_config() -> HealthMonitorConfig {
        HealthMonitorConfig {
            initial_startup_delay: Duration::from_millis(10),
            check_interval: Duration::from_millis(10),
            check_timeout: Duration::from_millis(500),
            max_unhealthy_time: Duration::from_millis(50),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service())
                .await
                .unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn sustained_unresponsiveness_requests_a_kill() {
        let uri = serve(Router::new().route(
            "/healthz",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;

        let cancel = CancellationToken::new();
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(monitor_runner_health(
            fast_config(),
            reqwest::Client::new(),
            uri,
            cancel.clone(),
            kill_tx,
        ));

        tokio::time::timeout(Duration::from_secs(5), kill_rx)
            .await
            .expect("monitor should request a kill")
            .unwrap();
    }

    #[tokio::test]
    async fn healthy_runner_is_left_alone() {
        let uri = serve(Router::new().route("/healthz", get(|| async { "ok" }))).await;

        let cancel = CancellationToken::new();
        let (kill_tx, mut kill_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor_runner_health(
            fast_config(),
            reqwest::Client::new(),
            uri,
            cancel.clone(),
            kill_tx,
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(kill_rx.try_recv().is_err(), "no kill should be requested");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), monitor)
            .await
            .expect("monitor should exit promptly after cancellation")
            .unwrap();
    }

    #[tokio::test]
    async fn a_single_success_resets_the_failure_clock() {
        // Every third probe succeeds, so failures never persist long enough
        // to cross the unhealthy window.
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let uri = serve(Router::new().route(
            "/healthz",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) % 3 == 2 {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }
            }),
        ))
        .await;

        let cancel = CancellationToken::new();
        let (kill_tx, mut kill_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor_runner_health(
            fast_config(),
            reqwest::Client::new(),
            uri,
            cancel.clone(),
            kill_tx,
        ));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(kill_rx.try_recv().is_err(), "kill must not fire");

        cancel.cancel();
        let _ = monitor.await;
    }

    #[tokio::test]
    async fn cancellation_stops_the_monitor_during_startup_delay() {
        let cancel = CancellationToken::new();
        let (kill_tx, _kill_rx) = oneshot::channel();

        let mut cfg = fast_config();
        cfg.initial_startup_delay = Duration::from_secs(3600);

        let monitor = tokio::spawn(monitor_runner_health(
            cfg,
            reqwest::Client::new(),
            "http://127.0.0.1:1".to_string(),
            cancel.clone(),
            kill_tx,
        ));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), monitor)
            .await
            .expect("monitor should exit promptly")
            .unwrap();
    }
}
