//! End-to-end supervision loop tests against a stub broker.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use trl_core::{supervise_runner, HealthMonitorConfig, SupervisorOptions};
use trl_model::{BaseConfig, Env, LauncherConfig, RunnerConfig, SentryConfig};

#[derive(Clone)]
struct BrokerStub {
    auth_calls: Arc<AtomicU32>,
    handshakes: Arc<AtomicU32>,
    /// Handshakes beyond this count stall instead of completing, which
    /// freezes the loop at a known point for assertions.
    max_handshakes: u32,
}

async fn start_broker_stub(stub: BrokerStub) -> SocketAddr {
    let router = Router::new()
        .route("/healthz/readiness", get(|| async { "ok" }))
        .route(
            "/runners/auth",
            post(
                |State(stub): State<BrokerStub>, Json(body): Json<Value>| async move {
                    assert_eq!(body["token"], "secret");
                    let n = stub.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
                    Json(json!({"data": {"token": format!("G{n}")}}))
                },
            ),
        )
        .route(
            "/runners/_ws",
            get(
                |State(stub): State<BrokerStub>, upgrade: WebSocketUpgrade| async move {
                    upgrade
                        .on_upgrade(move |ws| async move {
                            if stub.handshakes.fetch_add(1, Ordering::SeqCst) < stub.max_handshakes
                            {
                                accepting_peer(ws).await;
                            } else {
                                tokio::time::sleep(Duration::from_secs(60)).await;
                            }
                        })
                        .into_response()
                },
            ),
        )
        .with_state(stub);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });
    addr
}

/// Broker peer that walks the happy path and accepts the first offer.
async fn accepting_peer(mut ws: WebSocket) {
    let send = |msg: Value| Message::Text(msg.to_string());

    ws.send(send(json!({"type": "broker:inforequest"})))
        .await
        .unwrap();
    recv_text(&mut ws).await; // runner:info

    ws.send(send(json!({"type": "broker:runnerregistered"})))
        .await
        .unwrap();
    recv_text(&mut ws).await; // runner:taskoffer

    ws.send(send(
        json!({"type": "broker:taskofferaccept", "taskId": "T1"}),
    ))
    .await
    .unwrap();
    recv_text(&mut ws).await; // runner:taskdeferred
}

async fn recv_text(ws: &mut WebSocket) -> Value {
    loop {
        match ws.recv().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

fn launcher_config(broker: SocketAddr, runner: RunnerConfig) -> Arc<LauncherConfig> {
    Arc::new(LauncherConfig {
        base: BaseConfig {
            log_level: "info".to_string(),
            auth_token: "secret".to_string(),
            auto_shutdown_timeout: "15".to_string(),
            task_timeout: "60".to_string(),
            task_broker_uri: format!("http://{broker}"),
            health_check_server_port: 5680,
            runner_health_check_host: "127.0.0.1".to_string(),
            config_path: PathBuf::from("/etc/n8n-task-runners.json"),
            sentry: SentryConfig::default(),
        },
        runners: HashMap::from([(runner.runner_type.clone(), runner)]),
    })
}

fn fast_options() -> SupervisorOptions {
    SupervisorOptions {
        use_color: false,
        monitor: HealthMonitorConfig {
            initial_startup_delay: Duration::from_millis(20),
            check_interval: Duration::from_millis(20),
            check_timeout: Duration::from_millis(500),
            max_unhealthy_time: Duration::from_millis(60),
        },
    }
}

/// Pick a TCP port that nothing is listening on.
async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn launches_runner_with_fresh_grant_token_and_restarts_after_exit() {
    let auth_calls = Arc::new(AtomicU32::new(0));
    let broker = start_broker_stub(BrokerStub {
        auth_calls: Arc::clone(&auth_calls),
        handshakes: Arc::new(AtomicU32::new(0)),
        max_handshakes: 1,
    })
    .await;

    let workdir = tempfile::tempdir().unwrap();
    let runner = RunnerConfig {
        runner_type: "javascript".to_string(),
        workdir: workdir.path().to_path_buf(),
        command: "sh".to_string(),
        // Record the injected grant token, then exit zero (idle timeout).
        args: vec![
            "-c".to_string(),
            "printf '%s' \"$GRANT_TOKEN\" > grant.txt".to_string(),
        ],
        health_check_server_port: unused_port().await,
        allowed_env: vec![],
        env_overrides: BTreeMap::new(),
    };
    let config = launcher_config(broker, runner.clone());

    let loop_task = tokio::spawn(supervise_runner(
        config,
        runner,
        Env::new(),
        fast_options(),
    ));

    // Token 1 goes to the first handshake, token 2 to the first runner.
    // A third fetch means the loop started its second iteration.
    tokio::time::timeout(Duration::from_secs(30), async {
        while auth_calls.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("supervision loop should restart after the runner exits");

    loop_task.abort();

    let recorded = std::fs::read_to_string(workdir.path().join("grant.txt")).unwrap();
    assert_eq!(recorded, "G2");
}

#[tokio::test]
async fn unresponsive_runner_is_killed_and_the_loop_restarts() {
    let auth_calls = Arc::new(AtomicU32::new(0));
    let broker = start_broker_stub(BrokerStub {
        auth_calls: Arc::clone(&auth_calls),
        handshakes: Arc::new(AtomicU32::new(0)),
        max_handshakes: u32::MAX,
    })
    .await;

    let workdir = tempfile::tempdir().unwrap();
    let runner = RunnerConfig {
        runner_type: "javascript".to_string(),
        workdir: workdir.path().to_path_buf(),
        // Never exits on its own and never serves /healthz, so only the
        // monitor can end the session.
        command: "sh".to_string(),
        args: vec!["-c".to_string(), "sleep 30".to_string()],
        health_check_server_port: unused_port().await,
        allowed_env: vec![],
        env_overrides: BTreeMap::new(),
    };
    let config = launcher_config(broker, runner.clone());

    let loop_task = tokio::spawn(supervise_runner(
        config,
        runner,
        Env::new(),
        fast_options(),
    ));

    tokio::time::timeout(Duration::from_secs(30), async {
        while auth_calls.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("monitor should kill the runner and the loop should restart");

    loop_task.abort();
}
