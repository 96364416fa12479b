use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::info;

use crate::error::BrokerError;
use crate::retry::{retry, RetryConfig};

const READINESS_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait until the task broker reports readiness.
///
/// Polls `GET {brokerURI}/healthz/readiness` until it returns 200 OK. Never
/// gives up: the broker may be running a long migration at boot.
pub async fn wait_for_broker_ready(client: &Client, broker_uri: &str) -> Result<(), BrokerError> {
    info!("Waiting for task broker to be ready...");

    let url = readiness_url(broker_uri);
    retry("broker-readiness-check", RetryConfig::unbounded(), || {
        send_readiness_request(client, &url)
    })
    .await?;

    info!("Task broker is ready");
    Ok(())
}

fn readiness_url(broker_uri: &str) -> String {
    format!("{}/healthz/readiness", broker_uri.trim_end_matches('/'))
}

async fn send_readiness_request(client: &Client, url: &str) -> Result<(), BrokerError> {
    let response = client
        .get(url)
        .timeout(READINESS_CHECK_TIMEOUT)
        .send()
        .await?;

    if response.status() != StatusCode::OK {
        return Err(BrokerError::ReadinessStatus(response.status().as_u16()));
    }

    Ok(())
}
