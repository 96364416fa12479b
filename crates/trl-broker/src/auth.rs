use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;
use crate::retry::{retry, RetryConfig};

const GRANT_TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct GrantTokenRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct GrantTokenResponse {
    data: GrantTokenData,
}

#[derive(Debug, Deserialize)]
struct GrantTokenData {
    token: String,
}

/// Exchange the launcher's long-lived auth token for a single-use grant
/// token.
///
/// In case the broker is temporarily unavailable, the exchange is retried a
/// limited number of times.
pub async fn fetch_grant_token(
    client: &Client,
    broker_uri: &str,
    auth_token: &str,
) -> Result<String, BrokerError> {
    retry("grant-token-fetch", RetryConfig::bounded(), || {
        send_grant_token_request(client, broker_uri, auth_token)
    })
    .await
}

async fn send_grant_token_request(
    client: &Client,
    broker_uri: &str,
    auth_token: &str,
) -> Result<String, BrokerError> {
    let url = format!("{}/runners/auth", broker_uri.trim_end_matches('/'));

    let response = client
        .post(&url)
        .timeout(GRANT_TOKEN_REQUEST_TIMEOUT)
        .json(&GrantTokenRequest { token: auth_token })
        .send()
        .await?;

    if response.status() != StatusCode::OK {
        return Err(BrokerError::GrantTokenStatus(response.status().as_u16()));
    }

    let body: GrantTokenResponse = response
        .json()
        .await
        .map_err(|e| BrokerError::Decode(e.to_string()))?;

    Ok(body.data.token)
}
