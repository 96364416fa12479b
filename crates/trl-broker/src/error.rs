use std::time::Duration;

use thiserror::Error;

use crate::retry::RetryLimit;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker refused the connection or closed it with a normal or
    /// going-away status. Transient: callers reconnect after a pause.
    #[error("task broker is down")]
    ServerDown,

    #[error("runner type is missing")]
    MissingRunnerType,

    #[error("task broker URI is missing")]
    MissingBrokerUri,

    #[error("grant token is missing")]
    MissingGrantToken,

    #[error("invalid task broker URI: {0}")]
    InvalidBrokerUri(String),

    #[error("task broker URI must have no query params")]
    BrokerUriHasQuery,

    #[error("received unexpected message during handshake: {0}")]
    UnexpectedMessage(String),

    #[error("failed to decode broker message: {0}")]
    Decode(String),

    #[error("websocket message too large for buffer")]
    MessageTooLarge,

    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("websocket error: {0}")]
    Ws(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("readiness check failed with status code {0}")]
    ReadinessStatus(u16),

    #[error("request to fetch grant token received status code {0}")]
    GrantTokenStatus(u16),

    #[error("gave up retrying operation `{operation}` on reaching {cause}, last error: {last}")]
    RetriesExhausted {
        operation: &'static str,
        cause: RetryLimit,
        last: Box<BrokerError>,
    },
}
