mod auth;
mod error;
mod handshake;
mod readiness;
mod retry;

pub use auth::fetch_grant_token;
pub use error::BrokerError;
pub use handshake::{handshake, BrokerMessage, HandshakeConfig, LauncherMessage};
pub use readiness::wait_for_broker_ready;
pub use retry::{retry, RetryConfig, RetryLimit};
