mod message;

pub use message::{BrokerMessage, LauncherMessage};

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::error::BrokerError;

/// Overall deadline for the whole handshake. Defends against a broker that
/// registers the launcher but never accepts the offer.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Handshake messages larger than this are rejected outright.
const MAX_MESSAGE_SIZE: usize = 512 * 1024;

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Parameters for one handshake attempt.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub runner_type: String,
    pub task_broker_uri: String,
    pub grant_token: String,
    pub timeout: Duration,
}

impl HandshakeConfig {
    pub fn new(
        runner_type: impl Into<String>,
        task_broker_uri: impl Into<String>,
        grant_token: impl Into<String>,
    ) -> Self {
        Self {
            runner_type: runner_type.into(),
            task_broker_uri: task_broker_uri.into(),
            grant_token: grant_token.into(),
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    fn validate(&self) -> Result<Url, BrokerError> {
        if self.runner_type.is_empty() {
            return Err(BrokerError::MissingRunnerType);
        }
        if self.task_broker_uri.is_empty() {
            return Err(BrokerError::MissingBrokerUri);
        }
        if self.grant_token.is_empty() {
            return Err(BrokerError::MissingGrantToken);
        }

        let url = Url::parse(&self.task_broker_uri)
            .map_err(|e| BrokerError::InvalidBrokerUri(e.to_string()))?;
        if url.query().is_some() {
            return Err(BrokerError::BrokerUriHasQuery);
        }

        Ok(url)
    }
}

/// Drive the websocket handshake with the broker until a task offer is
/// accepted and deferred.
///
/// The launcher registers as a runner for the configured type, offers a task
/// slot with no expiry, and defers the accepted task so the real runner can
/// claim it once launched. The connection is closed before returning.
pub async fn handshake(cfg: &HandshakeConfig) -> Result<(), BrokerError> {
    let broker_url = cfg.validate()?;
    let connection_id = random_hex_id();
    let ws_url = websocket_url(&broker_url, &connection_id)?;

    debug!(connection_id = %connection_id, runner_type = %cfg.runner_type, "Connecting to task broker");

    let mut request = ws_url
        .as_str()
        .into_client_request()
        .map_err(|e| BrokerError::Ws(e.to_string()))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", cfg.grant_token))
        .map_err(|e| BrokerError::Ws(e.to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    match tokio::time::timeout(cfg.timeout, exchange(request, cfg)).await {
        Ok(result) => result,
        Err(_) => Err(BrokerError::HandshakeTimeout(cfg.timeout)),
    }
}

async fn exchange(
    request: tokio_tungstenite::tungstenite::handshake::client::Request,
    cfg: &HandshakeConfig,
) -> Result<(), BrokerError> {
    let (mut ws, _) = connect_async(request).await.map_err(connect_error)?;

    match read_message(&mut ws).await? {
        BrokerMessage::InfoRequest => {}
        other => return Err(unexpected(&other)),
    }
    send_message(
        &mut ws,
        &LauncherMessage::Info {
            name: "Launcher".to_string(),
            types: vec![cfg.runner_type.clone()],
        },
    )
    .await?;

    match read_message(&mut ws).await? {
        BrokerMessage::RunnerRegistered => {}
        other => return Err(unexpected(&other)),
    }
    let offer_id = random_hex_id();
    debug!(offer_id = %offer_id, "Registered with task broker, sending task offer");
    send_message(
        &mut ws,
        &LauncherMessage::TaskOffer {
            task_type: cfg.runner_type.clone(),
            valid_for: -1,
            offer_id,
        },
    )
    .await?;

    let task_id = match read_message(&mut ws).await? {
        BrokerMessage::TaskOfferAccept { task_id } => task_id,
        other => return Err(unexpected(&other)),
    };
    debug!(task_id = %task_id, "Task offer accepted, deferring task to the runner");
    send_message(&mut ws, &LauncherMessage::TaskDeferred { task_id }).await?;

    let _ = ws.close(None).await;
    Ok(())
}

async fn read_message(ws: &mut WsStream) -> Result<BrokerMessage, BrokerError> {
    loop {
        let frame = match ws.next().await {
            None => return Err(BrokerError::ServerDown),
            Some(Err(err)) => return Err(read_error(err)),
            Some(Ok(frame)) => frame,
        };

        match frame {
            Message::Text(text) => {
                if text.len() > MAX_MESSAGE_SIZE {
                    return Err(BrokerError::MessageTooLarge);
                }
                return serde_json::from_str(&text).map_err(|e| BrokerError::Decode(e.to_string()));
            }
            Message::Close(frame) => return Err(close_error(frame)),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return Err(BrokerError::UnexpectedMessage(format!("{other:?}"))),
        }
    }
}

async fn send_message(ws: &mut WsStream, msg: &LauncherMessage) -> Result<(), BrokerError> {
    let text = serde_json::to_string(msg).map_err(|e| BrokerError::Decode(e.to_string()))?;
    ws.send(Message::Text(text)).await.map_err(|err| match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => BrokerError::ServerDown,
        other => BrokerError::Ws(other.to_string()),
    })
}

fn unexpected(msg: &BrokerMessage) -> BrokerError {
    BrokerError::UnexpectedMessage(format!("{msg:?}"))
}

fn connect_error(err: WsError) -> BrokerError {
    match err {
        WsError::Io(ref io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
            BrokerError::ServerDown
        }
        WsError::Capacity(_) => BrokerError::MessageTooLarge,
        other => BrokerError::Ws(other.to_string()),
    }
}

fn read_error(err: WsError) -> BrokerError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => BrokerError::ServerDown,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => BrokerError::ServerDown,
        WsError::Capacity(_) => BrokerError::MessageTooLarge,
        other => BrokerError::Ws(other.to_string()),
    }
}

/// A close with normal or going-away status means the broker is shutting
/// down; everything else is a protocol failure.
fn close_error(frame: Option<CloseFrame<'_>>) -> BrokerError {
    match frame {
        None => BrokerError::ServerDown,
        Some(frame) if frame.code == CloseCode::Normal || frame.code == CloseCode::Away => {
            BrokerError::ServerDown
        }
        Some(frame) => BrokerError::Ws(format!(
            "websocket closed with code {}",
            u16::from(frame.code)
        )),
    }
}

/// Random 16-hex id for log correlation. Uniqueness is not relied on for
/// correctness.
fn random_hex_id() -> String {
    use rand::RngCore;

    let mut raw = [0u8; 8];
    rand::rng().fill_bytes(&mut raw);
    hex::encode(raw)
}

fn websocket_url(broker: &Url, connection_id: &str) -> Result<Url, BrokerError> {
    let scheme = match broker.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(BrokerError::InvalidBrokerUri(format!(
                "unsupported scheme: {other}"
            )))
        }
    };

    let mut url = broker.clone();
    url.set_scheme(scheme)
        .map_err(|_| BrokerError::InvalidBrokerUri(broker.to_string()))?;
    url.set_path("/runners/_ws");
    url.set_query(Some(&format!("id={connection_id}")));
    Ok(url)
}
