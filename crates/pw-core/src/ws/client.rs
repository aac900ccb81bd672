//! tokio-tungstenite implementation of [`WsConnector`].
//!
//! Each successful connect spawns a pump task that:
//! 1. Forwards text frames to the session's inbound channel.
//! 2. Writes queued outbound frames.
//! 3. Answers protocol-level pings.
//! 4. Closes the socket once the session is dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{WsConnector, WsEvent, WsPeer, WsSession};
use crate::error::FetchError;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const SESSION_BUFFER: usize = 256;

/// Production connector over TLS WebSockets.
pub struct TungsteniteConnector {
    connect_timeout: Duration,
    next_id: AtomicUsize,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            next_id: AtomicUsize::new(0),
        }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl WsConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<WsSession, FetchError> {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        info!("[ws-{conn_id}] connecting to {url}");

        let stream = match tokio::time::timeout(self.connect_timeout, connect_ws(url)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                warn!("[ws-{conn_id}] connection failed: {e}");
                return Err(e);
            }
            Err(_) => {
                warn!("[ws-{conn_id}] connect timed out after {:?}", self.connect_timeout);
                return Err(FetchError::Timeout(self.connect_timeout));
            }
        };
        info!("[ws-{conn_id}] connected");

        let (session, peer) = WsSession::channel(SESSION_BUFFER);
        tokio::spawn(pump(conn_id, stream, peer));
        Ok(session)
    }
}

/// Shuttle frames between the socket and the session until either ends.
async fn pump(conn_id: usize, stream: WsStream, peer: WsPeer) {
    let WsPeer {
        mut outbound,
        inbound,
    } = peer;
    let (mut ws_write, mut ws_read) = stream.split();

    loop {
        tokio::select! {
            msg = ws_read.next() => {
                let event = match msg {
                    Some(Ok(Message::Text(text))) => WsEvent::Text(text.as_str().to_owned()),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => WsEvent::Text(text),
                        Err(_) => {
                            debug!("[ws-{conn_id}] dropping non-utf8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_write.send(Message::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(Message::Close(_))) => {
                        warn!("[ws-{conn_id}] received close frame");
                        let _ = inbound.send(WsEvent::Closed).await;
                        return;
                    }
                    Some(Err(e)) => {
                        warn!("[ws-{conn_id}] read error: {e}");
                        let _ = inbound.send(WsEvent::Failed(e.to_string())).await;
                        return;
                    }
                    None => {
                        warn!("[ws-{conn_id}] stream ended");
                        let _ = inbound.send(WsEvent::Closed).await;
                        return;
                    }
                    _ => continue, // Pong, Frame
                };
                if inbound.send(event).await.is_err() {
                    debug!("[ws-{conn_id}] session dropped");
                    let _ = ws_write.close().await;
                    return;
                }
            }

            out = outbound.recv() => {
                match out {
                    Some(text) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!("[ws-{conn_id}] send error: {e}");
                            let _ = inbound.send(WsEvent::Failed(e.to_string())).await;
                            return;
                        }
                    }
                    None => {
                        debug!("[ws-{conn_id}] session dropped, closing");
                        let _ = ws_write.close().await;
                        return;
                    }
                }
            }
        }
    }
}

/// Establish a (TLS) WebSocket connection.
async fn connect_ws(url: &str) -> Result<WsStream, FetchError> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    let mut request = url
        .into_client_request()
        .map_err(|e| FetchError::Connection(format!("bad websocket url {url}: {e}")))?;
    if let Ok(host) = extract_host(url).parse() {
        request.headers_mut().insert("Host", host);
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| FetchError::Connection(e.to_string()))?;
    Ok(stream)
}

/// Host part of a URL, empty when unparsable.
fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("").to_string())
        .unwrap_or_default()
}
