//! WebSocket sessions behind a connector seam.
//!
//! A [`WsSession`] is one open socket seen as two channels: outbound text
//! frames and inbound [`WsEvent`]s. Reconnect policy is not handled here;
//! the live managers own it so they can track retry counts per key. A
//! session ends when either side drops its half.
//!
//! [`WsConnector`] is the seam live managers open sockets through. The
//! production implementation is [`TungsteniteConnector`]; tests plug in a
//! scripted connector built on [`WsSession::channel`].

pub mod client;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::FetchError;

pub use client::TungsteniteConnector;

/// Inbound event on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    /// A text frame.
    Text(String),
    /// The peer closed the socket (close frame or end of stream).
    Closed,
    /// Read or write failure; the session is dead.
    Failed(String),
}

/// Client half of one open socket.
pub struct WsSession {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<WsEvent>,
}

/// Transport half of one open socket, driven by a connector's pump task
/// (or by a test).
pub struct WsPeer {
    pub outbound: mpsc::Receiver<String>,
    pub inbound: mpsc::Sender<WsEvent>,
}

impl WsSession {
    /// A connected `(session, peer)` pair with `capacity` slots per direction.
    pub fn channel(capacity: usize) -> (WsSession, WsPeer) {
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (in_tx, in_rx) = mpsc::channel(capacity);
        (
            WsSession {
                outbound: out_tx,
                inbound: in_rx,
            },
            WsPeer {
                outbound: out_rx,
                inbound: in_tx,
            },
        )
    }

    /// Queue a text frame.
    pub async fn send(&self, text: String) -> Result<(), FetchError> {
        self.outbound
            .send(text)
            .await
            .map_err(|_| FetchError::Connection("socket closed".into()))
    }

    /// Next inbound event. A dropped peer reads as [`WsEvent::Closed`].
    pub async fn next_event(&mut self) -> WsEvent {
        self.inbound.recv().await.unwrap_or(WsEvent::Closed)
    }
}

/// Opens WebSocket sessions.
#[async_trait]
pub trait WsConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<WsSession, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_peer_reads_as_closed() {
        let (mut session, peer) = WsSession::channel(4);
        peer.inbound.send(WsEvent::Text("hi".into())).await.unwrap();
        drop(peer);
        assert_eq!(session.next_event().await, WsEvent::Text("hi".into()));
        assert_eq!(session.next_event().await, WsEvent::Closed);
        assert!(session.send("x".into()).await.is_err());
    }
}
