//! Fakes shared by the integration tests: a routed HTTP transport and a
//! connector that hands each socket's far end to the test.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_core::FetchError;
use pw_core::config::AppConfig;
use pw_core::ws::{WsConnector, WsEvent, WsPeer, WsSession};
use pw_md::AdapterRegistry;
use pw_md::live::LiveDeps;
use pw_md::rest::{HttpResponse, HttpTransport};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Answers GETs by URL prefix. A route's last reply repeats.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<(String, VecDeque<Result<HttpResponse, FetchError>>)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, prefix: &str, reply: Result<HttpResponse, FetchError>) {
        let mut routes = self.routes.lock();
        match routes.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, queue)) => queue.push_back(reply),
            None => routes.push((prefix.to_string(), VecDeque::from([reply]))),
        }
    }

    pub fn ok(&self, prefix: &str, body: &str) {
        self.route(prefix, Ok(HttpResponse::ok(body)));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.calls.lock().push(url.to_string());
        let mut routes = self.routes.lock();
        let Some((_, queue)) = routes.iter_mut().find(|(p, _)| url.starts_with(p.as_str())) else {
            return Err(FetchError::Network(format!("no route for {url}")));
        };
        let reply = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        reply.unwrap_or_else(|| Err(FetchError::Network("no reply".into())))
    }
}

/// Connector whose sockets are driven by the test through [`WsPeer`]s.
pub struct ScriptedConnector {
    peers: mpsc::UnboundedSender<WsPeer>,
    attempts: Mutex<Vec<Instant>>,
    refuse: bool,
}

impl ScriptedConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<WsPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers: tx,
            attempts: Mutex::new(Vec::new()),
            refuse: false,
        };
        (Arc::new(connector), rx)
    }

    /// Every connect attempt fails.
    pub fn refusing() -> Arc<Self> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            peers: tx,
            attempts: Mutex::new(Vec::new()),
            refuse: true,
        })
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.attempts.lock().len()
    }
}

#[async_trait]
impl WsConnector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<WsSession, FetchError> {
        self.attempts.lock().push(Instant::now());
        if self.refuse {
            return Err(FetchError::Connection("connection refused".into()));
        }
        let (session, peer) = WsSession::channel(64);
        let _ = self.peers.send(peer);
        Ok(session)
    }
}

pub fn deps(transport: Arc<FakeTransport>, connector: Arc<ScriptedConnector>) -> LiveDeps {
    deps_with(AppConfig::default(), transport, connector)
}

pub fn deps_with(config: AppConfig, transport: Arc<FakeTransport>, connector: Arc<ScriptedConnector>) -> LiveDeps {
    LiveDeps {
        connector,
        adapters: AdapterRegistry::from_config(&config, transport),
        config,
    }
}

const WAIT: Duration = Duration::from_secs(5);

pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<WsPeer>) -> WsPeer {
    tokio::time::timeout(WAIT, peers.recv())
        .await
        .expect("no connection opened")
        .expect("connector gone")
}

pub async fn next_sent(peer: &mut WsPeer) -> String {
    tokio::time::timeout(WAIT, peer.outbound.recv())
        .await
        .expect("nothing sent")
        .expect("session closed")
}

pub async fn push(peer: &WsPeer, text: &str) {
    peer.inbound.send(WsEvent::Text(text.to_string())).await.expect("session closed");
}

/// Wait until the session side of `peer` is dropped.
pub async fn wait_closed(peer: &mut WsPeer) {
    tokio::time::timeout(WAIT, async {
        while peer.outbound.recv().await.is_some() {}
    })
    .await
    .expect("session still open");
}

pub const BYBIT_PONG: &str = r#"{"success":true,"ret_msg":"pong","conn_id":"c1","req_id":"100001","op":"ping"}"#;
