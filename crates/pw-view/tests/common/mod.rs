//! Fakes for view tests. Routes can be held until the test releases them,
//! to make a fetch resolve after a selection switch.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_core::FetchError;
use pw_core::config::AppConfig;
use pw_core::ws::{WsConnector, WsEvent, WsPeer, WsSession};
use pw_md::rest::{HttpResponse, HttpTransport};
use pw_view::MarketHub;
use tokio::sync::{Notify, mpsc};

struct Route {
    prefix: String,
    replies: VecDeque<HttpResponse>,
    hold: Option<Arc<Notify>>,
}

#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a 200 reply for `prefix`. The last reply repeats.
    pub fn ok(&self, prefix: &str, body: &str) {
        let mut routes = self.routes.lock();
        match routes.iter_mut().find(|r| r.prefix == prefix) {
            Some(route) => route.replies.push_back(HttpResponse::ok(body)),
            None => routes.push(Route {
                prefix: prefix.to_string(),
                replies: VecDeque::from([HttpResponse::ok(body)]),
                hold: None,
            }),
        }
    }

    /// Hold every request to `prefix` until the returned gate is notified.
    pub fn hold(&self, prefix: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        let mut routes = self.routes.lock();
        if let Some(route) = routes.iter_mut().find(|r| r.prefix == prefix) {
            route.hold = Some(gate.clone());
        }
        gate
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.calls.lock().push(url.to_string());
        let (reply, hold) = {
            let mut routes = self.routes.lock();
            let Some(route) = routes.iter_mut().find(|r| url.starts_with(r.prefix.as_str())) else {
                return Err(FetchError::Network(format!("no route for {url}")));
            };
            let reply = if route.replies.len() > 1 {
                route.replies.pop_front()
            } else {
                route.replies.front().cloned()
            };
            (reply, route.hold.clone())
        };
        if let Some(gate) = hold {
            gate.notified().await;
        }
        reply.ok_or_else(|| FetchError::Network("no reply".into()))
    }
}

pub struct ScriptedConnector {
    peers: mpsc::UnboundedSender<WsPeer>,
}

impl ScriptedConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<WsPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { peers: tx }), rx)
    }
}

#[async_trait]
impl WsConnector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<WsSession, FetchError> {
        let (session, peer) = WsSession::channel(64);
        let _ = self.peers.send(peer);
        Ok(session)
    }
}

pub fn hub(transport: Arc<FakeTransport>, connector: Arc<ScriptedConnector>) -> MarketHub {
    MarketHub::new(&AppConfig::default(), transport, connector)
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

pub async fn push(peer: &WsPeer, text: &str) -> bool {
    peer.inbound.send(WsEvent::Text(text.to_string())).await.is_ok()
}

/// Wait until `rx` holds a value matching `pred`.
pub async fn wait_for<T: Clone>(rx: &mut tokio::sync::watch::Receiver<T>, pred: impl Fn(&T) -> bool) -> T {
    tokio::time::timeout(WAIT, async {
        loop {
            let value = rx.borrow_and_update().clone();
            if pred(&value) {
                return value;
            }
            rx.changed().await.expect("sender dropped");
        }
    })
    .await
    .expect("condition not reached")
}

pub const BYBIT_PONG: &str = r#"{"success":true,"ret_msg":"pong","conn_id":"c1","req_id":"100001","op":"ping"}"#;

pub fn bybit_ticker_rest(symbol: &str, last: &str) -> String {
    format!(
        r#"{{"retCode":0,"retMsg":"OK","time":1700000000000,"result":{{"category":"linear","list":[{{"symbol":"{symbol}","lastPrice":"{last}","highPrice24h":"{last}","lowPrice24h":"{last}","turnover24h":"1","price24hPcnt":"0"}}]}}}}"#
    )
}

pub fn bybit_ticker_push(symbol: &str, last: &str) -> String {
    format!(
        r#"{{"topic":"tickers.{symbol}","type":"snapshot","ts":1700000000000,"data":{{"symbol":"{symbol}","lastPrice":"{last}"}}}}"#
    )
}

pub fn ticker_url(symbol: &str) -> String {
    format!("https://api.bybit.com/v5/market/tickers?category=linear&symbol={symbol}")
}
