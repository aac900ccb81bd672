mod common;

use std::time::Duration;

use common::{BYBIT_PONG, FakeTransport, ScriptedConnector, deps, next_peer, next_sent, push, wait_closed};
use pw_core::{ConnectionStatus, Exchange, FeedKey};
use pw_md::live::{LivePriceManager, LiveTradesManager, PriceFeed, TradesFeed};

const BTC_TICKER: &str =
    r#"{"topic":"tickers.BTCUSDT","type":"snapshot","ts":1700000000000,"data":{"symbol":"BTCUSDT","lastPrice":"37000.5","highPrice24h":"38000","lowPrice24h":"36000","price24hPcnt":"0.01"}}"#;

fn trade_push(id: &str, ts_ms: u64) -> String {
    format!(
        r#"{{"topic":"publicTrade.BTCUSDT","type":"snapshot","ts":{ts_ms},"data":[{{"T":{ts_ms},"s":"BTCUSDT","S":"Buy","v":"0.1","p":"37000","i":"{id}"}}]}}"#
    )
}

#[tokio::test]
async fn bybit_price_handshake_then_subscribe() {
    let (connector, mut peers) = ScriptedConnector::new();
    let manager = LivePriceManager::new(PriceFeed, deps(FakeTransport::new(), connector));
    let key = FeedKey::new(Exchange::Bybit, "BTCUSDT");

    let mut sub = manager.acquire(key.clone());
    assert_eq!(sub.current().connection.status, ConnectionStatus::Connecting);

    let mut peer = next_peer(&mut peers).await;
    let handshake = next_sent(&mut peer).await;
    assert!(handshake.contains(r#""op":"ping""#));

    // nothing is subscribed before the pong
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(peer.outbound.try_recv().is_err());

    push(&peer, BYBIT_PONG).await;
    let subscribe = next_sent(&mut peer).await;
    assert!(subscribe.contains(r#""op":"subscribe""#));
    assert!(subscribe.contains("tickers.BTCUSDT"));

    push(&peer, BTC_TICKER).await;
    let view = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = sub.current_and_mark_seen();
            if view.data.is_some() {
                return view;
            }
            assert!(sub.changed().await);
        }
    })
    .await
    .expect("no price published");

    assert_eq!(view.connection.status, ConnectionStatus::Connected);
    assert_eq!(view.connection.retry_count, 0);
    let price = view.data.unwrap();
    assert_eq!(price.symbol, "BTCUSDT");
    assert_eq!(price.price, 37000.5);
}

#[tokio::test]
async fn two_subscribers_share_one_connection() {
    let (connector, mut peers) = ScriptedConnector::new();
    let manager = LivePriceManager::new(PriceFeed, deps(FakeTransport::new(), connector.clone()));
    let key = FeedKey::new(Exchange::Bybit, "ETHUSDT");

    let first = manager.acquire(key.clone());
    let second = manager.acquire(key.clone());
    let mut peer = next_peer(&mut peers).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.subscriber_count(&key), 2);
    assert_eq!(connector.connections(), 1);
    assert!(peers.try_recv().is_err());

    manager.release(first);
    assert_eq!(manager.subscriber_count(&key), 1);
    assert!(manager.is_live(&key));

    drop(second);
    assert_eq!(manager.subscriber_count(&key), 0);
    assert!(!manager.is_live(&key));
    assert!(manager.view(&key).is_none());
    wait_closed(&mut peer).await;
}

#[tokio::test]
async fn fresh_session_after_release_starts_with_empty_memo() {
    let (connector, mut peers) = ScriptedConnector::new();
    let manager = LiveTradesManager::new(TradesFeed, deps(FakeTransport::new(), connector));
    let key = FeedKey::new(Exchange::Bybit, "BTCUSDT");

    for round in 0..2 {
        let mut sub = manager.acquire(key.clone());
        let mut peer = next_peer(&mut peers).await;
        next_sent(&mut peer).await;
        push(&peer, BYBIT_PONG).await;
        assert!(next_sent(&mut peer).await.contains("publicTrade.BTCUSDT"));

        push(&peer, &trade_push("t1", 1_700_000_000_000)).await;
        let feed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let view = sub.current_and_mark_seen();
                if !view.data.trades.is_empty() {
                    return view.data;
                }
                assert!(sub.changed().await);
            }
        })
        .await
        .expect("no trades published");

        assert_eq!(feed.new_ids, vec!["t1".to_string()], "round {round}");
        drop(sub);
        wait_closed(&mut peer).await;
    }
}

#[tokio::test]
async fn disconnect_resets_view_and_restarts_for_subscribers() {
    let (connector, mut peers) = ScriptedConnector::new();
    let manager = LivePriceManager::new(PriceFeed, deps(FakeTransport::new(), connector.clone()));
    let key = FeedKey::new(Exchange::Bybit, "BTCUSDT");

    let mut sub = manager.acquire(key.clone());
    let mut peer = next_peer(&mut peers).await;
    next_sent(&mut peer).await;
    push(&peer, BYBIT_PONG).await;
    next_sent(&mut peer).await;
    push(&peer, BTC_TICKER).await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while sub.current_and_mark_seen().data.is_none() {
            assert!(sub.changed().await);
        }
    })
    .await
    .expect("no price published");

    manager.disconnect(&key);
    let view = sub.current();
    assert!(view.data.is_none());
    assert_eq!(view.connection.status, ConnectionStatus::Connecting);
    assert_eq!(manager.subscriber_count(&key), 1);
    assert!(manager.is_live(&key));
    wait_closed(&mut peer).await;

    // the remaining subscriber is served by a new socket
    let mut fresh = next_peer(&mut peers).await;
    assert_eq!(connector.connections(), 2);
    assert!(next_sent(&mut fresh).await.contains(r#""op":"ping""#));
    push(&fresh, BYBIT_PONG).await;
    assert!(next_sent(&mut fresh).await.contains("tickers.BTCUSDT"));
    push(&fresh, BTC_TICKER).await;
    let view = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = sub.current_and_mark_seen();
            if view.data.is_some() {
                return view;
            }
            assert!(sub.changed().await);
        }
    })
    .await
    .expect("no price after restart");
    assert_eq!(view.connection.status, ConnectionStatus::Connected);
}

#[tokio::test]
async fn indodax_trades_connect_then_subscribe() {
    let (connector, mut peers) = ScriptedConnector::new();
    let manager = LiveTradesManager::new(TradesFeed, deps(FakeTransport::new(), connector));
    let key = FeedKey::new(Exchange::Indodax, "btcidr");

    let mut sub = manager.acquire(key.clone());
    let mut peer = next_peer(&mut peers).await;
    let connect = next_sent(&mut peer).await;
    assert!(connect.contains(r#""token""#));
    assert!(connect.contains(r#""id":1"#));

    // no subscription until the connect reply
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(peer.outbound.try_recv().is_err());

    push(&peer, r#"{"id":1,"result":{"client":"c1","version":"3.2"}}"#).await;
    let subscribe = next_sent(&mut peer).await;
    assert!(subscribe.contains("market:trade-activity-btcidr"));
    assert!(subscribe.contains(r#""id":2"#));
    push(&peer, r#"{"id":2,"result":{"recoverable":true}}"#).await;

    // another pair's channel is ignored
    push(
        &peer,
        r#"{"result":{"channel":"market:trade-activity-ethidr","data":{"data":[["ethidr",1700000001,77,"sell",30000000,"1","1"]]}}}"#,
    )
    .await;
    push(
        &peer,
        r#"{"result":{"channel":"market:trade-activity-btcidr","data":{"data":[["btcidr",1700000000,9001,"buy",650000000,"65000","0.0001"]]}}}"#,
    )
    .await;

    let view = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = sub.current_and_mark_seen();
            if !view.data.trades.is_empty() {
                return view;
            }
            assert!(sub.changed().await);
        }
    })
    .await
    .expect("no trades published");

    assert_eq!(view.connection.status, ConnectionStatus::Connected);
    assert_eq!(view.data.new_ids, vec!["9001".to_string()]);
    assert_eq!(view.data.trades.len(), 1);
    assert_eq!(view.data.trades[0].price, 650_000_000.0);
}

#[tokio::test(start_paused = true)]
async fn failed_connects_back_off_exponentially() {
    let connector = ScriptedConnector::refusing();
    let manager = LivePriceManager::new(PriceFeed, deps(FakeTransport::new(), connector.clone()));
    let key = FeedKey::new(Exchange::Bybit, "SOLUSDT");

    let sub = manager.acquire(key.clone());
    while connector.connections() < 4 {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let attempts = connector.attempts();
    for (i, expected) in [2_000u64, 4_000, 8_000].into_iter().enumerate() {
        let gap = attempts[i + 1] - attempts[i];
        assert!(gap >= Duration::from_millis(expected), "gap {i} was {gap:?}");
        assert!(gap < Duration::from_millis(expected + 100), "gap {i} was {gap:?}");
    }

    let view = sub.current();
    assert_eq!(view.connection.status, ConnectionStatus::Disconnected);
    assert_eq!(view.connection.retry_count, 4);

    // no reconnects once nobody is listening
    drop(sub);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.connections(), 4);
}
