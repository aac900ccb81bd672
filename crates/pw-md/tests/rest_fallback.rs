mod common;

use common::FakeTransport;
use pw_core::config::AppConfig;
use pw_core::{Exchange, FetchError};
use pw_md::AdapterRegistry;
use pw_md::rest::HttpResponse;

const PAIRS: &str = r#"[{"id":"btcidr","symbol":"BTCIDR","base_currency":"idr","traded_currency":"btc","description":"BTC/IDR"}]"#;

#[tokio::test]
async fn indodax_pairs_through_first_mirror_then_cache() {
    let transport = FakeTransport::new();
    transport.route("https://indodax.com/api/pairs", Err(FetchError::Network("blocked by cors".into())));
    let wrapped = serde_json::json!({ "contents": PAIRS, "status": { "http_code": 200 } });
    transport.ok("https://api.allorigins.win/", &wrapped.to_string());

    let registry = AdapterRegistry::from_config(&AppConfig::default(), transport.clone());
    let indodax = registry.get(Exchange::Indodax);

    let first = indodax.list_pairs().await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.data.len(), 1);
    assert_eq!(first.data[0].id, "btcidr");
    assert_eq!(first.data[0].display_symbol, "BTC/IDR");
    assert_eq!(transport.call_count(), 2);
    assert!(transport.calls()[1].starts_with("https://api.allorigins.win/get?url=https%3A%2F%2Findodax.com"));

    let second = indodax.list_pairs().await.unwrap();
    assert!(second.cached);
    assert_eq!(second.data, first.data);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn bybit_rejection_is_not_retried() {
    let transport = FakeTransport::new();
    transport.ok(
        "https://api.bybit.com/v5/market/tickers",
        r#"{"retCode":10001,"retMsg":"params error","result":{}}"#,
    );
    let registry = AdapterRegistry::from_config(&AppConfig::default(), transport.clone());

    let err = registry.get(Exchange::Bybit).ticker("btcusdt").await.unwrap_err();
    assert!(matches!(err, FetchError::ExchangeRejected { code: 10001, .. }));
    assert_eq!(transport.call_count(), 1);
    assert_eq!(
        transport.calls()[0],
        "https://api.bybit.com/v5/market/tickers?category=linear&symbol=BTCUSDT"
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_sources_surface_after_retries() {
    let transport = FakeTransport::new();
    transport.route("https://", Ok(HttpResponse { status: 503, body: String::new() }));
    let mut config = AppConfig::default();
    config.proxies = Some(Vec::new());
    let registry = AdapterRegistry::from_config(&config, transport.clone());

    let err = registry.get(Exchange::Bybit).depth("ETHUSDT").await.unwrap_err();
    match err {
        FetchError::MaxRetriesExceeded { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(transport.call_count(), 3);
}
