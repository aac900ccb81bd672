//! Adapter registry: builds both exchange adapters from config.

use std::sync::Arc;

use pw_core::Exchange;
use pw_core::cache::ResponseCache;
use pw_core::config::{AppConfig, ExchangeSettings, ProxyMirror};
use tracing::info;

use crate::ExchangeAdapter;
use crate::bybit::BybitAdapter;
use crate::indodax::IndodaxAdapter;
use crate::rest::client::SharedCache;
use crate::rest::{HttpTransport, ReqwestTransport, RequestExecutor, RestClient, RetryPolicy};

/// Both adapters, sharing one transport and one response cache.
#[derive(Clone)]
pub struct AdapterRegistry {
    indodax: Arc<dyn ExchangeAdapter>,
    bybit: Arc<dyn ExchangeAdapter>,
    cache: SharedCache,
}

impl AdapterRegistry {
    /// Build adapters over `transport`.
    pub fn from_config(config: &AppConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let cache: SharedCache = Arc::new(ResponseCache::new());
        let proxies: Arc<[ProxyMirror]> = config.effective_proxies().into();
        info!("[registry] {} proxy mirrors configured", proxies.len());

        let client = |settings: &ExchangeSettings| {
            let executor = RequestExecutor::new(
                transport.clone(),
                proxies.clone(),
                settings.timeout,
                settings.exchange.as_str(),
            );
            RestClient::new(
                settings.rest_url.clone(),
                executor,
                RetryPolicy::new(settings.retry_attempts, settings.retry_delay),
                cache.clone(),
            )
        };

        let indodax = config.exchange(Exchange::Indodax);
        let bybit = config.exchange(Exchange::Bybit);
        Self {
            indodax: Arc::new(IndodaxAdapter::new(client(&indodax), indodax)),
            bybit: Arc::new(BybitAdapter::new(client(&bybit), bybit)),
            cache,
        }
    }

    /// Production registry over reqwest.
    pub fn with_reqwest(config: &AppConfig) -> Self {
        Self::from_config(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn get(&self, exchange: Exchange) -> Arc<dyn ExchangeAdapter> {
        match exchange {
            Exchange::Indodax => self.indodax.clone(),
            Exchange::Bybit => self.bybit.clone(),
        }
    }

    /// The response cache every adapter reads through.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }
}
