use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use cryptofolio_core::{
    InMemoryMarketStore, MarketDataService, MarketDataServiceTrait, MarketStore, Scheduler,
};
use cryptofolio_market_data::{
    CoinGeckoProvider, CoinMarketCapProvider, CryptoCompareProvider, MarketDataProvider,
    ProviderRegistry,
};

use crate::config::Config;

pub struct AppState {
    pub service: Arc<MarketDataService>,
    pub scheduler: Scheduler,
}

pub fn init_tracing() {
    let log_format = std::env::var("CF_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // `init` also installs the log bridge, so the library crates' `log` records show up here.
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let providers: Vec<Arc<dyn MarketDataProvider>> = vec![
        Arc::new(CoinGeckoProvider::new()),
        Arc::new(CryptoCompareProvider::new(
            config.cryptocompare_api_key.clone(),
        )),
        Arc::new(CoinMarketCapProvider::new()),
    ];
    let registry = ProviderRegistry::with_config(providers, config.registry.clone());
    let order: Vec<&str> = registry.providers().iter().map(|p| p.id()).collect();
    tracing::info!("Provider order: {}", order.join(" -> "));

    let store: Arc<dyn MarketStore> = Arc::new(InMemoryMarketStore::new());
    let service = Arc::new(MarketDataService::with_config(
        Arc::new(registry),
        store.clone(),
        config.aggregator.clone(),
    ));

    let scheduler_service: Arc<dyn MarketDataServiceTrait> = service.clone();
    let scheduler = Scheduler::new(scheduler_service, store, config.scheduler.clone());

    Ok(AppState { service, scheduler })
}
