//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;

use cryptofolio_core::{InMemoryMarketStore, MarketDataService};
use cryptofolio_market_data::errors::MarketDataError;
use cryptofolio_market_data::{
    AssetDetail, GlobalSnapshot, HistoricalSeries, MarketDataProvider, MarketItem, PricePoint,
    ProviderRegistry, RegistryConfig,
};

/// How a stub provider answers every call.
#[derive(Clone, Copy, Debug)]
pub enum Mode {
    Healthy,
    Down,
    Empty,
}

/// Provider stub with a shared call counter.
pub struct StubProvider {
    id: &'static str,
    mode: Mode,
    items: usize,
    delay: Duration,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl StubProvider {
    pub fn new(id: &'static str, mode: Mode) -> Arc<Self> {
        Self::build(id, mode, 3, Duration::ZERO)
    }

    pub fn with_items(id: &'static str, items: usize) -> Arc<Self> {
        Self::build(id, Mode::Healthy, items, Duration::ZERO)
    }

    pub fn slow(id: &'static str, delay: Duration) -> Arc<Self> {
        Self::build(id, Mode::Healthy, 3, delay)
    }

    fn build(id: &'static str, mode: Mode, items: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            mode,
            items,
            delay,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to completion, as opposed to being cancelled.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<bool, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Down => Err(MarketDataError::Unreachable {
                provider: self.id.to_string(),
                message: "connection refused".to_string(),
            }),
            Mode::Empty => Ok(false),
            Mode::Healthy => Ok(true),
        }
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn fetch_snapshot(
        &self,
        currency: &str,
        _limit: u32,
    ) -> Result<Vec<MarketItem>, MarketDataError> {
        if !self.enter().await? {
            return Ok(Vec::new());
        }
        Ok((0..self.items)
            .map(|i| {
                MarketItem::new(
                    format!("{}-coin-{}", self.id.to_lowercase(), i),
                    format!("C{}", i),
                    format!("Coin {}", i),
                    currency,
                    dec!(10),
                    Utc::now(),
                    self.id,
                )
                .with_rank(i as u32 + 1)
            })
            .collect())
    }

    async fn fetch_detail(&self, id: &str) -> Result<AssetDetail, MarketDataError> {
        let healthy = self.enter().await?;
        let mut detail = AssetDetail::new(id, "BTC", "Bitcoin", Utc::now(), self.id);
        if healthy {
            detail
                .market_data
                .current_price
                .insert("usd".to_string(), dec!(64000));
        }
        Ok(detail)
    }

    async fn fetch_history(
        &self,
        id: &str,
        currency: &str,
        days: u32,
    ) -> Result<HistoricalSeries, MarketDataError> {
        let healthy = self.enter().await?;
        let now = Utc::now();
        let prices = if healthy {
            vec![
                PricePoint::new(now - chrono::Duration::days(1), dec!(100)),
                PricePoint::new(now, dec!(110)),
            ]
        } else {
            Vec::new()
        };
        Ok(HistoricalSeries::new(id, currency, days, prices, now, self.id))
    }

    async fn fetch_global(&self) -> Result<GlobalSnapshot, MarketDataError> {
        let healthy = self.enter().await?;
        let mut global = GlobalSnapshot::new(Utc::now(), self.id);
        if healthy {
            global.active_cryptocurrencies = 10_000;
            global
                .total_market_cap
                .insert("usd".to_string(), dec!(2500000000000));
        }
        Ok(global)
    }
}

/// Registry that keeps the given order.
pub fn registry(providers: &[Arc<StubProvider>]) -> Arc<ProviderRegistry> {
    let order = providers.iter().map(|p| p.id().into()).collect();
    let providers: Vec<Arc<dyn MarketDataProvider>> = providers
        .iter()
        .map(|p| p.clone() as Arc<dyn MarketDataProvider>)
        .collect();
    Arc::new(ProviderRegistry::with_config(
        providers,
        RegistryConfig {
            priority_order: order,
            ..Default::default()
        },
    ))
}

pub fn service(providers: &[Arc<StubProvider>]) -> (Arc<MarketDataService>, Arc<InMemoryMarketStore>) {
    let store = Arc::new(InMemoryMarketStore::new());
    let service = MarketDataService::new(registry(providers), store.clone());
    (Arc::new(service), store)
}

pub fn total_calls(providers: &[Arc<StubProvider>]) -> usize {
    providers.iter().map(|p| p.calls()).sum()
}
