use std::borrow::Cow;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};

use cryptofolio_core::cache::DEFAULT_SWEEP_INTERVAL;
use cryptofolio_core::scheduler::WatchedAsset;
use cryptofolio_core::{AggregatorConfig, SchedulerConfig};
use cryptofolio_market_data::{normalize_currency, CircuitBreakerConfig, RegistryConfig};

/// Upper bound for `CF_RETENTION_DAYS` (a century).
const MAX_RETENTION_DAYS: u32 = 36_500;

/// Daemon settings, read once at startup from `CF_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub registry: RegistryConfig,
    pub aggregator: AggregatorConfig,
    pub scheduler: SchedulerConfig,
    pub cache_sweep_interval: Duration,
    pub cryptocompare_api_key: Option<String>,
}

impl Config {
    /// Load `.env` (if any) and overlay the environment on the defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();

        let mut registry = RegistryConfig::default();
        if let Some(order) = var("CF_PROVIDER_ORDER") {
            registry.priority_order = order
                .split(',')
                .map(|id| id.trim().to_uppercase())
                .filter(|id| !id.is_empty())
                .map(Cow::Owned)
                .collect();
        }
        if let Some(timeout) = secs("CF_FETCH_TIMEOUT_SECS")? {
            registry.fetch_timeout = timeout;
        }
        registry.circuit_breaker = CircuitBreakerConfig {
            failure_threshold: parse("CF_CIRCUIT_FAILURE_THRESHOLD")?
                .unwrap_or(registry.circuit_breaker.failure_threshold),
            recovery_timeout: secs("CF_CIRCUIT_RECOVERY_SECS")?
                .unwrap_or(registry.circuit_breaker.recovery_timeout),
        };

        let mut aggregator = AggregatorConfig::default();
        if let Some(capacity) = parse("CF_PERSIST_QUEUE_CAPACITY")? {
            aggregator.persist_capacity = capacity;
        }
        let ttls = &mut aggregator.cache_ttls;
        let staleness = &mut aggregator.staleness;
        let windows = [
            ("CF_CACHE_TTL_SNAPSHOT_SECS", &mut ttls.snapshot),
            ("CF_CACHE_TTL_DETAIL_SECS", &mut ttls.detail),
            ("CF_CACHE_TTL_HISTORY_SECS", &mut ttls.history),
            ("CF_CACHE_TTL_GLOBAL_SECS", &mut ttls.global),
            ("CF_STALE_AFTER_SNAPSHOT_SECS", &mut staleness.snapshot),
            ("CF_STALE_AFTER_DETAIL_SECS", &mut staleness.detail),
            ("CF_STALE_AFTER_HISTORY_SECS", &mut staleness.history),
            ("CF_STALE_AFTER_GLOBAL_SECS", &mut staleness.global),
        ];
        for (name, slot) in windows {
            if let Some(window) = secs(name)? {
                *slot = window;
            }
        }

        let mut scheduler = SchedulerConfig::default();
        let intervals = [
            ("CF_COLLECTION_INTERVAL_SECS", &mut scheduler.collection_interval),
            ("CF_INDICATOR_INTERVAL_SECS", &mut scheduler.indicator_interval),
            ("CF_SENTIMENT_INTERVAL_SECS", &mut scheduler.sentiment_interval),
            ("CF_RETENTION_INTERVAL_SECS", &mut scheduler.retention_interval),
        ];
        for (name, slot) in intervals {
            if let Some(interval) = secs(name)? {
                if interval.is_zero() {
                    return Err(anyhow!("{} must be greater than zero", name));
                }
                *slot = interval;
            }
        }
        if let Some(delay) = millis("CF_INDICATOR_DELAY_MS")? {
            scheduler.indicator_delay = delay;
        }
        if let Some(delay) = millis("CF_SENTIMENT_DELAY_MS")? {
            scheduler.sentiment_delay = delay;
        }
        if let Some(days) = parse::<u32>("CF_RETENTION_DAYS")? {
            scheduler.retention_days = check_retention_days(days)?;
        }
        let history_windows = [
            ("CF_COLLECTION_HISTORY_DAYS", &mut scheduler.collection_history_days),
            ("CF_INDICATOR_HISTORY_DAYS", &mut scheduler.indicator_history_days),
        ];
        for (name, slot) in history_windows {
            if let Some(days) = parse::<u32>(name)? {
                if days == 0 {
                    return Err(anyhow!("{} must be greater than zero", name));
                }
                *slot = days;
            }
        }
        if let Some(currency) = var("CF_SNAPSHOT_CURRENCY") {
            scheduler.snapshot_currency = normalize_currency(&currency);
        }
        if let Some(limit) = parse("CF_SNAPSHOT_LIMIT")? {
            scheduler.snapshot_limit = limit;
        }
        if let Some(assets) = var("CF_WATCHED_ASSETS") {
            scheduler.watched_assets = parse_watched_assets(&assets)?;
            scheduler.tracked_assets = scheduler
                .watched_assets
                .iter()
                .map(|a| a.id.clone())
                .collect();
        }

        Ok(Self {
            registry,
            aggregator,
            scheduler,
            cache_sweep_interval: secs("CF_CACHE_SWEEP_SECS")?.unwrap_or(DEFAULT_SWEEP_INTERVAL),
            cryptocompare_api_key: var("CF_CRYPTOCOMPARE_API_KEY"),
        })
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("Invalid value for {}: '{}'", name, raw))
        })
        .transpose()
}

fn secs(name: &str) -> anyhow::Result<Option<Duration>> {
    Ok(parse::<u64>(name)?.map(Duration::from_secs))
}

fn millis(name: &str) -> anyhow::Result<Option<Duration>> {
    Ok(parse::<u64>(name)?.map(Duration::from_millis))
}

fn check_retention_days(days: u32) -> anyhow::Result<u32> {
    if (1..=MAX_RETENTION_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(anyhow!(
            "CF_RETENTION_DAYS must be between 1 and {}, got {}",
            MAX_RETENTION_DAYS,
            days
        ))
    }
}

/// `BTC:bitcoin,ETH:ethereum`
fn parse_watched_assets(raw: &str) -> anyhow::Result<Vec<WatchedAsset>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once(':') {
            Some((symbol, id)) if !symbol.trim().is_empty() && !id.trim().is_empty() => {
                Ok(WatchedAsset::new(symbol.trim().to_uppercase(), id.trim()))
            }
            _ => Err(anyhow!(
                "Invalid CF_WATCHED_ASSETS entry '{}', expected SYMBOL:id",
                pair
            )),
        })
        .collect()
}
