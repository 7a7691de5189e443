//! Market data models
//!
//! This module contains the normalized records every provider produces:
//! - `types` - Type aliases for common identifiers (ProviderId, AssetId, Currency)
//! - `market` - One row of a market snapshot (MarketItem)
//! - `detail` - Single-asset profile (AssetDetail, AssetMarketData, AssetLinks)
//! - `history` - Price history (HistoricalSeries, PricePoint)
//! - `global` - Market-wide totals (GlobalSnapshot)

mod detail;
mod global;
mod history;
mod market;
mod types;

pub use detail::{AssetDetail, AssetLinks, AssetMarketData, CurrencyMap};
pub use global::GlobalSnapshot;
pub use history::{HistoricalSeries, PricePoint};
pub use market::MarketItem;
pub use types::{normalize_currency, AssetId, Currency, ProviderId};
