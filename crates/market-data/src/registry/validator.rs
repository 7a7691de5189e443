//! Payload validation.
//!
//! Checks provider output before the registry accepts it:
//! - A non-empty source tag
//! - Non-negative prices and amounts
//! - A sanity ceiling on prices
//! - Strictly ascending series timestamps
//!
//! Empty payloads are reported separately through [`Payload::is_empty`] so
//! the registry can treat them as "no data" and move on.

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{AssetDetail, CurrencyMap, GlobalSnapshot, HistoricalSeries, MarketItem};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject the payload, try next provider.
    Hard,
    /// Soft warning - accept but log.
    Soft,
}

#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

impl ValidationIssue {
    fn hard(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message: message.into(),
        }
    }

    fn soft(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message: message.into(),
        }
    }
}

/// Validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Reject payloads carrying negative prices or amounts.
    pub reject_negative_values: bool,
    /// Warn above this price.
    pub max_price: Option<Decimal>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_negative_values: true,
            max_price: Some(Decimal::from(10_000_000_000i64)),
        }
    }
}

/// Provider output the registry can validate.
pub trait Payload: Send {
    /// True when the provider answered but delivered nothing usable.
    fn is_empty(&self) -> bool;

    /// Push every issue found with this payload.
    fn inspect(&self, config: &ValidatorConfig, issues: &mut Vec<ValidationIssue>);

    /// Short label for log lines.
    fn label(&self) -> String;
}

fn check_source(source: &str, issues: &mut Vec<ValidationIssue>) {
    if source.trim().is_empty() {
        issues.push(ValidationIssue::hard("Missing source tag"));
    }
}

fn check_price(name: &str, value: Decimal, config: &ValidatorConfig, issues: &mut Vec<ValidationIssue>) {
    if config.reject_negative_values && value < Decimal::ZERO {
        issues.push(ValidationIssue::hard(format!("Negative {}: {}", name, value)));
    }
    if let Some(max) = config.max_price {
        if value > max {
            issues.push(ValidationIssue::soft(format!(
                "{} {} exceeds sanity ceiling {}",
                name, value, max
            )));
        }
    }
}

fn check_amount(name: &str, value: Option<Decimal>, config: &ValidatorConfig, issues: &mut Vec<ValidationIssue>) {
    if let Some(v) = value {
        if config.reject_negative_values && v < Decimal::ZERO {
            issues.push(ValidationIssue::hard(format!("Negative {}: {}", name, v)));
        }
    }
}

fn check_map(name: &str, map: &CurrencyMap, config: &ValidatorConfig, issues: &mut Vec<ValidationIssue>) {
    for (currency, value) in map {
        check_amount(&format!("{} ({})", name, currency), Some(*value), config, issues);
    }
}

impl Payload for MarketItem {
    fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    fn inspect(&self, config: &ValidatorConfig, issues: &mut Vec<ValidationIssue>) {
        check_source(&self.source, issues);
        check_price("price", self.current_price, config, issues);
        check_amount("market cap", self.market_cap, config, issues);
        check_amount("volume", self.total_volume, config, issues);
    }

    fn label(&self) -> String {
        format!("item '{}'", self.id)
    }
}

impl Payload for Vec<MarketItem> {
    fn is_empty(&self) -> bool {
        self.iter().all(Payload::is_empty)
    }

    fn inspect(&self, config: &ValidatorConfig, issues: &mut Vec<ValidationIssue>) {
        for item in self {
            item.inspect(config, issues);
        }
    }

    fn label(&self) -> String {
        format!("snapshot of {} items", self.len())
    }
}

impl Payload for AssetDetail {
    fn is_empty(&self) -> bool {
        self.id.is_empty() || self.market_data.current_price.is_empty()
    }

    fn inspect(&self, config: &ValidatorConfig, issues: &mut Vec<ValidationIssue>) {
        check_source(&self.source, issues);
        for (currency, price) in &self.market_data.current_price {
            check_price(&format!("price ({})", currency), *price, config, issues);
        }
        check_map("market cap", &self.market_data.market_cap, config, issues);
        check_map("volume", &self.market_data.total_volume, config, issues);
    }

    fn label(&self) -> String {
        format!("detail '{}'", self.id)
    }
}

impl Payload for HistoricalSeries {
    fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    fn inspect(&self, config: &ValidatorConfig, issues: &mut Vec<ValidationIssue>) {
        check_source(&self.source, issues);
        if !self.is_strictly_ascending() {
            issues.push(ValidationIssue::hard("Timestamps are not strictly ascending"));
        }
        if let Some(negative) = self
            .prices
            .iter()
            .find(|p| config.reject_negative_values && p.value < Decimal::ZERO)
        {
            issues.push(ValidationIssue::hard(format!(
                "Negative price {} at {}",
                negative.value, negative.timestamp
            )));
        }
    }

    fn label(&self) -> String {
        format!("series '{}' ({} days)", self.id, self.days)
    }
}

impl Payload for GlobalSnapshot {
    fn is_empty(&self) -> bool {
        self.active_cryptocurrencies == 0 && self.total_market_cap.is_empty()
    }

    fn inspect(&self, config: &ValidatorConfig, issues: &mut Vec<ValidationIssue>) {
        check_source(&self.source, issues);
        check_map("total market cap", &self.total_market_cap, config, issues);
        check_map("total volume", &self.total_volume, config, issues);
        if self.total_market_cap.is_empty() {
            issues.push(ValidationIssue::soft("No market cap totals"));
        }
    }

    fn label(&self) -> String {
        format!("global snapshot from {}", self.source)
    }
}

/// Validates provider payloads.
pub struct PayloadValidator {
    config: ValidatorConfig,
}

impl PayloadValidator {
    pub fn new() -> Self {
        Self::with_config(ValidatorConfig::default())
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Returns Ok(()) if the payload is acceptable.
    /// Soft issues are logged but do not cause rejection.
    pub fn validate<P: Payload + ?Sized>(&self, payload: &P) -> Result<(), MarketDataError> {
        let mut issues = Vec::new();
        payload.inspect(&self.config, &mut issues);

        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();
        if !errors.is_empty() {
            return Err(MarketDataError::ValidationFailed {
                message: errors.join("; "),
            });
        }

        for issue in issues.iter().filter(|i| i.severity == ValidationSeverity::Soft) {
            warn!("Validation warning for {}: {}", payload.label(), issue.message);
        }
        Ok(())
    }

    /// Keep the items that pass validation, logging the ones dropped.
    pub fn retain_valid(&self, items: Vec<MarketItem>) -> Vec<MarketItem> {
        items
            .into_iter()
            .filter(|item| match self.validate(item) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Dropping {} from {}: {}", item.label(), item.source, e);
                    false
                }
            })
            .collect()
    }
}

impl Default for PayloadValidator {
    fn default() -> Self {
        Self::new()
    }
}
