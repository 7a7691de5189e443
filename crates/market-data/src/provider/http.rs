//! HTTP plumbing shared by the provider clients.

use std::time::Duration;

use log::debug;
use num_traits::FromPrimitive;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;

use crate::errors::MarketDataError;

/// Upstream request timeout.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "Mozilla/5.0 (compatible; cryptofolio/0.4)";

pub(crate) fn build_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// GET `url` and return the body, mapping transport and status failures to
/// the provider error taxonomy.
pub(crate) async fn get_text(
    client: &Client,
    provider: &str,
    url: &str,
    params: &[(&str, String)],
) -> Result<String, MarketDataError> {
    debug!("{} request: {} with {} params", provider, url, params.len());

    let response = client.get(url).query(params).send().await.map_err(|e| {
        if e.is_timeout() {
            MarketDataError::Timeout {
                provider: provider.to_string(),
            }
        } else {
            MarketDataError::Unreachable {
                provider: provider.to_string(),
                message: format!("Request failed: {}", e),
            }
        }
    })?;

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(MarketDataError::RateLimited {
            provider: provider.to_string(),
        });
    }

    if !status.is_success() {
        return Err(MarketDataError::BadStatus {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| MarketDataError::Unreachable {
        provider: provider.to_string(),
        message: format!("Failed to read response body: {}", e),
    })
}

/// Convert an upstream float into a `Decimal`, dropping NaN and infinities.
pub(crate) fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.normalize())
}

pub(crate) fn opt_decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(to_decimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_decimal() {
        assert_eq!(to_decimal(1.5), Some(dec!(1.5)));
        assert_eq!(to_decimal(f64::NAN), None);
        assert_eq!(opt_decimal(None), None);
    }
}
