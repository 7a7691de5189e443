use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Provider-native asset identifier (e.g. "bitcoin")
pub type AssetId = String;

/// Quote currency code, lower-cased (e.g. "usd")
pub type Currency = String;

/// Lower-cases a currency code the way every record stores it.
pub fn normalize_currency(currency: &str) -> Currency {
    currency.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency("USD"), "usd");
        assert_eq!(normalize_currency(" Eur "), "eur");
    }
}
