//! Currency and amount value types

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Currency metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub decimals: u8,
    pub kind: CurrencyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

/// Look up currency metadata from the static supported set
///
/// The brokerage only exchanges between these codes; everything else is
/// rejected at config load and ledger parse time.
pub fn currency_info(code: &str) -> Option<CurrencyInfo> {
    let info = match code {
        "USD" => CurrencyInfo { code: "USD", decimals: 2, kind: CurrencyKind::Fiat },
        "EUR" => CurrencyInfo { code: "EUR", decimals: 2, kind: CurrencyKind::Fiat },
        "GBP" => CurrencyInfo { code: "GBP", decimals: 2, kind: CurrencyKind::Fiat },
        "CHF" => CurrencyInfo { code: "CHF", decimals: 2, kind: CurrencyKind::Fiat },
        "PLN" => CurrencyInfo { code: "PLN", decimals: 2, kind: CurrencyKind::Fiat },
        "BTC" => CurrencyInfo { code: "BTC", decimals: 8, kind: CurrencyKind::Crypto },
        "ETH" => CurrencyInfo { code: "ETH", decimals: 8, kind: CurrencyKind::Crypto },
        "LTC" => CurrencyInfo { code: "LTC", decimals: 8, kind: CurrencyKind::Crypto },
        "XRP" => CurrencyInfo { code: "XRP", decimals: 6, kind: CurrencyKind::Crypto },
        "BCH" => CurrencyInfo { code: "BCH", decimals: 8, kind: CurrencyKind::Crypto },
        _ => return None,
    };

    Some(info)
}

/// A supported currency code
///
/// Always holds one of the codes known to [`currency_info`]; parsing an
/// unknown code fails, so downstream code never sees an unsupported
/// currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct Currency(&'static str);

// Deserialize is implemented by hand rather than via `#[serde(try_from =
// "String")]`: the derive leaks a `'de: 'static` bound from the inner
// `&'static str` field, which then forces every container holding a
// `Currency` to require `'de: 'static`. Delegating through `String` here is
// exactly what the `try_from` attribute expands to, minus that spurious bound.
impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Currency::try_from(s).map_err(serde::de::Error::custom)
    }
}

impl Currency {
    pub fn code(&self) -> &'static str {
        self.0
    }

    pub fn info(&self) -> CurrencyInfo {
        // Construction guarantees membership in the table
        currency_info(self.0).unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency code: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match currency_info(s) {
            Some(info) => Ok(Currency(info.code)),
            None => Err(UnknownCurrency(s.to_string())),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = UnknownCurrency;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> String {
        c.0.to_string()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A quantity of one currency
///
/// Values are exact decimals so margin targets survive thousands of
/// poll iterations without drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: Decimal,
    pub currency: Currency,
}

impl Amount {
    /// Create an amount, rejecting negative values
    ///
    /// Held balances and quoted prices are never negative in this
    /// system.
    pub fn new(value: Decimal, currency: Currency) -> anyhow::Result<Self> {
        if value < Decimal::ZERO {
            return Err(anyhow::anyhow!("amount cannot be negative: {}", value));
        }
        Ok(Self { value, currency })
    }

    /// Apply a percent margin: `value * (1 + percent/100)`
    ///
    /// Negative percents shrink the result. `with_margin(0)` returns an
    /// equal amount exactly.
    pub fn with_margin(&self, percent: Decimal) -> Amount {
        let factor = Decimal::ONE + percent / Decimal::ONE_HUNDRED;
        Amount {
            value: self.value * factor,
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}
