// Currency conversion
//
// Trades accrue profit in the instrument's quote currency, while the account
// reports in its own currency. Rates come from a collaborator; we only define
// the trait it implements plus an in-memory source for tests and simulations.
// A missing rate never panics: the converter falls back to the last rate it
// saw, and reports an error only if it has never seen one.

use crate::types::Quote;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Anything that can quote an exchange rate. `rate(from, to)` returns how many
/// units of `to` one unit of `from` buys.
pub trait RateSource: Send + Sync {
    fn rate(&self, from: &str, to: &str) -> Option<Decimal>;
}

/// Thread-safe rate table. Inverse pairs are answered from the direct quote.
#[derive(Debug, Default)]
pub struct FixedRates {
    rates: RwLock<HashMap<(String, String), Decimal>>,
}

impl FixedRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(self, from: &str, to: &str, rate: Decimal) -> Self {
        self.set_rate(from, to, rate);
        self
    }

    pub fn set_rate(&self, from: &str, to: &str, rate: Decimal) {
        self.rates
            .write()
            .insert((from.to_string(), to.to_string()), rate);
    }

    pub fn remove_rate(&self, from: &str, to: &str) -> Option<Decimal> {
        self.rates
            .write()
            .remove(&(from.to_string(), to.to_string()))
    }
}

impl RateSource for FixedRates {
    fn rate(&self, from: &str, to: &str) -> Option<Decimal> {
        let rates = self.rates.read();
        if let Some(rate) = rates.get(&(from.to_string(), to.to_string())) {
            return Some(*rate);
        }
        rates
            .get(&(to.to_string(), from.to_string()))
            .filter(|rate| !rate.is_zero())
            .map(|rate| Decimal::ONE / *rate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("No rate available for {from}/{to}")]
    RateUnavailable { from: String, to: String },

    #[error("Converting {amount} at {rate} overflows")]
    Overflow { amount: Decimal, rate: Decimal },
}

/// Result of a successful conversion. `stale` is set when the last-known rate
/// was used because the source had nothing fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub amount: Quote,
    pub stale: bool,
}

/// Converts one instrument's quote currency into the account currency.
pub struct CurrencyConverter {
    quote_currency: String,
    account_currency: String,
    source: Arc<dyn RateSource>,
    last_rate: RwLock<Option<Decimal>>,
}

impl std::fmt::Debug for CurrencyConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrencyConverter")
            .field("quote_currency", &self.quote_currency)
            .field("account_currency", &self.account_currency)
            .field("last_rate", &*self.last_rate.read())
            .finish()
    }
}

impl CurrencyConverter {
    pub fn new(quote_currency: &str, account_currency: &str, source: Arc<dyn RateSource>) -> Self {
        Self {
            quote_currency: quote_currency.to_string(),
            account_currency: account_currency.to_string(),
            source,
            last_rate: RwLock::new(None),
        }
    }

    pub fn quote_currency(&self) -> &str {
        &self.quote_currency
    }

    pub fn account_currency(&self) -> &str {
        &self.account_currency
    }

    pub fn is_identity(&self) -> bool {
        self.quote_currency == self.account_currency
    }

    pub fn last_rate(&self) -> Option<Decimal> {
        if self.is_identity() {
            return Some(Decimal::ONE);
        }
        *self.last_rate.read()
    }

    pub fn convert(&self, amount: Quote) -> Result<Conversion, ConversionError> {
        if self.is_identity() {
            return Ok(Conversion {
                amount,
                stale: false,
            });
        }

        if let Some(rate) = self
            .source
            .rate(&self.quote_currency, &self.account_currency)
        {
            *self.last_rate.write() = Some(rate);
            return Ok(Conversion {
                amount: apply_rate(amount, rate)?,
                stale: false,
            });
        }

        match *self.last_rate.read() {
            Some(rate) => {
                debug!(
                    from = %self.quote_currency,
                    to = %self.account_currency,
                    %rate,
                    "rate missing, using last known"
                );
                Ok(Conversion {
                    amount: apply_rate(amount, rate)?,
                    stale: true,
                })
            }
            None => Err(ConversionError::RateUnavailable {
                from: self.quote_currency.clone(),
                to: self.account_currency.clone(),
            }),
        }
    }
}

fn apply_rate(amount: Quote, rate: Decimal) -> Result<Quote, ConversionError> {
    amount
        .checked_mul(rate)
        .ok_or(ConversionError::Overflow { amount: amount.value(), rate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn identity_needs_no_rate() {
        let converter = CurrencyConverter::new("USD", "USD", Arc::new(FixedRates::new()));
        let out = converter.convert(Quote::new(dec!(4))).unwrap();
        assert_eq!(out.amount.value(), dec!(4));
        assert!(!out.stale);
        assert_eq!(converter.last_rate(), Some(Decimal::ONE));
    }

    #[test]
    fn direct_and_inverse_rates() {
        let rates = FixedRates::new().with_rate("EUR", "USD", dec!(1.25));
        assert_eq!(rates.rate("EUR", "USD"), Some(dec!(1.25)));
        assert_eq!(rates.rate("USD", "EUR"), Some(dec!(0.8)));
        assert_eq!(rates.rate("GBP", "USD"), None);
    }

    #[test]
    fn converts_with_fresh_rate() {
        let rates = Arc::new(FixedRates::new().with_rate("JPY", "USD", dec!(0.01)));
        let converter = CurrencyConverter::new("JPY", "USD", rates);

        let out = converter.convert(Quote::new(dec!(500))).unwrap();
        assert_eq!(out.amount.value(), dec!(5));
        assert!(!out.stale);
    }

    #[test]
    fn falls_back_to_last_known_rate() {
        let rates = Arc::new(FixedRates::new().with_rate("JPY", "USD", dec!(0.01)));
        let converter = CurrencyConverter::new("JPY", "USD", rates.clone());
        converter.convert(Quote::new(dec!(100))).unwrap();

        rates.remove_rate("JPY", "USD");
        let out = converter.convert(Quote::new(dec!(200))).unwrap();
        assert_eq!(out.amount.value(), dec!(2));
        assert!(out.stale);
    }

    #[test]
    fn missing_rate_without_history_is_an_error() {
        let converter = CurrencyConverter::new("CHF", "USD", Arc::new(FixedRates::new()));
        let result = converter.convert(Quote::new(dec!(10)));
        assert!(matches!(result, Err(ConversionError::RateUnavailable { .. })));
        assert_eq!(converter.last_rate(), None);
    }

    #[test]
    fn overflowing_amount_is_an_error() {
        let rates = Arc::new(FixedRates::new().with_rate("JPY", "USD", dec!(100)));
        let converter = CurrencyConverter::new("JPY", "USD", rates);
        let result = converter.convert(Quote::new(Decimal::MAX));
        assert!(matches!(result, Err(ConversionError::Overflow { .. })));
    }
}
