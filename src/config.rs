// 7.0 config.rs: static description of an instrument. loading it from disk is the
// caller's business; we only deserialize and validate.

use crate::instrument::InstrumentError;
use crate::margin::Hedge;
use crate::types::Leverage;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    // Symbol, e.g. "EUR/USD"
    pub name: String,
    // What is being traded
    pub base_currency: String,
    // What prices and pnl are expressed in
    pub quote_currency: String,
    // What the account reports in. pnl and margin are converted to this
    pub account_currency: String,
    // Broker leverage, shared by every trade on the instrument
    pub leverage: Decimal,
    // How long and short margin are netted
    pub hedge: Hedge,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self::eur_usd()
    }
}

impl InstrumentConfig {
    pub fn eur_usd() -> Self {
        Self {
            name: "EUR/USD".to_string(),
            base_currency: "EUR".to_string(),
            quote_currency: "USD".to_string(),
            account_currency: "USD".to_string(),
            leverage: dec!(50),
            hedge: Hedge::NoHedge,
        }
    }

    // quote currency differs from the account, so pnl needs a JPY→USD rate
    pub fn usd_jpy() -> Self {
        Self {
            name: "USD/JPY".to_string(),
            base_currency: "USD".to_string(),
            quote_currency: "JPY".to_string(),
            account_currency: "USD".to_string(),
            leverage: dec!(30),
            hedge: Hedge::FullHedge,
        }
    }

    pub fn validate(&self) -> Result<Leverage, InstrumentError> {
        for (field, value) in [
            ("name", &self.name),
            ("base_currency", &self.base_currency),
            ("quote_currency", &self.quote_currency),
            ("account_currency", &self.account_currency),
        ] {
            if value.trim().is_empty() {
                return Err(InstrumentError::InvalidConfig(format!("{field} is empty")));
            }
        }
        Leverage::new(self.leverage).ok_or(InstrumentError::InvalidLeverage(self.leverage))
    }
}
