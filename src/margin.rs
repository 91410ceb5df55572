//! Margin requirements and hedge netting.
//!
//! Each trade reserves notional divided by leverage, valued at its close-side
//! live price. An instrument then combines the long and short totals according
//! to the broker's hedge policy:
//!
//! * `NoHedge`: both sides pay in full.
//! * `FullHedge`: opposite exposure offsets completely.
//! * `HalfHedge`: only the larger side pays.

use crate::instrument::InstrumentError;
use crate::types::{Leverage, Price, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hedge {
    FullHedge,
    NoHedge,
    HalfHedge,
}

impl Hedge {
    pub const ALL: [Hedge; 3] = [Hedge::FullHedge, Hedge::NoHedge, Hedge::HalfHedge];

    pub fn combine(&self, long_margin: Quote, short_margin: Quote) -> Quote {
        match self {
            Hedge::NoHedge => long_margin.add(short_margin),
            Hedge::FullHedge => long_margin.sub(short_margin).abs(),
            Hedge::HalfHedge => long_margin.max(short_margin),
        }
    }
}

impl fmt::Display for Hedge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hedge::FullHedge => "FullHedge",
            Hedge::NoHedge => "NoHedge",
            Hedge::HalfHedge => "HalfHedge",
        };
        f.write_str(name)
    }
}

impl FromStr for Hedge {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FullHedge" => Ok(Hedge::FullHedge),
            "NoHedge" => Ok(Hedge::NoHedge),
            "HalfHedge" => Ok(Hedge::HalfHedge),
            other => Err(InstrumentError::UnknownHedge(other.to_string())),
        }
    }
}

// broker feeds encode the policy as 0/1/2
impl TryFrom<u8> for Hedge {
    type Error = InstrumentError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Hedge::FullHedge),
            1 => Ok(Hedge::NoHedge),
            2 => Ok(Hedge::HalfHedge),
            other => Err(InstrumentError::UnknownHedge(other.to_string())),
        }
    }
}

/// `None` when units * price overflows.
pub fn notional_value(units: Decimal, price: Price) -> Option<Quote> {
    units.abs().checked_mul(price.value()).map(Quote::new)
}

/// notional / leverage, in the instrument's quote currency
pub fn required_margin(units: Decimal, price: Price, leverage: Leverage) -> Option<Quote> {
    notional_value(units, price)?.checked_mul(leverage.margin_fraction())
}
