//! Live market cells shared between an instrument and its trades.
//!
//! The instrument owns one [`LiveValue`] per bid, ask and leverage. Trades
//! never copy these values: they hold a [`LiveView`], a weak handle that
//! always reads whatever the feed stored last. Each cell is individually
//! atomic; nothing ties the bid and ask of one tick together, so a reader may
//! see the ask of tick N next to the bid of tick N+1.

use crate::types::Price;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Owning side of a shared scalar. Zero means nothing was published yet.
#[derive(Debug, Clone, Default)]
pub struct LiveValue(Arc<RwLock<Decimal>>);

impl LiveValue {
    pub fn new(value: Decimal) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn load(&self) -> Decimal {
        *self.0.read()
    }

    pub fn store(&self, value: Decimal) {
        *self.0.write() = value;
    }

    /// Non-owning handle for observers.
    pub fn watch(&self) -> LiveView {
        LiveView(Arc::downgrade(&self.0))
    }
}

/// Observation handle on a [`LiveValue`]. Returns `None` once the owner is gone.
#[derive(Debug, Clone)]
pub struct LiveView(Weak<RwLock<Decimal>>);

impl LiveView {
    pub fn load(&self) -> Option<Decimal> {
        self.0.upgrade().map(|cell| *cell.read())
    }
}

// 9.0: one quote from the price feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub ask: Price,
    pub bid: Price,
}

impl Tick {
    /// Both sides must be strictly positive. A crossed book (bid > ask) is
    /// accepted as-is; the feed is trusted on ordering.
    #[must_use]
    pub fn new(ask: Decimal, bid: Decimal) -> Option<Self> {
        Some(Self {
            ask: Price::new(ask)?,
            bid: Price::new(bid)?,
        })
    }

    pub fn spread(&self) -> Decimal {
        self.ask.value() - self.bid.value()
    }

    pub fn mid(&self) -> Decimal {
        (self.ask.value() + self.bid.value()) / Decimal::TWO
    }
}
