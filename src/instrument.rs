//! Instrument: top-level aggregate for one tradable symbol.
//!
//! Owns the live bid/ask and leverage cells, the trade registry and its
//! time-ordered index, and both positions. Price ticks only store prices;
//! callers decide when to pay for a recompute, which lets a feed batch several
//! ticks before anyone reads the figures.

use crate::config::InstrumentConfig;
use crate::conversion::{CurrencyConverter, RateSource};
use crate::live::{LiveValue, Tick};
use crate::margin::Hedge;
use crate::position::Position;
use crate::time_order::{TimeOrderedTrades, TradeIds};
use crate::trade::Trade;
use crate::types::{Leverage, Price, Quote, Side, Timestamp, TradeId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstrumentError {
    #[error("Trade {0} is already open")]
    DuplicateTrade(TradeId),

    #[error("Trade units must be positive, got {0}")]
    InvalidUnits(Decimal),

    #[error("Leverage must be at least 1x, got {0}")]
    InvalidLeverage(Decimal),

    #[error("Unknown hedge policy: {0}")]
    UnknownHedge(String),

    #[error("Invalid instrument config: {0}")]
    InvalidConfig(String),
}

/// Instrument-level aggregates as of the last recompute, in account currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstrumentFigures {
    pub unrealized_net_profit: Quote,
    /// net profit + charged fees
    pub unrealized_effective_profit: Quote,
    pub charged_fees: Quote,
    pub margin_used: Quote,
}

#[derive(Debug)]
pub struct Instrument {
    name: String,
    base_currency: String,
    quote_currency: String,
    hedge: Hedge,
    leverage: LiveValue,
    ask: LiveValue,
    bid: LiveValue,
    trades: DashMap<TradeId, Arc<Trade>>,
    time_order: TimeOrderedTrades,
    long_position: Position,
    short_position: Position,
    conversion: Arc<CurrencyConverter>,
    figures: RwLock<InstrumentFigures>,
}

impl Instrument {
    pub fn new(
        config: InstrumentConfig,
        rates: Arc<dyn RateSource>,
    ) -> Result<Self, InstrumentError> {
        let leverage = config.validate()?;
        let conversion = Arc::new(CurrencyConverter::new(
            &config.quote_currency,
            &config.account_currency,
            rates,
        ));

        Ok(Self {
            name: config.name,
            base_currency: config.base_currency,
            quote_currency: config.quote_currency,
            hedge: config.hedge,
            leverage: LiveValue::new(leverage.value()),
            ask: LiveValue::default(),
            bid: LiveValue::default(),
            trades: DashMap::new(),
            time_order: TimeOrderedTrades::new(),
            long_position: Position::new(Side::Long),
            short_position: Position::new(Side::Short),
            conversion,
            figures: RwLock::new(InstrumentFigures::default()),
        })
    }

    /// Shorts are valued at the ask (the buy-back price), longs at the bid.
    pub fn open_trade(
        &self,
        id: impl Into<TradeId>,
        side: Side,
        open_time: Timestamp,
        units: Decimal,
        open_price: Price,
    ) -> Result<Arc<Trade>, InstrumentError> {
        let id = id.into();
        if units <= Decimal::ZERO {
            return Err(InstrumentError::InvalidUnits(units));
        }

        let price_cell = match side {
            Side::Long => &self.bid,
            Side::Short => &self.ask,
        };

        // shard lock is held until the index and position are updated, so a
        // concurrent close of the same id sees all three or none
        match self.trades.entry(id.clone()) {
            Entry::Occupied(_) => {
                warn!(instrument = %self.name, trade = %id, "rejecting duplicate trade id");
                Err(InstrumentError::DuplicateTrade(id))
            }
            Entry::Vacant(slot) => {
                let trade = Arc::new(Trade::new(
                    id.clone(),
                    &self.name,
                    side,
                    units,
                    open_time,
                    open_price,
                    price_cell.watch(),
                    self.leverage.watch(),
                    Arc::clone(&self.conversion),
                ));

                self.time_order.append(id.clone());
                self.position(side).open_trade(Arc::clone(&trade));
                slot.insert(Arc::clone(&trade));

                debug!(
                    instrument = %self.name,
                    trade = %id,
                    %side,
                    %units,
                    price = %open_price,
                    "trade opened"
                );
                Ok(trade)
            }
        }
    }

    /// Unknown ids are logged and ignored.
    pub fn close_trade(&self, id: &TradeId) -> Option<Arc<Trade>> {
        let Some((_, trade)) = self.trades.remove(id) else {
            warn!(instrument = %self.name, trade = %id, "trying to close unexisting trade");
            return None;
        };
        self.time_order.delete(id);

        let closed = self.position(trade.side()).close_trade(id);
        debug_assert!(closed.is_some(), "registry and position out of sync");

        debug!(instrument = %self.name, trade = %id, side = %trade.side(), "trade closed");
        Some(trade)
    }

    pub fn calculate_unrealized(&self) -> InstrumentFigures {
        let mut figures = self.figures.write();

        let short = self.short_position.calculate_unrealized();
        let long = self.long_position.calculate_unrealized();

        figures.unrealized_net_profit = long.unrealized_net_profit.add(short.unrealized_net_profit);
        figures.unrealized_effective_profit = long
            .unrealized_effective_profit
            .add(short.unrealized_effective_profit);
        figures.charged_fees = long.charged_fees.add(short.charged_fees);

        *figures
    }

    pub fn calculate_margin_used(&self) -> Quote {
        let mut figures = self.figures.write();

        let short = self.short_position.calculate_margin_used();
        let long = self.long_position.calculate_margin_used();

        figures.margin_used = self.hedge.combine(long, short);
        figures.margin_used
    }

    pub fn recalculate(&self) -> InstrumentFigures {
        self.calculate_unrealized();
        self.calculate_margin_used();
        self.figures()
    }

    /// Stores the new prices. Does not recompute.
    pub fn update_price(&self, tick: &Tick) {
        self.ask.store(tick.ask.value());
        self.bid.store(tick.bid.value());
    }

    /// Every open trade sees the new leverage on its next margin computation.
    pub fn set_leverage(&self, leverage: Leverage) {
        self.leverage.store(leverage.value());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn quote_currency(&self) -> &str {
        &self.quote_currency
    }

    pub fn account_currency(&self) -> &str {
        self.conversion.account_currency()
    }

    pub fn hedge(&self) -> Hedge {
        self.hedge
    }

    pub fn leverage(&self) -> Decimal {
        self.leverage.load()
    }

    pub fn long_position(&self) -> &Position {
        &self.long_position
    }

    pub fn short_position(&self) -> &Position {
        &self.short_position
    }

    pub fn position(&self, side: Side) -> &Position {
        match side {
            Side::Long => &self.long_position,
            Side::Short => &self.short_position,
        }
    }

    pub fn trade(&self, id: &TradeId) -> Option<Arc<Trade>> {
        self.trades.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// All open trades, in no particular order.
    pub fn trades(&self) -> Vec<Arc<Trade>> {
        self.trades
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// Id of the `index`-th oldest open trade.
    pub fn trade_by_order(&self, index: usize) -> Option<TradeId> {
        self.time_order.get(index)
    }

    pub fn trades_by_ascending_order(&self, count: usize) -> TradeIds {
        self.time_order.ascending(count)
    }

    pub fn trades_by_descending_order(&self, count: usize) -> TradeIds {
        self.time_order.descending(count)
    }

    /// Ids in open order. Used to check registry/index parity.
    pub fn ordered_trade_ids(&self) -> Vec<TradeId> {
        self.time_order.to_vec()
    }

    pub fn figures(&self) -> InstrumentFigures {
        *self.figures.read()
    }

    pub fn unrealized_net_profit(&self) -> Quote {
        self.figures.read().unrealized_net_profit
    }

    pub fn unrealized_effective_profit(&self) -> Quote {
        self.figures.read().unrealized_effective_profit
    }

    pub fn margin_used(&self) -> Quote {
        self.figures.read().margin_used
    }

    pub fn charged_fees(&self) -> Quote {
        self.figures.read().charged_fees
    }

    /// `None` until the first tick.
    pub fn ask(&self) -> Option<Price> {
        Price::new(self.ask.load())
    }

    pub fn bid(&self) -> Option<Price> {
        Price::new(self.bid.load())
    }
}
