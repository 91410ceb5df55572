// 4.0: a single open lot. side, units, open price and open time are fixed at construction.
// only the fees charged and the cached valuation change afterwards.
// gross pnl: long = (bid - open) * units, short = (open - ask) * units.

use crate::conversion::{ConversionError, CurrencyConverter};
use crate::live::LiveView;
use crate::margin::required_margin;
use crate::types::{Leverage, Price, Quote, Side, Timestamp, TradeId};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValuationError {
    #[error("No live price published for {0}")]
    NoPrice(String),

    #[error("Instrument {0} no longer exists")]
    InstrumentGone(String),

    #[error("Value of trade {0} overflows")]
    Overflow(TradeId),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),
}

/// Mark-to-market of one trade, in account currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TradeValuation {
    /// effective profit minus charged fees
    pub net_profit: Quote,
    /// price move only
    pub effective_profit: Quote,
    pub charged_fees: Quote,
    /// valued with a last-known conversion rate
    pub stale: bool,
}

#[derive(Debug, Default)]
struct TradeState {
    charged_fees: Quote,
    valuation: Option<TradeValuation>,
    margin: Option<Quote>,
}

#[derive(Debug)]
pub struct Trade {
    id: TradeId,
    instrument: String,
    side: Side,
    units: Decimal,
    open_time: Timestamp,
    open_price: Price,
    current_price: LiveView,
    leverage: LiveView,
    conversion: Arc<CurrencyConverter>,
    state: RwLock<TradeState>,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: TradeId,
        instrument: &str,
        side: Side,
        units: Decimal,
        open_time: Timestamp,
        open_price: Price,
        current_price: LiveView,
        leverage: LiveView,
        conversion: Arc<CurrencyConverter>,
    ) -> Self {
        Self {
            id,
            instrument: instrument.to_string(),
            side,
            units,
            open_time,
            open_price,
            current_price,
            leverage,
            conversion,
            state: RwLock::new(TradeState::default()),
        }
    }

    pub fn id(&self) -> &TradeId {
        &self.id
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn units(&self) -> Decimal {
        self.units
    }

    pub fn open_time(&self) -> Timestamp {
        self.open_time
    }

    pub fn open_price(&self) -> Price {
        self.open_price
    }

    /// Live close-side price: bid for longs, ask for shorts.
    pub fn current_price(&self) -> Result<Price, ValuationError> {
        let raw = self
            .current_price
            .load()
            .ok_or_else(|| ValuationError::InstrumentGone(self.instrument.clone()))?;
        Price::new(raw).ok_or_else(|| ValuationError::NoPrice(self.instrument.clone()))
    }

    pub fn leverage(&self) -> Result<Leverage, ValuationError> {
        self.leverage
            .load()
            .and_then(Leverage::new)
            .ok_or_else(|| ValuationError::InstrumentGone(self.instrument.clone()))
    }

    pub fn charged_fees(&self) -> Quote {
        self.state.read().charged_fees
    }

    /// Accrues a holding cost (financing, commission). Computed by the fee engine.
    pub fn charge_fee(&self, amount: Quote) {
        let mut state = self.state.write();
        state.charged_fees = state.charged_fees.add(amount);
    }

    /// Last valuation produced by [`Trade::calculate_unrealized`].
    pub fn last_valuation(&self) -> Option<TradeValuation> {
        self.state.read().valuation
    }

    /// Last requirement produced by [`Trade::margin_required`].
    pub fn last_margin(&self) -> Option<Quote> {
        self.state.read().margin
    }

    /// Price-move profit in quote currency at the current live price.
    pub fn gross_profit(&self) -> Result<Quote, ValuationError> {
        let current = self.current_price()?.value();
        let open = self.open_price.value();
        let per_unit = match self.side {
            Side::Long => current - open,
            Side::Short => open - current,
        };
        per_unit
            .checked_mul(self.units)
            .map(Quote::new)
            .ok_or_else(|| ValuationError::Overflow(self.id.clone()))
    }

    pub fn calculate_unrealized(&self) -> Result<TradeValuation, ValuationError> {
        let gross = self.gross_profit()?;
        let converted = self.conversion.convert(gross)?;

        let mut state = self.state.write();
        let valuation = TradeValuation {
            net_profit: converted.amount.sub(state.charged_fees),
            effective_profit: converted.amount,
            charged_fees: state.charged_fees,
            stale: converted.stale,
        };
        state.valuation = Some(valuation);
        Ok(valuation)
    }

    /// units * live price / leverage, in account currency.
    pub fn margin_required(&self) -> Result<Quote, ValuationError> {
        let price = self.current_price()?;
        let leverage = self.leverage()?;
        let margin = required_margin(self.units, price, leverage)
            .ok_or_else(|| ValuationError::Overflow(self.id.clone()))?;
        let converted = self.conversion.convert(margin)?.amount;
        self.state.write().margin = Some(converted);
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::FixedRates;
    use crate::live::LiveValue;
    use rust_decimal_macros::dec;

    struct Cells {
        bid: LiveValue,
        ask: LiveValue,
        leverage: LiveValue,
    }

    fn cells() -> Cells {
        Cells {
            bid: LiveValue::new(dec!(1.1040)),
            ask: LiveValue::new(dec!(1.1050)),
            leverage: LiveValue::new(dec!(50)),
        }
    }

    fn usd_converter() -> Arc<CurrencyConverter> {
        Arc::new(CurrencyConverter::new("USD", "USD", Arc::new(FixedRates::new())))
    }

    fn trade(cells: &Cells, side: Side, units: Decimal) -> Trade {
        let price_cell = match side {
            Side::Long => &cells.bid,
            Side::Short => &cells.ask,
        };
        Trade::new(
            TradeId::from("t1"),
            "EUR/USD",
            side,
            units,
            Timestamp::from_millis(0),
            Price::new_unchecked(dec!(1.1000)),
            price_cell.watch(),
            cells.leverage.watch(),
            usd_converter(),
        )
    }

    #[test]
    fn long_valued_at_bid() {
        let cells = cells();
        let trade = trade(&cells, Side::Long, dec!(1000));

        let valuation = trade.calculate_unrealized().unwrap();
        // (1.1040 - 1.1000) * 1000
        assert_eq!(valuation.effective_profit.value(), dec!(4.0));
        assert_eq!(valuation.net_profit.value(), dec!(4.0));
        assert_eq!(trade.last_valuation(), Some(valuation));
    }

    #[test]
    fn short_valued_at_ask() {
        let cells = cells();
        let trade = trade(&cells, Side::Short, dec!(1000));

        let valuation = trade.calculate_unrealized().unwrap();
        // (1.1000 - 1.1050) * 1000
        assert_eq!(valuation.effective_profit.value(), dec!(-5.0));
    }

    #[test]
    fn fees_reduce_net_but_not_effective() {
        let cells = cells();
        let trade = trade(&cells, Side::Long, dec!(1000));
        trade.charge_fee(Quote::new(dec!(0.5)));
        trade.charge_fee(Quote::new(dec!(0.25)));

        let valuation = trade.calculate_unrealized().unwrap();
        assert_eq!(valuation.charged_fees.value(), dec!(0.75));
        assert_eq!(valuation.effective_profit.value(), dec!(4.0));
        assert_eq!(valuation.net_profit.value(), dec!(3.25));
    }

    #[test]
    fn tracks_live_price_without_copying() {
        let cells = cells();
        let trade = trade(&cells, Side::Long, dec!(1000));

        cells.bid.store(dec!(1.0990));
        let valuation = trade.calculate_unrealized().unwrap();
        assert_eq!(valuation.effective_profit.value(), dec!(-1.0));
    }

    #[test]
    fn margin_follows_leverage_cell() {
        let cells = cells();
        let trade = trade(&cells, Side::Long, dec!(1000));

        // 1000 * 1.1040 / 50
        assert_eq!(trade.margin_required().unwrap().value(), dec!(22.08));

        cells.leverage.store(dec!(100));
        assert_eq!(trade.margin_required().unwrap().value(), dec!(11.04));
        assert_eq!(trade.last_margin().unwrap().value(), dec!(11.04));
    }

    #[test]
    fn huge_trade_overflows_instead_of_panicking() {
        let cells = cells();
        cells.bid.store(dec!(3.1));
        let trade = trade(&cells, Side::Long, Decimal::MAX);

        assert!(matches!(
            trade.calculate_unrealized(),
            Err(ValuationError::Overflow(_))
        ));
        assert!(matches!(
            trade.margin_required(),
            Err(ValuationError::Overflow(_))
        ));
        assert!(trade.last_valuation().is_none());
        assert!(trade.last_margin().is_none());
    }

    #[test]
    fn no_price_before_first_tick() {
        let cells = cells();
        cells.bid.store(Decimal::ZERO);
        let trade = trade(&cells, Side::Long, dec!(1000));

        assert!(matches!(
            trade.calculate_unrealized(),
            Err(ValuationError::NoPrice(_))
        ));
        assert!(trade.last_valuation().is_none());
    }

    #[test]
    fn dropped_instrument_is_reported() {
        let cells = cells();
        let trade = trade(&cells, Side::Short, dec!(10));
        drop(cells);

        assert!(matches!(
            trade.margin_required(),
            Err(ValuationError::InstrumentGone(_))
        ));
    }
}
