// 6.0: one side of an instrument. holds every open trade on that side and the
// figures derived from them at the last recompute.
// 6.1 has the recompute loops, 6.2 the close bookkeeping.

use crate::trade::{Trade, TradeValuation, ValuationError};
use crate::types::{Quote, Side, TradeId};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Snapshot of a position's figures, all in account currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PositionFigures {
    pub unrealized_net_profit: Quote,
    pub unrealized_effective_profit: Quote,
    pub charged_fees: Quote,
    pub margin_used: Quote,
    pub realized_net_profit: Quote,
    pub realized_fees: Quote,
    pub closed_trades: u64,
    /// trades whose contribution could not be computed at the last recompute
    pub unvalued_trades: usize,
    /// trades whose margin could not be computed at the last margin recompute
    pub unvalued_margins: usize,
}

#[derive(Debug)]
pub struct Position {
    side: Side,
    trades: DashMap<TradeId, Arc<Trade>>,
    figures: RwLock<PositionFigures>,
}

impl Position {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            trades: DashMap::new(),
            figures: RwLock::new(PositionFigures::default()),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn contains(&self, id: &TradeId) -> bool {
        self.trades.contains_key(id)
    }

    pub fn trade(&self, id: &TradeId) -> Option<Arc<Trade>> {
        self.trades.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn trades(&self) -> Vec<Arc<Trade>> {
        self.trades
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn open_trade(&self, trade: Arc<Trade>) {
        debug_assert_eq!(trade.side(), self.side, "trade filed under the wrong side");
        self.trades.insert(trade.id().clone(), trade);
    }

    // 6.2: pulls the trade out of the working set and books its final contribution
    // at the current live price. settlement proper belongs to the execution engine.
    pub fn close_trade(&self, id: &TradeId) -> Option<Arc<Trade>> {
        let (_, trade) = self.trades.remove(id)?;

        let realized = match trade.calculate_unrealized() {
            Ok(valuation) => valuation,
            Err(err) => {
                warn!(
                    trade = %id,
                    side = %self.side,
                    error = %err,
                    "closing trade without a fresh valuation"
                );
                fallback_valuation(&trade, &err)
            }
        };

        let mut figures = self.figures.write();
        figures.realized_net_profit = figures.realized_net_profit.add(realized.net_profit);
        figures.realized_fees = figures.realized_fees.add(realized.charged_fees);
        figures.closed_trades += 1;

        Some(trade)
    }

    // 6.1: sum of converted pnl and fees over the open trades.
    pub fn calculate_unrealized(&self) -> PositionFigures {
        let mut net = Quote::zero();
        let mut effective = Quote::zero();
        let mut fees = Quote::zero();
        let mut unvalued = 0;

        for entry in self.trades.iter() {
            let trade = entry.value();
            fees = fees.add(trade.charged_fees());

            match trade.calculate_unrealized() {
                Ok(valuation) => {
                    net = net.add(valuation.net_profit);
                    effective = effective.add(valuation.effective_profit);
                }
                Err(err) => {
                    unvalued += 1;
                    let fallback = fallback_valuation(trade, &err);
                    net = net.add(fallback.net_profit);
                    effective = effective.add(fallback.effective_profit);
                }
            }
        }

        let mut figures = self.figures.write();
        figures.unrealized_net_profit = net;
        figures.unrealized_effective_profit = effective;
        figures.charged_fees = fees;
        figures.unvalued_trades = unvalued;
        *figures
    }

    // a trade whose requirement can't be computed keeps its last known one
    pub fn calculate_margin_used(&self) -> Quote {
        let mut margin = Quote::zero();
        let mut unvalued = 0;

        for entry in self.trades.iter() {
            let trade = entry.value();
            match trade.margin_required() {
                Ok(required) => margin = margin.add(required),
                Err(err) => {
                    unvalued += 1;
                    margin = margin.add(fallback_margin(trade, &err));
                }
            }
        }

        let mut figures = self.figures.write();
        figures.margin_used = margin;
        figures.unvalued_margins = unvalued;
        margin
    }

    pub fn figures(&self) -> PositionFigures {
        *self.figures.read()
    }

    pub fn unrealized_net_profit(&self) -> Quote {
        self.figures.read().unrealized_net_profit
    }

    pub fn unrealized_effective_profit(&self) -> Quote {
        self.figures.read().unrealized_effective_profit
    }

    pub fn charged_fees(&self) -> Quote {
        self.figures.read().charged_fees
    }

    pub fn margin_used(&self) -> Quote {
        self.figures.read().margin_used
    }
}

// last price move, but net against the fees charged so far
fn fallback_valuation(trade: &Trade, err: &ValuationError) -> TradeValuation {
    let effective_profit = match trade.last_valuation() {
        Some(last) => {
            debug!(trade = %trade.id(), error = %err, "using last valuation");
            last.effective_profit
        }
        None => {
            warn!(trade = %trade.id(), error = %err, "trade contribution unknown");
            Quote::zero()
        }
    };
    let charged_fees = trade.charged_fees();

    TradeValuation {
        net_profit: effective_profit.sub(charged_fees),
        effective_profit,
        charged_fees,
        stale: true,
    }
}

fn fallback_margin(trade: &Trade, err: &ValuationError) -> Quote {
    match trade.last_margin() {
        Some(last) => {
            debug!(trade = %trade.id(), error = %err, "using last margin");
            last
        }
        None => {
            warn!(trade = %trade.id(), error = %err, "margin contribution unknown");
            Quote::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{CurrencyConverter, FixedRates};
    use crate::live::LiveValue;
    use crate::types::{Price, Timestamp};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        bid: LiveValue,
        leverage: LiveValue,
        rates: Arc<FixedRates>,
        converter: Arc<CurrencyConverter>,
    }

    fn fixture(quote: &str) -> Fixture {
        let rates = Arc::new(FixedRates::new());
        Fixture {
            bid: LiveValue::new(dec!(1.1040)),
            leverage: LiveValue::new(dec!(50)),
            converter: Arc::new(CurrencyConverter::new(quote, "USD", rates.clone())),
            rates,
        }
    }

    fn long_trade(fx: &Fixture, id: &str, units: Decimal) -> Arc<Trade> {
        Arc::new(Trade::new(
            TradeId::from(id),
            "EUR/USD",
            Side::Long,
            units,
            Timestamp::from_millis(0),
            Price::new_unchecked(dec!(1.1000)),
            fx.bid.watch(),
            fx.leverage.watch(),
            fx.converter.clone(),
        ))
    }

    #[test]
    fn sums_open_trades() {
        let fx = fixture("USD");
        let position = Position::new(Side::Long);
        position.open_trade(long_trade(&fx, "a", dec!(1000)));
        position.open_trade(long_trade(&fx, "b", dec!(500)));
        position.trade(&TradeId::from("b")).unwrap().charge_fee(Quote::new(dec!(0.5)));

        let figures = position.calculate_unrealized();
        // 4.0 + 2.0 gross, 0.5 fees
        assert_eq!(figures.unrealized_effective_profit.value(), dec!(6.0));
        assert_eq!(figures.unrealized_net_profit.value(), dec!(5.5));
        assert_eq!(figures.charged_fees.value(), dec!(0.5));
        assert_eq!(figures.unvalued_trades, 0);
    }

    #[test]
    fn margin_sums_per_trade_requirement() {
        let fx = fixture("USD");
        let position = Position::new(Side::Long);
        position.open_trade(long_trade(&fx, "a", dec!(1000)));
        position.open_trade(long_trade(&fx, "b", dec!(1000)));

        // 2 * 1000 * 1.1040 / 50
        assert_eq!(position.calculate_margin_used().value(), dec!(44.16));
        assert_eq!(position.margin_used().value(), dec!(44.16));
    }

    #[test]
    fn closed_trade_leaves_recompute() {
        let fx = fixture("USD");
        let position = Position::new(Side::Long);
        position.open_trade(long_trade(&fx, "a", dec!(1000)));
        position.open_trade(long_trade(&fx, "b", dec!(1000)));

        let closed = position.close_trade(&TradeId::from("a")).unwrap();
        assert_eq!(closed.id().as_str(), "a");
        assert!(position.close_trade(&TradeId::from("a")).is_none());

        let figures = position.calculate_unrealized();
        assert_eq!(figures.unrealized_effective_profit.value(), dec!(4.0));
        assert_eq!(figures.realized_net_profit.value(), dec!(4.0));
        assert_eq!(figures.closed_trades, 1);
        assert_eq!(position.trade_count(), 1);
    }

    #[test]
    fn missing_rate_counts_as_unvalued() {
        let fx = fixture("EUR");
        let position = Position::new(Side::Long);
        position.open_trade(long_trade(&fx, "a", dec!(1000)));

        let figures = position.calculate_unrealized();
        assert_eq!(figures.unvalued_trades, 1);
        assert!(figures.unrealized_net_profit.is_zero());
        assert!(position.calculate_margin_used().is_zero());
        assert_eq!(position.figures().unvalued_margins, 1);

        fx.rates.set_rate("EUR", "USD", dec!(1.5));
        let figures = position.calculate_unrealized();
        assert_eq!(figures.unvalued_trades, 0);
        assert_eq!(figures.unrealized_effective_profit.value(), dec!(6.0));
    }

    #[test]
    fn unvalued_trade_keeps_last_valuation() {
        let fx = fixture("USD");
        let position = Position::new(Side::Long);
        position.open_trade(long_trade(&fx, "a", dec!(1000)));
        position.calculate_unrealized();

        // feed drops to "no price"
        fx.bid.store(Decimal::ZERO);
        let figures = position.calculate_unrealized();
        assert_eq!(figures.unvalued_trades, 1);
        assert_eq!(figures.unrealized_effective_profit.value(), dec!(4.0));
    }

    #[test]
    fn fees_charged_before_first_price_stay_balanced() {
        let fx = fixture("USD");
        fx.bid.store(Decimal::ZERO);
        let position = Position::new(Side::Long);
        let trade = long_trade(&fx, "a", dec!(1000));
        trade.charge_fee(Quote::new(dec!(0.4)));
        position.open_trade(trade);

        let figures = position.calculate_unrealized();
        assert_eq!(figures.unvalued_trades, 1);
        assert_eq!(figures.charged_fees.value(), dec!(0.4));
        assert_eq!(figures.unrealized_net_profit.value(), dec!(-0.4));
        assert_eq!(
            figures.unrealized_effective_profit,
            figures.unrealized_net_profit.add(figures.charged_fees)
        );
    }

    #[test]
    fn fee_after_last_valuation_is_netted() {
        let fx = fixture("USD");
        let position = Position::new(Side::Long);
        position.open_trade(long_trade(&fx, "a", dec!(1000)));
        position.calculate_unrealized();

        fx.bid.store(Decimal::ZERO);
        position.trade(&TradeId::from("a")).unwrap().charge_fee(Quote::new(dec!(1)));
        let figures = position.calculate_unrealized();
        assert_eq!(figures.unrealized_effective_profit.value(), dec!(4.0));
        assert_eq!(figures.unrealized_net_profit.value(), dec!(3.0));
        assert_eq!(figures.charged_fees.value(), dec!(1));
    }

    #[test]
    fn close_without_price_books_fees_as_loss() {
        let fx = fixture("USD");
        fx.bid.store(Decimal::ZERO);
        let position = Position::new(Side::Long);
        let trade = long_trade(&fx, "a", dec!(1000));
        trade.charge_fee(Quote::new(dec!(0.4)));
        position.open_trade(trade);

        position.close_trade(&TradeId::from("a")).unwrap();
        let figures = position.figures();
        assert_eq!(figures.realized_net_profit.value(), dec!(-0.4));
        assert_eq!(figures.realized_fees.value(), dec!(0.4));
    }

    #[test]
    fn unpriced_margin_keeps_last_requirement() {
        let fx = fixture("USD");
        let position = Position::new(Side::Long);
        position.open_trade(long_trade(&fx, "a", dec!(1000)));
        position.open_trade(long_trade(&fx, "b", dec!(1000)));
        assert_eq!(position.calculate_margin_used().value(), dec!(44.16));
        assert_eq!(position.figures().unvalued_margins, 0);

        fx.bid.store(Decimal::ZERO);
        assert_eq!(position.calculate_margin_used().value(), dec!(44.16));
        assert_eq!(position.figures().unvalued_margins, 2);
    }
}
