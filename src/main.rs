//! Instrument ledger simulation.
//!
//! Walks an instrument through trade opens, price ticks, hedge netting and
//! closes, printing the figures a reporting layer would read.

use instrument_ledger::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), InstrumentError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("Instrument Ledger Simulation\n");

    scenario_1_single_trade_pnl()?;
    scenario_2_hedge_policies()?;
    scenario_3_trade_lifecycle()?;
    scenario_4_cross_currency()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn tick(ask: Decimal, bid: Decimal) -> Tick {
    Tick {
        ask: Price::new_unchecked(ask),
        bid: Price::new_unchecked(bid),
    }
}

fn print_tick(tick: &Tick) {
    println!(
        "  Tick ask {} / bid {} (mid {}, spread {})",
        tick.ask,
        tick.bid,
        tick.mid(),
        tick.spread()
    );
}

fn print_figures(instrument: &Instrument) {
    let figures = instrument.figures();
    println!(
        "    net ${}, effective ${}, fees ${}, margin ${}",
        figures.unrealized_net_profit,
        figures.unrealized_effective_profit,
        figures.charged_fees,
        figures.margin_used
    );
}

/// One long trade marked to the bid.
fn scenario_1_single_trade_pnl() -> Result<(), InstrumentError> {
    println!("Scenario 1: Single Trade PnL\n");

    let instrument = Instrument::new(InstrumentConfig::eur_usd(), Arc::new(FixedRates::new()))?;
    instrument.update_price(&tick(dec!(1.1000), dec!(1.0998)));
    instrument.open_trade(
        "t-1",
        Side::Long,
        Timestamp::now(),
        dec!(1000),
        Price::new_unchecked(dec!(1.1000)),
    )?;
    println!("  Long 1000 EUR/USD @ 1.1000, leverage {}x", instrument.leverage());

    let moved = tick(dec!(1.1050), dec!(1.1040));
    instrument.update_price(&moved);
    instrument.recalculate();
    print_tick(&moved);
    print_figures(&instrument);
    println!();
    Ok(())
}

/// Offsetting trades under every hedge policy.
fn scenario_2_hedge_policies() -> Result<(), InstrumentError> {
    println!("Scenario 2: Hedge Policies\n");

    for hedge in Hedge::ALL {
        let config = InstrumentConfig {
            hedge,
            ..InstrumentConfig::eur_usd()
        };
        let instrument = Instrument::new(config, Arc::new(FixedRates::new()))?;
        instrument.update_price(&tick(dec!(1.1), dec!(1.1)));

        let open = Price::new_unchecked(dec!(1.1));
        instrument.open_trade("long", Side::Long, Timestamp::now(), dec!(1000), open)?;
        instrument.open_trade("short", Side::Short, Timestamp::now(), dec!(1000), open)?;

        let margin = instrument.calculate_margin_used();
        println!(
            "  {hedge}: long ${}, short ${}, instrument ${}",
            instrument.long_position().margin_used(),
            instrument.short_position().margin_used(),
            margin
        );
    }
    println!();
    Ok(())
}

/// Opens, fees, ordered traversal and closes.
fn scenario_3_trade_lifecycle() -> Result<(), InstrumentError> {
    println!("Scenario 3: Trade Lifecycle\n");

    let instrument = Instrument::new(InstrumentConfig::eur_usd(), Arc::new(FixedRates::new()))?;
    instrument.update_price(&tick(dec!(1.1002), dec!(1.1000)));

    for (i, side) in [Side::Long, Side::Short, Side::Long].into_iter().enumerate() {
        let trade = instrument.open_trade(
            format!("t-{}", i + 1),
            side,
            Timestamp::from_millis(i as i64),
            dec!(500),
            Price::new_unchecked(dec!(1.1001)),
        )?;
        trade.charge_fee(Quote::new(dec!(0.1)));
    }

    let oldest: Vec<String> = instrument
        .trades_by_ascending_order(2)
        .map(|id| id.to_string())
        .collect();
    let newest: Vec<String> = instrument
        .trades_by_descending_order(2)
        .map(|id| id.to_string())
        .collect();
    println!("  Oldest two: {:?}, newest two: {:?}", oldest, newest);

    let reopen = Price::new_unchecked(dec!(1.1));
    if let Err(err) = instrument.open_trade("t-2", Side::Long, Timestamp::now(), dec!(1), reopen) {
        println!("  Reopen of t-2 refused: {err}");
    }

    instrument.update_price(&tick(dec!(1.0990), dec!(1.0988)));
    instrument.recalculate();
    print_figures(&instrument);

    instrument.close_trade(&TradeId::from("t-2"));
    instrument.close_trade(&TradeId::from("t-2"));
    instrument.recalculate();
    println!("  After closing t-2 (twice), {} trades open", instrument.trade_count());
    print_figures(&instrument);

    let short = instrument.short_position().figures();
    println!(
        "  Short side realized ${} over {} closed trade(s)\n",
        short.realized_net_profit, short.closed_trades
    );
    Ok(())
}

/// Quote currency differs from the account currency.
fn scenario_4_cross_currency() -> Result<(), InstrumentError> {
    println!("Scenario 4: Cross-Currency PnL\n");

    let rates = Arc::new(FixedRates::new());
    let instrument = Instrument::new(InstrumentConfig::usd_jpy(), rates.clone())?;
    instrument.update_price(&tick(dec!(150.02), dec!(150.00)));
    instrument.open_trade(
        "jpy-1",
        Side::Long,
        Timestamp::now(),
        dec!(10000),
        Price::new_unchecked(dec!(149.50)),
    )?;

    let figures = instrument.calculate_unrealized();
    println!(
        "  Without a JPY/USD rate: net ${}, unvalued trades {}",
        figures.unrealized_net_profit,
        instrument.long_position().figures().unvalued_trades
    );

    rates.set_rate("USD", "JPY", dec!(150));
    instrument.recalculate();
    println!("  With USD/JPY 150:");
    print_figures(&instrument);

    rates.remove_rate("USD", "JPY");
    instrument.update_price(&tick(dec!(151.02), dec!(151.00)));
    instrument.recalculate();
    println!("  Rate withdrawn, price moves, last-known rate used:");
    print_figures(&instrument);
    Ok(())
}
