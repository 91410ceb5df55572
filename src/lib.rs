// instrument-ledger: per-instrument trade and position accounting.
// tracks open trades, rolls them into long/short positions and recomputes
// unrealized pnl and margin on demand. no I/O; rates and prices are pushed in.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: TradeId, Side, Price, Quote, Leverage, Timestamp
//   2.x  live.rs: shared bid/ask/leverage cells, observation handles, Tick
//   3.x  conversion.rs: rate sources, quote → account currency conversion
//   4.x  trade.rs: single open lot, valuation and margin
//   5.x  time_order.rs: trade ids in open order, bounded traversal
//   6.x  position.rs: one side's trades, aggregates, close bookkeeping
//   7.x  config.rs: instrument description + validation
//   8.x  instrument.rs: registry, positions, hedge netting, read API
//   8.1  margin.rs: hedge policy, notional / leverage

pub mod config;
pub mod conversion;
pub mod instrument;
pub mod live;
pub mod margin;
pub mod position;
pub mod time_order;
pub mod trade;
pub mod types;

// re exports for convenience
pub use config::InstrumentConfig;
pub use conversion::{Conversion, ConversionError, CurrencyConverter, FixedRates, RateSource};
pub use instrument::{Instrument, InstrumentError, InstrumentFigures};
pub use live::{LiveValue, LiveView, Tick};
pub use margin::{notional_value, required_margin, Hedge};
pub use position::{Position, PositionFigures};
pub use time_order::{TimeOrderedTrades, TradeIds};
pub use trade::{Trade, TradeValuation, ValuationError};
pub use types::*;
