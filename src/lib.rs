// =============================================================================
// perp-rsi-bot — RSI entry scanner and take-profit manager for USDT-M perpetuals
// =============================================================================
//
// Two binaries share this library:
//   entry_scanner     opens positions on RSI extremes below a price ceiling
//   position_manager  closes positions once PnL reaches a share of margin
//
// Decision logic lives in `decision` and `indicators` as pure functions; the
// orchestrators in `scanner` and `monitor` talk to the venue only through the
// `Exchange` trait.
// =============================================================================

pub mod binance;
pub mod config;
pub mod decision;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod scanner;
pub mod types;

#[cfg(test)]
mod testing;
