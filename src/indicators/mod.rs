// =============================================================================
// Technical Indicators
// =============================================================================
//
// Pure functions over close prices.  The `latest_*` helpers return `None` when
// history is insufficient so the scanner never mistakes missing data for a
// signal.

pub mod ema;
pub mod rsi;

pub use ema::latest_ema;
pub use rsi::latest_rsi;
