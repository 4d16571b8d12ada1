// =============================================================================
// Binance USDT-M Futures
// =============================================================================

pub mod client;
pub mod parse;
pub mod rate_limit;

pub use client::BinanceFuturesClient;
pub use rate_limit::RateLimitTracker;
