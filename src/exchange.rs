// =============================================================================
// Exchange capability — everything the two processes need from the venue
// =============================================================================
//
// Fetch operations fail with `BotError::Fetch` / `BotError::Exchange`; order
// and account-setting operations fail with `BotError::OrderRejected` or
// `BotError::Exchange`.  The orchestrators depend on this trait only, so the
// decision flow can be driven by a scripted exchange in tests.
// =============================================================================

use async_trait::async_trait;

use crate::error::BotResult;
use crate::types::{
    Candle, FundingInfo, MarginMode, MarketOrder, OrderAck, PositionSide, PositionSnapshot,
    SymbolInfo,
};

#[async_trait]
pub trait Exchange: Send + Sync {
    /// Perpetual contracts currently trading against `quote_asset`.
    async fn tradable_symbols(&self, quote_asset: &str) -> BotResult<Vec<SymbolInfo>>;

    async fn klines(&self, symbol: &str, interval: &str, limit: u32) -> BotResult<Vec<Candle>>;

    async fn last_price(&self, symbol: &str) -> BotResult<f64>;

    async fn funding(&self, symbol: &str) -> BotResult<FundingInfo>;

    /// Positions with non-zero size.
    async fn open_positions(&self) -> BotResult<Vec<PositionSnapshot>>;

    /// Free balance of `asset` available for new margin.
    async fn available_balance(&self, asset: &str) -> BotResult<f64>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> BotResult<()>;

    /// Succeeds when the symbol already uses `mode`.
    async fn set_margin_mode(&self, symbol: &str, mode: MarginMode) -> BotResult<()>;

    async fn place_market_order(&self, order: &MarketOrder) -> BotResult<OrderAck>;

    /// Add `amount` quote units of isolated margin to a position.
    async fn add_isolated_margin(
        &self,
        symbol: &str,
        side: Option<PositionSide>,
        amount: f64,
    ) -> BotResult<()>;

    /// Whether recent request weight is close enough to the limit that callers
    /// should slow down.
    fn is_throttled(&self) -> bool {
        false
    }
}
