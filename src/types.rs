// =============================================================================
// Shared types used by the entry scanner and the position manager
// =============================================================================
//
// Every snapshot here is rebuilt from the exchange on each poll cycle and is
// never persisted.  Decisions are plain enums produced by the pure evaluators
// in `crate::decision`.
// =============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directional exposure of a futures position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Order side that opens exposure in this direction.
    pub fn opening_order_side(self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Buy,
            Self::Short => OrderSide::Sell,
        }
    }

    /// Order side that reduces exposure in this direction.
    pub fn closing_order_side(self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Sell,
            Self::Short => OrderSide::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side of a single order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Margin mode applied to a symbol before opening a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarginMode {
    #[default]
    Isolated,
    Crossed,
}

impl MarginMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Isolated => "ISOLATED",
            Self::Crossed => "CROSSED",
        }
    }
}

impl std::fmt::Display for MarginMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

/// Tradable perpetual contract with the quantity filters needed for sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub step_size: f64,
    pub min_qty: f64,
}

/// Funding snapshot for a perpetual contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundingInfo {
    /// Last funding rate in percent (0.01 means 0.01 %).
    pub rate_pct: f64,
    /// Unix milliseconds of the next funding event.
    pub next_funding_time: i64,
}

/// An open position as reported by the exchange for one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub side: PositionSide,
    /// Signed quantity: positive for longs, negative for shorts.
    pub size: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_profit: f64,
    /// Zero for cross-margin positions.
    pub isolated_margin: f64,
    /// Whether the exchange reported an explicit LONG/SHORT position side
    /// (hedge mode) rather than a one-way `BOTH` row.
    pub hedge_side: bool,
}

impl PositionSnapshot {
    pub fn quantity(&self) -> f64 {
        self.size.abs()
    }
}

/// Indicator and price snapshot for one symbol, recomputed every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub symbol: String,
    pub rsi: f64,
    pub ema: f64,
    pub last_price: f64,
    /// Percent.
    pub funding_rate: f64,
    pub next_funding_time: i64,
}

/// Outcome of the entry rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryDecision {
    OpenLong,
    OpenShort,
    NoAction,
}

impl EntryDecision {
    /// Direction of the position this decision would open.
    pub fn side(self) -> Option<PositionSide> {
        match self {
            Self::OpenLong => Some(PositionSide::Long),
            Self::OpenShort => Some(PositionSide::Short),
            Self::NoAction => None,
        }
    }
}

/// Outcome of the exit rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitDecision {
    ClosePosition,
    NoAction,
}

/// A market order request handed to the exchange client.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    /// Sent as `positionSide` when the account runs in hedge mode.
    pub position_side: Option<PositionSide>,
    pub reduce_only: bool,
    pub client_order_id: String,
}

impl MarketOrder {
    /// Build an order with a fresh client order id (`prb-` + 32 hex chars, the
    /// 36-character maximum Binance accepts).
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: f64,
        position_side: Option<PositionSide>,
        reduce_only: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            position_side,
            reduce_only,
            client_order_id: format!("prb-{}", Uuid::new_v4().simple()),
        }
    }
}

/// Acknowledgement returned by the exchange for an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: i64,
    pub client_order_id: String,
    pub status: String,
}
