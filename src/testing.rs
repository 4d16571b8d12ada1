// Scripted exchange and recording notifier for orchestrator tests.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{BotError, BotResult};
use crate::exchange::Exchange;
use crate::notify::Notifier;
use crate::types::{
    Candle, FundingInfo, MarginMode, MarketOrder, OrderAck, PositionSide, PositionSnapshot,
    SymbolInfo,
};

#[derive(Default)]
pub struct MockState {
    pub symbols: Vec<SymbolInfo>,
    pub fail_symbols: bool,
    pub closes: HashMap<String, Vec<f64>>,
    pub prices: HashMap<String, f64>,
    pub funding: HashMap<String, FundingInfo>,
    pub fail_fetch: HashSet<String>,
    /// Each `open_positions` call pops the front until one entry remains.
    pub positions: VecDeque<Vec<PositionSnapshot>>,
    pub fail_positions: bool,
    pub balance: f64,
    pub reject_orders: bool,
    pub throttled: bool,
    pub throttle_checks: usize,
    pub orders: Vec<MarketOrder>,
    pub leverage_calls: Vec<(String, u32)>,
    pub margin_calls: Vec<(String, MarginMode)>,
    pub top_ups: Vec<(String, Option<PositionSide>, f64)>,
    pub position_fetches: usize,
}

#[derive(Default)]
pub struct MockExchange {
    pub state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(self, symbol: &str, closes: Vec<f64>, price: f64) -> Self {
        {
            let mut s = self.state.lock();
            s.symbols.push(SymbolInfo {
                symbol: symbol.to_string(),
                step_size: 1.0,
                min_qty: 1.0,
            });
            s.closes.insert(symbol.to_string(), closes);
            s.prices.insert(symbol.to_string(), price);
        }
        self
    }

    pub fn with_positions(self, positions: Vec<PositionSnapshot>) -> Self {
        self.state.lock().positions.push_back(positions);
        self
    }

    pub fn orders(&self) -> Vec<MarketOrder> {
        self.state.lock().orders.clone()
    }

    fn check(&self, symbol: &str, what: &str) -> BotResult<()> {
        if self.state.lock().fail_fetch.contains(symbol) {
            return Err(BotError::fetch(
                format!("{what} for {symbol}"),
                anyhow::anyhow!("scripted failure"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn tradable_symbols(&self, _quote_asset: &str) -> BotResult<Vec<SymbolInfo>> {
        let s = self.state.lock();
        if s.fail_symbols {
            return Err(BotError::fetch("exchangeInfo", anyhow::anyhow!("scripted failure")));
        }
        Ok(s.symbols.clone())
    }

    async fn klines(&self, symbol: &str, _interval: &str, limit: u32) -> BotResult<Vec<Candle>> {
        self.check(symbol, "klines")?;
        let s = self.state.lock();
        let closes = s.closes.get(symbol).cloned().unwrap_or_default();
        let skip = closes.len().saturating_sub(limit as usize);
        Ok(closes
            .iter()
            .skip(skip)
            .enumerate()
            .map(|(i, &c)| Candle {
                open_time: i as i64 * 300_000,
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 1.0,
                close_time: i as i64 * 300_000 + 299_999,
            })
            .collect())
    }

    async fn last_price(&self, symbol: &str) -> BotResult<f64> {
        self.check(symbol, "ticker")?;
        Ok(self.state.lock().prices.get(symbol).copied().unwrap_or_default())
    }

    async fn funding(&self, symbol: &str) -> BotResult<FundingInfo> {
        self.check(symbol, "funding")?;
        Ok(self
            .state
            .lock()
            .funding
            .get(symbol)
            .copied()
            .unwrap_or(FundingInfo {
                rate_pct: 0.01,
                next_funding_time: 1_700_006_400_000,
            }))
    }

    async fn open_positions(&self) -> BotResult<Vec<PositionSnapshot>> {
        let mut s = self.state.lock();
        s.position_fetches += 1;
        if s.fail_positions {
            return Err(BotError::fetch("positionRisk", anyhow::anyhow!("scripted failure")));
        }
        if s.positions.len() > 1 {
            Ok(s.positions.pop_front().unwrap_or_default())
        } else {
            Ok(s.positions.front().cloned().unwrap_or_default())
        }
    }

    async fn available_balance(&self, _asset: &str) -> BotResult<f64> {
        Ok(self.state.lock().balance)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> BotResult<()> {
        self.state.lock().leverage_calls.push((symbol.to_string(), leverage));
        Ok(())
    }

    async fn set_margin_mode(&self, symbol: &str, mode: MarginMode) -> BotResult<()> {
        self.state.lock().margin_calls.push((symbol.to_string(), mode));
        Ok(())
    }

    async fn place_market_order(&self, order: &MarketOrder) -> BotResult<OrderAck> {
        let mut s = self.state.lock();
        if s.reject_orders {
            return Err(BotError::rejected(&order.symbol, "Margin is insufficient."));
        }
        s.orders.push(order.clone());
        Ok(OrderAck {
            order_id: s.orders.len() as i64,
            client_order_id: order.client_order_id.clone(),
            status: "NEW".into(),
        })
    }

    async fn add_isolated_margin(
        &self,
        symbol: &str,
        side: Option<PositionSide>,
        amount: f64,
    ) -> BotResult<()> {
        self.state.lock().top_ups.push((symbol.to_string(), side, amount));
        Ok(())
    }

    fn is_throttled(&self) -> bool {
        let mut s = self.state.lock();
        s.throttle_checks += 1;
        s.throttled
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// 40 strictly rising closes under 1.0: RSI 100.
pub fn overbought_closes() -> Vec<f64> {
    (0..40).map(|i| 0.40 + i as f64 * 0.005).collect()
}

/// 40 falling closes with one small uptick: RSI low but above zero.
pub fn oversold_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..40).map(|i| 0.80 - i as f64 * 0.005).collect();
    closes[35] += 0.008;
    closes
}

/// Closes alternating up and down: RSI near 50.
pub fn neutral_closes() -> Vec<f64> {
    (0..40).map(|i| if i % 2 == 0 { 0.50 } else { 0.51 }).collect()
}

pub fn position(symbol: &str, side: PositionSide, unrealized_profit: f64, isolated_margin: f64) -> PositionSnapshot {
    let size = match side {
        PositionSide::Long => 100.0,
        PositionSide::Short => -100.0,
    };
    PositionSnapshot {
        symbol: symbol.to_string(),
        side,
        size,
        entry_price: 0.5,
        mark_price: 0.5,
        unrealized_profit,
        isolated_margin,
        hedge_side: true,
    }
}
