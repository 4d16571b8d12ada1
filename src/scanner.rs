// =============================================================================
// Entry Scanner — sequential RSI scan over every tradable perpetual
// =============================================================================
//
// One cycle:
//   1. List tradable symbols for the quote asset, minus exclusions.
//   2. Count open positions once.
//   3. For each symbol, unless the position cap is already reached:
//      klines -> RSI/EMA, ticker, funding -> entry rule.
//   4. On a signal, re-read the position count and re-evaluate.  The check
//      and the order are not atomic; a manual trade or the position manager
//      can still slip in between.
//   5. Set margin mode and leverage, size the order, place it, notify.
//
// Per-symbol failures are logged and skipped.  A failure of steps 1-2 aborts
// the cycle; `run` logs it and retries after `error_retry_secs`.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::decision::{funding_label, size_order, EntryRule};
use crate::error::BotResult;
use crate::exchange::Exchange;
use crate::indicators::{latest_ema, latest_rsi};
use crate::notify::{format_funding_time, Notifier};
use crate::types::{EntryDecision, MarketOrder, OrderAck, PositionSide, SignalSnapshot, SymbolInfo};

/// Counters for one pass over the symbol list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub scanned: usize,
    pub signals: usize,
    pub opened: usize,
    /// Signals dropped by the pre-order recheck or by sizing.
    pub skipped: usize,
    pub failed: usize,
}

/// Outcomes that re-read positions carry the fresh open-position count.
enum SymbolOutcome {
    Idle,
    Skipped(usize),
    Opened(usize),
}

pub struct EntryScanner {
    exchange: Arc<dyn Exchange>,
    notifier: Arc<dyn Notifier>,
    config: Arc<BotConfig>,
    rule: EntryRule,
}

impl EntryScanner {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        notifier: Arc<dyn Notifier>,
        config: Arc<BotConfig>,
    ) -> Self {
        let rule = config.entry.rule();
        Self {
            exchange,
            notifier,
            config,
            rule,
        }
    }

    /// Scan forever.
    pub async fn run(&self) {
        let entry = &self.config.entry;
        info!(
            interval = %entry.kline_interval,
            sell_threshold = entry.sell_threshold,
            buy_threshold = entry.buy_threshold,
            price_ceiling = entry.price_ceiling,
            max_positions = entry.max_positions,
            "entry scanner started"
        );

        loop {
            match self.scan_cycle().await {
                Ok(summary) => {
                    info!(
                        scanned = summary.scanned,
                        signals = summary.signals,
                        opened = summary.opened,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "scan cycle complete"
                    );
                    tokio::time::sleep(Duration::from_secs(entry.cycle_delay_secs)).await;
                }
                Err(e) => {
                    error!(error = %e, retry_secs = self.config.error_retry_secs, "scan cycle failed");
                    tokio::time::sleep(Duration::from_secs(self.config.error_retry_secs)).await;
                }
            }
        }
    }

    pub async fn scan_cycle(&self) -> BotResult<ScanSummary> {
        let entry = &self.config.entry;
        let symbols: Vec<SymbolInfo> = self
            .exchange
            .tradable_symbols(&self.config.quote_asset)
            .await?
            .into_iter()
            .filter(|s| !entry.is_excluded(&s.symbol))
            .collect();

        let mut active = self.exchange.open_positions().await?.len();
        debug!(symbols = symbols.len(), active, "scan cycle starting");

        let mut summary = ScanSummary::default();
        for info in &symbols {
            summary.scanned += 1;
            match self.scan_symbol(info, active).await {
                Ok(SymbolOutcome::Idle) => {}
                Ok(SymbolOutcome::Skipped(open)) => {
                    summary.signals += 1;
                    summary.skipped += 1;
                    active = active.max(open);
                }
                Ok(SymbolOutcome::Opened(open)) => {
                    summary.signals += 1;
                    summary.opened += 1;
                    active = active.max(open) + 1;
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(symbol = %info.symbol, error = %e, transient = e.is_transient(), "symbol skipped");
                }
            }

            if self.exchange.is_throttled() {
                warn!(pause_secs = entry.throttle_pause_secs, "request weight high, pausing scan");
                tokio::time::sleep(Duration::from_secs(entry.throttle_pause_secs)).await;
            }
            tokio::time::sleep(Duration::from_millis(entry.symbol_delay_ms)).await;
        }

        Ok(summary)
    }

    /// Klines, ticker and funding for `symbol`.  Too little history yields an
    /// RSI of zero, which the entry rule never treats as a signal.
    pub async fn build_signal(&self, symbol: &str) -> BotResult<SignalSnapshot> {
        let entry = &self.config.entry;
        let candles = self
            .exchange
            .klines(symbol, &entry.kline_interval, entry.kline_limit)
            .await?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let rsi = latest_rsi(&closes, entry.rsi_period).unwrap_or_else(|| {
            debug!(symbol, candles = closes.len(), "not enough history for RSI");
            0.0
        });
        let ema = latest_ema(&closes, entry.ema_period).unwrap_or(0.0);

        let last_price = self.exchange.last_price(symbol).await?;
        let funding = self.exchange.funding(symbol).await?;

        Ok(SignalSnapshot {
            symbol: symbol.to_string(),
            rsi,
            ema,
            last_price,
            funding_rate: funding.rate_pct,
            next_funding_time: funding.next_funding_time,
        })
    }

    async fn scan_symbol(&self, info: &SymbolInfo, active: usize) -> BotResult<SymbolOutcome> {
        // At the cap no signal can fire; spare the request weight.
        if active >= self.rule.max_positions {
            return Ok(SymbolOutcome::Idle);
        }

        let signal = self.build_signal(&info.symbol).await?;
        let decision = self.rule.evaluate(&signal, active);
        debug!(
            symbol = %signal.symbol,
            rsi = format!("{:.2}", signal.rsi),
            price = signal.last_price,
            ?decision,
            "symbol evaluated"
        );

        if decision == EntryDecision::NoAction {
            return Ok(SymbolOutcome::Idle);
        }

        info!(
            symbol = %signal.symbol,
            rsi = format!("{:.2}", signal.rsi),
            ema = signal.ema,
            price = signal.last_price,
            ?decision,
            "entry signal"
        );

        // Best-effort recheck right before acting.
        let fresh = self.exchange.open_positions().await?.len();
        let decision = self.rule.evaluate(&signal, fresh.max(active));
        let Some(side) = decision.side() else {
            info!(symbol = %signal.symbol, open_positions = fresh, "position limit reached, signal dropped");
            return Ok(SymbolOutcome::Skipped(fresh));
        };

        match self.open_position(info, &signal, side).await? {
            Some(_) => Ok(SymbolOutcome::Opened(fresh)),
            None => Ok(SymbolOutcome::Skipped(fresh)),
        }
    }

    async fn open_position(
        &self,
        info: &SymbolInfo,
        signal: &SignalSnapshot,
        side: PositionSide,
    ) -> BotResult<Option<OrderAck>> {
        let entry = &self.config.entry;
        let symbol = info.symbol.as_str();

        let Some(quantity) = size_order(
            entry.order_margin,
            entry.leverage,
            signal.last_price,
            info.step_size,
            info.min_qty,
        ) else {
            warn!(
                symbol,
                margin = entry.order_margin,
                price = signal.last_price,
                min_qty = info.min_qty,
                "order size below exchange minimum, skipping"
            );
            return Ok(None);
        };

        self.exchange.set_margin_mode(symbol, entry.margin_mode).await?;
        self.exchange.set_leverage(symbol, entry.leverage).await?;

        let order = MarketOrder::new(
            symbol,
            side.opening_order_side(),
            quantity,
            self.config.hedge_mode.then_some(side),
            false,
        );
        let ack = self.exchange.place_market_order(&order).await?;

        info!(
            symbol,
            %side,
            quantity,
            order_id = ack.order_id,
            client_order_id = %ack.client_order_id,
            "position opened"
        );

        self.notifier.send(&open_message(signal, side, quantity, entry.leverage)).await;
        Ok(Some(ack))
    }
}

fn open_message(signal: &SignalSnapshot, side: PositionSide, quantity: f64, leverage: u32) -> String {
    format!(
        "OPEN {side} {symbol} x{leverage}\nqty {quantity} @ {price}\nRSI {rsi:.2} | EMA {ema:.6}\nfunding {rate:.4}% ({label}), next {next}",
        symbol = signal.symbol,
        price = signal.last_price,
        rsi = signal.rsi,
        ema = signal.ema,
        rate = signal.funding_rate,
        label = funding_label(side, signal.funding_rate),
        next = format_funding_time(signal.next_funding_time),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        neutral_closes, overbought_closes, oversold_closes, position, MockExchange,
        RecordingNotifier,
    };
    use crate::types::{MarginMode, OrderSide};

    fn config() -> BotConfig {
        let mut cfg = BotConfig::default();
        cfg.entry.symbol_delay_ms = 0;
        cfg.entry.throttle_pause_secs = 0;
        cfg.entry.ema_period = 20;
        cfg
    }

    fn scanner(
        exchange: Arc<MockExchange>,
        cfg: BotConfig,
    ) -> (EntryScanner, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let s = EntryScanner::new(exchange, notifier.clone(), Arc::new(cfg));
        (s, notifier)
    }

    #[tokio::test]
    async fn overbought_symbol_opens_short() {
        let ex = Arc::new(MockExchange::new().with_symbol("DOGEUSDT", overbought_closes(), 0.5));
        let (s, notifier) = scanner(ex.clone(), config());

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.opened, 1);

        let orders = ex.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[0].position_side, Some(PositionSide::Short));
        // 5 USDT * 10x / 0.5
        assert_eq!(orders[0].quantity, 100.0);
        assert!(!orders[0].reduce_only);

        let st = ex.state.lock();
        assert_eq!(st.margin_calls, vec![("DOGEUSDT".to_string(), MarginMode::Isolated)]);
        assert_eq!(st.leverage_calls, vec![("DOGEUSDT".to_string(), 10)]);
        drop(st);

        let msgs = notifier.messages();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].starts_with("OPEN SHORT DOGEUSDT"));
    }

    #[tokio::test]
    async fn oversold_symbol_opens_long() {
        let ex = Arc::new(MockExchange::new().with_symbol("ADAUSDT", oversold_closes(), 0.61));
        let (s, _) = scanner(ex.clone(), config());

        s.scan_cycle().await.unwrap();
        let orders = ex.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert_eq!(orders[0].position_side, Some(PositionSide::Long));
    }

    #[tokio::test]
    async fn one_way_accounts_omit_position_side() {
        let ex = Arc::new(MockExchange::new().with_symbol("DOGEUSDT", overbought_closes(), 0.5));
        let mut cfg = config();
        cfg.hedge_mode = false;
        let (s, _) = scanner(ex.clone(), cfg);

        s.scan_cycle().await.unwrap();
        assert_eq!(ex.orders()[0].position_side, None);
    }

    #[tokio::test]
    async fn only_one_position_per_cycle() {
        let ex = Arc::new(
            MockExchange::new()
                .with_symbol("AAAUSDT", overbought_closes(), 0.5)
                .with_symbol("BBBUSDT", overbought_closes(), 0.5),
        );
        let (s, _) = scanner(ex.clone(), config());

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.opened, 1);
        assert_eq!(summary.signals, 1);
        assert_eq!(ex.orders().len(), 1);
        assert_eq!(ex.orders()[0].symbol, "AAAUSDT");
    }

    #[tokio::test]
    async fn existing_position_blocks_entries() {
        let ex = Arc::new(
            MockExchange::new()
                .with_symbol("DOGEUSDT", overbought_closes(), 0.5)
                .with_positions(vec![position("XRPUSDT", PositionSide::Long, 0.0, 5.0)]),
        );
        let (s, _) = scanner(ex.clone(), config());

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.opened, 0);
        assert_eq!(summary.signals, 0);
        assert!(ex.orders().is_empty());
        assert_eq!(ex.state.lock().position_fetches, 1);
    }

    #[tokio::test]
    async fn recheck_drops_signal_when_position_appears() {
        // Cycle start sees no positions; the pre-order recheck sees one.
        let ex = Arc::new(
            MockExchange::new()
                .with_symbol("DOGEUSDT", overbought_closes(), 0.5)
                .with_positions(vec![])
                .with_positions(vec![position("XRPUSDT", PositionSide::Long, 0.0, 5.0)]),
        );
        let (s, notifier) = scanner(ex.clone(), config());

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.signals, 1);
        assert_eq!(summary.skipped, 1);
        assert!(ex.orders().is_empty());
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn recheck_count_carries_to_later_symbols() {
        let ex = Arc::new(
            MockExchange::new()
                .with_symbol("AAAUSDT", overbought_closes(), 0.5)
                .with_symbol("BBBUSDT", overbought_closes(), 0.5)
                .with_symbol("CCCUSDT", overbought_closes(), 0.5)
                .with_positions(vec![])
                .with_positions(vec![position("XRPUSDT", PositionSide::Long, 0.0, 5.0)]),
        );
        let (s, _) = scanner(ex.clone(), config());

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.signals, 1);
        assert_eq!(summary.skipped, 1);
        // Cycle start plus one recheck; the later symbols see the raised count.
        assert_eq!(ex.state.lock().position_fetches, 2);
        assert!(ex.orders().is_empty());
    }

    #[tokio::test]
    async fn throttled_exchange_pauses_between_symbols() {
        let ex = Arc::new(
            MockExchange::new()
                .with_symbol("AAAUSDT", neutral_closes(), 0.5)
                .with_symbol("BBBUSDT", neutral_closes(), 0.5)
                .with_symbol("CCCUSDT", neutral_closes(), 0.5),
        );
        ex.state.lock().throttled = true;
        let mut cfg = config();
        cfg.entry.throttle_pause_secs = 1;
        let (s, _) = scanner(ex.clone(), cfg);

        let started = std::time::Instant::now();
        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(ex.state.lock().throttle_checks, 3);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn unthrottled_exchange_is_checked_without_pausing() {
        let ex = Arc::new(MockExchange::new().with_symbol("AAAUSDT", neutral_closes(), 0.5));
        let mut cfg = config();
        cfg.entry.throttle_pause_secs = 60;
        let (s, _) = scanner(ex.clone(), cfg);

        let started = std::time::Instant::now();
        s.scan_cycle().await.unwrap();
        assert_eq!(ex.state.lock().throttle_checks, 1);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn price_ceiling_and_neutral_rsi_do_nothing() {
        let ex = Arc::new(
            MockExchange::new()
                .with_symbol("BTCUSDT", overbought_closes(), 65000.0)
                .with_symbol("XRPUSDT", neutral_closes(), 0.5),
        );
        let (s, _) = scanner(ex.clone(), config());

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.signals, 0);
        assert!(ex.orders().is_empty());
    }

    #[tokio::test]
    async fn short_history_is_never_a_signal() {
        let ex = Arc::new(MockExchange::new().with_symbol("NEWUSDT", vec![0.5; 5], 0.5));
        let (s, _) = scanner(ex.clone(), config());

        let signal = s.build_signal("NEWUSDT").await.unwrap();
        assert_eq!(signal.rsi, 0.0);
        s.scan_cycle().await.unwrap();
        assert!(ex.orders().is_empty());
    }

    #[tokio::test]
    async fn excluded_symbols_are_not_scanned() {
        let ex = Arc::new(MockExchange::new().with_symbol("DOGEUSDT", overbought_closes(), 0.5));
        let mut cfg = config();
        cfg.entry.excluded_symbols = vec!["DOGEUSDT".into()];
        let (s, _) = scanner(ex.clone(), cfg);

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.scanned, 0);
        assert!(ex.orders().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_skips_only_that_symbol() {
        let ex = Arc::new(
            MockExchange::new()
                .with_symbol("BADUSDT", overbought_closes(), 0.5)
                .with_symbol("DOGEUSDT", overbought_closes(), 0.5),
        );
        ex.state.lock().fail_fetch.insert("BADUSDT".into());
        let (s, _) = scanner(ex.clone(), config());

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.opened, 1);
        assert_eq!(ex.orders()[0].symbol, "DOGEUSDT");
    }

    #[tokio::test]
    async fn rejected_order_is_logged_not_fatal() {
        let ex = Arc::new(MockExchange::new().with_symbol("DOGEUSDT", overbought_closes(), 0.5));
        ex.state.lock().reject_orders = true;
        let (s, notifier) = scanner(ex.clone(), config());

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.opened, 0);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn unsizable_order_is_skipped() {
        let ex = Arc::new(MockExchange::new().with_symbol("DOGEUSDT", overbought_closes(), 0.5));
        let mut cfg = config();
        cfg.entry.order_margin = 0.01;
        cfg.entry.leverage = 1;
        let (s, _) = scanner(ex.clone(), cfg);

        let summary = s.scan_cycle().await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(ex.orders().is_empty());
        assert!(ex.state.lock().leverage_calls.is_empty());
    }

    #[tokio::test]
    async fn cycle_fails_when_positions_unavailable() {
        let ex = Arc::new(MockExchange::new().with_symbol("DOGEUSDT", overbought_closes(), 0.5));
        ex.state.lock().fail_positions = true;
        let (s, _) = scanner(ex.clone(), config());

        let err = s.scan_cycle().await.unwrap_err();
        assert!(err.is_transient());
        assert!(ex.orders().is_empty());
    }

    #[tokio::test]
    async fn cycle_fails_when_symbols_unavailable() {
        let ex = Arc::new(MockExchange::new());
        ex.state.lock().fail_symbols = true;
        let (s, _) = scanner(ex, config());
        assert!(s.scan_cycle().await.is_err());
    }

    #[test]
    fn open_message_mentions_funding() {
        let signal = SignalSnapshot {
            symbol: "DOGEUSDT".into(),
            rsi: 85.0,
            ema: 0.48,
            last_price: 0.5,
            funding_rate: 0.01,
            next_funding_time: 1_700_006_400_000,
        };
        let msg = open_message(&signal, PositionSide::Short, 100.0, 10);
        assert!(msg.contains("OPEN SHORT DOGEUSDT x10"));
        assert!(msg.contains("RSI 85.00"));
        assert!(msg.contains("(receiving)"));
    }
}
