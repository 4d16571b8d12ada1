// =============================================================================
// Position Monitor — take-profit loop over open positions
// =============================================================================
//
// One cycle:
//   1. List open positions.
//   2. For each: fetch funding, log funding direction (display only).
//   3. Exit rule: unrealized PnL >= isolated margin * profit_ratio closes the
//      position with an opposite-side market order for the full size.
//   4. Otherwise, if margin top-up is enabled and the loss is deep enough,
//      add isolated margin sized from the current margin.  Off by default.
//
// Per-position failures are logged and skipped; a failed position listing
// aborts the cycle and `run` retries after `error_retry_secs`.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::decision::{evaluate_exit, funding_label, profit_target, propose_top_up, top_up_due};
use crate::error::BotResult;
use crate::exchange::Exchange;
use crate::notify::{format_funding_time, Notifier};
use crate::types::{ExitDecision, FundingInfo, MarketOrder, OrderAck, PositionSnapshot};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSummary {
    pub positions: usize,
    pub closed: usize,
    pub held: usize,
    pub topped_up: usize,
    pub failed: usize,
}

enum PositionOutcome {
    Held,
    ToppedUp,
    Closed,
}

pub struct PositionMonitor {
    exchange: Arc<dyn Exchange>,
    notifier: Arc<dyn Notifier>,
    config: Arc<BotConfig>,
}

impl PositionMonitor {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        notifier: Arc<dyn Notifier>,
        config: Arc<BotConfig>,
    ) -> Self {
        Self {
            exchange,
            notifier,
            config,
        }
    }

    /// Monitor forever.
    pub async fn run(&self) {
        let exit = &self.config.exit;
        info!(
            profit_ratio = exit.profit_ratio,
            margin_top_up = exit.margin_top_up.enabled,
            reduce_only = exit.reduce_only_on_close,
            "position monitor started"
        );

        loop {
            match self.monitor_cycle().await {
                Ok(summary) => {
                    if summary.positions > 0 {
                        info!(
                            positions = summary.positions,
                            closed = summary.closed,
                            held = summary.held,
                            topped_up = summary.topped_up,
                            failed = summary.failed,
                            "monitor cycle complete"
                        );
                    }
                    tokio::time::sleep(Duration::from_secs(exit.poll_interval_secs)).await;
                }
                Err(e) => {
                    error!(error = %e, retry_secs = self.config.error_retry_secs, "monitor cycle failed");
                    tokio::time::sleep(Duration::from_secs(self.config.error_retry_secs)).await;
                }
            }
        }
    }

    pub async fn monitor_cycle(&self) -> BotResult<MonitorSummary> {
        let positions = self.exchange.open_positions().await?;
        if positions.is_empty() {
            debug!("no open positions");
        }

        let mut summary = MonitorSummary {
            positions: positions.len(),
            ..MonitorSummary::default()
        };

        for position in &positions {
            match self.check_position(position).await {
                Ok(PositionOutcome::Held) => summary.held += 1,
                Ok(PositionOutcome::ToppedUp) => {
                    summary.held += 1;
                    summary.topped_up += 1;
                }
                Ok(PositionOutcome::Closed) => summary.closed += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(symbol = %position.symbol, side = %position.side, error = %e, "position skipped");
                }
            }
            tokio::time::sleep(Duration::from_millis(self.config.exit.position_delay_ms)).await;
        }

        Ok(summary)
    }

    async fn check_position(&self, position: &PositionSnapshot) -> BotResult<PositionOutcome> {
        let exit = &self.config.exit;
        let funding = self.exchange.funding(&position.symbol).await?;
        let target = profit_target(position, exit.profit_ratio);

        info!(
            symbol = %position.symbol,
            side = %position.side,
            size = position.size,
            entry = position.entry_price,
            mark = position.mark_price,
            pnl = position.unrealized_profit,
            target,
            funding_pct = format!("{:.4}", funding.rate_pct),
            funding = funding_label(position.side, funding.rate_pct),
            "position status"
        );

        if position.isolated_margin == 0.0 {
            debug!(
                symbol = %position.symbol,
                "zero isolated margin: any non-negative PnL meets the target"
            );
        }

        if evaluate_exit(position, exit.profit_ratio) == ExitDecision::ClosePosition {
            self.close_position(position, &funding).await?;
            return Ok(PositionOutcome::Closed);
        }

        if exit.margin_top_up.enabled && self.top_up(position).await?.is_some() {
            return Ok(PositionOutcome::ToppedUp);
        }

        Ok(PositionOutcome::Held)
    }

    async fn close_position(
        &self,
        position: &PositionSnapshot,
        funding: &FundingInfo,
    ) -> BotResult<OrderAck> {
        // Binance rejects reduceOnly in hedge mode; positionSide already pins
        // the order to one leg there.
        let reduce_only = self.config.exit.reduce_only_on_close && !position.hedge_side;
        let order = MarketOrder::new(
            &position.symbol,
            position.side.closing_order_side(),
            position.quantity(),
            position.hedge_side.then_some(position.side),
            reduce_only,
        );
        let ack = self.exchange.place_market_order(&order).await?;

        info!(
            symbol = %position.symbol,
            side = %position.side,
            quantity = position.quantity(),
            pnl = position.unrealized_profit,
            order_id = ack.order_id,
            client_order_id = %ack.client_order_id,
            "position closed"
        );

        self.notifier.send(&close_message(position, funding)).await;
        Ok(ack)
    }

    /// Add isolated margin to a losing position when the free balance covers
    /// the proposal.
    async fn top_up(&self, position: &PositionSnapshot) -> BotResult<Option<f64>> {
        let params = &self.config.exit.margin_top_up;
        if !top_up_due(position, params.trigger_ratio) {
            return Ok(None);
        }

        let available = self.exchange.available_balance(&self.config.quote_asset).await?;
        let Some(amount) = propose_top_up(
            position,
            params.trigger_ratio,
            params.support_ratio,
            available,
        ) else {
            warn!(
                symbol = %position.symbol,
                available,
                margin = position.isolated_margin,
                "margin top-up wanted but balance is insufficient"
            );
            return Ok(None);
        };

        self.exchange
            .add_isolated_margin(&position.symbol, position.hedge_side.then_some(position.side), amount)
            .await?;

        info!(symbol = %position.symbol, side = %position.side, amount, "isolated margin added");
        self.notifier
            .send(&format!(
                "MARGIN +{amount:.4} {quote} {side} {symbol}\npnl {pnl:.4} on margin {margin:.4}",
                quote = self.config.quote_asset,
                side = position.side,
                symbol = position.symbol,
                pnl = position.unrealized_profit,
                margin = position.isolated_margin,
            ))
            .await;
        Ok(Some(amount))
    }
}

fn close_message(position: &PositionSnapshot, funding: &FundingInfo) -> String {
    format!(
        "CLOSE {side} {symbol}\nqty {qty} entry {entry} mark {mark}\npnl {pnl:.4} on margin {margin:.4}\nfunding {rate:.4}% ({label}), next {next}",
        side = position.side,
        symbol = position.symbol,
        qty = position.quantity(),
        entry = position.entry_price,
        mark = position.mark_price,
        pnl = position.unrealized_profit,
        margin = position.isolated_margin,
        rate = funding.rate_pct,
        label = funding_label(position.side, funding.rate_pct),
        next = format_funding_time(funding.next_funding_time),
    )
}
