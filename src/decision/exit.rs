// =============================================================================
// Exit Rule — take profit once PnL reaches a fraction of isolated margin
// =============================================================================
//
//   unrealized_profit >= isolated_margin * profit_ratio  => ClosePosition
//
// Cross-margin positions report zero isolated margin, so the threshold is zero
// and any non-negative PnL closes them.
// =============================================================================

use crate::types::{ExitDecision, PositionSnapshot};

/// Profit threshold in quote currency for a position.
pub fn profit_target(position: &PositionSnapshot, profit_ratio: f64) -> f64 {
    position.isolated_margin * profit_ratio
}

pub fn evaluate_exit(position: &PositionSnapshot, profit_ratio: f64) -> ExitDecision {
    if position.unrealized_profit >= profit_target(position, profit_ratio) {
        ExitDecision::ClosePosition
    } else {
        ExitDecision::NoAction
    }
}
