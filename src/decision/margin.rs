// =============================================================================
// Sizing — margin top-up proposals and entry order quantity
// =============================================================================

use crate::types::PositionSnapshot;

/// Proposed isolated-margin addition: `isolated_margin * support_ratio`.
pub fn size_top_up(isolated_margin: f64, support_ratio: f64) -> f64 {
    isolated_margin * support_ratio
}

/// Whether an isolated position has lost at least `isolated_margin *
/// trigger_ratio`.  Cross-margin positions (zero isolated margin) never are.
pub fn top_up_due(position: &PositionSnapshot, trigger_ratio: f64) -> bool {
    position.isolated_margin > 0.0
        && position.unrealized_profit <= -(position.isolated_margin * trigger_ratio)
}

/// Top-up amount for `position`, or `None` when the top-up is not due, the
/// amount is not positive, or the free balance cannot cover it.
pub fn propose_top_up(
    position: &PositionSnapshot,
    trigger_ratio: f64,
    support_ratio: f64,
    available_balance: f64,
) -> Option<f64> {
    if !top_up_due(position, trigger_ratio) {
        return None;
    }
    let amount = size_top_up(position.isolated_margin, support_ratio);
    (amount > 0.0 && available_balance >= amount).then_some(amount)
}

/// Market-order quantity for `margin` quote units at `leverage`, floored to the
/// symbol's step size.  `None` when the result is below `min_qty` or any input
/// is non-positive.
pub fn size_order(margin: f64, leverage: u32, price: f64, step_size: f64, min_qty: f64) -> Option<f64> {
    if margin <= 0.0 || leverage == 0 || price <= 0.0 || step_size <= 0.0 {
        return None;
    }
    let raw = margin * leverage as f64 / price;
    // Nudge before flooring so 0.3 / 0.1 style ratios don't drop a step.
    let steps = (raw / step_size + 1e-9).floor();
    let qty = round_to_step(steps * step_size, step_size);
    (qty > 0.0 && qty >= min_qty).then_some(qty)
}

/// Decimal places implied by a step size such as `0.001`.
pub fn step_decimals(step_size: f64) -> usize {
    let mut decimals = 0;
    let mut s = step_size;
    while decimals < 12 && (s - s.round()).abs() > 1e-9 {
        s *= 10.0;
        decimals += 1;
    }
    decimals
}

fn round_to_step(value: f64, step_size: f64) -> f64 {
    let factor = 10f64.powi(step_decimals(step_size) as i32);
    (value * factor).round() / factor
}
