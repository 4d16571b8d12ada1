// =============================================================================
// Relative Strength Index (RSI) — Wilder's smoothing
// =============================================================================
//
//   delta_i   = close_i - close_{i-1}
//   seed      = simple mean of the first `period` gains / losses
//   avg_t     = (avg_{t-1} * (period - 1) + x_t) / period
//   RSI       = 100 - 100 / (1 + avg_gain / avg_loss)
//
// A flat window yields 50, a window with no losses yields 100.
// =============================================================================

/// Full RSI series, one value per close from index `period` onward.
///
/// Empty when `period == 0` or fewer than `period + 1` closes are supplied.
/// The series stops at the first non-finite value.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let n = period as f64;
    let mut avg_gain = 0.0_f64;
    let mut avg_loss = 0.0_f64;
    for w in closes[..=period].windows(2) {
        let d = w[1] - w[0];
        if d > 0.0 {
            avg_gain += d;
        } else {
            avg_loss -= d;
        }
    }
    avg_gain /= n;
    avg_loss /= n;

    let mut out = Vec::with_capacity(closes.len() - period);
    let Some(first) = rsi_value(avg_gain, avg_loss) else {
        return out;
    };
    out.push(first);

    for w in closes[period..].windows(2) {
        let d = w[1] - w[0];
        avg_gain = (avg_gain * (n - 1.0) + d.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-d).max(0.0)) / n;
        match rsi_value(avg_gain, avg_loss) {
            Some(v) => out.push(v),
            None => break,
        }
    }

    out
}

/// Most recent RSI value, or `None` when history is too short.
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    rsi_series(closes, period).last().copied()
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };
    rsi.is_finite().then_some(rsi)
}
