// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
//   k     = 2 / (period + 1)
//   EMA_t = close_t * k + EMA_{t-1} * (1 - k)
//
// Seeded with the simple mean of the first `period` closes.
// =============================================================================

/// EMA series, one value per close from index `period - 1` onward.
///
/// Empty when `period == 0` or the input is shorter than `period`. A
/// non-finite value ends the series.
pub fn ema_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = closes[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(closes.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &c in &closes[period..] {
        let next = c * k + prev * (1.0 - k);
        if !next.is_finite() {
            break;
        }
        out.push(next);
        prev = next;
    }
    out
}

/// Most recent EMA value.
pub fn latest_ema(closes: &[f64], period: usize) -> Option<f64> {
    ema_series(closes, period).last().copied()
}
