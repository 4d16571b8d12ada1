// =============================================================================
// Request-weight tracker for the futures REST API
// =============================================================================
//
// Binance USDT-M futures allows 2 400 request weight per minute per IP and
// reports current usage in `X-MBX-USED-WEIGHT-1M` on every response.  The
// tracker keeps the last reported value in an atomic so the client can stay
// `Clone + Sync` without locking.
// =============================================================================

use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, warn};

/// Exchange-side limit per minute.
pub const WEIGHT_LIMIT_1M: u32 = 2400;
/// Usage at which callers are asked to pause.
pub const WEIGHT_WARN_THRESHOLD: u32 = 1800;

const USED_WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";

#[derive(Debug, Default)]
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the weight reported by a response.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(weight) = headers
            .get(USED_WEIGHT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };
        self.record(weight);
    }

    pub fn record(&self, weight: u32) {
        let prev = self.used_weight_1m.swap(weight, Ordering::Relaxed);
        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                limit = WEIGHT_LIMIT_1M,
                "request weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "request weight updated");
    }

    pub fn used_weight(&self) -> u32 {
        self.used_weight_1m.load(Ordering::Relaxed)
    }

    pub fn is_throttled(&self) -> bool {
        self.used_weight() >= WEIGHT_WARN_THRESHOLD
    }
}
