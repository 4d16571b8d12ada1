// =============================================================================
// Entry Rule — RSI extreme below a price ceiling, one position at a time
// =============================================================================
//
// Rules, first match wins:
//   1. active positions >= max positions          => NoAction
//   2. rsi >= sell threshold, price < ceiling     => OpenShort (if enabled)
//   3. buy threshold > rsi > 0, price < ceiling   => OpenLong  (if enabled)
//   4. otherwise                                  => NoAction
//
// RSI <= 0 is degenerate indicator output, never an oversold signal.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{EntryDecision, SignalSnapshot};

/// Thresholds for the entry rule, built once from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryRule {
    pub max_positions: usize,
    pub price_ceiling: f64,
    pub sell_threshold: f64,
    pub buy_threshold: f64,
    pub short_enabled: bool,
    pub long_enabled: bool,
}

impl EntryRule {
    pub fn evaluate(&self, signal: &SignalSnapshot, active_position_count: usize) -> EntryDecision {
        if active_position_count >= self.max_positions {
            return EntryDecision::NoAction;
        }

        let below_ceiling = signal.last_price < self.price_ceiling;

        if signal.rsi >= self.sell_threshold && below_ceiling && self.short_enabled {
            EntryDecision::OpenShort
        } else if self.buy_threshold > signal.rsi
            && signal.rsi > 0.0
            && below_ceiling
            && self.long_enabled
        {
            EntryDecision::OpenLong
        } else {
            EntryDecision::NoAction
        }
    }
}
