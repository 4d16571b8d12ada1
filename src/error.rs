// =============================================================================
// Error taxonomy shared by both polling processes
// =============================================================================
//
// Per-symbol and per-position failures are caught at the item level by the
// orchestrators; only `Config` is allowed to abort a process.
// =============================================================================

use thiserror::Error;

/// Binance code returned when the requested margin type is already active.
pub const NO_NEED_TO_CHANGE_MARGIN_TYPE: i64 = -4046;

#[derive(Debug, Error)]
pub enum BotError {
    /// Market data, balance, or position retrieval failed.
    #[error("failed to fetch {what}: {source}")]
    Fetch {
        what: String,
        #[source]
        source: anyhow::Error,
    },

    /// The exchange refused an order or account setting.
    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    /// Structured error body returned by the exchange.
    #[error("exchange error {code}: {msg}")]
    Exchange { code: i64, msg: String },

    /// Notification delivery failed.
    #[error("notification failed: {0}")]
    Notification(String),

    /// Missing credentials or invalid thresholds.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BotError {
    pub fn fetch(what: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Fetch {
            what: what.into(),
            source: source.into(),
        }
    }

    pub fn rejected(symbol: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::OrderRejected {
            symbol: symbol.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors that skip the current item but leave the loop running.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Exchange { .. })
    }

    /// Binance API code, when the error came from a structured error body.
    pub fn exchange_code(&self) -> Option<i64> {
        match self {
            Self::Exchange { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type BotResult<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_are_transient() {
        let err = BotError::fetch("klines for BTCUSDT", anyhow::anyhow!("timeout"));
        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "failed to fetch klines for BTCUSDT: timeout"
        );
    }

    #[test]
    fn rejections_and_config_are_not_transient() {
        assert!(!BotError::rejected("ETHUSDT", "insufficient margin").is_transient());
        assert!(!BotError::Config("missing key".into()).is_transient());
    }

    #[test]
    fn exchange_code_is_exposed() {
        let err = BotError::Exchange {
            code: NO_NEED_TO_CHANGE_MARGIN_TYPE,
            msg: "No need to change margin type.".into(),
        };
        assert_eq!(err.exchange_code(), Some(-4046));
        assert_eq!(BotError::Notification("x".into()).exchange_code(), None);
    }
}
