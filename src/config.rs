// =============================================================================
// Bot Configuration — immutable settings shared by both processes
// =============================================================================
//
// Thresholds live in a JSON file (`BOT_CONFIG`, default `bot_config.json`);
// credentials and the REST endpoint come from the environment (after .env).
// Every field carries a serde default so a partial or missing file still
// loads.  The value is built once at startup, validated, wrapped in `Arc`
// and never mutated afterwards.
// =============================================================================

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::decision::EntryRule;
use crate::error::{BotError, BotResult};
use crate::types::MarginMode;

pub const DEFAULT_CONFIG_PATH: &str = "bot_config.json";
pub const DEFAULT_REST_URL: &str = "https://fapi.binance.com";

// =============================================================================
// Default-value helpers
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_kline_interval() -> String {
    "5m".to_string()
}

fn default_kline_limit() -> u32 {
    100
}

fn default_rsi_period() -> usize {
    14
}

fn default_ema_period() -> usize {
    50
}

fn default_sell_threshold() -> f64 {
    80.0
}

fn default_buy_threshold() -> f64 {
    20.0
}

fn default_price_ceiling() -> f64 {
    1.0
}

fn default_max_positions() -> usize {
    1
}

fn default_leverage() -> u32 {
    10
}

fn default_order_margin() -> f64 {
    5.0
}

fn default_symbol_delay_ms() -> u64 {
    300
}

fn default_cycle_delay_secs() -> u64 {
    10
}

fn default_error_retry_secs() -> u64 {
    30
}

fn default_throttle_pause_secs() -> u64 {
    20
}

fn default_profit_ratio() -> f64 {
    0.03
}

fn default_position_delay_ms() -> u64 {
    1000
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_support_ratio() -> f64 {
    0.5
}

fn default_trigger_ratio() -> f64 {
    0.5
}

// =============================================================================
// Credentials
// =============================================================================

/// Secrets read from the environment.  Never serialised or logged.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: std::env::var("BINANCE_API_KEY").unwrap_or_default(),
            api_secret: std::env::var("BINANCE_API_SECRET").unwrap_or_default(),
            telegram_token: non_empty("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty("TELEGRAM_CHAT_ID"),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("telegram_token", &self.telegram_token.as_ref().map(|_| "<redacted>"))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish()
    }
}

// =============================================================================
// EntryParams
// =============================================================================

/// Entry scanner parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryParams {
    /// Kline interval used for RSI/EMA, e.g. "5m".
    #[serde(default = "default_kline_interval")]
    pub kline_interval: String,

    #[serde(default = "default_kline_limit")]
    pub kline_limit: u32,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_ema_period")]
    pub ema_period: usize,

    /// RSI at or above this opens a short.
    #[serde(default = "default_sell_threshold")]
    pub sell_threshold: f64,

    /// RSI strictly below this (and above zero) opens a long.
    #[serde(default = "default_buy_threshold")]
    pub buy_threshold: f64,

    /// Only symbols priced strictly below this are traded.
    #[serde(default = "default_price_ceiling")]
    pub price_ceiling: f64,

    #[serde(default = "default_true")]
    pub short_enabled: bool,

    #[serde(default = "default_true")]
    pub long_enabled: bool,

    /// System-wide cap on open positions (best-effort, checked then acted).
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,

    #[serde(default = "default_leverage")]
    pub leverage: u32,

    #[serde(default)]
    pub margin_mode: MarginMode,

    /// Margin committed per entry, in quote units.
    #[serde(default = "default_order_margin")]
    pub order_margin: f64,

    /// Symbols never traded.
    #[serde(default)]
    pub excluded_symbols: Vec<String>,

    /// Pause between symbols.
    #[serde(default = "default_symbol_delay_ms")]
    pub symbol_delay_ms: u64,

    /// Pause between full scans.
    #[serde(default = "default_cycle_delay_secs")]
    pub cycle_delay_secs: u64,

    /// Extra pause when request weight crosses the warning threshold.
    #[serde(default = "default_throttle_pause_secs")]
    pub throttle_pause_secs: u64,
}

impl Default for EntryParams {
    fn default() -> Self {
        Self {
            kline_interval: default_kline_interval(),
            kline_limit: default_kline_limit(),
            rsi_period: default_rsi_period(),
            ema_period: default_ema_period(),
            sell_threshold: default_sell_threshold(),
            buy_threshold: default_buy_threshold(),
            price_ceiling: default_price_ceiling(),
            short_enabled: true,
            long_enabled: true,
            max_positions: default_max_positions(),
            leverage: default_leverage(),
            margin_mode: MarginMode::default(),
            order_margin: default_order_margin(),
            excluded_symbols: Vec::new(),
            symbol_delay_ms: default_symbol_delay_ms(),
            cycle_delay_secs: default_cycle_delay_secs(),
            throttle_pause_secs: default_throttle_pause_secs(),
        }
    }
}

impl EntryParams {
    pub fn rule(&self) -> EntryRule {
        EntryRule {
            max_positions: self.max_positions,
            price_ceiling: self.price_ceiling,
            sell_threshold: self.sell_threshold,
            buy_threshold: self.buy_threshold,
            short_enabled: self.short_enabled,
            long_enabled: self.long_enabled,
        }
    }

    pub fn is_excluded(&self, symbol: &str) -> bool {
        self.excluded_symbols
            .iter()
            .any(|s| s.eq_ignore_ascii_case(symbol))
    }
}

// =============================================================================
// ExitParams
// =============================================================================

/// Dormant margin top-up settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginTopUpParams {
    #[serde(default)]
    pub enabled: bool,

    /// Proposed addition as a fraction of current isolated margin.
    #[serde(default = "default_support_ratio")]
    pub support_ratio: f64,

    /// Loss, as a fraction of isolated margin, that triggers a proposal.
    #[serde(default = "default_trigger_ratio")]
    pub trigger_ratio: f64,
}

impl Default for MarginTopUpParams {
    fn default() -> Self {
        Self {
            enabled: false,
            support_ratio: default_support_ratio(),
            trigger_ratio: default_trigger_ratio(),
        }
    }
}

/// Position manager parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitParams {
    /// Close once unrealized profit >= isolated margin * profit_ratio.
    #[serde(default = "default_profit_ratio")]
    pub profit_ratio: f64,

    /// Send `reduceOnly=true` on close orders (one-way mode only).
    #[serde(default)]
    pub reduce_only_on_close: bool,

    #[serde(default = "default_position_delay_ms")]
    pub position_delay_ms: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub margin_top_up: MarginTopUpParams,
}

impl Default for ExitParams {
    fn default() -> Self {
        Self {
            profit_ratio: default_profit_ratio(),
            reduce_only_on_close: false,
            position_delay_ms: default_position_delay_ms(),
            poll_interval_secs: default_poll_interval_secs(),
            margin_top_up: MarginTopUpParams::default(),
        }
    }
}

// =============================================================================
// BotConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,

    /// Send `positionSide` with orders (account in hedge mode).
    #[serde(default = "default_true")]
    pub hedge_mode: bool,

    /// Pause before retrying a cycle that failed as a whole.
    #[serde(default = "default_error_retry_secs")]
    pub error_retry_secs: u64,

    #[serde(default)]
    pub entry: EntryParams,

    #[serde(default)]
    pub exit: ExitParams,

    #[serde(skip)]
    pub rest_url: String,

    #[serde(skip)]
    pub credentials: Credentials,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            quote_asset: default_quote_asset(),
            hedge_mode: true,
            error_retry_secs: default_error_retry_secs(),
            entry: EntryParams::default(),
            exit: ExitParams::default(),
            rest_url: DEFAULT_REST_URL.to_string(),
            credentials: Credentials::default(),
        }
    }
}

impl BotConfig {
    /// Parse thresholds from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> BotResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BotError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| BotError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.rest_url = DEFAULT_REST_URL.to_string();
        info!(path = %path.display(), "bot config loaded");
        Ok(config)
    }

    /// Full startup load: .env, JSON thresholds, environment secrets, then
    /// validation.  A missing file falls back to defaults with a warning; an
    /// unparsable one is fatal.
    pub fn load() -> BotResult<Self> {
        let _ = dotenv::dotenv();

        let path = std::env::var("BOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            warn!(path = %path, "config file not found, using defaults");
            Self::default()
        };

        if let Ok(url) = std::env::var("BINANCE_FUTURES_REST_URL") {
            config.rest_url = url.trim_end_matches('/').to_string();
        }
        config.credentials = Credentials::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot trade safely.
    pub fn validate(&self) -> BotResult<()> {
        if self.credentials.api_key.is_empty() || self.credentials.api_secret.is_empty() {
            return Err(BotError::Config(
                "BINANCE_API_KEY and BINANCE_API_SECRET must be set".into(),
            ));
        }
        self.validate_thresholds()
    }

    fn validate_thresholds(&self) -> BotResult<()> {
        let e = &self.entry;
        if !(0.0..=100.0).contains(&e.buy_threshold) || !(0.0..=100.0).contains(&e.sell_threshold) {
            return Err(BotError::Config("RSI thresholds must lie in [0, 100]".into()));
        }
        if e.buy_threshold >= e.sell_threshold {
            return Err(BotError::Config(format!(
                "buy_threshold ({}) must be below sell_threshold ({})",
                e.buy_threshold, e.sell_threshold
            )));
        }
        if e.leverage == 0 {
            return Err(BotError::Config("leverage must be at least 1".into()));
        }
        if e.order_margin <= 0.0 || e.price_ceiling <= 0.0 {
            return Err(BotError::Config(
                "order_margin and price_ceiling must be positive".into(),
            ));
        }
        if e.rsi_period == 0 || e.ema_period == 0 {
            return Err(BotError::Config("indicator periods must be non-zero".into()));
        }
        if (e.kline_limit as usize) <= e.rsi_period {
            return Err(BotError::Config(format!(
                "kline_limit ({}) must exceed rsi_period ({})",
                e.kline_limit, e.rsi_period
            )));
        }
        if self.exit.profit_ratio <= 0.0 {
            return Err(BotError::Config("profit_ratio must be positive".into()));
        }
        let t = &self.exit.margin_top_up;
        if t.enabled && (t.support_ratio <= 0.0 || t.trigger_ratio <= 0.0) {
            return Err(BotError::Config(
                "margin top-up ratios must be positive when enabled".into(),
            ));
        }
        if !e.long_enabled && !e.short_enabled {
            warn!("both long and short entries are disabled; the scanner will never trade");
        }
        Ok(())
    }
}
