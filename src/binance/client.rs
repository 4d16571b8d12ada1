// =============================================================================
// Binance USDT-M Futures REST Client — HMAC-SHA256 signed requests
// =============================================================================
//
// SECURITY: the secret is only used for signing and is never logged.  Signed
// requests carry `timestamp`, `recvWindow` (5 000 ms) and `signature` in the
// query string; the API key travels in the `X-MBX-APIKEY` header.
//
// Every response updates the request-weight tracker.  Non-2xx responses with a
// `{code, msg}` body become `BotError::Exchange`; anything else becomes
// `BotError::Fetch`.
// =============================================================================

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use sha2::Sha256;
use tracing::{debug, info, instrument};

use crate::binance::parse;
use crate::binance::rate_limit::RateLimitTracker;
use crate::error::{BotError, BotResult, NO_NEED_TO_CHANGE_MARGIN_TYPE};
use crate::exchange::Exchange;
use crate::types::{
    Candle, FundingInfo, MarginMode, MarketOrder, OrderAck, PositionSide, PositionSnapshot,
    SymbolInfo,
};

type HmacSha256 = Hmac<Sha256>;

const RECV_WINDOW: u64 = 5000;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct BinanceFuturesClient {
    secret: String,
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceFuturesClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(
        api_key: &str,
        secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key).context("API key is not a valid header value")?;
        default_headers.insert("X-MBX-APIKEY", key);

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build reqwest client")?;

        let base_url = base_url.into();
        debug!(base_url = %base_url, "BinanceFuturesClient initialised");

        Ok(Self {
            secret: secret.into(),
            base_url,
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.rate_limit
    }

    // -------------------------------------------------------------------------
    // Signing helpers
    // -------------------------------------------------------------------------

    /// HMAC-SHA256 hex signature of `query`.
    pub fn sign(&self, query: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }

    fn signed_query(&self, params: &str) -> String {
        let ts = Self::timestamp_ms();
        let base = if params.is_empty() {
            format!("timestamp={ts}&recvWindow={RECV_WINDOW}")
        } else {
            format!("{params}&timestamp={ts}&recvWindow={RECV_WINDOW}")
        };
        let sig = self.sign(&base);
        format!("{base}&signature={sig}")
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    async fn public_get(&self, path: &str, query: &str, what: &str) -> BotResult<serde_json::Value> {
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };
        self.send(self.client.get(&url), what).await
    }

    async fn signed(
        &self,
        method: Method,
        path: &str,
        params: &str,
        what: &str,
    ) -> BotResult<serde_json::Value> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));
        self.send(self.client.request(method, &url), what).await
    }

    async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> BotResult<serde_json::Value> {
        let resp = req
            .send()
            .await
            .map_err(|e| BotError::fetch(what, e))?;

        self.rate_limit.update_from_headers(resp.headers());

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BotError::fetch(what, e))?;

        if !status.is_success() {
            return Err(match parse::parse_api_error(&body) {
                Some(e) => BotError::Exchange { code: e.code, msg: e.msg },
                None => BotError::fetch(what, anyhow::anyhow!("HTTP {status}: {body}")),
            });
        }

        serde_json::from_str(&body)
            .with_context(|| format!("invalid JSON in {what} response"))
            .map_err(|e| BotError::fetch(what, e))
    }
}

fn parsed<T>(what: &str, result: anyhow::Result<T>) -> BotResult<T> {
    result.map_err(|e| BotError::fetch(what, e))
}

#[async_trait]
impl Exchange for BinanceFuturesClient {
    #[instrument(skip(self), name = "binance::tradable_symbols")]
    async fn tradable_symbols(&self, quote_asset: &str) -> BotResult<Vec<SymbolInfo>> {
        let what = "exchangeInfo";
        let body = self.public_get("/fapi/v1/exchangeInfo", "", what).await?;
        let symbols = parsed(what, parse::parse_exchange_info(&body, quote_asset))?;
        debug!(count = symbols.len(), "tradable symbols fetched");
        Ok(symbols)
    }

    #[instrument(skip(self), name = "binance::klines")]
    async fn klines(&self, symbol: &str, interval: &str, limit: u32) -> BotResult<Vec<Candle>> {
        let what = format!("klines for {symbol}");
        let query = format!("symbol={symbol}&interval={interval}&limit={limit}");
        let body = self.public_get("/fapi/v1/klines", &query, &what).await?;
        parsed(&what, parse::parse_klines(&body))
    }

    #[instrument(skip(self), name = "binance::last_price")]
    async fn last_price(&self, symbol: &str) -> BotResult<f64> {
        let what = format!("ticker for {symbol}");
        let body = self
            .public_get("/fapi/v1/ticker/price", &format!("symbol={symbol}"), &what)
            .await?;
        parsed(&what, parse::parse_ticker_price(&body))
    }

    #[instrument(skip(self), name = "binance::funding")]
    async fn funding(&self, symbol: &str) -> BotResult<FundingInfo> {
        let what = format!("funding for {symbol}");
        let body = self
            .public_get("/fapi/v1/premiumIndex", &format!("symbol={symbol}"), &what)
            .await?;
        parsed(&what, parse::parse_premium_index(&body))
    }

    #[instrument(skip(self), name = "binance::open_positions")]
    async fn open_positions(&self) -> BotResult<Vec<PositionSnapshot>> {
        let what = "positionRisk";
        let body = self.signed(Method::GET, "/fapi/v2/positionRisk", "", what).await?;
        let positions = parsed(what, parse::parse_positions(&body))?;
        debug!(count = positions.len(), "open positions fetched");
        Ok(positions)
    }

    #[instrument(skip(self), name = "binance::available_balance")]
    async fn available_balance(&self, asset: &str) -> BotResult<f64> {
        let what = "balance";
        let body = self.signed(Method::GET, "/fapi/v2/balance", "", what).await?;
        parsed(what, parse::parse_available_balance(&body, asset))
    }

    #[instrument(skip(self), name = "binance::set_leverage")]
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> BotResult<()> {
        let params = format!("symbol={symbol}&leverage={leverage}");
        self.signed(Method::POST, "/fapi/v1/leverage", &params, "leverage")
            .await
            .map_err(|e| BotError::rejected(symbol, e))?;
        debug!(symbol, leverage, "leverage set");
        Ok(())
    }

    #[instrument(skip(self), name = "binance::set_margin_mode")]
    async fn set_margin_mode(&self, symbol: &str, mode: MarginMode) -> BotResult<()> {
        let params = format!("symbol={symbol}&marginType={mode}");
        match self
            .signed(Method::POST, "/fapi/v1/marginType", &params, "marginType")
            .await
        {
            Ok(_) => {
                debug!(symbol, %mode, "margin mode set");
                Ok(())
            }
            Err(e) if e.exchange_code() == Some(NO_NEED_TO_CHANGE_MARGIN_TYPE) => {
                debug!(symbol, %mode, "margin mode already active");
                Ok(())
            }
            Err(e) => Err(BotError::rejected(symbol, e)),
        }
    }

    #[instrument(skip(self, order), fields(symbol = %order.symbol, side = %order.side), name = "binance::place_market_order")]
    async fn place_market_order(&self, order: &MarketOrder) -> BotResult<OrderAck> {
        let mut params = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}",
            order.symbol, order.side, order.quantity, order.client_order_id
        );
        if let Some(ps) = order.position_side {
            params.push_str(&format!("&positionSide={ps}"));
        }
        if order.reduce_only {
            params.push_str("&reduceOnly=true");
        }

        info!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            client_order_id = %order.client_order_id,
            "placing market order"
        );

        let body = self
            .signed(Method::POST, "/fapi/v1/order", &params, "order")
            .await
            .map_err(|e| BotError::rejected(&order.symbol, e))?;
        parse::parse_order_ack(&body).map_err(|e| BotError::rejected(&order.symbol, e))
    }

    #[instrument(skip(self), name = "binance::add_isolated_margin")]
    async fn add_isolated_margin(
        &self,
        symbol: &str,
        side: Option<PositionSide>,
        amount: f64,
    ) -> BotResult<()> {
        let mut params = format!("symbol={symbol}&amount={amount}&type=1");
        if let Some(ps) = side {
            params.push_str(&format!("&positionSide={ps}"));
        }
        self.signed(Method::POST, "/fapi/v1/positionMargin", &params, "positionMargin")
            .await
            .map_err(|e| BotError::rejected(symbol, e))?;
        Ok(())
    }

    fn is_throttled(&self) -> bool {
        self.rate_limit.is_throttled()
    }
}

impl std::fmt::Debug for BinanceFuturesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceFuturesClient")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("used_weight_1m", &self.rate_limit.used_weight())
            .finish()
    }
}
