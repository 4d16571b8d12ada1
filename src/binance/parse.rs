// =============================================================================
// Response parsing for the USDT-M futures REST API
// =============================================================================
//
// Binance encodes most decimals as JSON strings; `de_f64` accepts either form.
// Everything here is pure so payload handling is tested without a network.
// =============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::types::{Candle, FundingInfo, OrderAck, PositionSide, PositionSnapshot, SymbolInfo};

/// Error body: `{"code": -2019, "msg": "Margin is insufficient."}`.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

pub fn parse_api_error(body: &str) -> Option<ApiErrorBody> {
    serde_json::from_str(body).ok()
}

fn de_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(f64),
    }
    match StrOrNum::deserialize(deserializer)? {
        StrOrNum::Num(n) => Ok(n),
        StrOrNum::Str(s) if s.is_empty() => Ok(0.0),
        StrOrNum::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn value_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

// -----------------------------------------------------------------------------
// exchangeInfo
// -----------------------------------------------------------------------------

/// Perpetual, trading contracts quoted in `quote_asset`, with LOT_SIZE filters.
pub fn parse_exchange_info(body: &serde_json::Value, quote_asset: &str) -> Result<Vec<SymbolInfo>> {
    let symbols = body["symbols"]
        .as_array()
        .context("exchangeInfo response missing 'symbols' array")?;

    let mut out = Vec::new();
    for s in symbols {
        let tradable = s["contractType"].as_str() == Some("PERPETUAL")
            && s["status"].as_str() == Some("TRADING")
            && s["quoteAsset"].as_str() == Some(quote_asset);
        if !tradable {
            continue;
        }
        let Some(symbol) = s["symbol"].as_str() else {
            continue;
        };
        let lot = s["filters"]
            .as_array()
            .and_then(|f| f.iter().find(|f| f["filterType"].as_str() == Some("LOT_SIZE")));
        let Some(lot) = lot else {
            warn!(symbol, "no LOT_SIZE filter, skipping symbol");
            continue;
        };
        out.push(SymbolInfo {
            symbol: symbol.to_string(),
            step_size: value_f64(&lot["stepSize"])?,
            min_qty: value_f64(&lot["minQty"])?,
        });
    }
    Ok(out)
}

// -----------------------------------------------------------------------------
// klines
// -----------------------------------------------------------------------------

/// Array-of-arrays: [openTime, open, high, low, close, volume, closeTime, ...].
pub fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;
    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;
        if arr.len() < 7 {
            warn!(len = arr.len(), "skipping malformed kline entry");
            continue;
        }
        candles.push(Candle {
            open_time: arr[0].as_i64().unwrap_or(0),
            open: value_f64(&arr[1])?,
            high: value_f64(&arr[2])?,
            low: value_f64(&arr[3])?,
            close: value_f64(&arr[4])?,
            volume: value_f64(&arr[5])?,
            close_time: arr[6].as_i64().unwrap_or(0),
        });
    }
    Ok(candles)
}

// -----------------------------------------------------------------------------
// ticker / premiumIndex
// -----------------------------------------------------------------------------

#[derive(Deserialize)]
struct TickerPrice {
    #[serde(deserialize_with = "de_f64")]
    price: f64,
}

pub fn parse_ticker_price(body: &serde_json::Value) -> Result<f64> {
    let t = TickerPrice::deserialize(body).context("failed to parse ticker price")?;
    Ok(t.price)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    #[serde(deserialize_with = "de_f64")]
    last_funding_rate: f64,
    next_funding_time: i64,
}

/// Funding rate converted from a decimal fraction to percent.
pub fn parse_premium_index(body: &serde_json::Value) -> Result<FundingInfo> {
    let p = PremiumIndex::deserialize(body).context("failed to parse premiumIndex")?;
    Ok(FundingInfo {
        rate_pct: p.last_funding_rate * 100.0,
        next_funding_time: p.next_funding_time,
    })
}

// -----------------------------------------------------------------------------
// positionRisk
// -----------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    symbol: String,
    #[serde(deserialize_with = "de_f64")]
    position_amt: f64,
    #[serde(deserialize_with = "de_f64")]
    entry_price: f64,
    #[serde(deserialize_with = "de_f64")]
    mark_price: f64,
    #[serde(rename = "unRealizedProfit", deserialize_with = "de_f64")]
    unrealized_profit: f64,
    #[serde(default, deserialize_with = "de_f64")]
    isolated_margin: f64,
    #[serde(default)]
    position_side: Option<String>,
}

/// Non-zero positions.  Hedge-mode rows carry LONG/SHORT; one-way `BOTH` rows
/// take their side from the sign of the amount.
pub fn parse_positions(body: &serde_json::Value) -> Result<Vec<PositionSnapshot>> {
    let rows = Vec::<PositionRisk>::deserialize(body).context("failed to parse positionRisk")?;
    Ok(rows
        .into_iter()
        .filter(|r| r.position_amt != 0.0)
        .map(|r| {
            let (side, hedge_side) = match r.position_side.as_deref() {
                Some("LONG") => (PositionSide::Long, true),
                Some("SHORT") => (PositionSide::Short, true),
                _ if r.position_amt < 0.0 => (PositionSide::Short, false),
                _ => (PositionSide::Long, false),
            };
            PositionSnapshot {
                symbol: r.symbol,
                side,
                size: r.position_amt,
                entry_price: r.entry_price,
                mark_price: r.mark_price,
                unrealized_profit: r.unrealized_profit,
                isolated_margin: r.isolated_margin,
                hedge_side,
            }
        })
        .collect())
}

// -----------------------------------------------------------------------------
// balance / order
// -----------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetBalance {
    asset: String,
    #[serde(deserialize_with = "de_f64")]
    available_balance: f64,
}

/// Available balance for `asset`; zero when the asset is absent.
pub fn parse_available_balance(body: &serde_json::Value, asset: &str) -> Result<f64> {
    let rows = Vec::<AssetBalance>::deserialize(body).context("failed to parse balance")?;
    match rows.into_iter().find(|b| b.asset == asset) {
        Some(b) => Ok(b.available_balance),
        None => {
            warn!(asset, "asset not found in balances, returning 0.0");
            Ok(0.0)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    client_order_id: String,
    status: String,
}

pub fn parse_order_ack(body: &serde_json::Value) -> Result<OrderAck> {
    let r = OrderResponse::deserialize(body).context("failed to parse order response")?;
    Ok(OrderAck {
        order_id: r.order_id,
        client_order_id: r.client_order_id,
        status: r.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exchange_info_keeps_trading_perpetuals_in_quote() {
        let body = json!({
            "symbols": [
                {
                    "symbol": "DOGEUSDT", "contractType": "PERPETUAL", "status": "TRADING",
                    "quoteAsset": "USDT",
                    "filters": [
                        {"filterType": "PRICE_FILTER", "tickSize": "0.000010"},
                        {"filterType": "LOT_SIZE", "stepSize": "1", "minQty": "1", "maxQty": "50000000"}
                    ]
                },
                {
                    "symbol": "BTCUSDT_250627", "contractType": "CURRENT_QUARTER", "status": "TRADING",
                    "quoteAsset": "USDT", "filters": []
                },
                {
                    "symbol": "OLDUSDT", "contractType": "PERPETUAL", "status": "SETTLING",
                    "quoteAsset": "USDT", "filters": []
                },
                {
                    "symbol": "ETHBUSD", "contractType": "PERPETUAL", "status": "TRADING",
                    "quoteAsset": "BUSD", "filters": []
                },
                {
                    "symbol": "NOLOTUSDT", "contractType": "PERPETUAL", "status": "TRADING",
                    "quoteAsset": "USDT", "filters": []
                }
            ]
        });
        let symbols = parse_exchange_info(&body, "USDT").unwrap();
        assert_eq!(
            symbols,
            vec![SymbolInfo { symbol: "DOGEUSDT".into(), step_size: 1.0, min_qty: 1.0 }]
        );
    }

    #[test]
    fn klines_parse_and_skip_short_rows() {
        let body = json!([
            [1700000000000i64, "0.1000", "0.1100", "0.0990", "0.1050", "12345.0", 1700000299999i64, "1296.2", 321, "6000", "630"],
            [1700000300000i64, "0.1050"]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 1);
        assert!((candles[0].close - 0.105).abs() < 1e-12);
        assert_eq!(candles[0].close_time, 1700000299999);
    }

    #[test]
    fn klines_reject_non_array() {
        assert!(parse_klines(&json!({"code": -1121})).is_err());
    }

    #[test]
    fn premium_index_in_percent() {
        let body = json!({
            "symbol": "DOGEUSDT", "markPrice": "0.16012000", "indexPrice": "0.16010",
            "lastFundingRate": "-0.00012500", "nextFundingTime": 1700006400000i64,
            "interestRate": "0.00010000", "time": 1700000000000i64
        });
        let f = parse_premium_index(&body).unwrap();
        assert!((f.rate_pct - (-0.0125)).abs() < 1e-12);
        assert_eq!(f.next_funding_time, 1700006400000);
    }

    #[test]
    fn ticker_price() {
        assert!((parse_ticker_price(&json!({"symbol": "XRPUSDT", "price": "0.5123"})).unwrap() - 0.5123).abs() < 1e-12);
    }

    #[test]
    fn positions_drop_flat_rows_and_resolve_sides() {
        let body = json!([
            {"symbol": "DOGEUSDT", "positionAmt": "-300", "entryPrice": "0.16", "markPrice": "0.15",
             "unRealizedProfit": "3.00", "isolatedMargin": "4.80", "marginType": "isolated", "positionSide": "SHORT"},
            {"symbol": "DOGEUSDT", "positionAmt": "0", "entryPrice": "0.0", "markPrice": "0.15",
             "unRealizedProfit": "0.0", "isolatedMargin": "0", "marginType": "isolated", "positionSide": "LONG"},
            {"symbol": "ADAUSDT", "positionAmt": "-10", "entryPrice": "0.4", "markPrice": "0.41",
             "unRealizedProfit": "-0.1", "isolatedMargin": "0.00000000", "marginType": "cross", "positionSide": "BOTH"}
        ]);
        let positions = parse_positions(&body).unwrap();
        assert_eq!(positions.len(), 2);

        assert_eq!(positions[0].side, PositionSide::Short);
        assert!(positions[0].hedge_side);
        assert!((positions[0].unrealized_profit - 3.0).abs() < 1e-12);
        assert!((positions[0].isolated_margin - 4.8).abs() < 1e-12);

        assert_eq!(positions[1].symbol, "ADAUSDT");
        assert_eq!(positions[1].side, PositionSide::Short);
        assert!(!positions[1].hedge_side);
        assert_eq!(positions[1].isolated_margin, 0.0);
    }

    #[test]
    fn balance_lookup() {
        let body = json!([
            {"accountAlias": "x", "asset": "BNB", "balance": "0.1", "availableBalance": "0.1"},
            {"accountAlias": "x", "asset": "USDT", "balance": "120.5", "availableBalance": "98.25"}
        ]);
        assert!((parse_available_balance(&body, "USDT").unwrap() - 98.25).abs() < 1e-12);
        assert_eq!(parse_available_balance(&body, "USDC").unwrap(), 0.0);
    }

    #[test]
    fn order_ack() {
        let body = json!({
            "orderId": 22542179, "symbol": "DOGEUSDT", "status": "NEW",
            "clientOrderId": "prb-0123456789abcdef0123456789abcdef", "side": "SELL",
            "positionSide": "SHORT", "origQty": "300", "type": "MARKET"
        });
        let ack = parse_order_ack(&body).unwrap();
        assert_eq!(ack.order_id, 22542179);
        assert_eq!(ack.status, "NEW");
    }

    #[test]
    fn api_error_body() {
        let e = parse_api_error(r#"{"code":-2019,"msg":"Margin is insufficient."}"#).unwrap();
        assert_eq!(e.code, -2019);
        assert!(parse_api_error("<html>bad gateway</html>").is_none());
    }
}
