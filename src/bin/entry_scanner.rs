// =============================================================================
// Entry scanner — opens RSI-extreme positions on low-priced perpetuals
// =============================================================================

use std::sync::Arc;

use tracing::{info, warn};

use perp_rsi_bot::binance::BinanceFuturesClient;
use perp_rsi_bot::config::BotConfig;
use perp_rsi_bot::notify;
use perp_rsi_bot::scanner::EntryScanner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    perp_rsi_bot::logging::init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Perp RSI Bot — Entry Scanner                      ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = Arc::new(BotConfig::load()?);
    let creds = &config.credentials;
    let exchange = Arc::new(BinanceFuturesClient::new(
        &creds.api_key,
        creds.api_secret.clone(),
        config.rest_url.clone(),
    )?);
    let notifier = notify::from_credentials(creds)?;

    let entry = &config.entry;
    notifier
        .send(&format!(
            "Entry scanner started: RSI {}/{} on {}, max {} position(s), x{}",
            entry.sell_threshold, entry.buy_threshold, entry.kline_interval, entry.max_positions, entry.leverage
        ))
        .await;

    let scanner = EntryScanner::new(exchange, notifier.clone(), config.clone());
    tokio::select! {
        _ = scanner.run() => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            warn!("Shutdown signal received — stopping");
        }
    }

    notifier.send("Entry scanner stopped").await;
    info!("entry scanner shut down");
    Ok(())
}
