// =============================================================================
// Position manager — closes positions at the profit target
// =============================================================================

use std::sync::Arc;

use tracing::{info, warn};

use perp_rsi_bot::binance::BinanceFuturesClient;
use perp_rsi_bot::config::BotConfig;
use perp_rsi_bot::monitor::PositionMonitor;
use perp_rsi_bot::notify;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    perp_rsi_bot::logging::init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Perp RSI Bot — Position Manager                   ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = Arc::new(BotConfig::load()?);
    let creds = &config.credentials;
    let exchange = Arc::new(BinanceFuturesClient::new(
        &creds.api_key,
        creds.api_secret.clone(),
        config.rest_url.clone(),
    )?);
    let notifier = notify::from_credentials(creds)?;

    notifier
        .send(&format!(
            "Position manager started: take profit at {:.1}% of margin",
            config.exit.profit_ratio * 100.0
        ))
        .await;

    let monitor = PositionMonitor::new(exchange, notifier.clone(), config.clone());
    tokio::select! {
        _ = monitor.run() => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            warn!("Shutdown signal received — stopping");
        }
    }

    notifier.send("Position manager stopped").await;
    info!("position manager shut down");
    Ok(())
}
