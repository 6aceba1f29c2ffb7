//! swingbot entry point
//!
//! Startup order matters: the token and config are fatal-on-missing
//! before anything else runs, then logging comes up at the configured
//! level, then the collaborators are built and handed to the loop.

use std::path::PathBuf;

use tracing::info;

use swingbot::config::{self, Config};
use swingbot::runner::TradeSettings;
use swingbot::{CsvLedger, HttpBroker, TradeRunner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let token = config::token_from_env()?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_FILE));
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level()?)
        .init();

    info!(
        "Starting swingbot: {} pair, {}% margin, polling every {} min",
        config.main_currency, config.percent_margin, config.repeat_every_min
    );

    let broker = HttpBroker::new(
        &config.broker.api_url,
        &config.broker.device_id,
        &token,
        config.broker_timeout(),
    )?;

    let history_file = config.active_history_file();
    info!("Transaction history: {}", history_file.display());
    let ledger = CsvLedger::new(history_file);

    let runner = TradeRunner::new(broker, ledger, TradeSettings::from_config(&config));
    runner.run().await
}
