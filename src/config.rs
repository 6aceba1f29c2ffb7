//! Agent configuration
//!
//! Everything is loaded once at startup: a YAML config file plus the
//! brokerage token from the environment. No ambient globals and no live
//! reload; the loaded [`Config`] is passed down explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::amount::Currency;

/// Environment variable carrying the pre-obtained brokerage token
pub const TOKEN_ENV: &str = "SWINGBOT_TOKEN";

/// Config file used when no path is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "swingbot.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    pub history_file: PathBuf,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub force_exchange: bool,
    pub main_currency: Currency,
    pub percent_margin: Decimal,
    pub repeat_every_min: u64,
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Optional separate ledger for simulated trades; when unset,
    /// synthetic transactions share the real history file
    pub history_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub api_url: String,
    pub device_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Config {
    /// Load and validate the YAML config file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.repeat_every_min == 0 {
            anyhow::bail!("repeat_every_min must be at least 1");
        }
        self.tracing_level()?;
        Ok(())
    }

    pub fn tracing_level(&self) -> anyhow::Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown log_level: {}", self.log_level))
    }

    pub fn repeat_every(&self) -> Duration {
        Duration::from_secs(self.repeat_every_min * 60)
    }

    pub fn broker_timeout(&self) -> Duration {
        Duration::from_secs(self.broker.timeout_secs)
    }

    /// The ledger file this run reads and appends
    ///
    /// Simulation with a dedicated history file keeps synthetic trades
    /// out of the real ledger; otherwise both share `history_file`.
    pub fn active_history_file(&self) -> PathBuf {
        if self.simulation.enabled {
            if let Some(sim_file) = &self.simulation.history_file {
                return self.data_path.join(sim_file);
            }
        }
        self.data_path.join(&self.history_file)
    }
}

/// Read the brokerage token, failing with a remediation hint
///
/// Token acquisition is a separate one-time CLI flow; this process only
/// consumes the result.
pub fn token_from_env() -> anyhow::Result<String> {
    std::env::var(TOKEN_ENV).map_err(|_| {
        anyhow::anyhow!(
            "no brokerage token found in {TOKEN_ENV}; \
             run the swingbot-auth onboarding CLI first to obtain one"
        )
    })
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout_secs() -> u64 {
    30
}
