//! Pipeline configuration
//!
//! Defaults cover every knob; a TOML file can override any section.

use serde::{Deserialize, Serialize};

use common::TimeFrame;
use execution::PlannerConfig;
use opportunity_scanner::ScannerConfig;
use signal_generation::GeneratorConfig;

/// One market/time-frame pair the batch job scans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSpec {
    pub market: String,
    pub time_frame: TimeFrame,
}

/// Top-level configuration for the decision pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Opportunity scanner settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Signal generation settings
    #[serde(default)]
    pub generation: GeneratorConfig,

    /// Plan assembly settings (token TTL, market hours)
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Seconds between scheduled cycles
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    /// Expiry stamped on intraday signals (minutes from generation)
    #[serde(default = "default_intraday_ttl")]
    pub intraday_ttl_minutes: i64,

    /// Expiry stamped on swing signals (hours from generation)
    #[serde(default = "default_swing_ttl")]
    pub swing_ttl_hours: i64,

    /// Market/time-frame pairs scanned each cycle
    #[serde(default = "default_markets")]
    pub markets: Vec<MarketSpec>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            generation: GeneratorConfig::default(),
            planner: PlannerConfig::default(),
            cycle_interval_secs: default_cycle_interval(),
            intraday_ttl_minutes: default_intraday_ttl(),
            swing_ttl_hours: default_swing_ttl(),
            markets: default_markets(),
        }
    }
}

fn default_cycle_interval() -> u64 {
    900
}

fn default_intraday_ttl() -> i64 {
    240
}

fn default_swing_ttl() -> i64 {
    72
}

fn default_markets() -> Vec<MarketSpec> {
    vec![
        MarketSpec {
            market: "NSE".to_string(),
            time_frame: TimeFrame::Intraday,
        },
        MarketSpec {
            market: "NSE".to_string(),
            time_frame: TimeFrame::Swing,
        },
    ]
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> anyhow::Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: PipelineConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a TOML file
pub fn save_config(config: &PipelineConfig, path: &str) -> anyhow::Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
