//! Runtime Configuration
//!
//! Spreads used by the planner and refiner, output settings for the CLI and
//! the optional run log. Loaded from the environment (and `.env`) or a TOML
//! file.

use chrono::{DateTime, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::auction::DEFAULT_PRICE_SPREAD;
use crate::fixed::Weight;

// ============================================
// OUTPUT FORMAT
// ============================================

/// How the CLI renders results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Styled console tables
    #[default]
    Table,

    /// One JSON document on stdout
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "TABLE"),
            OutputFormat::Json => write!(f, "JSON"),
        }
    }
}

impl OutputFormat {
    fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Auction Pricing ==========
    /// Planner spread around the fair rate (0.01 = 1%)
    pub price_spread: f64,

    /// Spread used when an auction is opened
    pub open_price_spread: f64,

    // ========== Output ==========
    pub output_format: OutputFormat,

    /// Print every simulated fill
    pub show_steps: bool,

    /// Append a JSON line per command to this file
    pub run_log_path: Option<String>,

    // ========== Logging ==========
    /// `tracing` filter used when RUST_LOG is unset
    pub log_directive: String,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            price_spread: env::var("REBALANCE_PRICE_SPREAD")
                .unwrap_or_else(|_| DEFAULT_PRICE_SPREAD.to_string())
                .parse()
                .unwrap_or(DEFAULT_PRICE_SPREAD),
            open_price_spread: env::var("REBALANCE_OPEN_PRICE_SPREAD")
                .unwrap_or_else(|_| DEFAULT_PRICE_SPREAD.to_string())
                .parse()
                .unwrap_or(DEFAULT_PRICE_SPREAD),
            output_format: OutputFormat::from_name(
                &env::var("REBALANCE_OUTPUT").unwrap_or_else(|_| "table".to_string()),
            ),
            show_steps: env::var("REBALANCE_SHOW_STEPS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            run_log_path: env::var("REBALANCE_RUN_LOG").ok(),
            log_directive: env::var("REBALANCE_LOG")
                .unwrap_or_else(|_| "dtf_rebalance=info".to_string()),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, spread) in [
            ("REBALANCE_PRICE_SPREAD", self.price_spread),
            ("REBALANCE_OPEN_PRICE_SPREAD", self.open_price_spread),
        ] {
            if !(0.0..1.0).contains(&spread) {
                return Err(eyre::eyre!(
                    "{} must be within [0, 1) (currently {})",
                    name,
                    spread
                ));
            }
        }

        if self.log_directive.trim().is_empty() {
            return Err(eyre::eyre!("REBALANCE_LOG must not be empty"));
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║             DTF REBALANCE - CONFIGURATION                  ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ AUCTION PRICING                                            ║");
        println!("║ • Plan Spread:     {:>39.2}% ║", self.price_spread * 100.0);
        println!("║ • Open Spread:     {:>39.2}% ║", self.open_price_spread * 100.0);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ OUTPUT                                                     ║");
        println!("║ • Format:          {:^40} ║", self.output_format);
        println!("║ • Show Steps:      {:^40} ║",
            if self.show_steps { "✓ Enabled" } else { "✗ Disabled" }
        );
        println!("║ • Run Log:         {:^40} ║",
            self.run_log_path.as_deref().unwrap_or("✗ Disabled")
        );
        println!("║ • Log Filter:      {:^40} ║", self.log_directive);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            price_spread: DEFAULT_PRICE_SPREAD,
            open_price_spread: DEFAULT_PRICE_SPREAD,
            output_format: OutputFormat::Table,
            show_steps: false,
            run_log_path: None,
            log_directive: "dtf_rebalance=info".to_string(),
        }
    }
}

// ============================================
// RUN LOGGER
// ============================================

/// Record of one CLI command, appended as a JSON line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub scenario: String,
    pub auctions: usize,
    pub basket: Vec<Weight>,
}

impl RunLog {
    pub fn new(command: &str, scenario: &str, auctions: usize, basket: Vec<Weight>) -> Self {
        Self {
            timestamp: Utc::now(),
            command: command.to_string(),
            scenario: scenario.to_string(),
            auctions,
            basket,
        }
    }

    /// Append this log to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// TESTS
// ============================================
