//! Configuration management for avix

use crate::indexer::extrinsics::default_fee_modules;
use crate::indexer::{FeePolicy, IndexerOptions};
use crate::rpc::RetryConfig;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub fees: FeesConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Maximum retry attempts for transient failures (0 = no retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_retry_initial_delay")]
    pub retry_initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesConfig {
    /// Query `payment_queryInfo` for allow-listed calls
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Call modules whose extrinsics get a fee lookup
    #[serde(default = "default_fee_modules")]
    pub modules: Vec<String>,

    /// Decimal places of the native token
    #[serde(default = "default_decimals")]
    pub decimals: u32,

    /// Decimal places kept in the rounded fee
    #[serde(default = "default_precision")]
    pub precision: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// NDJSON block file; stdin when unset or "-"
    #[serde(default)]
    pub input: Option<String>,

    /// Log progress every N block numbers (0 disables)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

// Default values
fn default_rpc_url() -> String {
    "http://localhost:9944".to_string()
}

fn default_timeout() -> u64 {
    30000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_initial_delay() -> u64 {
    1000 // 1 second
}

fn default_retry_max_delay() -> u64 {
    30000 // 30 seconds
}

fn default_db_path() -> String {
    "./avix.db".to_string()
}

fn default_true() -> bool {
    true
}

fn default_decimals() -> u32 {
    18
}

fn default_precision() -> u32 {
    4
}

fn default_progress_interval() -> u64 {
    100
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            timeout_ms: default_timeout(),
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

impl RpcConfig {
    /// Convert to RetryConfig for use with RpcClient
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_delay_ms: self.retry_initial_delay_ms,
            max_delay_ms: self.retry_max_delay_ms,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            modules: default_fee_modules(),
            decimals: default_decimals(),
            precision: default_precision(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            input: None,
            progress_interval: default_progress_interval(),
        }
    }
}

impl Config {
    /// Load configuration from file, environment, and defaults
    /// Priority: Environment variables > Config file > Defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // Try to load from config file (multiple locations)
        if let Some((file_config, config_path)) = Self::load_from_file()? {
            tracing::info!("Loaded configuration from: {}", config_path.display());
            config = file_config;
        } else {
            tracing::info!("Using default configuration (no config file found)");
        }

        // Override with environment variables
        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from file (searches multiple locations)
    fn load_from_file() -> Result<Option<(Self, PathBuf)>> {
        let paths = Self::config_file_paths();

        for path in &paths {
            if path.exists() {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

                let config: Config = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

                return Ok(Some((config, path.clone())));
            }
        }

        Ok(None)
    }

    /// Get list of config file paths to search (in order of priority)
    pub fn config_file_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Current directory
        paths.push(PathBuf::from("./avix.toml"));

        // 2. User config directory (~/.config/avix/config.toml)
        if let Some(proj_dirs) = ProjectDirs::from("io", "avail", "avix") {
            paths.push(proj_dirs.config_dir().join("config.toml"));
        }

        // 3. System-wide location
        paths.push(PathBuf::from("/etc/avix/config.toml"));

        paths
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("AVIX_RPC_URL") {
            self.rpc.url = url;
        }

        if let Ok(db_path) = std::env::var("AVIX_DB_PATH") {
            self.database.path = db_path;
        }

        if let Ok(enabled) = std::env::var("AVIX_FEES_ENABLED") {
            if let Some(enabled) = parse_bool(&enabled) {
                self.fees.enabled = enabled;
            }
        }

        if let Ok(input) = std::env::var("AVIX_INPUT") {
            self.index.input = Some(input);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Validate RPC URL
        if !self.rpc.url.starts_with("http://") && !self.rpc.url.starts_with("https://") {
            anyhow::bail!("Invalid RPC URL: {}", self.rpc.url);
        }

        if self.database.path.trim().is_empty() {
            anyhow::bail!("Database path must not be empty");
        }

        if self.fees.decimals > 38 {
            anyhow::bail!("Fee decimals must be at most 38, got {}", self.fees.decimals);
        }

        if self.fees.precision > self.fees.decimals {
            anyhow::bail!(
                "Fee precision ({}) cannot exceed token decimals ({})",
                self.fees.precision,
                self.fees.decimals
            );
        }

        Ok(())
    }

    /// Orchestrator settings derived from the `[fees]` and `[index]` sections
    pub fn indexer_options(&self) -> IndexerOptions {
        IndexerOptions {
            fee_policy: FeePolicy {
                modules: self.fees.modules.clone(),
                decimals: self.fees.decimals,
                precision: self.fees.precision,
            },
            progress_interval: self.index.progress_interval,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
