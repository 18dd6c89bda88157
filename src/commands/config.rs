//! Configuration management command

use crate::config::Config;
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration (after applying all overrides)
    Show,

    /// Validate configuration file
    Validate,

    /// Print example configuration file
    Example,

    /// Show configuration file search paths
    Paths,
}

pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => run_show()?,
        ConfigCommands::Validate => run_validate()?,
        ConfigCommands::Example => run_example(),
        ConfigCommands::Paths => run_paths(),
    }

    Ok(())
}

fn run_show() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    println!("Current Configuration:");
    println!("=====================\n");

    let toml_str = toml::to_string_pretty(&config)?;
    println!("{}", toml_str);

    println!("\nConfiguration loaded successfully.");
    println!("Priority: CLI flags > Environment variables > Config file > Defaults");

    Ok(())
}

fn run_validate() -> Result<()> {
    println!("Validating configuration...\n");

    match Config::config_file_paths().iter().find(|p| p.exists()) {
        Some(path) => println!("Found config file: {}", path.display()),
        None => println!("No config file found, checking defaults and environment"),
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            println!("✗ Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    match config.validate() {
        Ok(()) => println!("✓ Configuration is valid"),
        Err(e) => {
            println!("✗ Configuration validation failed: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

fn run_example() {
    println!(
        r#"# Avail Indexer (avix) Configuration File
#
# Location priority (first found is used):
#   1. ./avix.toml (current directory)
#   2. ~/.config/avix/config.toml (user config)
#   3. /etc/avix/config.toml (system-wide)
#
# Override priority: CLI flags > Environment variables > Config file > Defaults
#
# Environment variables: AVIX_RPC_URL, AVIX_DB_PATH, AVIX_FEES_ENABLED,
#   AVIX_INPUT

[rpc]
# Node JSON-RPC endpoint, used for session storage and fee queries
url = "http://localhost:9944"
# Request timeout in milliseconds
timeout_ms = 30000
# Retry settings for transient failures
max_retries = 3
retry_initial_delay_ms = 1000
retry_max_delay_ms = 30000

[database]
# SQLite database path for indexed chain data
path = "./avix.db"

[fees]
# Query payment_queryInfo for calls in the modules below
enabled = true
modules = ["balances", "dataAvailability", "utility", "proxy", "multisig",
           "staking", "nominationPools", "session", "vector"]
# Native token decimals and the decimal places kept in fees_rounded
decimals = 18
precision = 4

[index]
# NDJSON file with one block per line; stdin when unset or "-"
# input = "./blocks.ndjson"
# Log progress every N block numbers (0 disables)
progress_interval = 100
"#
    );
}

fn run_paths() {
    println!("Configuration File Search Paths:");
    println!("================================\n");

    for (i, path) in Config::config_file_paths().iter().enumerate() {
        let exists = if path.exists() { "✓ EXISTS" } else { "  " };
        println!("{}. {} {}", i + 1, path.display(), exists);
    }

    println!("\nConfiguration files are searched in order from top to bottom.");
    println!("The first file found will be used.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_matches_defaults() {
        let example = r#"
[fees]
modules = ["balances", "dataAvailability", "utility", "proxy", "multisig",
           "staking", "nominationPools", "session", "vector"]
"#;
        let config: Config = toml::from_str(example).unwrap();
        assert_eq!(config.fees.modules, Config::default().fees.modules);
    }
}
