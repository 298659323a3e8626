//! CLI module for the dispenser console
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `console` - Interactive operator console (one command per line)
//! - `health` - One-shot device health query
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Open the console against a device
//! dispenser console --endpoint 192.168.4.20 --api-key secret
//!
//! # Query health as JSON
//! TOKEN_DISPENSER_ENDPOINT=http://192.168.4.20 dispenser health --json
//!
//! # Generate shell completions
//! dispenser completions bash > ~/.bash_completion.d/dispenser
//! ```

pub mod completions;
pub mod config;
pub mod console;
pub mod health;
pub mod output;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::config::{ConfigError, DispenserConfig, ENV_API_KEY, ENV_ENDPOINT};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Dispenser console - operate and test a networked token dispenser
#[derive(Parser, Debug)]
#[command(
    name = "dispenser",
    version,
    about = "Operator console for a networked token dispenser"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the interactive console
    Console(ConsoleArgs),
    /// Query device health once
    Health(HealthArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Flags shared by every command that talks to the device.
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Device address (e.g., http://192.168.4.20)
    #[arg(short, long, env = ENV_ENDPOINT)]
    pub endpoint: Option<String>,

    /// API key sent as X-API-Key
    #[arg(short = 'k', long, env = ENV_API_KEY, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "DISPENSER_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl DeviceArgs {
    /// Load configuration with CLI overrides
    ///
    /// Precedence: CLI flags > environment > file > defaults.
    pub fn load_config(&self) -> Result<DispenserConfig, ConfigError> {
        let mut config = DispenserConfig::load(self.config.as_deref())?.with_env_overrides();

        if let Some(endpoint) = &self.endpoint {
            config.device.endpoint = endpoint.clone();
        }
        if let Some(api_key) = &self.api_key {
            config.device.api_key = api_key.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.device.timeout_ms = timeout_ms;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
}

#[derive(Args, Debug)]
pub struct HealthArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "dispenser.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
