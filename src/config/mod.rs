pub mod toml_config;

pub use toml_config::ProvisionConfig;

#[cfg(feature = "cli")]
use crate::utils::logger::LogFormat;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "journal-provision")]
#[command(about = "Provision the trading journal API as a Windows service")]
#[command(version)]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "provision.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Log what would be done without changing the host
    #[arg(long)]
    pub dry_run: bool,

    /// Print the provisioning report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Per-command timeout in seconds, overrides execution.command_timeout_seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}
