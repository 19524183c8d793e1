//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use kumite_core::config::LogFormat;

/// Serial gesture telemetry bridge: reads `LABEL: VALUE` score lines from a
/// serial device and serves the current winning label over HTTP.
#[derive(Debug, Parser)]
#[command(name = "kumite", version, about)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "kumite.toml", env = "KUMITE_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge (serial reader + HTTP server)
    Run(RunArgs),

    /// Inspect or create the configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Serial device path (overrides config)
    #[arg(long)]
    pub device: Option<String>,

    /// HTTP listen port (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Log level (overrides config)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log output format (overrides config)
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write the default configuration file (refuses to overwrite)
    Init,
    /// Print the effective configuration as TOML
    Show,
}

/// clap-friendly mirror of [`LogFormat`].
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}
