//! Command-line interface for voicebridge
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Real-time speech translation relay for BLE voice peripherals
#[derive(Parser, Debug)]
#[command(
    name = "voicebridge",
    version,
    about = "Real-time speech translation relay for BLE voice peripherals"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Advertised name of the peripheral to connect to
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Source language code (e.g. zh)
    #[arg(long, value_name = "LANG")]
    pub source_language: Option<String>,

    /// Target language code (e.g. en)
    #[arg(long, value_name = "LANG")]
    pub target_language: Option<String>,

    /// Write every captured segment to this directory as WAV
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay against a simulated peripheral (no hardware needed)
    Simulate {
        /// How long to run. Examples: 30s, 5m, 1h30m
        #[arg(
            long,
            short = 'd',
            value_name = "DURATION",
            default_value = "30s",
            value_parser = parse_duration_arg
        )]
        duration: Duration,
    },
    /// Validate the configuration and print the effective values
    CheckConfig,
}

/// Parse a duration string.
///
/// Supports any format accepted by `humantime`: single-unit (`30s`, `5m`,
/// `2h`) and compound (`1h30m`, `2m30s`).
fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s).map_err(|e| format!("invalid duration '{}': {}", s, e))
}
