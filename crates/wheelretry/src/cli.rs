//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use wheelretry_core::types::{TimeUnit, WheelRetryConfig};

/// wheelretry - Run commands with fixed-delay retries
#[derive(Parser, Debug)]
#[command(name = "wheelretry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to wheelretry.yaml config file
    #[arg(short, long, global = true, env = "WHEELRETRY_CONFIG")]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command, retrying it on failure
    Run(RunArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show version information
    Version(VersionArgs),
}

// Run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task name used in log output (defaults to the program name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Delay between attempts, in --delay-unit
    #[arg(short, long)]
    pub delay: Option<u64>,

    /// Unit of --delay (ns, us, ms, s, m, h, d or the full name)
    #[arg(short = 'u', long)]
    pub delay_unit: Option<TimeUnit>,

    /// Number of retries after the first attempt
    #[arg(short, long)]
    pub max_attempts: Option<u32>,

    /// Scheduler tick in milliseconds
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Command to run, after `--`
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Apply flag overrides on top of the loaded configuration
    pub fn apply_to(&self, config: &mut WheelRetryConfig) {
        if let Some(delay) = self.delay {
            config.retry.delay = delay;
        }
        if let Some(unit) = self.delay_unit {
            config.retry.delay_unit = unit;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.scheduler.tick_duration_ms = tick_ms;
        }
    }
}

// Config commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration
    Show(ConfigShowArgs),

    /// Validate the configuration
    Validate,
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
