//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rtstream - real-time streaming pipeline
#[derive(Parser, Debug)]
#[command(
    name = "rtstream",
    author,
    version,
    about = "Real-time streaming pipeline",
    long_about = "Ingests records from API, database, file, IoT and synthetic sources,\n\
                  runs them through validate/filter/enrich/aggregate/analytics stages\n\
                  and broadcasts the results to live subscribers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RTSTREAM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "RTSTREAM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the streaming pipeline until Ctrl+C (or --duration)
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "RTSTREAM_CONFIG")]
    pub config: PathBuf,

    /// Start a single synthetic source with this name/profile
    /// (user_events, sensor_data, ...); the config file becomes optional
    #[arg(long, env = "RTSTREAM_SOURCE")]
    pub source: Option<String>,

    /// Polling interval in seconds for --source
    #[arg(long, default_value = "1.0", requires = "source")]
    pub interval: f64,

    /// Stop after this many seconds (0 = run until Ctrl+C)
    #[arg(long, default_value = "0", env = "RTSTREAM_DURATION")]
    pub duration: u64,

    /// Write every event as a JSON line to stdout
    #[arg(long)]
    pub emit_stdout: bool,

    /// Log a summary of every event
    #[arg(long)]
    pub log_events: bool,

    /// Validate configuration and exit without running the pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "RTSTREAM_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show source parameters
    #[arg(long)]
    pub sources: bool,

    /// Show processor rules (filters, thresholds)
    #[arg(long)]
    pub rules: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_source() {
        let cli = Cli::parse_from([
            "rtstream",
            "-v",
            "run",
            "--source",
            "user_events",
            "--interval",
            "0.5",
            "--emit-stdout",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.source.as_deref(), Some("user_events"));
                assert_eq!(args.interval, 0.5);
                assert!(args.emit_stdout);
                assert_eq!(args.duration, 0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["rtstream", "-q", "-v", "info"]).is_err());
    }
}
