//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::schedule::ScheduleItem;

/// tq - drive messages through an in-process delay queue
#[derive(Parser)]
#[command(
    name = "tq",
    about = "Schedule messages on a delay queue and watch them come due",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Queue the given messages and print them as they come due
    Run {
        /// Messages as NAME@DELAY_MS[:PRIORITY]
        #[arg(value_name = "ITEM", required = true)]
        items: Vec<ScheduleItem>,

        /// Remove a queued message by name before draining
        #[arg(short, long, value_name = "NAME")]
        remove: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Feed a random schedule from a producer task while draining it
    Demo {
        /// Number of messages (defaults to the config value)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Upper bound for each delay in milliseconds
        #[arg(long)]
        max_delay_ms: Option<u64>,

        /// Seed for a reproducible schedule
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for delivery reports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Where `tq` writes its log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timequeue")
        .join("logs")
        .join("tq.log")
}
