//! tq - delay queue driver
//!
//! CLI entry point for running schedules through a `TimeQueue`.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use timequeue::cli::{Cli, Command, OutputFormat, get_log_path};
use timequeue::config::Config;
use timequeue::schedule::{self, RunReport, ScheduleItem};
use timequeue::{Context as QueueContext, TimeQueue};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't up yet, so nothing here can trace
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run { items, remove, format } => cmd_run(&config, &items, &remove, format).await,
        Command::Demo {
            count,
            max_delay_ms,
            seed,
            format,
        } => cmd_demo(&config, count, max_delay_ms, seed, format).await,
    }
}

/// Queue the given items, apply removals and print deliveries
async fn cmd_run(config: &Config, items: &[ScheduleItem], remove: &[String], format: OutputFormat) -> Result<()> {
    debug!(items = items.len(), ?remove, %format, "cmd_run: called");
    let queue = TimeQueue::with_config(config.queue.clone());
    let ctx = QueueContext::background();

    let report = schedule::run_schedule(&queue, &ctx, items, remove).await?;
    print_report(&report, format)
}

/// Generate a random schedule and run it with a concurrent producer
async fn cmd_demo(
    config: &Config,
    count: Option<usize>,
    max_delay_ms: Option<u64>,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    debug!(?count, ?max_delay_ms, ?seed, %format, "cmd_demo: called");
    let mut demo = config.demo.clone();
    if let Some(count) = count {
        demo.count = count;
    }
    if let Some(max_delay_ms) = max_delay_ms {
        demo.max_delay_ms = max_delay_ms;
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let items: Vec<ScheduleItem> = (0..demo.count)
        .map(|i| ScheduleItem::random(&mut rng, i, &demo))
        .collect();

    if format == OutputFormat::Text {
        println!("Scheduled {} messages:", items.len());
        for item in &items {
            println!("  {:<10} +{:>6}ms  priority {}", item.name, item.delay.as_millis(), item.priority);
        }
        println!();
    }

    // Spread arrivals so later, shorter delays preempt the consumer
    let stagger = schedule::demo_stagger(&demo);

    let queue = Arc::new(TimeQueue::with_config(config.queue.clone()));
    let ctx = QueueContext::background();
    let report = schedule::run_concurrent(queue, &ctx, items, stagger).await?;
    print_report(&report, format)
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            println!("{:<16} {:>8} {:>10} {:>10} {:>8}", "ID", "PRIORITY", "SCHEDULED", "FIRED", "LATE");
            for d in &report.delivered {
                println!(
                    "{:<16} {:>8} {:>8}ms {:>8}ms {:>6}ms",
                    d.id, d.priority, d.scheduled_ms, d.fired_ms, d.lateness_ms
                );
            }
            if !report.removed.is_empty() {
                println!("\nRemoved: {}", report.removed.join(", "));
            }
            if !report.missing.is_empty() {
                println!("Not queued: {}", report.missing.join(", "));
            }
        }
    }
    Ok(())
}
