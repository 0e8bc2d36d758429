//! Command-line surface: argument parsing, logging setup and exit codes.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use tidemark_core::RunOutcome;
use tidemark_engine::{
    init, run_once, status, EngineConfig, PublishStatus, RunOptions, RunReport,
    DEFAULT_CONFIG_FILENAME,
};
use tidemark_logging::{ingest_error, ingest_info, LogDestination};

/// Exit status for a publish failure after an otherwise clean run.
pub(crate) const EXIT_PUBLISH_FAILED: u8 = 3;

/// Tidemark: resume-where-you-left-off ingestion of an append-only source.
#[derive(Debug, Parser)]
#[command(name = "tidemark", version, long_about = None)]
pub(crate) struct Cli {
    /// RON configuration file. Missing file means built-in defaults.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILENAME)]
    pub config: PathBuf,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Verbosity (-v debug, -vv trace). Overrides the configured level.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Discover, fetch, render and advance the watermark once.
    Run {
        /// Seed for a first run when no watermark exists yet.
        #[arg(long)]
        baseline: Option<u64>,

        /// Process at most this many candidates.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_items: Option<u64>,

        /// Do not commit artifacts even if publishing is configured.
        #[arg(long)]
        no_publish: bool,
    },

    /// Show the watermark and the mode the next run would use.
    Status,

    /// Seed or move the watermark forward to a baseline id.
    Init {
        #[arg(long)]
        baseline: u64,

        /// Write the effective configuration to the config path if it does not exist.
        #[arg(long)]
        write_config: bool,
    },
}

pub(crate) fn run(cli: Cli) -> Result<u8> {
    let config = EngineConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&cli, &config);

    match cli.command {
        Command::Run {
            baseline,
            max_items,
            no_publish,
        } => {
            let options = RunOptions {
                baseline,
                max_items: max_items.map(|n| n as usize),
                no_publish,
            };
            let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
            let report = runtime
                .block_on(run_once(&config, &options, Utc::now()))
                .context("run failed")?;
            println!("{}", report.summary);
            let code = exit_code(&report);
            if code != 0 {
                ingest_error!("run ended with {:?}", report.summary.outcome());
            }
            Ok(code)
        }
        Command::Status => {
            let report = status(&config, Utc::now()).context("reading watermark")?;
            let wm = &report.watermark;
            println!("last_processed_id: {}", wm.last_processed_id);
            println!("last_processed_reference: {}", wm.last_processed_reference);
            println!("last_run_at: {}", wm.last_run_at.to_rfc3339());
            println!("last_mode: {}", wm.last_mode);
            println!("next_mode: {}", report.next_mode);
            println!("recorded_misses: {}", wm.misses.len());
            for miss in &wm.misses {
                println!("  {} {} {}", miss.id, miss.reason, miss.at.to_rfc3339());
            }
            Ok(0)
        }
        Command::Init {
            baseline,
            write_config,
        } => {
            let wm = init(&config, baseline, Utc::now()).context("initializing watermark")?;
            if write_config && !cli.config.exists() {
                fs::write(&cli.config, config.to_ron_pretty()?)
                    .with_context(|| format!("writing {}", cli.config.display()))?;
                ingest_info!("wrote default configuration to {}", cli.config.display());
            }
            println!("watermark: {}", wm.last_processed_id);
            Ok(0)
        }
    }
}

/// Run outcome first; a publish failure only matters when the run itself was clean.
pub(crate) fn exit_code(report: &RunReport) -> u8 {
    let outcome = report.summary.outcome();
    if outcome.exit_code() != 0 {
        return outcome.exit_code() as u8;
    }
    match (&report.publish, outcome) {
        (PublishStatus::Failed(_), RunOutcome::Completed) => EXIT_PUBLISH_FAILED,
        _ => 0,
    }
}

fn init_logging(cli: &Cli, config: &EngineConfig) {
    let level = match cli.verbose {
        0 => tidemark_logging::parse_level(&config.log.level),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let destination = match cli.log_file.clone().or_else(|| config.log.file.clone()) {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    tidemark_logging::initialize(destination, level);
}
