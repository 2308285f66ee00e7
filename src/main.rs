// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! fit-relabel command line
//!
//! Rewrites the device identity of FIT activity files to a Garmin Edge 830
//! and uploads them to Garmin Connect.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fit_relabel::{
    config::Config,
    models::{BatchReport, FileOutcome},
    services::{
        batch::{list_candidates, BatchOptions, BatchProcessor, ProcessMode},
        monitor::{watch_directory, DirectoryMonitor},
        FileEditor, GarminConnectClient, UploadLedger,
    },
    time_utils::format_utc_rfc3339,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "fit-relabel",
    version,
    about = "Make FIT activity files look like they were recorded on a Garmin Edge 830"
)]
struct Cli {
    /// Edit files but do not write, upload or touch the ledger
    #[arg(long, global = true)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Drop event messages from edited files
    #[arg(long, global = true)]
    strip_events: bool,

    /// Keep `<name>_modified.fit` next to each uploaded file
    #[arg(long, global = true)]
    keep_edited: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Edit a single file
    Edit {
        /// Activity file to edit
        file: PathBuf,

        /// Output path (default: <name>_modified.fit next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Upload the edited file to Garmin Connect
        #[arg(long)]
        upload: bool,
    },

    /// Edit and upload every new activity file in a directory
    UploadAll {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Mark every activity file in a directory as already uploaded
    Seed {
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Replace the ledger instead of adding to it
        #[arg(long)]
        reset: bool,
    },

    /// Watch a directory and upload new activity files as they appear
    Watch {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    init_logging(cli.verbose, json_logs);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let mode = if cli.dry_run {
        ProcessMode::DryRun
    } else {
        ProcessMode::Upload
    };

    match &cli.command {
        Commands::Edit {
            file,
            output,
            upload,
        } => {
            let mut processor = processor(&config, &cli)?;
            let mut ledger = if *upload && mode == ProcessMode::Upload {
                Some(UploadLedger::for_directory(parent_dir(file))?)
            } else {
                None
            };
            let report = processor
                .edit_single(file, output.as_deref(), ledger.as_mut(), mode, *upload)
                .await?;

            println!(
                "{}: activity {}, {} identity message(s) rewritten",
                file.display(),
                format_utc_rfc3339(report.activity_timestamp),
                report.rewritten
            );
            if let Some(output) = &report.output {
                println!("wrote {}", output.display());
            }
            match report.upload {
                Some(outcome) => {
                    println!("{}", outcome);
                    if outcome.is_failure() {
                        return Ok(ExitCode::FAILURE);
                    }
                }
                None if *upload && mode == ProcessMode::DryRun => {
                    println!("dry run: not uploaded");
                }
                None => {}
            }
        }

        Commands::UploadAll { dir } => {
            let mut processor = processor(&config, &cli)?;
            let mut ledger = open_ledger(dir, mode)?;
            let report = processor.process_directory(dir, &mut ledger, mode).await?;
            print_report(&report);
        }

        Commands::Seed { dir, reset } => {
            let keys = list_candidates(dir)?
                .iter()
                .map(|path| config.ledger_key.key_for(path))
                .collect::<Result<Vec<_>, _>>()?;
            if mode == ProcessMode::DryRun {
                println!("dry run: would seed {} file(s)", keys.len());
                return Ok(ExitCode::SUCCESS);
            }

            let mut ledger = UploadLedger::for_directory(dir)?;
            if *reset {
                ledger.reset(keys)?;
                println!("ledger reset to {} file(s)", ledger.len());
            } else {
                let added = ledger.seed_all(keys)?;
                println!("seeded {} new file(s), {} total", added, ledger.len());
            }
        }

        Commands::Watch { dir } => {
            let processor = processor(&config, &cli)?;
            let ledger = open_ledger(dir, mode)?;
            let monitor_config = config.monitor_config();
            let (_watcher, events) = watch_directory(dir, monitor_config.queue_capacity)?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, stopping after current file");
                    let _ = shutdown_tx.send(true);
                }
            });

            let mut monitor = DirectoryMonitor::new(processor, ledger, monitor_config);
            let report = monitor.run(events, shutdown_rx, mode).await?;
            print_report(&report);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn processor(config: &Config, cli: &Cli) -> anyhow::Result<BatchProcessor<GarminConnectClient>> {
    let client = GarminConnectClient::new(config.api_base.clone(), config.upload_timeout)?;
    let editor = FileEditor::new(
        config.target_identity(),
        config.edit_options(cli.strip_events),
    );
    let options = BatchOptions {
        key_strategy: config.ledger_key,
        keep_edited: cli.keep_edited,
    };
    Ok(BatchProcessor::new(client, config.credentials(), editor, options))
}

/// Dry runs read the ledger but never create it.
fn open_ledger(dir: &Path, mode: ProcessMode) -> fit_relabel::error::Result<UploadLedger> {
    match mode {
        ProcessMode::DryRun => UploadLedger::load_directory(dir),
        ProcessMode::Upload => UploadLedger::for_directory(dir),
    }
}

fn parent_dir(file: &Path) -> &Path {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn print_report(report: &BatchReport) {
    for file in &report.files {
        if file.outcome != FileOutcome::SkippedDuplicate {
            println!("{}: {}", file.key, file.outcome);
        }
    }
    println!(
        "{} uploaded, {} already on Garmin Connect, {} skipped, {} failed",
        report.uploaded(),
        report.conflicts(),
        report.skipped(),
        report.failed()
    );
}

/// Initialize logging: human-readable by default, structured JSON when
/// `LOG_FORMAT=json`. `RUST_LOG` overrides the default filter.
fn init_logging(verbose: bool, json: bool) {
    let default = if verbose {
        "fit_relabel=debug"
    } else {
        "fit_relabel=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
