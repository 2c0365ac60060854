mod bunny;
mod cli;
mod collections;
mod config;
mod error;
mod files;
mod host;
mod job;
mod logging;
mod pipeline;
mod pool;
mod progress;
mod retry;
mod ui;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use tokio_util::sync::CancellationToken;

use bunny::BunnyClient;
use cli::{Cli, Command};
use config::UploaderConfig;
use job::Job;
use pipeline::JobPipeline;
use pool::{RunSummary, WorkerPool};
use ui::TerminalProgress;

/// Exit status after Ctrl-C, as shells report SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", Style::new().red().bold().apply_to("error:"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = UploaderConfig::load(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }
    if let Some(attempts) = cli.max_attempts {
        config.max_attempts = attempts;
    }

    match cli.command {
        Command::Scan { dir } => {
            if let Some(dir) = dir {
                config.source_dir = dir;
            }
            scan(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Upload {
            dir,
            keep_files,
            report,
        } => {
            if let Some(dir) = dir {
                config.source_dir = dir;
            }
            if keep_files {
                config.keep_files = true;
            }
            config.validate()?;
            upload(&config, cli.verbose, report.as_deref()).await
        }
    }
}

fn load_jobs(config: &UploaderConfig) -> Result<Vec<Job>> {
    let paths = files::enumerate(&config.source_dir, &config.extension)
        .with_context(|| format!("reading {}", config.source_dir.display()))?;
    Ok(Job::queue(paths, config.delimiter))
}

fn scan(config: &UploaderConfig) -> Result<()> {
    let jobs = load_jobs(config)?;
    if jobs.is_empty() {
        println!(
            "No .{} files in {}",
            config.extension,
            config.source_dir.display()
        );
        return Ok(());
    }

    let green = Style::new().green();
    let red = Style::new().red();
    for job in &jobs {
        match job.target() {
            Ok(target) => println!(
                "  {} {} → collection `{}`, title `{}`",
                green.apply_to("✓"),
                job.file_name,
                target.collection_name(),
                target.title()
            ),
            Err(err) => println!("  {} {}: {err}", red.apply_to("✗"), job.file_name),
        }
    }
    Ok(())
}

async fn upload(
    config: &UploaderConfig,
    verbose: bool,
    report_path: Option<&Path>,
) -> Result<ExitCode> {
    let jobs = load_jobs(config)?;
    if jobs.is_empty() {
        println!(
            "No .{} files in {}",
            config.extension,
            config.source_dir.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let host = Arc::new(
        BunnyClient::with_base_url(
            config.api_key.clone(),
            config.library_id.clone(),
            config.api_base_url.clone(),
        )
        .context("building HTTP client")?,
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let pipeline = Arc::new(
        JobPipeline::new(host, config.retry_policy())
            .keep_files(config.keep_files)
            .with_cancellation(cancel.clone()),
    );
    let pool = WorkerPool::new(config.max_workers).with_cancellation(cancel.clone());
    let progress = TerminalProgress::new(jobs.len(), !verbose);

    tracing::info!(
        jobs = jobs.len(),
        workers = pool.capacity(),
        dir = %config.source_dir.display(),
        "starting upload"
    );
    let summary = pool.run(jobs, pipeline, &progress).await;
    progress.finish(&summary);

    if let Some(path) = report_path {
        write_report(path, &summary)?;
    }

    if cancel.is_cancelled() {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// First Ctrl-C stops new launches and lets running jobs wind down at their
/// next step; a second one exits immediately.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("interrupted, waiting for running uploads to stop");
        eprintln!("Interrupted: finishing in-flight jobs (press Ctrl-C again to abort)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    });
}

fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}
