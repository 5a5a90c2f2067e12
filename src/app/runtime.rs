use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use timelapse_dl_core::download::{CancellationHandle, LogSink, ProgressSink, RetryPolicy};
use timelapse_dl_core::listing::{ListingError, base_url};
use timelapse_dl_core::{BatchRunner, DownloadEngine, EngineOptions, HttpClient, fetch_archives};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::app::config::{self, Settings};
use crate::app::progress_manager::ConsoleReporter;
use crate::app::{exit_handler, terminal};
use crate::cli::Args;
use crate::{ProcessExit, output};

pub(crate) async fn run_timelapse_dl() -> Result<ProcessExit> {
    let args = Args::parse();

    terminal::init_tracing(
        terminal::resolve_default_log_level(&args),
        terminal::no_color_env_requested() || terminal::is_dumb_terminal(),
    );
    let file_config = config::load_file_config(args.config.as_deref())?;
    let settings = config::resolve_settings(&args, file_config.as_ref())?;
    debug!(
        host = %settings.host,
        outdir = %settings.outdir.display(),
        from_file = file_config.is_some(),
        "settings resolved"
    );

    tokio::fs::create_dir_all(&settings.outdir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory '{}'",
                settings.outdir.display()
            )
        })?;

    let client = HttpClient::new(settings.timeout)
        .context("Failed to build HTTP client")?
        .with_credentials(settings.credentials.clone());

    println!("{}", output::fetching_line(&settings.host));
    let archives = match list_archives(&client, &settings).await {
        Ok(archives) => archives,
        Err(error) => {
            eprintln!("ERROR: Failed to fetch archives: {error}");
            return Ok(ProcessExit::ListingFailed);
        }
    };

    if archives.is_empty() {
        println!("{}", output::NO_ARCHIVES_MESSAGE);
        return Ok(ProcessExit::Success);
    }
    println!("{}", output::found_line(archives.len()));

    let cancel = CancellationHandle::new();
    let interrupt_handler = spawn_interrupt_handler(cancel.clone());

    let show_progress = terminal::should_show_progress(
        settings.progress,
        io::stdout().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let reporter = Arc::new(ConsoleReporter::new(show_progress));
    let progress: Arc<dyn ProgressSink> = reporter.clone();
    let log: Arc<dyn LogSink> = reporter;
    let engine = DownloadEngine::new(Arc::new(client), engine_options(&settings))
        .with_progress(progress)
        .with_log(log);
    let runner = BatchRunner::new(engine, settings.outdir.clone());

    let summary = runner.run(&archives, &cancel).await;
    interrupt_handler.abort();

    if let Some(notice) = output::stopping_notice(&summary) {
        eprintln!("{notice}");
    }
    info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        "Download complete"
    );
    output::print_run_report(&summary);

    Ok(exit_handler::determine_exit_outcome(&summary))
}

async fn list_archives(
    client: &HttpClient,
    settings: &Settings,
) -> Result<Vec<timelapse_dl_core::ArchiveDescriptor>, ListingError> {
    let base = base_url(&settings.host, settings.https)?;
    fetch_archives(client, &base).await
}

fn engine_options(settings: &Settings) -> EngineOptions {
    EngineOptions {
        overwrite: settings.overwrite,
        check_size: settings.check_size,
        rate_limit_mbps: settings.rate_limit_mbps,
        retry_policy: RetryPolicy::new(settings.max_retries, settings.retry_delay),
    }
}

/// First Ctrl+C requests a graceful stop; a second one exits immediately.
fn spawn_interrupt_handler(cancel: CancellationHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        cancel.request();
        eprintln!("\n\nInterrupted by user (Ctrl+C). Cleaning up and exiting gracefully...");
        eprintln!("Press Ctrl+C again to force exit.");

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nForce exit!");
            std::process::exit(ProcessExit::Interrupted.code());
        }
    })
}
