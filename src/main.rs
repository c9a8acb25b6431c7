//! ssexport - saved-search CSV exporter
//!
//! Exports the documents behind a saved search into a spreadsheet-safe CSV
//! file.
//!
//! # Usage
//!
//! ```bash
//! # Last day of a saved search into the current directory
//! ssexport export 571aaf70-4c88-11e8-b3d7-01146121b73d --from 2024-05-01T00:00:00Z
//!
//! # First 500 rows to stdout
//! ssexport export 571aaf70-4c88-11e8-b3d7-01146121b73d --from 0 --limit 500 --stdout
//! ```

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use saved_search_export::cli::{CliInterface, ExportArgs, check_range};
use saved_search_export::error::Result;
use saved_search_export::executor::{ExportExecutor, ReportArtifact};
use saved_search_export::executor::export::writers::write_artifact;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments
/// 2. Load configuration
/// 3. Initialize logging
/// 4. Handle subcommands or run the export
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    match cli.export_args() {
        Some(args) => run_export(&cli, args).await,
        None => Ok(()),
    }
}

/// Run one export and deliver its artifact
async fn run_export(cli: &CliInterface, args: &ExportArgs) -> Result<()> {
    let config = cli.config();
    let request = args.to_request(config, Utc::now());
    check_range(&request)?;

    // Ctrl+C cancels the export; the scroll cursor is still released
    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();
    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel_token_clone.cancel(),
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let mut executor = ExportExecutor::from_config(config)?.with_cancellation(cancel_token);
    if let Some(deadline) = args.deadline() {
        executor = executor.with_deadline(deadline);
    }

    let result = executor
        .export(&args.saved_search_id, &request, args.report_name.as_deref())
        .await;
    ctrl_c_handle.abort();

    deliver(cli, args, &result?).await
}

/// Print the artifact or write it into the output directory
async fn deliver(cli: &CliInterface, args: &ExportArgs, artifact: &ReportArtifact) -> Result<()> {
    let outcome = &artifact.outcome;

    if args.stdout {
        if !artifact.body.is_empty() {
            println!("{}", artifact.body);
        }
        return Ok(());
    }

    if artifact.body.is_empty() {
        eprintln!("No documents matched; nothing was written");
        return Ok(());
    }

    let (path, size) = write_artifact(
        &cli.config().export.output_dir,
        &artifact.file_name,
        &artifact.body,
    )
    .await?;

    eprintln!(
        "Exported {} of {} matching documents to {} ({} bytes, {} ms)",
        outcome.records_exported,
        outcome.matching_count,
        path.display(),
        size,
        outcome.timings.total_ms()
    );
    Ok(())
}

/// Initialize logging system based on verbosity level
///
/// Logs go to stderr so `--stdout` output stays clean.
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
