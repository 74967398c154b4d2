use std::process::ExitCode;

use common::{
    error::AppError,
    storage::{client::connect_store, types::ingestion_report::IngestionReport},
    utils::config::get_config,
};
use ingestion_pipeline::IngestionOrchestrator;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

async fn run() -> Result<IngestionReport, AppError> {
    let config = get_config()?;
    let store = connect_store(&config)?;
    let orchestrator = IngestionOrchestrator::from_app_config(store, &config)?;
    orchestrator.run_full_reload().await
}

fn log_failures(report: &IngestionReport) {
    for failure in &report.files_failed {
        warn!(file = %failure.file, reason = %failure.reason, "file not loaded");
    }
    for failure in report.batch_failures() {
        warn!(
            title = %failure.title,
            first_location = failure.first_location,
            last_location = failure.last_location,
            reason = %failure.reason,
            "batch not loaded"
        );
    }
    for failure in report.document_failures() {
        warn!(
            title = %failure.title,
            location = failure.location,
            snippet = %failure.snippet,
            reason = %failure.reason,
            "document rejected"
        );
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    match run().await {
        Ok(report) => {
            log_failures(&report);
            info!(
                files_processed = report.files_processed,
                files_failed = report.files_failed.len(),
                documents_indexed = report.documents_indexed(),
                "load finished"
            );
            if report.files_failed.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!(error = %err, "load aborted");
            ExitCode::FAILURE
        }
    }
}
