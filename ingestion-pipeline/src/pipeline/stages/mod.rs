use std::path::{Path, PathBuf};

use common::{
    error::AppError,
    storage::{
        client::SearchStore, retry::wait_until_reachable, schema::paragraph_mapping,
        types::ingestion_report::BookLoadResult,
    },
};
use futures::{stream, StreamExt};
use state_machines::core::GuardError;
use tracing::{debug, info, instrument, warn};

use super::{
    config::ReloadConfig,
    context::ReloadContext,
    state::{DiscoveringFiles, Done, Idle, ParsingAndLoading, ReloadMachine, ResettingIndex},
};
use crate::{bulk_loader::BulkLoader, parser::BookParser};

const BOOK_SUFFIX: &str = "txt";

#[instrument(level = "trace", skip_all, fields(index = %ctx.config.index_name))]
pub async fn connect_to_store(
    machine: ReloadMachine<(), Idle>,
    ctx: &mut ReloadContext<'_>,
) -> Result<ReloadMachine<(), ResettingIndex>, AppError> {
    let machine = machine
        .connect()
        .map_err(|(_, guard)| map_guard_error("connect", &guard))?;

    match wait_until_reachable(ctx.store, &ctx.config.retry).await {
        Ok(health) => {
            debug!(cluster = %health.cluster_name, nodes = health.number_of_nodes, "store health");
            machine
                .reset()
                .map_err(|(_, guard)| map_guard_error("reset", &guard))
        }
        Err(err) => {
            let _failed = machine
                .fail()
                .map_err(|(_, guard)| map_guard_error("fail", &guard))?;
            Err(ctx.abort("connecting_to_store", err))
        }
    }
}

#[instrument(level = "trace", skip_all, fields(index = %ctx.config.index_name))]
pub async fn reset_index(
    machine: ReloadMachine<(), ResettingIndex>,
    ctx: &mut ReloadContext<'_>,
) -> Result<ReloadMachine<(), DiscoveringFiles>, AppError> {
    match recreate_index(ctx.store, &ctx.config.index_name).await {
        Ok(()) => {
            info!(index = %ctx.config.index_name, "index reset");
            machine
                .discover()
                .map_err(|(_, guard)| map_guard_error("discover", &guard))
        }
        Err(err) => {
            let _failed = machine
                .fail()
                .map_err(|(_, guard)| map_guard_error("fail", &guard))?;
            Err(ctx.abort("resetting_index", as_reset_error(err)))
        }
    }
}

#[instrument(level = "trace", skip_all, fields(books_dir = %ctx.config.books_dir.display()))]
pub async fn discover_files(
    machine: ReloadMachine<(), DiscoveringFiles>,
    ctx: &mut ReloadContext<'_>,
) -> Result<ReloadMachine<(), ParsingAndLoading>, AppError> {
    match list_books(&ctx.config.books_dir).await {
        Ok(files) => {
            info!(files = files.len(), "books discovered");
            ctx.report.files_discovered = files.len();
            ctx.files = files;
            machine
                .load()
                .map_err(|(_, guard)| map_guard_error("load", &guard))
        }
        Err(err) => {
            let _failed = machine
                .fail()
                .map_err(|(_, guard)| map_guard_error("fail", &guard))?;
            Err(ctx.abort("discovering_files", err))
        }
    }
}

/// Parse and load every discovered file. Per-file errors land in the report.
#[instrument(level = "trace", skip_all, fields(files = ctx.files.len()))]
pub async fn parse_and_load(
    machine: ReloadMachine<(), ParsingAndLoading>,
    ctx: &mut ReloadContext<'_>,
) -> Result<ReloadMachine<(), Done>, AppError> {
    let files = std::mem::take(&mut ctx.files);
    let store = ctx.store;
    let parser = ctx.parser;
    let config = ctx.config;

    let outcomes: Vec<(String, Result<BookLoadResult, AppError>)> = stream::iter(files)
        .map(move |path| async move {
            let file = display_name(&path);
            let outcome = load_file(store, parser, config, &path, &file).await;
            (file, outcome)
        })
        .buffered(config.ingest_concurrency.max(1))
        .collect()
        .await;

    for (file, outcome) in outcomes {
        match outcome {
            Ok(result) => ctx.report.record_book(result),
            Err(err) => {
                warn!(file = %file, error = %err, "skipping book");
                ctx.report.record_file_failure(file, err.to_string());
            }
        }
    }

    ctx.report.finish();
    machine
        .finish()
        .map_err(|(_, guard)| map_guard_error("finish", &guard))
}

async fn load_file(
    store: &dyn SearchStore,
    parser: &BookParser,
    config: &ReloadConfig,
    path: &Path,
    file: &str,
) -> Result<BookLoadResult, AppError> {
    info!(file, "processing book");
    let book = parser.parse(path).await?;
    BulkLoader::new(store, &config.index_name, config.bulk_batch_size)
        .load(file, &book)
        .await
}

async fn recreate_index(store: &dyn SearchStore, index: &str) -> Result<(), AppError> {
    if store.index_exists(index).await? {
        debug!(index, "deleting existing index");
        store.delete_index(index).await?;
    }
    store.create_index(index).await?;
    store.put_mapping(index, &paragraph_mapping()).await
}

fn as_reset_error(err: AppError) -> AppError {
    match err {
        AppError::IndexReset(_) => err,
        other => AppError::IndexReset(other.to_string()),
    }
}

/// `.txt` files directly under `dir`, sorted by name.
pub async fn list_books(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let discovery_error = |source: std::io::Error| AppError::FileDiscovery {
        path: dir.display().to_string(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(discovery_error)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(discovery_error)? {
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == BOOK_SUFFIX) {
            continue;
        }
        // Follows symlinks; a dangling link is skipped rather than failing the run.
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => files.push(path),
            Ok(_) => {}
            Err(err) => warn!(file = %path.display(), error = %err, "skipping unreadable entry"),
        }
    }
    files.sort();
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid reload pipeline transition during {event}: {guard:?}"
    ))
}
