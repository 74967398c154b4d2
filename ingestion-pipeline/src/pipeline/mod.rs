mod config;
mod context;
mod stages;
mod state;

pub use config::ReloadConfig;
pub use stages::list_books;

use std::time::Instant;

use common::{
    error::AppError,
    storage::{client::DynSearchStore, types::ingestion_report::IngestionReport},
    utils::config::AppConfig,
};
use tokio::sync::Mutex;
use tracing::info;

use self::{
    context::ReloadContext,
    stages::{connect_to_store, discover_files, parse_and_load, reset_index},
    state::idle,
};
use crate::parser::BookParser;

/// Drives a full reload: wait for the store, reset the index, then parse and
/// load every book file. Runs are serialized so two reloads never interleave
/// their index resets.
pub struct IngestionOrchestrator {
    store: DynSearchStore,
    config: ReloadConfig,
    parser: BookParser,
    run_lock: Mutex<()>,
}

impl IngestionOrchestrator {
    pub fn new(store: DynSearchStore, config: ReloadConfig) -> Result<Self, AppError> {
        Ok(Self {
            store,
            config,
            parser: BookParser::new()?,
            run_lock: Mutex::new(()),
        })
    }

    pub fn from_app_config(store: DynSearchStore, cfg: &AppConfig) -> Result<Self, AppError> {
        Self::new(store, ReloadConfig::from_app_config(cfg))
    }

    pub fn config(&self) -> &ReloadConfig {
        &self.config
    }

    fn duration_millis(started: Instant) -> u64 {
        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    #[tracing::instrument(
        skip_all,
        fields(
            index = %self.config.index_name,
            books_dir = %self.config.books_dir.display()
        )
    )]
    pub async fn run_full_reload(&self) -> Result<IngestionReport, AppError> {
        let _running = self.run_lock.lock().await;
        let mut ctx = ReloadContext::new(self.store.as_ref(), &self.config, &self.parser);

        let started = Instant::now();
        let machine = idle();

        let stage_start = Instant::now();
        let machine = connect_to_store(machine, &mut ctx).await?;
        let connect_ms = Self::duration_millis(stage_start);

        let stage_start = Instant::now();
        let machine = reset_index(machine, &mut ctx).await?;
        let reset_ms = Self::duration_millis(stage_start);

        let machine = discover_files(machine, &mut ctx).await?;

        let stage_start = Instant::now();
        let _machine = parse_and_load(machine, &mut ctx).await?;
        let load_ms = Self::duration_millis(stage_start);

        let report = ctx.into_report();
        info!(
            files_discovered = report.files_discovered,
            files_processed = report.files_processed,
            files_failed = report.files_failed.len(),
            documents_indexed = report.documents_indexed(),
            failures = report.failure_count(),
            total_ms = Self::duration_millis(started),
            connect_ms,
            reset_ms,
            load_ms,
            "reload finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests;
