use std::path::PathBuf;

use common::{
    error::AppError,
    storage::{client::SearchStore, types::ingestion_report::IngestionReport},
};
use tracing::error;

use super::config::ReloadConfig;
use crate::parser::BookParser;

pub struct ReloadContext<'a> {
    pub store: &'a dyn SearchStore,
    pub config: &'a ReloadConfig,
    pub parser: &'a BookParser,
    pub files: Vec<PathBuf>,
    pub report: IngestionReport,
}

impl<'a> ReloadContext<'a> {
    pub fn new(
        store: &'a dyn SearchStore,
        config: &'a ReloadConfig,
        parser: &'a BookParser,
    ) -> Self {
        Self {
            store,
            config,
            parser,
            files: Vec::new(),
            report: IngestionReport::started(),
        }
    }

    pub fn abort(&self, stage: &str, err: AppError) -> AppError {
        error!(
            stage,
            index = %self.config.index_name,
            error = %err,
            "reload aborted"
        );
        err
    }

    pub fn into_report(self) -> IngestionReport {
        self.report
    }
}
