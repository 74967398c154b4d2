use std::path::PathBuf;

use common::{storage::retry::RetryPolicy, utils::config::AppConfig};

#[derive(Debug, Clone)]
pub struct ReloadConfig {
    pub index_name: String,
    pub books_dir: PathBuf,
    pub bulk_batch_size: usize,
    /// Files parsed and loaded at the same time. Report order stays discovery order.
    pub ingest_concurrency: usize,
    pub retry: RetryPolicy,
}

impl ReloadConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            index_name: cfg.index_name.clone(),
            books_dir: PathBuf::from(&cfg.books_dir),
            bulk_batch_size: cfg.bulk_batch_size.max(1),
            ingest_concurrency: cfg.ingest_concurrency.max(1),
            retry: RetryPolicy::from_config(cfg),
        }
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}
