#![allow(clippy::missing_docs_in_private_items)]

pub mod normalize;
pub mod query;

use common::{
    error::AppError,
    storage::{
        client::{check_health, DynSearchStore},
        types::query_result::QueryResult,
    },
    utils::config::AppConfig,
};
use serde_json::Value;
use tracing::{debug, instrument};

pub use normalize::normalize;
pub use query::{paragraph_range_query, term_query, DEFAULT_PAGE_SIZE};

/// Read-only queries over the paragraph index.
#[derive(Clone)]
pub struct LibrarySearch {
    store: DynSearchStore,
    index: String,
    page_size: usize,
}

impl LibrarySearch {
    pub fn new(store: DynSearchStore, index: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            index: index.into(),
            page_size: page_size.max(1),
        }
    }

    pub fn from_app_config(store: DynSearchStore, cfg: &AppConfig) -> Self {
        Self::new(store, cfg.index_name.clone(), cfg.search_page_size)
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    async fn run(&self, body: &Value) -> Result<QueryResult, AppError> {
        debug!(index = %self.index, query = %body, "search request");
        let raw = self.store.search(&self.index, body).await?;
        normalize(&raw)
    }

    /// One page of fuzzy matches for `term`, starting at hit `offset`.
    #[instrument(skip(self), fields(index = %self.index))]
    pub async fn search_by_term(&self, term: &str, offset: usize) -> Result<QueryResult, AppError> {
        let body = term_query(term, offset, self.page_size)?;
        self.run(&body).await
    }

    #[instrument(skip(self), fields(index = %self.index))]
    pub async fn get_paragraph_range(
        &self,
        title: &str,
        start: i64,
        end: i64,
    ) -> Result<QueryResult, AppError> {
        let body = paragraph_range_query(title, start, end)?;
        self.run(&body).await
    }

    pub async fn check_health(&self) -> bool {
        check_health(self.store.as_ref()).await
    }
}
