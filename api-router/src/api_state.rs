use std::sync::Arc;

use common::{error::AppError, storage::client::DynSearchStore, utils::config::AppConfig};
use ingestion_pipeline::IngestionOrchestrator;
use retrieval_pipeline::LibrarySearch;

#[derive(Clone)]
pub struct ApiState {
    pub store: DynSearchStore,
    pub search: LibrarySearch,
    pub orchestrator: Arc<IngestionOrchestrator>,
}

impl ApiState {
    pub fn new(store: DynSearchStore, config: &AppConfig) -> Result<Self, AppError> {
        let orchestrator = Arc::new(IngestionOrchestrator::from_app_config(
            Arc::clone(&store),
            config,
        )?);
        let search = LibrarySearch::from_app_config(Arc::clone(&store), config);

        Ok(Self {
            store,
            search,
            orchestrator,
        })
    }
}
