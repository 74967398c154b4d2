use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::AppError,
    storage::{
        elastic::{ElasticsearchClient, ElasticsearchCredentials},
        memory::MemoryStore,
        types::{bulk::BulkResponse, paragraph_document::ParagraphDocument},
    },
    utils::config::{AppConfig, StoreKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHealth {
    #[serde(default)]
    pub cluster_name: String,
    pub status: HealthStatus,
    #[serde(default)]
    pub number_of_nodes: u64,
}

/// The document store as seen by ingestion and queries.
///
/// Implementations own transport and wire formats; callers only deal in
/// [`ParagraphDocument`], [`BulkResponse`] and raw search bodies.
#[async_trait]
pub trait SearchStore: Send + Sync {
    async fn health(&self) -> Result<ClusterHealth, AppError>;

    async fn index_exists(&self, index: &str) -> Result<bool, AppError>;

    async fn create_index(&self, index: &str) -> Result<(), AppError>;

    async fn delete_index(&self, index: &str) -> Result<(), AppError>;

    async fn put_mapping(&self, index: &str, mapping: &Value) -> Result<(), AppError>;

    /// One request for the whole batch. `Err` means the request itself failed;
    /// rejected documents are reported through the returned items.
    async fn bulk_write(
        &self,
        index: &str,
        documents: &[ParagraphDocument],
    ) -> Result<BulkResponse, AppError>;

    /// Raw search answer, normalized by the retrieval layer.
    async fn search(&self, index: &str, body: &Value) -> Result<Value, AppError>;
}

pub type DynSearchStore = Arc<dyn SearchStore>;

/// Build the configured store once at startup.
pub fn connect_store(cfg: &AppConfig) -> Result<DynSearchStore, AppError> {
    match cfg.store {
        StoreKind::Elasticsearch => {
            let credentials = match (&cfg.elastic_username, &cfg.elastic_password) {
                (Some(username), password) => Some(ElasticsearchCredentials {
                    username: username.clone(),
                    password: password.clone(),
                }),
                (None, Some(_)) => {
                    warn!("elastic_password set without elastic_username; ignoring credentials");
                    None
                }
                (None, None) => None,
            };

            let client = match &cfg.elastic_cloud_id {
                Some(cloud_id) => ElasticsearchClient::from_cloud_id(
                    cloud_id,
                    credentials,
                    Duration::from_secs(cfg.request_timeout_secs),
                )?,
                None => ElasticsearchClient::new(
                    &cfg.elastic_url,
                    credentials,
                    Duration::from_secs(cfg.request_timeout_secs),
                )?,
            };
            info!(base_url = %client.base_url(), "Elasticsearch store configured");
            Ok(Arc::new(client))
        }
        StoreKind::Memory => {
            info!("In-memory store configured; documents are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// True when the store answers and does not report a red cluster.
pub async fn check_health(store: &dyn SearchStore) -> bool {
    match store.health().await {
        Ok(health) => health.status != HealthStatus::Red,
        Err(err) => {
            warn!(error = %err, "store health check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_health_parses_elasticsearch_shape() {
        let raw = serde_json::json!({
            "cluster_name": "docker-cluster",
            "status": "yellow",
            "timed_out": false,
            "number_of_nodes": 1,
            "active_shards": 4
        });
        let health: ClusterHealth = serde_json::from_value(raw).expect("health");
        assert_eq!(health.status, HealthStatus::Yellow);
        assert_eq!(health.number_of_nodes, 1);
    }

    #[test]
    fn memory_store_from_config() {
        let cfg = AppConfig {
            store: StoreKind::Memory,
            ..AppConfig::default()
        };
        assert!(connect_store(&cfg).is_ok());
    }

    #[tokio::test]
    async fn memory_store_reports_healthy() {
        let store = MemoryStore::new();
        assert!(check_health(&store).await);
    }
}
