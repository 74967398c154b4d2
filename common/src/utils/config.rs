use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Elasticsearch,
    Memory,
}

fn default_store_kind() -> StoreKind {
    StoreKind::Elasticsearch
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_store_kind")]
    pub store: StoreKind,
    #[serde(default = "default_elastic_url")]
    pub elastic_url: String,
    #[serde(default)]
    pub elastic_cloud_id: Option<String>,
    #[serde(default)]
    pub elastic_username: Option<String>,
    #[serde(default)]
    pub elastic_password: Option<String>,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_books_dir")]
    pub books_dir: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_bulk_batch_size")]
    pub bulk_batch_size: usize,
    #[serde(default = "default_search_page_size")]
    pub search_page_size: usize,
    /// Zero keeps retrying until the store answers.
    #[serde(default = "default_connect_max_attempts")]
    pub connect_max_attempts: usize,
    #[serde(default = "default_connect_base_delay_ms")]
    pub connect_base_delay_ms: u64,
    #[serde(default = "default_connect_max_delay_ms")]
    pub connect_max_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_ingest_concurrency")]
    pub ingest_concurrency: usize,
    #[serde(default)]
    pub reload_on_start: bool,
}

fn default_elastic_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index_name() -> String {
    "library".to_string()
}

fn default_books_dir() -> String {
    "./books".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_bulk_batch_size() -> usize {
    500
}

fn default_search_page_size() -> usize {
    9
}

fn default_connect_max_attempts() -> usize {
    10
}

fn default_connect_base_delay_ms() -> u64 {
    250
}

fn default_connect_max_delay_ms() -> u64 {
    5_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_ingest_concurrency() -> usize {
    1
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: default_store_kind(),
            elastic_url: default_elastic_url(),
            elastic_cloud_id: None,
            elastic_username: None,
            elastic_password: None,
            index_name: default_index_name(),
            books_dir: default_books_dir(),
            http_port: default_http_port(),
            bulk_batch_size: default_bulk_batch_size(),
            search_page_size: default_search_page_size(),
            connect_max_attempts: default_connect_max_attempts(),
            connect_base_delay_ms: default_connect_base_delay_ms(),
            connect_max_delay_ms: default_connect_max_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            ingest_concurrency: default_ingest_concurrency(),
            reload_on_start: false,
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default().try_parsing(true))
        .build()?;

    config.try_deserialize()
}
