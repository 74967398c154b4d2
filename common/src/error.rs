use config::ConfigError;
use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Metadata field '{field}' missing in {file}")]
    MetadataMissing { field: String, file: String },
    #[error("Book boundary markers not found in {0}")]
    MalformedBookBoundary(String),
    #[error("Failed to list source directory {path}: {source}")]
    FileDiscovery {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read source file {path}: {source}")]
    SourceRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Store unreachable: {0}")]
    StoreUnreachable(String),
    #[error("Index reset failed: {0}")]
    IndexReset(String),
    #[error("Bulk write failed: {0}")]
    BulkWrite(String),
    #[error("Document at location {location} rejected: {reason}")]
    DocumentRejected { location: i64, reason: String },
    #[error("Invalid store response: {0}")]
    InvalidStoreResponse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Errors that abort a whole reload run rather than a single file.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            Self::StoreUnreachable(_) | Self::IndexReset(_) | Self::FileDiscovery { .. }
        )
    }
}
