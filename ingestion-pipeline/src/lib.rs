#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod bulk_loader;
pub mod metadata;
pub mod parser;
pub mod pipeline;
pub mod segmenter;

pub use pipeline::{IngestionOrchestrator, ReloadConfig};
