use std::path::Path;

use common::{error::AppError, storage::types::parsed_book::ParsedBook};
use tracing::{debug, info, instrument};

use crate::{metadata::MetadataExtractor, segmenter::ParagraphSegmenter};

/// Metadata extraction plus segmentation for one source file.
#[derive(Debug, Clone)]
pub struct BookParser {
    metadata: MetadataExtractor,
    segmenter: ParagraphSegmenter,
}

impl BookParser {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            metadata: MetadataExtractor::new()?,
            segmenter: ParagraphSegmenter::new()?,
        })
    }

    /// Parse an in-memory book. `file` only labels errors and logs.
    pub fn parse_text(&self, text: &str, file: &str) -> Result<ParsedBook, AppError> {
        let meta = self.metadata.extract(text, file)?;
        let paragraphs = self.segmenter.segment(text, file)?;

        info!(
            file,
            title = %meta.title,
            author = %meta.author,
            paragraphs = paragraphs.len(),
            "parsed book"
        );

        Ok(ParsedBook {
            title: meta.title,
            author: meta.author,
            url_original: meta.url_original,
            url_youtube: meta.url_youtube,
            url_ivoox: meta.url_ivoox,
            paragraphs,
        })
    }

    #[instrument(level = "debug", skip_all, fields(file = %path.display()))]
    pub async fn parse(&self, path: &Path) -> Result<ParsedBook, AppError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AppError::SourceRead {
                path: path.display().to_string(),
                source,
            })?;
        debug!(bytes = bytes.len(), "read source file");
        let text = String::from_utf8_lossy(&bytes);
        self.parse_text(&text, &path.display().to_string())
    }
}
