use serde::{Deserialize, Serialize};

use super::paragraph_document::ParagraphDocument;

pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const MISSING_URL: &str = "N/A";

/// A source file after metadata extraction and paragraph segmentation.
///
/// `paragraphs` keeps reading order; the index of each entry is its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedBook {
    pub title: String,
    pub author: String,
    pub url_original: String,
    pub url_youtube: String,
    pub url_ivoox: String,
    pub paragraphs: Vec<String>,
}

impl ParsedBook {
    pub fn document_at(&self, location: usize) -> Option<ParagraphDocument> {
        self.paragraphs
            .get(location)
            .map(|text| self.document(location, text))
    }

    /// Paragraph documents in location order, `location` starting at 0.
    pub fn documents(&self) -> impl Iterator<Item = ParagraphDocument> + '_ {
        self.paragraphs
            .iter()
            .enumerate()
            .map(|(location, text)| self.document(location, text))
    }

    fn document(&self, location: usize, text: &str) -> ParagraphDocument {
        ParagraphDocument {
            author: self.author.clone(),
            title: self.title.clone(),
            url_original: self.url_original.clone(),
            url_youtube: self.url_youtube.clone(),
            url_ivoox: self.url_ivoox.clone(),
            location: i64::try_from(location).unwrap_or(i64::MAX),
            text: text.to_owned(),
        }
    }
}
