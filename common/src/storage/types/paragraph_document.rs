use serde::{Deserialize, Serialize};

/// One stored paragraph. Written once per reload and never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParagraphDocument {
    pub author: String,
    pub title: String,
    pub url_original: String,
    pub url_youtube: String,
    pub url_ivoox: String,
    pub location: i64,
    pub text: String,
}

impl ParagraphDocument {
    /// First `max_chars` characters of the paragraph, for failure reports.
    pub fn snippet(&self, max_chars: usize) -> String {
        let mut snippet: String = self.text.chars().take(max_chars).collect();
        if self.text.chars().count() > max_chars {
            snippet.push('…');
        }
        snippet
    }
}
