use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::paragraph_document::ParagraphDocument;

/// Normalized answer to any query. `total` is the store's match count, not `hits.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub total: u64,
    pub hits: Vec<QueryHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub document: ParagraphDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<BTreeMap<String, Vec<String>>>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            total: 0,
            hits: Vec::new(),
        }
    }

    pub fn locations(&self) -> Vec<i64> {
        self.hits.iter().map(|hit| hit.document.location).collect()
    }
}

impl QueryHit {
    pub fn highlight_for(&self, field: &str) -> Option<&[String]> {
        self.highlight
            .as_ref()
            .and_then(|fields| fields.get(field))
            .map(Vec::as_slice)
    }
}
