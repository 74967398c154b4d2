use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Answer to a single bulk write, one item per submitted document in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItem {
    #[serde(alias = "create")]
    pub index: BulkItemStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemStatus {
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl BulkItemStatus {
    pub fn accepted(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            status: 201,
            error: None,
        }
    }

    pub fn rejected(status: u16, error_type: &str, reason: impl Into<String>) -> Self {
        Self {
            id: None,
            status,
            error: Some(serde_json::json!({
                "type": error_type,
                "reason": reason.into(),
            })),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 300
    }

    /// Human readable reason: `type: reason` when the store supplies both.
    pub fn failure_reason(&self) -> String {
        match &self.error {
            Some(Value::Object(error)) => {
                let kind = error.get("type").and_then(Value::as_str);
                let reason = error.get("reason").and_then(Value::as_str);
                match (kind, reason) {
                    (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
                    (Some(only), None) | (None, Some(only)) => only.to_string(),
                    (None, None) => Value::Object(error.clone()).to_string(),
                }
            }
            Some(Value::String(reason)) => reason.clone(),
            Some(other) => other.to_string(),
            None => format!("status {}", self.status),
        }
    }
}

impl BulkResponse {
    /// Positions (within the submitted batch) of rejected documents with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (usize, String)> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.index.is_failure())
            .map(|(position, item)| (position, item.index.failure_reason()))
    }
}
