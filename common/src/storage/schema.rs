use serde_json::{json, Map, Value};

pub const FIELD_TITLE: &str = "title";
pub const FIELD_AUTHOR: &str = "author";
pub const FIELD_URL_ORIGINAL: &str = "url_original";
pub const FIELD_URL_YOUTUBE: &str = "url_youtube";
pub const FIELD_URL_IVOOX: &str = "url_ivoox";
pub const FIELD_LOCATION: &str = "location";
pub const FIELD_TEXT: &str = "text";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Keyword,
    Integer,
    Text,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Integer => "integer",
            Self::Text => "text",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "keyword" => Some(Self::Keyword),
            "integer" => Some(Self::Integer),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

const PARAGRAPH_FIELDS: [(&str, FieldKind); 7] = [
    (FIELD_TITLE, FieldKind::Keyword),
    (FIELD_AUTHOR, FieldKind::Keyword),
    (FIELD_URL_ORIGINAL, FieldKind::Keyword),
    (FIELD_URL_YOUTUBE, FieldKind::Keyword),
    (FIELD_URL_IVOOX, FieldKind::Keyword),
    (FIELD_LOCATION, FieldKind::Integer),
    (FIELD_TEXT, FieldKind::Text),
];

/// Mapping body applied at index reset: `{ "properties": { field: { "type": kind } } }`.
pub fn paragraph_mapping() -> Value {
    let properties: Map<String, Value> = PARAGRAPH_FIELDS
        .iter()
        .map(|(name, kind)| ((*name).to_string(), json!({ "type": kind.as_str() })))
        .collect();

    json!({ "properties": properties })
}
