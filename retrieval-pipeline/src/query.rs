use common::{
    error::AppError,
    storage::schema::{FIELD_LOCATION, FIELD_TEXT, FIELD_TITLE},
};
use serde_json::{json, Value};

/// Results per term-search page.
pub const DEFAULT_PAGE_SIZE: usize = 9;

/// Fuzzy full-text match on paragraph text: every term must match, edit
/// distance scales with term length, `text` comes back highlighted.
pub fn term_query(term: &str, offset: usize, page_size: usize) -> Result<Value, AppError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(AppError::Validation("search term must not be blank".into()));
    }

    Ok(json!({
        "from": offset,
        "size": page_size,
        "query": {
            "match": {
                FIELD_TEXT: {
                    "query": term,
                    "operator": "and",
                    "fuzziness": "auto"
                }
            }
        },
        "highlight": { "fields": { FIELD_TEXT: {} } }
    }))
}

/// Paragraphs of one book with `start <= location <= end`, ascending.
///
/// `size` is `end - start`, so a fully populated range yields `start..end`.
pub fn paragraph_range_query(title: &str, start: i64, end: i64) -> Result<Value, AppError> {
    if end <= start {
        return Err(AppError::Validation(format!(
            "end ({end}) must be greater than start ({start})"
        )));
    }

    Ok(json!({
        "size": end.saturating_sub(start),
        "sort": [{ FIELD_LOCATION: "asc" }],
        "query": {
            "bool": {
                "filter": [
                    { "term": { FIELD_TITLE: title } },
                    { "range": { FIELD_LOCATION: { "gte": start, "lte": end } } }
                ]
            }
        }
    }))
}
