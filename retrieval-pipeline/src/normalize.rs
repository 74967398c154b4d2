use std::collections::BTreeMap;

use common::{
    error::AppError,
    storage::types::{
        paragraph_document::ParagraphDocument,
        query_result::{QueryHit, QueryResult},
    },
};
use serde_json::Value;

fn invalid(reason: impl Into<String>) -> AppError {
    AppError::InvalidStoreResponse(reason.into())
}

/// Translate a raw search answer into a [`QueryResult`].
///
/// Accepts the answer either bare or wrapped in `body`, and `hits.total` as
/// either a count or `{ value, relation }`. Without `total` the hit count is
/// used. A missing `hits` structure is an error, never an empty result.
pub fn normalize(raw: &Value) -> Result<QueryResult, AppError> {
    let envelope = match raw.get("hits") {
        Some(_) => raw,
        None => raw
            .get("body")
            .filter(|body| body.get("hits").is_some())
            .ok_or_else(|| invalid("response has no hits"))?,
    };

    let hits = envelope
        .get("hits")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid("hits is not an object"))?;

    let entries = hits
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("hits.hits is missing or not an array"))?;

    let hits: Vec<QueryHit> = entries.iter().map(normalize_hit).collect::<Result<_, _>>()?;

    let total = match envelope.get("hits").and_then(|h| h.get("total")) {
        Some(Value::Number(count)) => count
            .as_u64()
            .ok_or_else(|| invalid("hits.total is not a non-negative integer"))?,
        Some(Value::Object(total)) => total
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| invalid("hits.total.value is missing"))?,
        None | Some(Value::Null) => u64::try_from(hits.len()).unwrap_or(u64::MAX),
        Some(other) => return Err(invalid(format!("unexpected hits.total: {other}"))),
    };

    Ok(QueryResult { total, hits })
}

fn normalize_hit(hit: &Value) -> Result<QueryHit, AppError> {
    let source = hit
        .get("_source")
        .ok_or_else(|| invalid("hit without _source"))?;
    let document: ParagraphDocument = serde_json::from_value(source.clone())
        .map_err(|err| invalid(format!("hit _source is not a paragraph: {err}")))?;

    let highlight = match hit.get("highlight") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_json::from_value::<BTreeMap<String, Vec<String>>>(value.clone())
                .map_err(|err| invalid(format!("malformed highlight: {err}")))?,
        ),
    };

    Ok(QueryHit {
        id: hit.get("_id").and_then(Value::as_str).map(str::to_owned),
        score: hit.get("_score").and_then(Value::as_f64),
        document,
        highlight,
    })
}
