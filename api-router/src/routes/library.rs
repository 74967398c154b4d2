use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use common::storage::types::query_result::QueryResult;
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

pub const MAX_TERM_CHARS: usize = 60;
pub const MAX_TITLE_CHARS: usize = 256;
const DEFAULT_RANGE_END: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    term: Option<String>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ParagraphParams {
    #[serde(rename = "bookTitle")]
    book_title: Option<String>,
    start: Option<i64>,
    end: Option<i64>,
}

fn required_text(value: Option<String>, name: &str, max_chars: usize) -> Result<String, ApiError> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::ValidationError(format!("\"{name}\" is required")))?;
    if value.chars().count() > max_chars {
        return Err(ApiError::ValidationError(format!(
            "\"{name}\" must be at most {max_chars} characters"
        )));
    }
    Ok(value)
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::ValidationError(rejection.body_text()))
}

/// `GET /search?term=&offset=`
pub async fn search(
    State(state): State<ApiState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<QueryResult>, ApiError> {
    let params = query_params(params)?;
    let term = required_text(params.term, "term", MAX_TERM_CHARS)?;
    let offset = usize::try_from(params.offset.unwrap_or(0))
        .map_err(|_| ApiError::ValidationError("\"offset\" must be greater than or equal to 0".into()))?;

    let result = state.search.search_by_term(&term, offset).await?;
    Ok(Json(result))
}

/// `GET /paragraphs?bookTitle=&start=&end=`
pub async fn paragraphs(
    State(state): State<ApiState>,
    params: Result<Query<ParagraphParams>, QueryRejection>,
) -> Result<Json<QueryResult>, ApiError> {
    let params = query_params(params)?;
    let title = required_text(params.book_title, "bookTitle", MAX_TITLE_CHARS)?;
    let start = params.start.unwrap_or(0);
    if start < 0 {
        return Err(ApiError::ValidationError(
            "\"start\" must be greater than or equal to 0".into(),
        ));
    }
    let end = params.end.unwrap_or(DEFAULT_RANGE_END);
    if end <= start {
        return Err(ApiError::ValidationError(format!(
            "\"end\" must be greater than {start}"
        )));
    }

    let result = state.search.get_paragraph_range(&title, start, end).await?;
    Ok(Json(result))
}
