use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{
        client::{ClusterHealth, HealthStatus, SearchStore},
        schema::FieldKind,
        types::{
            bulk::{BulkItem, BulkItemStatus, BulkResponse},
            paragraph_document::ParagraphDocument,
        },
    },
};

const DEFAULT_SEARCH_SIZE: usize = 10;

#[cfg(any(test, feature = "test-utils"))]
type RejectPredicate = std::sync::Arc<dyn Fn(&ParagraphDocument) -> bool + Send + Sync>;

/// In-process [`SearchStore`] that speaks the same JSON query dialect as
/// Elasticsearch for the subset this crate issues: `match_all`, `match`
/// (operator, `AUTO` fuzziness), `term`, `range`, `bool`, `sort`, `from`,
/// `size` and `highlight`.
#[derive(Default)]
pub struct MemoryStore {
    indices: RwLock<HashMap<String, MemoryIndex>>,
    failing_health_checks: AtomicUsize,
    failing_bulk_writes: AtomicUsize,
    failing_index_ops: AtomicUsize,
    #[cfg(any(test, feature = "test-utils"))]
    rejection: std::sync::Mutex<Option<RejectPredicate>>,
}

#[derive(Default)]
struct MemoryIndex {
    mapping: HashMap<String, FieldKind>,
    documents: Vec<StoredDocument>,
}

struct StoredDocument {
    id: String,
    source: Value,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .await
            .get(index)
            .map_or(0, |idx| idx.documents.len())
    }

    fn consume(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok()
    }

    fn index_op_fault(&self, action: &str) -> Result<(), AppError> {
        if Self::consume(&self.failing_index_ops) {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("{action}: connection reset by peer (simulated)"),
            )));
        }
        Ok(())
    }

    #[cfg(any(test, feature = "test-utils"))]
    fn externally_rejected(&self, document: &ParagraphDocument) -> bool {
        self.rejection
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .is_some_and(|predicate| predicate(document))
    }

    #[cfg(not(any(test, feature = "test-utils")))]
    fn externally_rejected(&self, _document: &ParagraphDocument) -> bool {
        false
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl MemoryStore {
    /// The next `count` health checks fail as if the store were down.
    pub fn fail_next_health_checks(&self, count: usize) {
        self.failing_health_checks
            .store(count, AtomicOrdering::SeqCst);
    }

    /// The next `count` bulk calls fail at the request level.
    pub fn fail_next_bulk_writes(&self, count: usize) {
        self.failing_bulk_writes.store(count, AtomicOrdering::SeqCst);
    }

    /// The next `count` create, delete or mapping calls fail in transport.
    pub fn fail_next_index_ops(&self, count: usize) {
        self.failing_index_ops.store(count, AtomicOrdering::SeqCst);
    }

    /// Reject, item by item, every document matching `predicate`.
    pub fn reject_documents_where<F>(&self, predicate: F)
    where
        F: Fn(&ParagraphDocument) -> bool + Send + Sync + 'static,
    {
        if let Ok(mut guard) = self.rejection.lock() {
            *guard = Some(std::sync::Arc::new(predicate));
        }
    }
}

fn index_not_found(index: &str) -> String {
    format!("index_not_found_exception: no such index [{index}]")
}

/// Type check for one field against the applied mapping.
fn conforms(value: &Value, kind: FieldKind) -> bool {
    match kind {
        FieldKind::Integer => value
            .as_i64()
            .is_some_and(|n| i32::try_from(n).is_ok()),
        FieldKind::Keyword | FieldKind::Text => value.is_string(),
    }
}

fn validate_against_mapping(
    source: &Value,
    mapping: &HashMap<String, FieldKind>,
) -> Result<(), String> {
    for (field, kind) in mapping {
        if let Some(value) = source.get(field) {
            if !value.is_null() && !conforms(value, *kind) {
                return Err(format!(
                    "failed to parse field [{field}] of type [{}]",
                    kind.as_str()
                ));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl SearchStore for MemoryStore {
    async fn health(&self) -> Result<ClusterHealth, AppError> {
        if Self::consume(&self.failing_health_checks) {
            return Err(AppError::StoreUnreachable(
                "connection refused (simulated)".into(),
            ));
        }
        Ok(ClusterHealth {
            cluster_name: "memory".into(),
            status: HealthStatus::Green,
            number_of_nodes: 1,
        })
    }

    async fn index_exists(&self, index: &str) -> Result<bool, AppError> {
        Ok(self.indices.read().await.contains_key(index))
    }

    async fn create_index(&self, index: &str) -> Result<(), AppError> {
        self.index_op_fault("create index")?;
        let mut indices = self.indices.write().await;
        if indices.contains_key(index) {
            return Err(AppError::IndexReset(format!(
                "resource_already_exists_exception: index [{index}] already exists"
            )));
        }
        indices.insert(index.to_owned(), MemoryIndex::default());
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), AppError> {
        self.index_op_fault("delete index")?;
        self.indices
            .write()
            .await
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| AppError::IndexReset(index_not_found(index)))
    }

    async fn put_mapping(&self, index: &str, mapping: &Value) -> Result<(), AppError> {
        self.index_op_fault("put mapping")?;
        let mut indices = self.indices.write().await;
        let target = indices
            .get_mut(index)
            .ok_or_else(|| AppError::IndexReset(index_not_found(index)))?;

        let properties = mapping
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::IndexReset("mapping has no properties".into()))?;

        for (field, definition) in properties {
            let kind = definition.get("type").and_then(Value::as_str);
            if let Some(kind) = kind.and_then(FieldKind::parse) {
                target.mapping.insert(field.clone(), kind);
            }
        }
        Ok(())
    }

    async fn bulk_write(
        &self,
        index: &str,
        documents: &[ParagraphDocument],
    ) -> Result<BulkResponse, AppError> {
        if Self::consume(&self.failing_bulk_writes) {
            return Err(AppError::BulkWrite(
                "connection reset by peer (simulated)".into(),
            ));
        }

        let mut indices = self.indices.write().await;
        let target = indices.entry(index.to_owned()).or_default();

        let mut items = Vec::with_capacity(documents.len());
        for document in documents {
            let source = serde_json::to_value(document)?;

            let status = if self.externally_rejected(document) {
                BulkItemStatus::rejected(
                    400,
                    "document_parsing_exception",
                    "document rejected by store validation",
                )
            } else if let Err(reason) = validate_against_mapping(&source, &target.mapping) {
                BulkItemStatus::rejected(400, "mapper_parsing_exception", reason)
            } else {
                let id = Uuid::new_v4().to_string();
                target.documents.push(StoredDocument {
                    id: id.clone(),
                    source,
                });
                BulkItemStatus::accepted(id)
            };

            items.push(BulkItem { index: status });
        }

        Ok(BulkResponse {
            took: 0,
            errors: items.iter().any(|item| item.index.is_failure()),
            items,
        })
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value, AppError> {
        let indices = self.indices.read().await;
        let target = indices
            .get(index)
            .ok_or_else(|| AppError::InvalidStoreResponse(index_not_found(index)))?;

        let query = match body.get("query") {
            Some(query) => Clause::parse(query)?,
            None => Clause::MatchAll,
        };

        let mut matched: Vec<(&StoredDocument, f64)> = target
            .documents
            .iter()
            .filter_map(|doc| query.score(&doc.source).map(|score| (doc, score)))
            .collect();

        let sort_keys = parse_sort(body.get("sort"))?;
        if sort_keys.is_empty() {
            matched.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        } else {
            matched.sort_by(|a, b| compare_by_keys(&sort_keys, a, b));
        }

        let total = matched.len();
        let max_score = matched
            .iter()
            .map(|(_, score)| *score)
            .fold(None, |max: Option<f64>, score| {
                Some(max.map_or(score, |m| m.max(score)))
            });

        let from = usize_param(body, "from")?.unwrap_or(0);
        let size = usize_param(body, "size")?.unwrap_or(DEFAULT_SEARCH_SIZE);

        let highlight_fields: Vec<&str> = body
            .get("highlight")
            .and_then(|h| h.get("fields"))
            .and_then(Value::as_object)
            .map(|fields| fields.keys().map(String::as_str).collect())
            .unwrap_or_default();

        let hits: Vec<Value> = matched
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(doc, score)| {
                let mut hit = Map::new();
                hit.insert("_index".into(), json!(index));
                hit.insert("_id".into(), json!(doc.id));
                hit.insert(
                    "_score".into(),
                    if sort_keys.is_empty() { json!(score) } else { Value::Null },
                );
                hit.insert("_source".into(), doc.source.clone());

                let highlight = highlight_document(&query, &highlight_fields, &doc.source);
                if !highlight.is_empty() {
                    hit.insert("highlight".into(), json!(highlight));
                }
                Value::Object(hit)
            })
            .collect();

        Ok(json!({
            "took": 0,
            "timed_out": false,
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "max_score": max_score,
                "hits": hits,
            }
        }))
    }
}

fn usize_param(body: &Value, key: &str) -> Result<Option<usize>, AppError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("[{key}] must be a non-negative integer"))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fuzziness {
    Exact,
    Auto,
    Edits(usize),
}

impl Fuzziness {
    fn parse(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) if s.eq_ignore_ascii_case("auto") => Self::Auto,
            Some(Value::String(s)) => s.parse().map_or(Self::Exact, Self::Edits),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map_or(Self::Exact, Self::Edits),
            _ => Self::Exact,
        }
    }

    /// Allowed edits for a term, `AUTO` scaling with its length.
    fn allowed_edits(self, term: &str) -> usize {
        match self {
            Self::Exact => 0,
            Self::Edits(n) => n.min(2),
            Self::Auto => match term.chars().count() {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Clause {
    MatchAll,
    Match {
        field: String,
        terms: Vec<String>,
        require_all: bool,
        fuzziness: Fuzziness,
    },
    Term {
        field: String,
        value: Value,
    },
    Range {
        field: String,
        gte: Option<f64>,
        gt: Option<f64>,
        lte: Option<f64>,
        lt: Option<f64>,
    },
    Bool {
        must: Vec<Clause>,
        filter: Vec<Clause>,
        should: Vec<Clause>,
        must_not: Vec<Clause>,
    },
}

fn single_entry<'a>(value: &'a Value, clause: &str) -> Result<(&'a String, &'a Value), AppError> {
    value
        .as_object()
        .filter(|object| object.len() == 1)
        .and_then(|object| object.iter().next())
        .ok_or_else(|| AppError::Validation(format!("[{clause}] expects exactly one field")))
}

impl Clause {
    fn parse(query: &Value) -> Result<Self, AppError> {
        let (kind, body) = single_entry(query, "query")?;
        match kind.as_str() {
            "match_all" => Ok(Self::MatchAll),
            "match" => {
                let (field, options) = single_entry(body, "match")?;
                let (text, operator, fuzziness) = match options {
                    Value::String(text) => (text.as_str(), None, Fuzziness::Exact),
                    Value::Object(options) => (
                        options.get("query").and_then(Value::as_str).unwrap_or_default(),
                        options.get("operator").and_then(Value::as_str),
                        Fuzziness::parse(options.get("fuzziness")),
                    ),
                    _ => {
                        return Err(AppError::Validation(
                            "[match] expects a string or an options object".into(),
                        ))
                    }
                };
                Ok(Self::Match {
                    field: field.clone(),
                    terms: tokenize(text).into_iter().map(|t| t.text).collect(),
                    require_all: operator.is_some_and(|op| op.eq_ignore_ascii_case("and")),
                    fuzziness,
                })
            }
            "term" => {
                let (field, term) = single_entry(body, "term")?;
                let value = term.get("value").unwrap_or(term).clone();
                Ok(Self::Term {
                    field: field.clone(),
                    value,
                })
            }
            "range" => {
                let (field, bounds) = single_entry(body, "range")?;
                let bound = |key: &str| bounds.get(key).and_then(Value::as_f64);
                Ok(Self::Range {
                    field: field.clone(),
                    gte: bound("gte"),
                    gt: bound("gt"),
                    lte: bound("lte"),
                    lt: bound("lt"),
                })
            }
            "bool" => {
                let occurrence = |key: &str| -> Result<Vec<Clause>, AppError> {
                    match body.get(key) {
                        None => Ok(Vec::new()),
                        Some(Value::Array(clauses)) => clauses.iter().map(Clause::parse).collect(),
                        Some(clause) => Ok(vec![Clause::parse(clause)?]),
                    }
                };
                Ok(Self::Bool {
                    must: occurrence("must")?,
                    filter: occurrence("filter")?,
                    should: occurrence("should")?,
                    must_not: occurrence("must_not")?,
                })
            }
            other => Err(AppError::Validation(format!(
                "unsupported query clause [{other}]"
            ))),
        }
    }

    /// `None` when the document does not match; filter clauses score zero.
    fn score(&self, source: &Value) -> Option<f64> {
        match self {
            Self::MatchAll => Some(1.0),
            Self::Match {
                field,
                terms,
                require_all,
                fuzziness,
            } => {
                let tokens = tokenize(source.get(field)?.as_str()?);
                if terms.is_empty() {
                    return None;
                }
                let mut score = 0.0;
                let mut matched_terms = 0usize;
                for term in terms {
                    let edits = fuzziness.allowed_edits(term);
                    let hits = tokens
                        .iter()
                        .filter(|token| within_edit_distance(term, &token.text, edits))
                        .count();
                    if hits > 0 {
                        matched_terms = matched_terms.saturating_add(1);
                        score += hits as f64;
                    }
                }
                let matches = if *require_all {
                    matched_terms == terms.len()
                } else {
                    matched_terms > 0
                };
                matches.then_some(score)
            }
            Self::Term { field, value } => {
                let actual = source.get(field)?;
                let equal = match (actual.as_f64(), value.as_f64()) {
                    (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                    _ => actual == value,
                };
                equal.then_some(0.0)
            }
            Self::Range {
                field,
                gte,
                gt,
                lte,
                lt,
            } => {
                let actual = source.get(field)?.as_f64()?;
                let inside = gte.map_or(true, |b| actual >= b)
                    && gt.map_or(true, |b| actual > b)
                    && lte.map_or(true, |b| actual <= b)
                    && lt.map_or(true, |b| actual < b);
                inside.then_some(0.0)
            }
            Self::Bool {
                must,
                filter,
                should,
                must_not,
            } => {
                let mut score = 0.0;
                for clause in must {
                    score += clause.score(source)?;
                }
                for clause in filter {
                    clause.score(source)?;
                }
                if must_not.iter().any(|clause| clause.score(source).is_some()) {
                    return None;
                }
                let should_scores: Vec<f64> =
                    should.iter().filter_map(|c| c.score(source)).collect();
                let should_required = must.is_empty() && filter.is_empty() && !should.is_empty();
                if should_required && should_scores.is_empty() {
                    return None;
                }
                score += should_scores.iter().sum::<f64>();
                Some(score)
            }
        }
    }

    /// Match clauses (with their fuzziness) that apply to `field`.
    fn match_terms_for<'a>(&'a self, field: &str, out: &mut Vec<(&'a str, Fuzziness)>) {
        match self {
            Self::Match {
                field: f,
                terms,
                fuzziness,
                ..
            } if f == field => {
                out.extend(terms.iter().map(|t| (t.as_str(), *fuzziness)));
            }
            Self::Bool { must, should, .. } => {
                for clause in must.iter().chain(should.iter()) {
                    clause.match_terms_for(field, out);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
struct SortKey {
    field: String,
    order: SortOrder,
}

fn parse_order(value: &Value) -> Result<SortOrder, AppError> {
    let order = match value {
        Value::String(order) => order.as_str(),
        Value::Object(options) => options
            .get("order")
            .and_then(Value::as_str)
            .unwrap_or("asc"),
        _ => return Err(AppError::Validation("invalid sort order".into())),
    };
    match order.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortOrder::Asc),
        "desc" => Ok(SortOrder::Desc),
        other => Err(AppError::Validation(format!("invalid sort order [{other}]"))),
    }
}

fn parse_sort(sort: Option<&Value>) -> Result<Vec<SortKey>, AppError> {
    let entries = match sort {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries.iter().collect::<Vec<_>>(),
        Some(entry) => vec![entry],
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(field) => Ok(SortKey {
                field: field.clone(),
                order: if field == "_score" {
                    SortOrder::Desc
                } else {
                    SortOrder::Asc
                },
            }),
            Value::Object(_) => {
                let (field, order) = single_entry(entry, "sort")?;
                Ok(SortKey {
                    field: field.clone(),
                    order: parse_order(order)?,
                })
            }
            _ => Err(AppError::Validation("invalid sort entry".into())),
        })
        .collect()
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
        },
        // Missing values sort last.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_by_keys(
    keys: &[SortKey],
    a: &(&StoredDocument, f64),
    b: &(&StoredDocument, f64),
) -> Ordering {
    for key in keys {
        let ordering = if key.field == "_score" {
            a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal)
        } else {
            compare_values(a.0.source.get(&key.field), b.0.source.get(&key.field))
        };
        let ordering = match key.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

struct Token {
    text: String,
    start: usize,
    end: usize,
}

/// Lowercased alphanumeric runs with their byte spans.
fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (offset, ch) in text.char_indices() {
        match (ch.is_alphanumeric(), start) {
            (true, None) => start = Some(offset),
            (false, Some(begin)) => {
                tokens.push(Token {
                    text: text.get(begin..offset).unwrap_or_default().to_lowercase(),
                    start: begin,
                    end: offset,
                });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = start {
        tokens.push(Token {
            text: text.get(begin..).unwrap_or_default().to_lowercase(),
            start: begin,
            end: text.len(),
        });
    }
    tokens
}

fn within_edit_distance(a: &str, b: &str, max_distance: usize) -> bool {
    if max_distance == 0 {
        return a == b;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > max_distance {
        return false;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len().saturating_add(1)];

    for (i, ca) in a.iter().enumerate() {
        if let Some(first) = current.first_mut() {
            *first = i.saturating_add(1);
        }
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            let deletion = previous.get(j.saturating_add(1)).copied().unwrap_or(usize::MAX);
            let insertion = current.get(j).copied().unwrap_or(usize::MAX);
            let substitution = previous.get(j).copied().unwrap_or(usize::MAX);
            if let Some(cell) = current.get_mut(j.saturating_add(1)) {
                *cell = deletion
                    .saturating_add(1)
                    .min(insertion.saturating_add(1))
                    .min(substitution.saturating_add(cost));
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous.last().is_some_and(|distance| *distance <= max_distance)
}

fn highlight_document(
    query: &Clause,
    fields: &[&str],
    source: &Value,
) -> BTreeMap<String, Vec<String>> {
    let mut highlight = BTreeMap::new();

    for field in fields {
        let mut terms = Vec::new();
        query.match_terms_for(field, &mut terms);
        let Some(text) = source.get(*field).and_then(Value::as_str) else {
            continue;
        };
        if terms.is_empty() {
            continue;
        }

        let mut fragment = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut marked = false;
        for token in tokenize(text) {
            let hit = terms.iter().any(|(term, fuzziness)| {
                within_edit_distance(term, &token.text, fuzziness.allowed_edits(term))
            });
            if hit {
                fragment.push_str(text.get(cursor..token.start).unwrap_or_default());
                fragment.push_str("<em>");
                fragment.push_str(text.get(token.start..token.end).unwrap_or_default());
                fragment.push_str("</em>");
                cursor = token.end;
                marked = true;
            }
        }
        if marked {
            fragment.push_str(text.get(cursor..).unwrap_or_default());
            highlight.insert((*field).to_string(), vec![fragment]);
        }
    }

    highlight
}
