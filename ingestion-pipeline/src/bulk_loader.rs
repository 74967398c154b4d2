use common::{
    error::AppError,
    storage::{
        client::SearchStore,
        types::{
            ingestion_report::{BatchFailure, BookLoadResult, DocumentFailure},
            paragraph_document::ParagraphDocument,
            parsed_book::ParsedBook,
        },
    },
};
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 500;
const SNIPPET_CHARS: usize = 120;

/// Writes a parsed book to the store in fixed-size bulk batches.
pub struct BulkLoader<'a> {
    store: &'a dyn SearchStore,
    index: &'a str,
    batch_size: usize,
}

impl<'a> BulkLoader<'a> {
    pub fn new(store: &'a dyn SearchStore, index: &'a str, batch_size: usize) -> Self {
        Self {
            store,
            index,
            batch_size: batch_size.max(1),
        }
    }

    /// Submit every paragraph of `book`. Failed batches and rejected documents
    /// are recorded in the result; only an internal error aborts the book.
    pub async fn load(&self, file: &str, book: &ParsedBook) -> Result<BookLoadResult, AppError> {
        let documents: Vec<ParagraphDocument> = book.documents().collect();
        let mut result = BookLoadResult::new(file, book.title.clone(), documents.len());

        for batch in documents.chunks(self.batch_size) {
            self.load_batch(batch, &mut result).await;
        }

        info!(
            file,
            title = %book.title,
            paragraphs = result.paragraphs,
            indexed = result.documents_indexed,
            failed_batches = result.batch_failures.len(),
            rejected = result.document_failures.len(),
            "book indexed"
        );
        Ok(result)
    }

    async fn load_batch(&self, batch: &[ParagraphDocument], result: &mut BookLoadResult) {
        let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
            return;
        };
        debug!(
            title = %first.title,
            first_location = first.location,
            last_location = last.location,
            "submitting bulk batch"
        );

        let response = match self.store.bulk_write(self.index, batch).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    title = %first.title,
                    first_location = first.location,
                    last_location = last.location,
                    error = %err,
                    "bulk batch failed"
                );
                result.batch_failures.push(BatchFailure {
                    title: first.title.clone(),
                    first_location: first.location,
                    last_location: last.location,
                    reason: err.to_string(),
                });
                return;
            }
        };

        let mut rejected = 0usize;
        for (position, reason) in response.failures() {
            let Some(document) = batch.get(position) else {
                continue;
            };
            rejected = rejected.saturating_add(1);
            let err = AppError::DocumentRejected {
                location: document.location,
                reason: reason.clone(),
            };
            warn!(title = %document.title, error = %err, "document rejected by store");
            result.document_failures.push(DocumentFailure {
                title: document.title.clone(),
                location: document.location,
                snippet: document.snippet(SNIPPET_CHARS),
                reason,
            });
        }

        result.documents_indexed = result
            .documents_indexed
            .saturating_add(batch.len().saturating_sub(rejected));
    }
}
