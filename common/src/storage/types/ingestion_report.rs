use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated outcome of one full reload. Append-only while the run is in flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub files_discovered: usize,
    pub files_processed: usize,
    pub files_failed: Vec<FileFailure>,
    pub books: Vec<BookLoadResult>,
}

/// A file that could not be parsed or loaded at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFailure {
    pub file: String,
    pub reason: String,
}

/// Outcome of loading one parsed book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookLoadResult {
    pub file: String,
    pub title: String,
    pub paragraphs: usize,
    pub documents_indexed: usize,
    pub batch_failures: Vec<BatchFailure>,
    pub document_failures: Vec<DocumentFailure>,
}

/// A whole bulk call that failed at the request level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchFailure {
    pub title: String,
    pub first_location: i64,
    pub last_location: i64,
    pub reason: String,
}

/// A single document the store rejected inside an otherwise accepted batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentFailure {
    pub title: String,
    pub location: i64,
    pub snippet: String,
    pub reason: String,
}

impl IngestionReport {
    pub fn started() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            files_discovered: 0,
            files_processed: 0,
            files_failed: Vec::new(),
            books: Vec::new(),
        }
    }

    pub fn record_book(&mut self, result: BookLoadResult) {
        self.files_processed = self.files_processed.saturating_add(1);
        self.books.push(result);
    }

    pub fn record_file_failure(&mut self, file: impl Into<String>, reason: impl Into<String>) {
        self.files_failed.push(FileFailure {
            file: file.into(),
            reason: reason.into(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn documents_indexed(&self) -> usize {
        self.books.iter().map(|book| book.documents_indexed).sum()
    }

    pub fn batch_failures(&self) -> impl Iterator<Item = &BatchFailure> {
        self.books.iter().flat_map(|book| book.batch_failures.iter())
    }

    pub fn document_failures(&self) -> impl Iterator<Item = &DocumentFailure> {
        self.books
            .iter()
            .flat_map(|book| book.document_failures.iter())
    }

    /// Files failed plus batch and document failures.
    pub fn failure_count(&self) -> usize {
        self.files_failed
            .len()
            .saturating_add(self.batch_failures().count())
            .saturating_add(self.document_failures().count())
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

impl BookLoadResult {
    pub fn new(file: impl Into<String>, title: impl Into<String>, paragraphs: usize) -> Self {
        Self {
            file: file.into(),
            title: title.into(),
            paragraphs,
            documents_indexed: 0,
            batch_failures: Vec::new(),
            document_failures: Vec::new(),
        }
    }
}
