use std::{path::Path, sync::Arc};

use common::{
    error::AppError,
    storage::{
        client::SearchStore, memory::MemoryStore, retry::RetryPolicy,
        types::paragraph_document::ParagraphDocument,
    },
};
use serde_json::json;
use tempfile::TempDir;

use super::{IngestionOrchestrator, ReloadConfig};

fn gutenberg_book(title: &str, paragraphs: usize) -> String {
    let body: Vec<String> = (0..paragraphs)
        .map(|i| format!("{title} paragraph {i}\nwrapped onto a second line."))
        .collect();
    format!(
        "Title: {title}\r\nAuthor: Test Author\r\n\r\n\
         *** START OF THE PROJECT GUTENBERG EBOOK {upper} ***\r\n\r\n{}\r\n\r\n\
         *** END OF THE PROJECT GUTENBERG EBOOK {upper} ***\r\n",
        body.join("\r\n\r\n"),
        upper = title.to_uppercase(),
    )
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("write book");
}

fn config_for(dir: &TempDir) -> ReloadConfig {
    ReloadConfig {
        index_name: "library".into(),
        books_dir: dir.path().to_path_buf(),
        bulk_batch_size: 500,
        ingest_concurrency: 1,
        retry: RetryPolicy::immediate(3),
    }
}

fn orchestrator(store: &Arc<MemoryStore>, config: ReloadConfig) -> IngestionOrchestrator {
    IngestionOrchestrator::new(store.clone(), config).expect("orchestrator")
}

async fn stored_documents(store: &MemoryStore, title: &str) -> Vec<ParagraphDocument> {
    let raw = store
        .search(
            "library",
            &json!({
                "size": 10_000,
                "sort": [{ "location": "asc" }],
                "query": { "bool": { "filter": [{ "term": { "title": title } }] } }
            }),
        )
        .await
        .expect("search");
    raw["hits"]["hits"]
        .as_array()
        .expect("hits array")
        .iter()
        .map(|hit| serde_json::from_value(hit["_source"].clone()).expect("document"))
        .collect()
}

#[tokio::test]
async fn full_reload_indexes_every_paragraph() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "moby.txt", &gutenberg_book("Moby Dick", 12));
    write(dir.path(), "walden.txt", &gutenberg_book("Walden", 3));
    write(dir.path(), "notes.md", "not a book");

    let store = Arc::new(MemoryStore::new());
    let report = orchestrator(&store, config_for(&dir))
        .run_full_reload()
        .await
        .expect("reload");

    assert_eq!(report.files_discovered, 2);
    assert_eq!(report.files_processed, 2);
    assert!(report.is_clean());
    assert_eq!(report.documents_indexed(), 15);
    assert!(report.finished_at.is_some());

    let docs = stored_documents(&store, "Moby Dick").await;
    let locations: Vec<i64> = docs.iter().map(|d| d.location).collect();
    assert_eq!(locations, (0..12).collect::<Vec<i64>>());
    assert_eq!(docs[3].text, "Moby Dick paragraph 3 wrapped onto a second line.");
    assert_eq!(docs[3].author, "Test Author");
    assert_eq!(docs[3].url_ivoox, "N/A");
}

#[tokio::test]
async fn reloading_twice_does_not_duplicate() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "moby.txt", &gutenberg_book("Moby Dick", 7));
    write(dir.path(), "walden.txt", &gutenberg_book("Walden", 4));

    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(&store, config_for(&dir));

    orchestrator.run_full_reload().await.expect("first reload");
    orchestrator.run_full_reload().await.expect("second reload");

    assert_eq!(store.document_count("library").await, 11);
}

#[tokio::test]
async fn broken_files_are_recorded_and_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "a-good.txt", &gutenberg_book("Good Book", 5));
    write(
        dir.path(),
        "b-untitled.txt",
        "Author: Someone\n*** START OF THE PROJECT GUTENBERG EBOOK X ***\nbody\n*** END OF THE PROJECT GUTENBERG EBOOK X ***\n",
    );
    write(dir.path(), "c-unmarked.txt", "Title: No Markers\n\nJust prose.\n");
    write(dir.path(), "d-also-good.txt", &gutenberg_book("Second Book", 2));

    let store = Arc::new(MemoryStore::new());
    let report = orchestrator(&store, config_for(&dir))
        .run_full_reload()
        .await
        .expect("reload still succeeds");

    assert_eq!(report.files_discovered, 4);
    assert_eq!(report.files_processed, 2);
    let failed: Vec<&str> = report.files_failed.iter().map(|f| f.file.as_str()).collect();
    assert_eq!(failed, vec!["b-untitled.txt", "c-unmarked.txt"]);
    assert!(report.files_failed[0].reason.contains("'Title'"));
    assert!(report.files_failed[1].reason.contains("boundary"));
    assert_eq!(store.document_count("library").await, 7);
}

#[tokio::test]
async fn single_rejected_document_is_isolated() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "moby.txt", &gutenberg_book("Moby Dick", 500));

    let store = Arc::new(MemoryStore::new());
    store.reject_documents_where(|doc| doc.location == 250);

    let report = orchestrator(&store, config_for(&dir))
        .run_full_reload()
        .await
        .expect("reload");

    let failures: Vec<_> = report.document_failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].location, 250);
    assert!(failures[0].snippet.starts_with("Moby Dick paragraph 250"));
    assert_eq!(report.documents_indexed(), 499);

    let docs = stored_documents(&store, "Moby Dick").await;
    assert_eq!(docs.len(), 499);
    assert!(docs.iter().all(|d| d.location != 250));
}

#[tokio::test]
async fn concurrent_loading_keeps_discovery_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, title) in [("1.txt", "One"), ("2.txt", "Two"), ("3.txt", "Three")] {
        write(dir.path(), name, &gutenberg_book(title, 30));
    }

    let store = Arc::new(MemoryStore::new());
    let config = ReloadConfig {
        ingest_concurrency: 3,
        bulk_batch_size: 7,
        ..config_for(&dir)
    };
    let report = orchestrator(&store, config)
        .run_full_reload()
        .await
        .expect("reload");

    let titles: Vec<&str> = report.books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["One", "Two", "Three"]);
    assert_eq!(store.document_count("library").await, 90);
}

#[tokio::test]
async fn missing_books_dir_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ReloadConfig {
        books_dir: dir.path().join("absent"),
        ..config_for(&dir)
    };

    let store = Arc::new(MemoryStore::new());
    let err = orchestrator(&store, config)
        .run_full_reload()
        .await
        .expect_err("no directory");
    assert!(matches!(err, AppError::FileDiscovery { .. }));
    assert!(err.is_fatal_to_run());
}

#[tokio::test]
async fn unreachable_store_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "moby.txt", &gutenberg_book("Moby Dick", 2));

    let store = Arc::new(MemoryStore::new());
    store.fail_next_health_checks(100);

    let err = orchestrator(&store, config_for(&dir))
        .run_full_reload()
        .await
        .expect_err("store down");
    assert!(matches!(err, AppError::StoreUnreachable(_)));
    assert!(!store.index_exists("library").await.expect("exists"));
}

#[tokio::test]
async fn transient_outage_is_retried() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "moby.txt", &gutenberg_book("Moby Dick", 2));

    let store = Arc::new(MemoryStore::new());
    store.fail_next_health_checks(2);

    let report = orchestrator(&store, config_for(&dir))
        .run_full_reload()
        .await
        .expect("third attempt connects");
    assert_eq!(report.documents_indexed(), 2);
}

#[tokio::test]
async fn index_reset_failure_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "moby.txt", &gutenberg_book("Moby Dick", 2));

    let store = Arc::new(MemoryStore::new());
    store.fail_next_index_ops(1);

    let err = orchestrator(&store, config_for(&dir))
        .run_full_reload()
        .await
        .expect_err("create index fails");
    assert!(matches!(err, AppError::IndexReset(ref msg) if msg.contains("create index")));
    assert!(err.is_fatal_to_run());
    assert_eq!(store.document_count("library").await, 0);
}

#[tokio::test]
async fn failed_reset_loads_nothing_new() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "moby.txt", &gutenberg_book("Moby Dick", 4));

    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(&store, config_for(&dir));
    orchestrator.run_full_reload().await.expect("first reload");

    write(dir.path(), "walden.txt", &gutenberg_book("Walden", 3));
    store.fail_next_index_ops(1);
    let err = orchestrator
        .run_full_reload()
        .await
        .expect_err("delete index fails");
    assert!(matches!(err, AppError::IndexReset(_)));
    assert!(stored_documents(&store, "Walden").await.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_books_are_discovered() {
    let sources = tempfile::tempdir().expect("sources");
    write(sources.path(), "moby.txt", &gutenberg_book("Moby Dick", 3));
    let dir = tempfile::tempdir().expect("tempdir");
    std::os::unix::fs::symlink(sources.path().join("moby.txt"), dir.path().join("moby.txt"))
        .expect("symlink");
    std::os::unix::fs::symlink(sources.path().join("gone.txt"), dir.path().join("dangling.txt"))
        .expect("dangling symlink");

    let store = Arc::new(MemoryStore::new());
    let report = orchestrator(&store, config_for(&dir))
        .run_full_reload()
        .await
        .expect("reload");

    assert_eq!(report.files_discovered, 1);
    assert_eq!(report.files_processed, 1);
    assert_eq!(stored_documents(&store, "Moby Dick").await.len(), 3);
}
