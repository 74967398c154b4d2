use api_state::ApiState;
use axum::{extract::FromRef, routing::get, Router};
use routes::{
    health::{health, live, not_found},
    library::{paragraphs, search},
    load_data::load_data,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api_state;
pub mod error;
mod routes;

/// Library routes: connectivity, reload, term search and paragraph ranges.
pub fn api_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/health", get(health))
        .route("/live", get(live))
        .route("/load-data", get(load_data))
        .route("/search", get(search))
        .route("/paragraphs", get(paragraphs))
        .fallback(not_found)
}

/// The served application: routes plus permissive CORS and request tracing.
pub fn app(state: ApiState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_headers(Any);

    api_routes()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use common::{
        storage::memory::MemoryStore,
        utils::config::{AppConfig, StoreKind},
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    fn write_book(dir: &Path, file: &str, title: &str, paragraphs: &[&str]) {
        let contents = format!(
            "Title: {title}\nAuthor: Herman Melville\nUrl Youtube: https://youtu.be/moby\n\n\
             *** START OF THE PROJECT GUTENBERG EBOOK {title} ***\n\n{}\n\n\
             *** END OF THE PROJECT GUTENBERG EBOOK {title} ***\n",
            paragraphs.join("\n\n")
        );
        std::fs::write(dir.join(file), contents).expect("write book");
    }

    fn test_app(books: &TempDir) -> (Arc<MemoryStore>, Router) {
        let config = AppConfig {
            store: StoreKind::Memory,
            books_dir: books.path().to_string_lossy().into_owned(),
            connect_max_attempts: 2,
            connect_base_delay_ms: 0,
            ..AppConfig::default()
        };
        let store = Arc::new(MemoryStore::new());
        let state = ApiState::new(store.clone(), &config).expect("state");
        (store, app(state))
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn loaded_app() -> (TempDir, Arc<MemoryStore>, Router) {
        let books = tempfile::tempdir().expect("tempdir");
        let paragraphs: Vec<String> = (0..20)
            .map(|i| {
                if i % 4 == 0 {
                    format!("The white whale rose, sighting {i}.")
                } else {
                    format!("Calm seas on day {i}.")
                }
            })
            .collect();
        let refs: Vec<&str> = paragraphs.iter().map(String::as_str).collect();
        write_book(books.path(), "moby.txt", "Moby Dick", &refs);

        let (store, app) = test_app(&books);
        let (status, body) = get(&app, "/load-data").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        (books, store, app)
    }

    #[tokio::test]
    async fn health_reports_store_state() {
        let books = tempfile::tempdir().expect("tempdir");
        let (store, app) = test_app(&books);

        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        store.fail_next_health_checks(1);
        let (status, body) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some());

        let (status, body) = get(&app, "/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn load_data_returns_report() {
        let books = tempfile::tempdir().expect("tempdir");
        write_book(books.path(), "moby.txt", "Moby Dick", &["One.", "Two.", "Three."]);
        std::fs::write(books.path().join("broken.txt"), "no title here").expect("write");

        let (store, app) = test_app(&books);
        let (status, body) = get(&app, "/load-data").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["report"]["files_discovered"], 2);
        assert_eq!(body["report"]["files_processed"], 1);
        assert_eq!(body["report"]["files_failed"][0]["file"], "broken.txt");
        assert_eq!(store.document_count("library").await, 3);
    }

    #[tokio::test]
    async fn load_data_fails_without_books_dir() {
        let books = tempfile::tempdir().expect("tempdir");
        let missing = books.path().join("gone");
        let config = AppConfig {
            books_dir: missing.to_string_lossy().into_owned(),
            ..AppConfig::default()
        };
        let state = ApiState::new(Arc::new(MemoryStore::new()), &config).expect("state");

        let (status, body) = get(&app(state), "/load-data").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn search_returns_highlighted_page() {
        let (_books, _store, app) = loaded_app().await;

        let (status, body) = get(&app, "/search?term=whale").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 5);
        let hits = body["hits"].as_array().expect("hits");
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|hit| hit["highlight"]["text"][0]
            .as_str()
            .is_some_and(|fragment| fragment.contains("<em>whale</em>"))));
        assert_eq!(hits[0]["document"]["url_youtube"], "https://youtu.be/moby");

        let (status, body) = get(&app, "/search?term=whale&offset=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hits"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn search_validates_parameters() {
        let (_books, _store, app) = loaded_app().await;

        let (status, body) = get(&app, "/search").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let long_term = "a".repeat(61);
        let (status, _) = get(&app, &format!("/search?term={long_term}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(&app, "/search?term=whale&offset=-1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(&app, "/search?term=whale&offset=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn paragraphs_default_to_first_ten() {
        let (_books, _store, app) = loaded_app().await;

        let (status, body) = get(&app, "/paragraphs?bookTitle=Moby%20Dick").await;
        assert_eq!(status, StatusCode::OK);
        let locations: Vec<i64> = body["hits"]
            .as_array()
            .expect("hits")
            .iter()
            .filter_map(|hit| hit["document"]["location"].as_i64())
            .collect();
        assert_eq!(locations, (0..10).collect::<Vec<i64>>());

        let (status, body) = get(&app, "/paragraphs?bookTitle=Moby%20Dick&start=10&end=15").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hits"][0]["document"]["location"], 10);
        assert_eq!(body["hits"].as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn paragraphs_validate_range() {
        let (_books, _store, app) = loaded_app().await;

        for uri in [
            "/paragraphs",
            "/paragraphs?bookTitle=Moby%20Dick&start=5&end=5",
            "/paragraphs?bookTitle=Moby%20Dick&start=-1",
            "/paragraphs?bookTitle=Moby%20Dick&start=12",
        ] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["status"], "error");
        }
    }

    #[tokio::test]
    async fn unknown_routes_are_json_not_found() {
        let books = tempfile::tempdir().expect("tempdir");
        let (_store, app) = test_app(&books);

        let (status, body) = get(&app, "/books/moby").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "no route for /books/moby");
    }

    #[tokio::test]
    async fn responses_allow_any_origin() {
        let books = tempfile::tempdir().expect("tempdir");
        let (_store, app) = test_app(&books);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/live")
                    .header(header::ORIGIN, "http://example.com")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
