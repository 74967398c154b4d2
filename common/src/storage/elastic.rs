use std::{fmt::Write as _, time::Duration};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::{
    error::AppError,
    storage::{
        client::{ClusterHealth, SearchStore},
        types::{bulk::BulkResponse, paragraph_document::ParagraphDocument},
    },
};

const ERROR_BODY_EXCERPT: usize = 512;

#[derive(Clone, Debug)]
pub struct ElasticsearchCredentials {
    pub username: String,
    pub password: Option<String>,
}

/// [`SearchStore`] over the Elasticsearch REST API.
#[derive(Clone)]
pub struct ElasticsearchClient {
    http: Client,
    base_url: Url,
    credentials: Option<ElasticsearchCredentials>,
}

impl ElasticsearchClient {
    pub fn new(
        base_url: &str,
        credentials: Option<ElasticsearchCredentials>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|err| AppError::Validation(format!("invalid elastic_url {base_url}: {err}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Resolve an Elastic Cloud id (`name:base64(host$es_uuid$kibana_uuid)`).
    pub fn from_cloud_id(
        cloud_id: &str,
        credentials: Option<ElasticsearchCredentials>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let url = cloud_id_to_url(cloud_id)?;
        Self::new(&url, credentials, timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|err| AppError::InternalError(format!("invalid store path {path}: {err}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, credentials.password.as_deref())
            }
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        Ok(self.authorize(request).send().await?)
    }
}

pub fn cloud_id_to_url(cloud_id: &str) -> Result<String, AppError> {
    cloud_id_to_url_inner(cloud_id)
        .map_err(|err| AppError::Validation(format!("invalid elastic_cloud_id: {err}")))
}

fn cloud_id_to_url_inner(cloud_id: &str) -> anyhow::Result<String> {
    let (_, encoded) = cloud_id
        .split_once(':')
        .ok_or_else(|| anyhow!("expected <name>:<base64>"))?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .context("cloud id payload is not base64")?;
    let decoded = String::from_utf8(decoded).context("cloud id payload is not UTF-8")?;

    let mut parts = decoded.split('$');
    let host = parts
        .next()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| anyhow!("cloud id has no host"))?;
    let es_uuid = parts
        .next()
        .filter(|uuid| !uuid.is_empty())
        .ok_or_else(|| anyhow!("cloud id has no elasticsearch id"))?;

    let (domain, port) = match host.split_once(':') {
        Some((domain, port)) => (domain, Some(port)),
        None => (host, None),
    };

    Ok(match port {
        Some(port) if port != "443" => format!("https://{es_uuid}.{domain}:{port}"),
        _ => format!("https://{es_uuid}.{domain}"),
    })
}

/// Error for a non-2xx answer, keeping an excerpt of the body.
async fn status_error(response: Response, action: &str) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
    format!("{action} returned {status}: {excerpt}")
}

fn bulk_payload(index: &str, documents: &[ParagraphDocument]) -> Result<String, AppError> {
    let action = json!({ "index": { "_index": index } }).to_string();
    let mut payload = String::new();
    for document in documents {
        let source = serde_json::to_string(document)?;
        writeln!(payload, "{action}")
            .and_then(|()| writeln!(payload, "{source}"))
            .map_err(|err| AppError::InternalError(err.to_string()))?;
    }
    Ok(payload)
}

#[async_trait]
impl SearchStore for ElasticsearchClient {
    async fn health(&self) -> Result<ClusterHealth, AppError> {
        let url = self.endpoint("_cluster/health")?;
        let response = self.send(self.http.get(url)).await?;
        if !response.status().is_success() {
            return Err(AppError::StoreUnreachable(
                status_error(response, "cluster health").await,
            ));
        }
        response
            .json::<ClusterHealth>()
            .await
            .map_err(|err| AppError::InvalidStoreResponse(format!("cluster health: {err}")))
    }

    async fn index_exists(&self, index: &str) -> Result<bool, AppError> {
        let url = self.endpoint(index)?;
        let response = self.send(self.http.head(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(AppError::IndexReset(
                status_error(response, "index exists").await,
            )),
        }
    }

    async fn create_index(&self, index: &str) -> Result<(), AppError> {
        let url = self.endpoint(index)?;
        let response = self.send(self.http.put(url)).await?;
        if !response.status().is_success() {
            return Err(AppError::IndexReset(
                status_error(response, "create index").await,
            ));
        }
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), AppError> {
        let url = self.endpoint(index)?;
        let response = self.send(self.http.delete(url)).await?;
        if !response.status().is_success() {
            return Err(AppError::IndexReset(
                status_error(response, "delete index").await,
            ));
        }
        Ok(())
    }

    async fn put_mapping(&self, index: &str, mapping: &Value) -> Result<(), AppError> {
        let url = self.endpoint(&format!("{index}/_mapping"))?;
        let response = self.send(self.http.put(url).json(mapping)).await?;
        if !response.status().is_success() {
            return Err(AppError::IndexReset(
                status_error(response, "put mapping").await,
            ));
        }
        Ok(())
    }

    async fn bulk_write(
        &self,
        index: &str,
        documents: &[ParagraphDocument],
    ) -> Result<BulkResponse, AppError> {
        let url = self.endpoint("_bulk")?;
        let payload = bulk_payload(index, documents)?;
        debug!(index, documents = documents.len(), bytes = payload.len(), "bulk write");

        let response = self
            .send(
                self.http
                    .post(url)
                    .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                    .body(payload),
            )
            .await
            .map_err(|err| AppError::BulkWrite(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::BulkWrite(status_error(response, "bulk").await));
        }

        response
            .json::<BulkResponse>()
            .await
            .map_err(|err| AppError::InvalidStoreResponse(format!("bulk: {err}")))
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value, AppError> {
        let url = self.endpoint(&format!("{index}/_search"))?;
        let response = self.send(self.http.post(url).json(body)).await?;
        if !response.status().is_success() {
            return Err(AppError::InvalidStoreResponse(
                status_error(response, "search").await,
            ));
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| AppError::InvalidStoreResponse(format!("search: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(payload: &str) -> String {
        STANDARD.encode(payload)
    }

    #[test]
    fn cloud_id_resolves_to_elasticsearch_endpoint() {
        let cloud_id = format!(
            "library:{}",
            encoded("us-central1.gcp.cloud.es.io$abc123$kib456")
        );
        assert_eq!(
            cloud_id_to_url(&cloud_id).expect("valid cloud id"),
            "https://abc123.us-central1.gcp.cloud.es.io"
        );
    }

    #[test]
    fn cloud_id_keeps_non_default_port() {
        let cloud_id = format!("dev:{}", encoded("example.io:9243$esid$kbid"));
        assert_eq!(
            cloud_id_to_url(&cloud_id).expect("valid cloud id"),
            "https://esid.example.io:9243"
        );
    }

    #[test]
    fn malformed_cloud_id_is_a_validation_error() {
        assert!(matches!(
            cloud_id_to_url("no-separator"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            cloud_id_to_url("name:!!!not-base64"),
            Err(AppError::Validation(_))
        ));
        let host_only = format!("name:{}", encoded("example.io"));
        assert!(matches!(
            cloud_id_to_url(&host_only),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn endpoints_join_below_base_path() {
        let client = ElasticsearchClient::new(
            "http://localhost:9200/proxy",
            None,
            Duration::from_secs(5),
        )
        .expect("client");
        assert_eq!(
            client.endpoint("library/_search").expect("url").as_str(),
            "http://localhost:9200/proxy/library/_search"
        );
    }

    #[test]
    fn bulk_payload_is_ndjson_pairs() {
        let documents = vec![
            ParagraphDocument {
                author: "A".into(),
                title: "T".into(),
                url_original: "N/A".into(),
                url_youtube: "N/A".into(),
                url_ivoox: "N/A".into(),
                location: 0,
                text: "first".into(),
            },
            ParagraphDocument {
                author: "A".into(),
                title: "T".into(),
                url_original: "N/A".into(),
                url_youtube: "N/A".into(),
                url_ivoox: "N/A".into(),
                location: 1,
                text: "second".into(),
            },
        ];

        let payload = bulk_payload("library", &documents).expect("payload");
        let lines: Vec<&str> = payload.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(payload.ends_with('\n'));

        let action: Value = serde_json::from_str(lines[0]).expect("action line");
        assert_eq!(action["index"]["_index"], "library");
        let source: Value = serde_json::from_str(lines[3]).expect("source line");
        assert_eq!(source["location"], 1);
        assert_eq!(source["text"], "second");
    }
}
