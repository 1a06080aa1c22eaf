use crate::config::{EdlConfig, SourceKind};
use async_trait::async_trait;
use edl_core::{EdlError, IndicatorPage, IndicatorSource, MemoryIndicatorSource};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    page: usize,
    size: usize,
}

/// Indicator store reached over HTTP.
///
/// Sends `POST {base_url}/indicators/search` with `{query, page, size}` and
/// expects `{"iocs": [...], "total": n}` back.
pub struct HttpIndicatorSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpIndicatorSource {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/indicators/search", self.base_url)
    }
}

#[async_trait]
impl IndicatorSource for HttpIndicatorSource {
    async fn find_indicators(&self, query: &str, page: usize, size: usize) -> edl_core::Result<IndicatorPage> {
        debug!("Searching indicators: query={:?} page={} size={}", query, page, size);

        let mut request = self
            .client
            .post(self.search_url())
            .json(&SearchRequest { query, page, size });
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| EdlError::Fetch(format!("request to {} failed: {}", self.base_url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EdlError::Fetch(format!(
                "indicator search returned {}: {}",
                status,
                body.trim()
            )));
        }

        resp.json::<IndicatorPage>()
            .await
            .map_err(|e| EdlError::Fetch(format!("invalid indicator search response: {}", e)))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Build the indicator source described by `[source]`.
pub fn from_config(config: &EdlConfig) -> anyhow::Result<Arc<dyn IndicatorSource>> {
    match config.source.kind {
        SourceKind::File => {
            let path = &config.source.path;
            if !path.exists() {
                info!(
                    "Indicator file {} not found, starting with an empty store",
                    path.display()
                );
                return Ok(Arc::new(MemoryIndicatorSource::default()));
            }
            Ok(Arc::new(MemoryIndicatorSource::from_file(path)?))
        }
        SourceKind::Http => {
            let url = config
                .source
                .url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("[source] url is required when kind = \"http\""))?;
            info!("Using remote indicator store at {}", url);
            Ok(Arc::new(HttpIndicatorSource::new(
                url,
                config.source.resolved_api_key(),
                config.source.timeout(),
            )?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn spawn_store(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_source_posts_search_request() {
        let app = Router::new().route(
            "/indicators/search",
            post(|headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(json!({
                    "iocs": [{"value": format!("{}-{}", body["query"].as_str().unwrap(), body["page"]), "auth": auth}],
                    "total": 1,
                }))
            }),
        );
        let base = spawn_store(app).await;

        let source = HttpIndicatorSource::new(
            format!("{}/", base),
            Some("secret".into()),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let page = source.find_indicators("type:IP", 3, 200).await.unwrap();

        assert_eq!(page.total, Some(1));
        assert_eq!(page.iocs[0].value(), "type:IP-3");
        assert_eq!(page.iocs[0].field("auth"), Some(json!("secret")));
    }

    #[tokio::test]
    async fn test_http_source_maps_errors_to_fetch() {
        let app = Router::new().route(
            "/indicators/search",
            post(|| async { (axum::http::StatusCode::BAD_REQUEST, "bad query") }),
        );
        let base = spawn_store(app).await;
        let source = HttpIndicatorSource::new(base, None, std::time::Duration::from_secs(5)).unwrap();

        let err = source.find_indicators("type", 0, 200).await.unwrap_err();
        assert!(matches!(err, EdlError::Fetch(ref m) if m.contains("400") && m.contains("bad query")));
    }

    #[tokio::test]
    async fn test_http_source_unreachable() {
        let source = HttpIndicatorSource::new(
            "http://127.0.0.1:1",
            None,
            std::time::Duration::from_secs(2),
        )
        .unwrap();
        assert!(matches!(
            source.find_indicators("", 0, 200).await,
            Err(EdlError::Fetch(_))
        ));
    }

    #[test]
    fn test_from_config_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EdlConfig::default();
        config.source.path = dir.path().join("nope.json");
        let source = from_config(&config).unwrap();
        assert_eq!(source.name(), "memory");
    }

    #[test]
    fn test_from_config_http_requires_url() {
        let mut config = EdlConfig::default();
        config.source.kind = SourceKind::Http;
        assert!(from_config(&config).is_err());
    }
}
