use catalog::RegionGroups;
use foundation::geo::BBox;
use reqwest::Client;
use scene::asset::{Asset, sanitize_assets};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::protocol::{
    AnnotationRequest, PipelineJobStatus, PipelineLogsResponse, PipelineStatusResponse,
    RunPipelineRequest,
};

pub const DEFAULT_LOG_LINES: u32 = 20;

const NO_QUERY: [(&str, &str); 0] = [];

/// Failure of a backend call. Never fatal: callers log it and keep their
/// prior state.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered HTTP {status}")]
    Status { status: u16, url: String },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// HTTP client for the pipeline backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET /regions`.
    pub async fn list_regions(&self) -> Result<RegionGroups, NetworkError> {
        self.get_json("regions", &NO_QUERY).await
    }

    /// `GET /assets` scoped to `bbox`. Records with unusable coordinates are
    /// dropped.
    pub async fn fetch_assets(&self, bbox: BBox) -> Result<Vec<Asset>, NetworkError> {
        let raw: Vec<Asset> = self.get_json("assets", &bbox).await?;
        Ok(sanitize_assets(raw))
    }

    /// `POST /annotation/from-map`.
    pub async fn post_annotation(&self, body: &AnnotationRequest) -> Result<(), NetworkError> {
        self.post_json("annotation/from-map", body).await
    }

    /// `POST /pipeline/run/{job_type}` with `{params}`.
    pub async fn run_pipeline<P: Serialize>(&self, job_type: &str, params: P) -> Result<(), NetworkError> {
        let path = format!("pipeline/run/{job_type}");
        self.post_json(&path, &RunPipelineRequest { params }).await
    }

    pub async fn pipeline_status(&self) -> Result<PipelineStatusResponse, NetworkError> {
        self.get_json("pipeline/status", &NO_QUERY).await
    }

    pub async fn pipeline_logs(&self, lines: u32) -> Result<PipelineLogsResponse, NetworkError> {
        self.get_json("pipeline/logs", &[("lines", lines)]).await
    }

    /// Status plus the log tail. A failed log read still yields a snapshot.
    pub async fn job_status(&self, log_lines: u32) -> Result<PipelineJobStatus, NetworkError> {
        let status = self.pipeline_status().await?;
        let logs = match self.pipeline_logs(log_lines).await {
            Ok(l) => Some(l),
            Err(err) => {
                debug!(error = %err, "pipeline logs unavailable");
                None
            }
        };
        Ok(PipelineJobStatus::from_parts(status, logs))
    }

    async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T, NetworkError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| NetworkError::Transport {
                url: url.clone(),
                source,
            })?;
        let bytes = Self::checked_body(resp, &url).await?;
        serde_json::from_slice(&bytes).map_err(|source| NetworkError::Decode { url, source })
    }

    async fn post_json<B>(&self, path: &str, body: &B) -> Result<(), NetworkError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| NetworkError::Transport {
                url: url.clone(),
                source,
            })?;
        Self::checked_body(resp, &url).await?;
        Ok(())
    }

    async fn checked_body(resp: reqwest::Response, url: &str) -> Result<Vec<u8>, NetworkError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let bytes = resp.bytes().await.map_err(|source| NetworkError::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use foundation::geo::BBox;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::{BackendClient, NetworkError};
    use crate::protocol::{AnnotationRequest, TRAIN_SATELLITE_JOB, TrainParams};

    type Seen = Arc<Mutex<Vec<(String, Value)>>>;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    async fn assets(Query(q): Query<HashMap<String, f64>>) -> Json<Value> {
        assert_eq!(q.get("min_lat"), Some(&40.0));
        assert_eq!(q.get("max_lng"), Some(&-76.5));
        Json(json!([
            {"id": "MT-1", "lat": 40.1, "lng": -76.8, "status": "Verified", "confidence": 0.9},
            {"id": "bad", "lat": 91.0, "lng": -76.8, "status": "New", "confidence": 0.9}
        ]))
    }

    async fn record_annotation(State(seen): State<Seen>, Json(body): Json<Value>) -> StatusCode {
        seen.lock().unwrap().push(("annotation".to_string(), body));
        StatusCode::OK
    }

    async fn record_run(State(seen): State<Seen>, Path(job): Path<String>, Json(body): Json<Value>) -> Json<Value> {
        seen.lock().unwrap().push((job, body));
        Json(json!({"status": "started"}))
    }

    fn backend(seen: Seen) -> Router {
        Router::new()
            .route(
                "/regions",
                get(|| async {
                    Json(json!({"PA": [{"id": "dauphin_pa", "name": "Dauphin", "center": [-76.8, 40.4]}]}))
                }),
            )
            .route("/assets", get(assets))
            .route("/annotation/from-map", post(record_annotation))
            .route("/pipeline/run/:job", post(record_run))
            .route(
                "/pipeline/status",
                get(|| async { Json(json!({"running": true, "job_type": "train_satellite"})) }),
            )
            .route(
                "/pipeline/logs",
                get(|Query(q): Query<HashMap<String, u32>>| async move {
                    Json(json!({"logs": [format!("tail {}", q.get("lines").copied().unwrap_or(0))]}))
                }),
            )
            .with_state(seen)
    }

    #[tokio::test]
    async fn reads_regions_assets_and_status() {
        let base = serve(backend(Seen::default())).await;
        let client = BackendClient::new(base);

        let groups = client.list_regions().await.unwrap();
        assert_eq!(groups["PA"][0].id, "dauphin_pa");

        let assets = client
            .fetch_assets(BBox::new(40.0, 40.5, -77.0, -76.5))
            .await
            .unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id.as_str(), "MT-1");

        let status = client.job_status(7).await.unwrap();
        assert!(status.running);
        assert_eq!(status.last_log_line.as_deref(), Some("tail 7"));
    }

    #[tokio::test]
    async fn posts_annotation_and_training_run() {
        let seen = Seen::default();
        let client = BackendClient::new(serve(backend(seen.clone())).await);

        client
            .post_annotation(&AnnotationRequest {
                lat: 40.1,
                lon: -76.8,
                dataset: "satellite".to_string(),
            })
            .await
            .unwrap();
        client
            .run_pipeline(TRAIN_SATELLITE_JOB, TrainParams::default())
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, json!({"lat": 40.1, "lon": -76.8, "dataset": "satellite"}));
        assert_eq!(seen[1].0, "train_satellite");
        assert_eq!(seen[1].1["params"]["resume"], json!(true));
    }

    #[tokio::test]
    async fn maps_failures_to_typed_errors() {
        let app = Router::new()
            .route("/assets", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/regions", get(|| async { "not json" }));
        let client = BackendClient::new(serve(app).await);

        let err = client
            .fetch_assets(BBox::new(0.0, 1.0, 0.0, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::Status { status: 500, .. }));

        let err = client.list_regions().await.unwrap_err();
        assert!(matches!(err, NetworkError::Decode { .. }));

        let unreachable = BackendClient::new("http://127.0.0.1:9");
        assert!(matches!(
            unreachable.pipeline_status().await.unwrap_err(),
            NetworkError::Transport { .. }
        ));
    }
}
