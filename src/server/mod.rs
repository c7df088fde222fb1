//! HTTP surface: shared state, router assembly and error mapping.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::core::jobs::JobDispatcher;
use crate::verification::federation::FederationProbe;

pub use error::ApiError;

/// State shared by every handler.
pub struct AppState {
    pub dispatcher: JobDispatcher,
    pub probe: FederationProbe,
}

impl AppState {
    pub fn new(dispatcher: JobDispatcher, probe: FederationProbe) -> Arc<Self> {
        Arc::new(Self { dispatcher, probe })
    }
}

/// Builds the full application router with request tracing.
pub fn create_app(state: Arc<AppState>) -> Router {
    routes::api_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::jobs::JobStore;
    use crate::core::models::{BulkVerification, FederationCheck, Job, JobResult, JobStatus};
    use crate::server::routes::health::HealthResponse;
    use crate::server::routes::jobs::StartJobResponse;
    use crate::server::routes::verification::INVALID_SYNTAX_BODY;
    use crate::verification::source::tests::StubSource;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let dispatcher = JobDispatcher::new(Arc::new(JobStore::new()), Arc::new(StubSource::instant()));
        let probe = FederationProbe::new(&Config::default()).unwrap();
        create_app(AppState::new(dispatcher, probe))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_bulk_job_lifecycle() {
        let app = test_app();
        let (status, body) = send(
            &app,
            post("/bulk/job/start", r#"{"emails": ["a@x.com", "bad-address"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let started: StartJobResponse = serde_json::from_slice(&body).unwrap();

        let status_uri = format!("/bulk/job/status/{}", started.job_id);
        let mut job: Option<Job> = None;
        for _ in 0..200 {
            let (status, body) = send(&app, get(&status_uri)).await;
            assert_eq!(status, StatusCode::OK);
            let current: Job = serde_json::from_slice(&body).unwrap();
            assert!(current.total_processed <= current.total_records);
            if current.status == JobStatus::Finished {
                job = Some(current);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let job = job.expect("job never finished");
        assert_eq!(job.total_records, 2);
        assert_eq!(job.total_processed, 2);
        assert!(job.finished_at.is_some());

        let (status, body) = send(&app, get(&format!("/bulk/job/results/{}", started.job_id))).await;
        assert_eq!(status, StatusCode::OK);
        let result: JobResult = serde_json::from_slice(&body).unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_status_wire_format() {
        let app = test_app();
        let (_, body) = send(&app, post("/bulk/job/start", r#"{"emails": ["a@x.com"]}"#)).await;
        let started: StartJobResponse = serde_json::from_slice(&body).unwrap();

        let (_, body) = send(&app, get(&format!("/bulk/job/status/{}", started.job_id))).await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["job_id"], started.job_id.as_str());
        assert!(value["job_status"].is_string());
        assert_eq!(value["total_records"], 1);
        assert!(value["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let app = test_app();
        let (status, _) = send(&app, get("/bulk/job/status/does-not-exist")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, get("/bulk/job/results/does-not-exist")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_start_requests() {
        let app = test_app();
        for body in ["", "{not json", r#"{"emails": []}"#, r#"{"other": 1}"#] {
            let (status, _) = send(&app, post("/bulk/job/start", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {:?}", body);
        }
    }

    #[tokio::test]
    async fn test_single_verification() {
        let app = test_app();
        let (status, body) = send(&app, get("/v1/a@x.com/verification")).await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["email"], "a@x.com");

        let (status, body) = send(&app, get("/v1/bad-address/verification")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, INVALID_SYNTAX_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_synchronous_bulk() {
        let app = test_app();
        let (status, body) = send(&app, get("/verify/bulk?emails=a@x.com,b@y.org,nope")).await;
        assert_eq!(status, StatusCode::OK);
        let bulk: BulkVerification = serde_json::from_slice(&body).unwrap();
        assert_eq!(bulk.results.len(), 2);
        assert_eq!(bulk.errors.len(), 1);

        let (_, body) = send(&app, get("/verify/bulk?emails=a@x.com")).await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(value.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_federation_without_at_sign() {
        let app = test_app();
        let (status, body) = send(&app, get("/v1/nodot/federation")).await;
        assert_eq!(status, StatusCode::OK);
        let check: FederationCheck = serde_json::from_slice(&body).unwrap();
        assert!(!check.federated);
    }
}
