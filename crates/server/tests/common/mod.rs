//! Common test utilities for in-process API testing with a mock try-on service.
//!
//! The fixture builds the real router on top of a `MockTryOnApi`, so the
//! whole submission flow (multipart parsing, job registry, orchestrator,
//! poller) runs without network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use tryon_core::{
    testing::MockTryOnApi, ApiConfig, Config, PollerConfig, ServerConfig, TryOnOrchestrator,
};
use tryon_server::api::{create_router, WsBroadcaster};
use tryon_server::state::AppState;

/// Re-export fixtures for test convenience
pub use tryon_core::testing::fixtures;

const BOUNDARY: &str = "tryon-test-boundary";

/// Test fixture with a mock try-on service behind the router.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new();
///     let response = fixture.submit(MultipartForm::valid()).await;
///     assert_eq!(response.status, StatusCode::ACCEPTED);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock try-on service - script responses and inspect calls
    pub api: Arc<MockTryOnApi>,
    pub state: Arc<AppState>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture polling every millisecond with the default attempt budget.
    pub fn new() -> Self {
        Self::with_poller(fixtures::fast_poller())
    }

    pub fn with_poller(poller: PollerConfig) -> Self {
        Self::with_server_config(poller, ServerConfig::default())
    }

    pub fn with_server_config(poller: PollerConfig, server: ServerConfig) -> Self {
        let api = Arc::new(MockTryOnApi::new());
        let config = Config {
            api: ApiConfig::new("tryon.test", "test-key"),
            poller: poller.clone(),
            server,
        };

        let orchestrator = Arc::new(TryOnOrchestrator::new(
            Arc::clone(&api) as Arc<dyn tryon_core::TryOnApi>,
            poller,
        ));
        let state = Arc::new(AppState::new(
            config,
            orchestrator,
            WsBroadcaster::default(),
        ));
        let router = create_router(Arc::clone(&state));

        Self { router, api, state }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path), Body::empty())
            .await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("POST").uri(path), Body::empty())
            .await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("DELETE").uri(path), Body::empty())
            .await
    }

    /// Submit a try-on form.
    pub async fn submit(&self, form: MultipartForm) -> TestResponse {
        let builder = Request::builder()
            .method("POST")
            .uri("/api/v1/tryon")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        self.send(builder, Body::from(form.into_bytes())).await
    }

    /// Fetch raw text, for non-JSON endpoints such as `/metrics`.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Poll a job until it leaves `running`.
    pub async fn wait_for_job(&self, id: &str) -> Value {
        for _ in 0..500 {
            let response = self.get(&format!("/api/v1/tryon/{}", id)).await;
            if response.body["state"] != "running" {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("Job {} did not finish in time", id);
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Builder for `multipart/form-data` bodies.
#[derive(Default)]
pub struct MultipartForm {
    parts: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Garment, model and upper-body category.
    pub fn valid() -> Self {
        Self::new()
            .file("garment", "garment.png", "image/png", b"\x89PNG garment")
            .file("model", "model.jpg", "image/jpeg", b"\xff\xd8 model")
            .text("category", "1")
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, filename, content_type
            )
            .as_bytes(),
        );
        self.parts.extend_from_slice(bytes);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.parts
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.parts
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
