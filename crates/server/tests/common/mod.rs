//! Common test utilities for in-process API testing with mocks.
//!
//! This module provides a test fixture that creates the router with a running
//! dispatcher backed by [`MockExecutor`], so tickets can be driven end to end
//! without spawning agent processes.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use taskrelay_core::{
    testing::MockExecutor, AgentPool, Config, DatabaseConfig, Dispatcher, DispatcherConfig,
    SqliteTicketStore, TicketStore,
};

/// Re-export fixtures for test convenience
pub use taskrelay_core::testing::fixtures;

/// Test fixture for API testing with a mock executor.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_ticket_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/tickets", json!({
///         "id": "T-1",
///         "tags": ["qa"]
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock executor - script agent outcomes and delays
    pub executor: MockExecutor,
    /// The running dispatcher behind the router
    pub dispatcher: Arc<Dispatcher>,
    /// Ticket store shared with the router
    pub ticket_store: Arc<SqliteTicketStore>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with the default dispatcher configuration.
    pub async fn new() -> Self {
        Self::with_dispatcher_config(DispatcherConfig::default()).await
    }

    /// Create a test fixture with a custom dispatcher configuration.
    pub async fn with_dispatcher_config(dispatcher_config: DispatcherConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            dispatcher: dispatcher_config.clone(),
            ..Default::default()
        };

        let ticket_store = Arc::new(
            SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"),
        );

        let executor = MockExecutor::new();
        let pool = AgentPool::from_config(&config.pools).expect("Failed to create agent pools");

        let dispatcher = Arc::new(Dispatcher::new(
            dispatcher_config,
            pool,
            Arc::new(executor.clone()),
            Arc::clone(&ticket_store) as Arc<dyn TicketStore>,
        ));
        dispatcher.start().await.expect("Failed to start dispatcher");

        let state = Arc::new(taskrelay_server::state::AppState::new(
            config,
            Arc::clone(&ticket_store) as Arc<dyn TicketStore>,
            Arc::clone(&dispatcher),
        ));

        let router = taskrelay_server::api::create_router(state);

        Self {
            router,
            executor,
            dispatcher,
            ticket_store,
            temp_dir,
        }
    }

    /// Wait until nothing is ready or running.
    pub async fn wait_idle(&self) {
        tokio::time::timeout(Duration::from_secs(10), self.dispatcher.wait_idle())
            .await
            .expect("dispatcher did not become idle");
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

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

        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
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
