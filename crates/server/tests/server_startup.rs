//! Tests that run the real `tryon` binary against a config file.

use std::io::Write;
use std::net::TcpListener;
use std::process::ExitStatus;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tempfile::NamedTempFile;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};

fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// A running server bound to a free local port.
///
/// The child is killed on drop; the config file lives as long as the server.
struct StartedServer {
    port: u16,
    client: Client,
    _child: Child,
    _config: NamedTempFile,
}

impl StartedServer {
    async fn start() -> Self {
        let port = get_available_port();
        let config = write_config(&format!(
            r#"
[api]
domain = "tryon.invalid"
api_key = "startup-test-key"

[server]
host = "127.0.0.1"
port = {}
"#,
            port
        ));

        let child = Command::new(env!("CARGO_BIN_EXE_tryon"))
            .env("TRYON_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .kill_on_drop(true)
            .spawn()
            .expect("Failed to spawn server");

        let server = Self {
            port,
            client: Client::new(),
            _child: child,
            _config: config,
        };
        assert!(server.wait_ready(40).await, "Server did not start in time");
        server
    }

    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    async fn wait_ready(&self, max_attempts: u32) -> bool {
        for _ in 0..max_attempts {
            if self.client.get(self.url("/api/v1/health")).send().await.is_ok() {
                return true;
            }
            sleep(Duration::from_millis(50)).await;
        }
        false
    }

    async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send request");
        let status = response.status();
        let json = response.json().await.expect("Failed to parse JSON");
        (status, json)
    }

    async fn get_text(&self, path: &str) -> String {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send request")
            .text()
            .await
            .expect("Failed to read body")
    }
}

/// Run the binary until it exits on its own.
async fn run_to_exit(config_path: &std::path::Path) -> ExitStatus {
    timeout(
        Duration::from_secs(5),
        Command::new(env!("CARGO_BIN_EXE_tryon"))
            .env("TRYON_CONFIG", config_path)
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command")
    .status
}

#[tokio::test]
async fn test_fresh_server_has_no_jobs() {
    let server = StartedServer::start().await;

    let (status, health) = server.get_json("/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["api"], "http");

    let (status, list) = server.get_json("/api/v1/tryon").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["jobs"], serde_json::json!([]));
    assert_eq!(list["total"], 0);

    let (status, missing) = server.get_json("/api/v1/tryon/no-such-job").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(missing["error"].is_string());

    let metrics = server.get_text("/metrics").await;
    assert!(metrics.contains("tryon_jobs_by_state"));
}

#[tokio::test]
async fn test_config_endpoint_hides_key_and_shows_defaults() {
    let server = StartedServer::start().await;

    let (status, json) = server.get_json("/api/v1/config").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["api"]["base_url"], "https://tryon.invalid/api");
    assert_eq!(json["api"]["api_key_configured"], true);
    assert_eq!(json["poller"]["interval_ms"], 10_000);
    assert_eq!(json["poller"]["max_attempts"], 30);
    assert_eq!(json["server"]["port"], server.port);
    assert_eq!(json["server"]["max_finished_jobs"], 100);
    assert!(!json.to_string().contains("startup-test-key"));
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let status = run_to_exit(std::path::Path::new("/nonexistent/config.toml")).await;
    assert!(!status.success());
}

#[tokio::test]
async fn test_missing_api_section_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 8080
"#,
    );
    assert!(!run_to_exit(config.path()).await.success());
}

#[tokio::test]
async fn test_empty_api_key_exits_with_error() {
    let config = write_config(
        r#"
[api]
domain = "tryon.invalid"
api_key = ""
"#,
    );
    assert!(!run_to_exit(config.path()).await.success());
}

#[tokio::test]
async fn test_zero_poll_budget_exits_with_error() {
    let config = write_config(
        r#"
[api]
domain = "tryon.invalid"
api_key = "k"

[poller]
max_attempts = 0
"#,
    );
    assert!(!run_to_exit(config.path()).await.success());
}
