use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Remote try-on service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Service host name (e.g., "tryon.example.com")
    pub domain: String,
    /// Bearer credential sent on every JSON request
    pub api_key: String,
    /// Path prefix for all operations (default: "/api")
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// URL scheme (default: "https")
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Optional per-request timeout in seconds. Unset means no timeout;
    /// overall run time is bounded by the poller budget instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl ApiConfig {
    /// Build a config with default scheme and base path.
    pub fn new(domain: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            api_key: api_key.into(),
            base_path: default_base_path(),
            scheme: default_scheme(),
            request_timeout_secs: None,
        }
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}{}",
            self.scheme,
            self.domain.trim_end_matches('/'),
            self.base_path.trim_end_matches('/')
        )
    }

    /// Full URL for an operation path such as "/create-task".
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

fn default_base_path() -> String {
    "/api".to_string()
}

fn default_scheme() -> String {
    "https".to_string()
}

/// Task status polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollerConfig {
    /// Delay between status queries (milliseconds).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum number of status queries before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl PollerConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_interval_ms() -> u64 {
    10_000 // 10 seconds
}

fn default_max_attempts() -> u32 {
    30
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted multipart body for a try-on submission.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Finished jobs kept in memory; the oldest are dropped past this.
    #[serde(default = "default_max_finished_jobs")]
    pub max_finished_jobs: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            max_finished_jobs: default_max_finished_jobs(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_max_finished_jobs() -> usize {
    100
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub api: SanitizedApiConfig,
    pub poller: PollerConfig,
    pub server: ServerConfig,
}

/// Sanitized API config (key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedApiConfig {
    pub base_url: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            api: SanitizedApiConfig {
                base_url: config.api.base_url(),
                api_key_configured: !config.api.api_key.is_empty(),
                request_timeout_secs: config.api.request_timeout_secs,
            },
            poller: config.poller.clone(),
            server: config.server.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[api]
domain = "tryon.example.com"
api_key = "secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_path, "/api");
        assert_eq!(config.api.scheme, "https");
        assert!(config.api.request_timeout_secs.is_none());
        assert_eq!(config.poller.interval_ms, 10_000);
        assert_eq!(config.poller.max_attempts, 30);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.max_finished_jobs, 100);
    }

    #[test]
    fn test_deserialize_missing_api_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[api]
domain = "localhost:9000"
api_key = "k"
base_path = "/v2"
scheme = "http"
request_timeout_secs = 15

[poller]
interval_ms = 250
max_attempts = 5

[server]
host = "127.0.0.1"
port = 9100
max_upload_bytes = 1024
max_finished_jobs = 7
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url(), "http://localhost:9000/v2");
        assert_eq!(config.api.request_timeout_secs, Some(15));
        assert_eq!(config.poller.max_attempts, 5);
        assert_eq!(config.poller.interval(), std::time::Duration::from_millis(250));
        assert_eq!(config.server.max_upload_bytes, 1024);
        assert_eq!(config.server.max_finished_jobs, 7);
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let mut api = ApiConfig::new("tryon.example.com/", "k");
        api.base_path = "/api/".to_string();
        assert_eq!(
            api.endpoint("/create-task"),
            "https://tryon.example.com/api/create-task"
        );
    }

    #[test]
    fn test_sanitized_config_hides_key() {
        let config = Config {
            api: ApiConfig::new("tryon.example.com", "super-secret"),
            poller: PollerConfig::default(),
            server: ServerConfig::default(),
        };
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.api.api_key_configured);
        assert_eq!(sanitized.api.base_url, "https://tryon.example.com/api");

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
    }
}
