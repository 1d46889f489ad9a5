//! HTTP client for the remote try-on service.
//!
//! Every JSON call is a bearer-authenticated POST under the configured base
//! URL. Responses are wrapped in an envelope `{code, message, data}` where a
//! non-zero `code` means the service rejected the request regardless of the
//! HTTP status. Image uploads go straight to the pre-signed URLs returned by
//! task creation and carry no credential.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ApiError, CreateTaskRequest, CreatedTask, ImagePayload, TaskInfo, TryOnApi};
use crate::config::{validate_api_config, ApiConfig, ConfigError};
use crate::metrics;

const CREATE_TASK_PATH: &str = "/create-task";
const SUBMIT_TASK_PATH: &str = "/submit-task";
const TASK_INFO_PATH: &str = "/get-task-info";

/// Longest slice of a raw body quoted in an error message.
const MAX_BODY_EXCERPT: usize = 200;

/// Try-on API client backed by reqwest.
pub struct HttpTryOnApi {
    client: Client,
    config: ApiConfig,
}

impl HttpTryOnApi {
    /// Create a new client. Fails when the domain or key is missing.
    pub fn new(config: ApiConfig) -> Result<Self, ConfigError> {
        validate_api_config(&config)?;

        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| {
            ConfigError::ValidationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    /// POST a JSON body and unwrap the response envelope.
    async fn post_envelope<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        let url = self.config.endpoint(path);
        debug!(url = %url, "Try-on API request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to read response body: {}", e))
        })?;

        parse_envelope(status, &bytes)
    }

    async fn send_create_task(&self, request: &CreateTaskRequest) -> Result<CreatedTask, ApiError> {
        let data = self.post_envelope(CREATE_TASK_PATH, request).await?;
        let data: CreateTaskData = decode_data(data, "create-task")?;
        Ok(data.into())
    }

    async fn send_task_info(&self, task_uuid: &str) -> Result<TaskInfo, ApiError> {
        let data = self
            .post_envelope(TASK_INFO_PATH, &TaskRef { task_uuid })
            .await?;
        let data: TaskInfoData = decode_data(data, "get-task-info")?;
        Ok(data.into())
    }

    async fn put_image(&self, upload_url: &str, payload: &ImagePayload) -> Result<(), ApiError> {
        debug!(
            filename = %payload.filename,
            mime_type = %payload.mime_type,
            bytes = payload.len(),
            "Uploading image to pre-signed URL"
        );

        let response = self
            .client
            .put(upload_url)
            .header(CONTENT_TYPE, &payload.mime_type)
            .body(payload.bytes.clone())
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: excerpt(&body),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TryOnApi for HttpTryOnApi {
    fn name(&self) -> &str {
        "http"
    }

    async fn create_task(&self, request: &CreateTaskRequest) -> Result<CreatedTask, ApiError> {
        let result = self.send_create_task(request).await;
        record("create_task", &result);
        result
    }

    async fn upload_image(
        &self,
        upload_url: &str,
        payload: &ImagePayload,
    ) -> Result<(), ApiError> {
        let result = self.put_image(upload_url, payload).await;
        record("upload_image", &result);
        result
    }

    async fn submit_task(&self, task_uuid: &str) -> Result<(), ApiError> {
        let result = self
            .post_envelope(SUBMIT_TASK_PATH, &TaskRef { task_uuid })
            .await
            .map(|_| ());
        record("submit_task", &result);
        result
    }

    async fn get_task_info(&self, task_uuid: &str) -> Result<TaskInfo, ApiError> {
        let result = self.send_task_info(task_uuid).await;
        record("get_task_info", &result);
        result
    }
}

fn record<T>(operation: &str, result: &Result<T, ApiError>) {
    metrics::API_REQUESTS
        .with_label_values(&[operation, metrics::api_status_label(result)])
        .inc();
}

/// Map a reqwest send failure. Only builder errors mean a request never left.
fn send_error(e: reqwest::Error) -> ApiError {
    if e.is_builder() {
        ApiError::InvalidRequest(e.to_string())
    } else {
        ApiError::Transport(e.to_string())
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_BODY_EXCERPT {
        let cut: String = trimmed.chars().take(MAX_BODY_EXCERPT).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Envelope around every JSON response. `data` stays raw until the code is
/// known to be zero so error bodies with odd payloads still parse.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct TaskRef<'a> {
    task_uuid: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateTaskData {
    uuid: String,
    user_img_url: String,
    cloth_img_url: String,
}

impl From<CreateTaskData> for CreatedTask {
    fn from(data: CreateTaskData) -> Self {
        CreatedTask {
            uuid: data.uuid,
            model_upload_url: data.user_img_url,
            garment_upload_url: data.cloth_img_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskInfoData {
    status: String,
    #[serde(default)]
    tryon_img_url: Option<String>,
    #[serde(default)]
    err_msg: Option<String>,
}

impl From<TaskInfoData> for TaskInfo {
    fn from(data: TaskInfoData) -> Self {
        TaskInfo {
            status: data.status.as_str().into(),
            result_url: data.tryon_img_url.filter(|u| !u.is_empty()),
            error_message: data.err_msg.filter(|m| !m.is_empty()),
        }
    }
}

/// Classify a response by HTTP status and envelope code.
fn parse_envelope(status: u16, body: &[u8]) -> Result<Option<serde_json::Value>, ApiError> {
    let envelope = serde_json::from_slice::<Envelope>(body);

    if !(200..300).contains(&status) {
        let message = match &envelope {
            Ok(Envelope {
                message: Some(m), ..
            }) if !m.is_empty() => m.clone(),
            _ => excerpt(&String::from_utf8_lossy(body)),
        };
        return Err(ApiError::Http { status, message });
    }

    let envelope = envelope
        .map_err(|e| ApiError::InvalidResponse(format!("Malformed response envelope: {}", e)))?;

    match envelope.code {
        Some(0) => Ok(envelope.data.filter(|d| !d.is_null())),
        Some(code) => Err(ApiError::Rejected {
            code,
            message: envelope.message.filter(|m| !m.is_empty()),
        }),
        None => Err(ApiError::InvalidResponse(
            "Response envelope has no code".to_string(),
        )),
    }
}

fn decode_data<T: DeserializeOwned>(
    data: Option<serde_json::Value>,
    operation: &str,
) -> Result<T, ApiError> {
    let data = data.ok_or_else(|| {
        ApiError::InvalidResponse(format!("{} response has no data", operation))
    })?;
    serde_json::from_value(data).map_err(|e| {
        ApiError::InvalidResponse(format!("Failed to parse {} data: {}", operation, e))
    })
}
