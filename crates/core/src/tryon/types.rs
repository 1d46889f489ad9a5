//! Types for the remote try-on service.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::TryOnError;

// ============================================================================
// Request side
// ============================================================================

/// A binary image with the metadata the service needs.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Read an image from disk, guessing the MIME type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime_type = mime_from_filename(&filename).to_string();
        Ok(Self {
            bytes,
            filename,
            mime_type,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Bytes are left out so logs stay readable.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Guess an image MIME type from a file name.
pub fn mime_from_filename(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Garment category understood by the service. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    UpperBody,
    LowerBody,
    Dresses,
    FullBody,
    Hair,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::UpperBody,
        Category::LowerBody,
        Category::Dresses,
        Category::FullBody,
        Category::Hair,
    ];

    /// Numeric code sent on the wire.
    pub fn code(self) -> u8 {
        match self {
            Category::UpperBody => 1,
            Category::LowerBody => 2,
            Category::Dresses => 3,
            Category::FullBody => 4,
            Category::Hair => 5,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Category::UpperBody => "Upper body",
            Category::LowerBody => "Lower body",
            Category::Dresses => "Dresses",
            Category::FullBody => "Full body",
            Category::Hair => "Hair",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Category::UpperBody => "upper_body",
            Category::LowerBody => "lower_body",
            Category::Dresses => "dresses",
            Category::FullBody => "full_body",
            Category::Hair => "hair",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown category '{0}' (expected 1-5 or one of upper_body, lower_body, dresses, full_body, hair)")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts the numeric code ("1".."5") or the snake_case name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| UnknownCategory(s.to_string()));
        }
        let normalized = trimmed.to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// One try-on request: a garment, a model, a category and an optional caption.
#[derive(Debug, Clone)]
pub struct TryOnRequest {
    pub garment: ImagePayload,
    pub model: ImagePayload,
    pub category: Category,
    pub caption: Option<String>,
}

impl TryOnRequest {
    pub fn new(garment: ImagePayload, model: ImagePayload, category: Category) -> Self {
        Self {
            garment,
            model,
            category,
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Both payloads must carry bytes before anything is sent.
    pub fn validate(&self) -> Result<(), TryOnError> {
        if self.garment.is_empty() {
            return Err(TryOnError::InvalidRequest(
                "garment image is empty".to_string(),
            ));
        }
        if self.model.is_empty() {
            return Err(TryOnError::InvalidRequest(
                "model image is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Body of the create-task call.
    pub fn create_task_request(&self) -> CreateTaskRequest {
        CreateTaskRequest {
            user_img_name: self.model.filename.clone(),
            cloth_img_name: self.garment.filename.clone(),
            category: self.category.code().to_string(),
            caption: self.caption.clone().unwrap_or_default(),
        }
    }
}

/// Wire body for `POST /create-task`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub user_img_name: String,
    pub cloth_img_name: String,
    pub category: String,
    pub caption: String,
}

// ============================================================================
// Response side
// ============================================================================

/// A freshly created remote task with its pre-signed upload targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTask {
    pub uuid: String,
    pub model_upload_url: String,
    pub garment_upload_url: String,
}

/// Which image an upload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadSubject {
    Model,
    Garment,
}

impl UploadSubject {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadSubject::Model => "model",
            UploadSubject::Garment => "garment",
        }
    }
}

impl fmt::Display for UploadSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Succeeded,
    Failed,
    /// Any non-terminal value, kept verbatim.
    Processing(String),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Processing(_))
    }
}

impl From<&str> for TaskStatus {
    fn from(raw: &str) -> Self {
        // The service spells success "successed".
        match raw {
            "successed" | "succeeded" => TaskStatus::Succeeded,
            "failed" => TaskStatus::Failed,
            other => TaskStatus::Processing(other.to_string()),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Succeeded => f.write_str("succeeded"),
            TaskStatus::Failed => f.write_str("failed"),
            TaskStatus::Processing(raw) => f.write_str(raw),
        }
    }
}

/// Snapshot returned by `POST /get-task-info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub status: TaskStatus,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

impl TaskInfo {
    pub fn processing(raw_status: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Processing(raw_status.into()),
            result_url: None,
            error_message: None,
        }
    }

    pub fn succeeded(result_url: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Succeeded,
            result_url: Some(result_url.into()),
            error_message: None,
        }
    }

    pub fn failed(error_message: Option<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            result_url: None,
            error_message,
        }
    }
}

/// Resolved value of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TryOnOutcome {
    pub task_uuid: String,
    /// Displayable URL of the composited image.
    pub result_url: String,
    pub poll_attempts: u32,
}

// ============================================================================
// API seam
// ============================================================================

/// Errors from a single call to the remote service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received (connection refused, DNS, timeout...).
    #[error("No response from server: {0}")]
    Transport(String),

    /// The server replied with a non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The envelope carried a non-zero code.
    #[error("Service rejected request (code {code}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected { code: i64, message: Option<String> },

    /// The response could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built (bad URL, unencodable body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// True when no response was received at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

/// Operations offered by the remote try-on service.
#[async_trait]
pub trait TryOnApi: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Create a task and obtain its upload targets.
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<CreatedTask, ApiError>;

    /// Write an image to a pre-signed URL.
    async fn upload_image(&self, upload_url: &str, payload: &ImagePayload)
        -> Result<(), ApiError>;

    /// Submit an uploaded task for processing.
    async fn submit_task(&self, task_uuid: &str) -> Result<(), ApiError>;

    /// Query the current task status.
    async fn get_task_info(&self, task_uuid: &str) -> Result<TaskInfo, ApiError>;
}
