//! Try-on run errors.
//!
//! Every variant is fatal for the run it came from. The `Display` text is the
//! message shown to the user; callers offer a manual retry that starts over
//! from task creation.

use thiserror::Error;

use super::types::{ApiError, UploadSubject};
use crate::config::ConfigError;

const CREATE_FALLBACK: &str = "Failed to create task. Server response was invalid.";
const SUBMIT_FALLBACK: &str = "Failed to submit task. Server response was invalid.";
const STATUS_FALLBACK: &str = "Failed to get task status";
const PROCESSING_FALLBACK: &str = "Processing failed";
const NO_RESPONSE: &str =
    "No response from server. Please check your network connection and try again.";

#[derive(Debug, Error)]
pub enum TryOnError {
    /// Client could not be built from configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Request broke a precondition (empty image).
    #[error("Invalid try-on request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    TaskCreation(String),

    #[error("Failed to upload {subject} image. Please try again.")]
    Upload {
        subject: UploadSubject,
        #[source]
        source: ApiError,
    },

    #[error("{0}")]
    TaskSubmission(String),

    #[error("{0}")]
    StatusCheck(String),

    /// The service reported the task as failed.
    #[error("{0}")]
    Processing(String),

    #[error("Task processing timed out. Please try again.")]
    Timeout { attempts: u32 },

    #[error("Try-on request was cancelled")]
    Cancelled,
}

impl TryOnError {
    /// Stable label for metrics and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            TryOnError::Configuration(_) => "configuration",
            TryOnError::InvalidRequest(_) => "invalid_request",
            TryOnError::TaskCreation(_) => "task_creation",
            TryOnError::Upload { .. } => "upload",
            TryOnError::TaskSubmission(_) => "task_submission",
            TryOnError::StatusCheck(_) => "status_check",
            TryOnError::Processing(_) => "processing",
            TryOnError::Timeout { .. } => "timeout",
            TryOnError::Cancelled => "cancelled",
        }
    }

    pub(crate) fn task_creation(err: ApiError) -> Self {
        TryOnError::TaskCreation(stage_message(err, CREATE_FALLBACK))
    }

    pub(crate) fn task_submission(err: ApiError) -> Self {
        TryOnError::TaskSubmission(stage_message(err, SUBMIT_FALLBACK))
    }

    /// Only for response-level failures; transport failures are retried.
    pub(crate) fn status_check(err: ApiError) -> Self {
        let message = match err {
            ApiError::Http { status, message } => {
                format!("Status check failed: {} - {}", status, message)
            }
            ApiError::Rejected {
                message: Some(m), ..
            } if !m.is_empty() => m,
            ApiError::Transport(_) => NO_RESPONSE.to_string(),
            _ => STATUS_FALLBACK.to_string(),
        };
        TryOnError::StatusCheck(message)
    }

    pub(crate) fn processing(err_msg: Option<String>) -> Self {
        TryOnError::Processing(
            err_msg
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| PROCESSING_FALLBACK.to_string()),
        )
    }
}

/// Message for a failed create or submit call.
fn stage_message(err: ApiError, fallback: &str) -> String {
    match err {
        ApiError::Rejected {
            message: Some(m), ..
        } if !m.is_empty() => m,
        ApiError::Rejected { .. } | ApiError::InvalidResponse(_) | ApiError::InvalidRequest(_) => {
            fallback.to_string()
        }
        ApiError::Http { status, message } => format!("API Error: {} - {}", status, message),
        ApiError::Transport(_) => NO_RESPONSE.to_string(),
    }
}
