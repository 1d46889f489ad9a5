//! Try-on job API handlers.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use tryon_core::{tryon::mime_from_filename, Category, ImagePayload, TryOnRequest};

use crate::jobs::{Job, JobError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

fn error_response(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn multipart_error(e: MultipartError) -> (StatusCode, Json<ErrorResponse>) {
    error_response(e.status(), e.body_text())
}

fn job_error(e: JobError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
        JobError::AlreadyFinished { .. } | JobError::StillRunning(_) => StatusCode::CONFLICT,
    };
    error_response(status, e.to_string())
}

// ============================================================================
// Form parsing
// ============================================================================

/// Fields of the try-on form as received.
#[derive(Default)]
struct TryOnForm {
    garment: Option<ImagePayload>,
    model: Option<ImagePayload>,
    category: Option<String>,
    caption: Option<String>,
}

impl TryOnForm {
    async fn read(multipart: &mut Multipart) -> ApiResult<Self> {
        let mut form = TryOnForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "garment" | "model" => {
                    let filename = field
                        .file_name()
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| name.clone());
                    let mime_type = field
                        .content_type()
                        .filter(|ct| ct.starts_with("image/"))
                        .map(|ct| ct.to_string())
                        .unwrap_or_else(|| mime_from_filename(&filename).to_string());
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    let payload = ImagePayload::new(bytes.to_vec(), filename, mime_type);
                    if name == "garment" {
                        form.garment = Some(payload);
                    } else {
                        form.model = Some(payload);
                    }
                }
                "category" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    if !text.trim().is_empty() {
                        form.category = Some(text);
                    }
                }
                "caption" => {
                    let text = field.text().await.map_err(multipart_error)?;
                    let text = text.trim();
                    if !text.is_empty() {
                        form.caption = Some(text.to_string());
                    }
                }
                other => debug!("Ignoring unknown form field '{}'", other),
            }
        }

        Ok(form)
    }

    /// Apply the form's precondition checks and build the request.
    fn into_request(self) -> ApiResult<TryOnRequest> {
        let (garment, model) = match (self.garment, self.model) {
            (Some(g), Some(m)) if !g.is_empty() && !m.is_empty() => (g, m),
            _ => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    "Please select both a garment and a model image",
                ))
            }
        };

        let category: Category = match self.category {
            Some(raw) => raw
                .parse()
                .map_err(|e: tryon_core::tryon::UnknownCategory| {
                    error_response(StatusCode::BAD_REQUEST, e.to_string())
                })?,
            None => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    "Please select a category",
                ))
            }
        };

        let mut request = TryOnRequest::new(garment, model, category);
        request.caption = self.caption;
        Ok(request)
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a try-on form. The run continues in the background.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let request = TryOnForm::read(&mut multipart).await?.into_request()?;
    let job = state.jobs().start(request);
    Ok((StatusCode::ACCEPTED, Json(job)))
}

pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<ListJobsResponse> {
    let jobs = state.jobs().list();
    Json(ListJobsResponse {
        total: jobs.len(),
        jobs,
    })
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    state
        .jobs()
        .get(&id)
        .map(Json)
        .ok_or_else(|| job_error(JobError::NotFound(id)))
}

/// Cancel a running job (DELETE endpoint)
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    state.jobs().cancel(&id).map(Json).map_err(job_error)
}

/// Start over from task creation with the inputs of a finished job.
pub async fn retry_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    let job = state.jobs().retry(&id).map_err(job_error)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}
