//! Remote virtual try-on: API seam, HTTP client, polling and orchestration.

mod error;
mod http;
mod orchestrator;
mod poller;
mod progress;
mod types;

pub use error::TryOnError;
pub use http::HttpTryOnApi;
pub use orchestrator::TryOnOrchestrator;
pub use poller::{PollOutcome, Poller};
pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter};
pub use types::{
    mime_from_filename, ApiError, Category, CreateTaskRequest, CreatedTask, ImagePayload,
    TaskInfo, TaskStatus, TryOnApi, TryOnOutcome, TryOnRequest, UnknownCategory, UploadSubject,
};
