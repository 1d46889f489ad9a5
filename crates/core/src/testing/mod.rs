//! Testing utilities and mock implementations.
//!
//! `MockTryOnApi` stands in for the remote service so the orchestrator and
//! the HTTP front end can be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use tryon_core::testing::{fixtures, MockTryOnApi};
//!
//! let api = Arc::new(MockTryOnApi::new());
//! api.push_task_info(Ok(TaskInfo::succeeded("https://cdn/result.png"))).await;
//!
//! let orchestrator = TryOnOrchestrator::new(api.clone(), fixtures::fast_poller());
//! let outcome = orchestrator
//!     .run_try_on(&fixtures::tryon_request(),&ProgressReporter::silent())
//!     .await?;
//! ```

mod mock_api;

pub use mock_api::{MockTryOnApi, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::PollerConfig;
    use crate::tryon::{mime_from_filename, Category, CreatedTask, ImagePayload, TryOnRequest};

    /// An image payload with the MIME type guessed from the name.
    pub fn payload(filename: &str, bytes: &[u8]) -> ImagePayload {
        ImagePayload::new(bytes.to_vec(), filename, mime_from_filename(filename))
    }

    pub fn garment() -> ImagePayload {
        payload("garment.png", b"\x89PNG garment")
    }

    pub fn model() -> ImagePayload {
        payload("model.jpg", b"\xff\xd8 model")
    }

    /// Upper-body request with no caption.
    pub fn tryon_request() -> TryOnRequest {
        TryOnRequest::new(garment(), model(), Category::UpperBody)
    }

    pub fn created_task(uuid: &str) -> CreatedTask {
        CreatedTask {
            uuid: uuid.to_string(),
            model_upload_url: format!("https://upload.test/{}/model", uuid),
            garment_upload_url: format!("https://upload.test/{}/garment", uuid),
        }
    }

    /// Default attempt budget with a 1 ms interval.
    pub fn fast_poller() -> PollerConfig {
        PollerConfig {
            interval_ms: 1,
            ..PollerConfig::default()
        }
    }
}
