//! Progress reporting for try-on runs.
//!
//! Progress is a side channel: the orchestrator renders each phase as a
//! human-readable line and hands it to a caller-supplied callback. Nothing is
//! persisted and a misbehaving callback cannot affect the run.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

/// Callback receiving rendered progress lines.
///
/// Called synchronously from the run; implementations should return quickly
/// (push to a channel, update a field) and must not block.
pub type ProgressCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// A phase of a try-on run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    CreatingTask,
    UploadingModel,
    UploadingGarment,
    SubmittingTask,
    Processing,
    /// Emitted from the second status query onward.
    WaitingForCompletion { attempt: u32 },
    /// Non-terminal status reported by the service.
    StillProcessing { status: String, retry_in: Duration },
    /// Status query got no response; the next tick will retry.
    NetworkRetry { retry_in: Duration },
    Completed,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::CreatingTask => f.write_str("Creating try-on task..."),
            ProgressEvent::UploadingModel => f.write_str("Uploading model image..."),
            ProgressEvent::UploadingGarment => f.write_str("Uploading garment image..."),
            ProgressEvent::SubmittingTask => f.write_str("Submitting try-on task..."),
            ProgressEvent::Processing => {
                f.write_str("Processing images... This may take a moment.")
            }
            ProgressEvent::WaitingForCompletion { attempt } => write!(
                f,
                "Waiting for processing to complete... ({})",
                attempt
            ),
            ProgressEvent::StillProcessing { status, retry_in } => write!(
                f,
                "Task status: {}. Checking again in {}...",
                status,
                human_interval(*retry_in)
            ),
            ProgressEvent::NetworkRetry { retry_in } => write!(
                f,
                "Network issue while checking status. Retrying in {}...",
                human_interval(*retry_in)
            ),
            ProgressEvent::Completed => f.write_str("Processing complete! Displaying result..."),
        }
    }
}

fn human_interval(interval: Duration) -> String {
    let millis = interval.as_millis();
    if millis >= 1000 && millis % 1000 == 0 {
        let secs = millis / 1000;
        if secs == 1 {
            "1 second".to_string()
        } else {
            format!("{} seconds", secs)
        }
    } else {
        format!("{} ms", millis)
    }
}

/// Status reporter handed to a run.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// Build a reporter from a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self::new(Arc::new(f))
    }

    /// Reporter that only logs.
    pub fn silent() -> Self {
        Self { callback: None }
    }

    /// Render, log and forward an event.
    pub fn report(&self, event: &ProgressEvent) {
        let text = event.to_string();
        info!(progress = %text, "Try-on progress");

        if let Some(callback) = &self.callback {
            if catch_unwind(AssertUnwindSafe(|| callback(&text))).is_err() {
                warn!("Progress callback panicked; continuing without it for this event");
            }
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
