//! Try-on orchestrator.
//!
//! Drives one request through the remote protocol, strictly in order:
//! create task, upload model, upload garment, submit, poll. Any stage
//! failure ends the run; nothing is retried automatically except transient
//! status queries inside the poller.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument, Span};

use super::error::TryOnError;
use super::http::HttpTryOnApi;
use super::poller::Poller;
use super::progress::{ProgressEvent, ProgressReporter};
use super::types::{ImagePayload, TryOnApi, TryOnOutcome, TryOnRequest, UploadSubject};
use crate::config::{Config, PollerConfig};
use crate::metrics;

pub struct TryOnOrchestrator {
    api: Arc<dyn TryOnApi>,
    poller: Poller,
}

impl TryOnOrchestrator {
    pub fn new(api: Arc<dyn TryOnApi>, poller_config: PollerConfig) -> Self {
        let poller = Poller::new(Arc::clone(&api), poller_config);
        Self { api, poller }
    }

    /// Build an orchestrator talking to the configured HTTP service.
    pub fn from_config(config: &Config) -> Result<Self, TryOnError> {
        let api = HttpTryOnApi::new(config.api.clone())?;
        Ok(Self::new(Arc::new(api), config.poller.clone()))
    }

    /// Name of the API backend in use.
    pub fn api_name(&self) -> &str {
        self.api.name()
    }

    /// Run a request to completion.
    pub async fn run_try_on(
        &self,
        request: &TryOnRequest,
        reporter: &ProgressReporter,
    ) -> Result<TryOnOutcome, TryOnError> {
        self.run_try_on_cancellable(request, reporter, CancellationToken::new())
            .await
    }

    /// Run a request, aborting with [`TryOnError::Cancelled`] as soon as
    /// `cancel` fires. The token is checked before every network call and
    /// raced against in-flight calls and poll sleeps.
    pub async fn run_try_on_cancellable(
        &self,
        request: &TryOnRequest,
        reporter: &ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<TryOnOutcome, TryOnError> {
        let span = info_span!(
            "tryon_run",
            category = %request.category,
            task_uuid = tracing::field::Empty
        );
        let started = Instant::now();

        let result = self
            .execute(request, reporter, &cancel)
            .instrument(span.clone())
            .await;

        let label = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::TRYON_RUNS.with_label_values(&[label]).inc();
        metrics::TRYON_RUN_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        span.in_scope(|| match &result {
            Ok(outcome) => info!(
                result_url = %outcome.result_url,
                poll_attempts = outcome.poll_attempts,
                "Try-on completed"
            ),
            Err(e) => warn!(kind = e.kind(), error = %e, "Try-on failed"),
        });

        result
    }

    async fn execute(
        &self,
        request: &TryOnRequest,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<TryOnOutcome, TryOnError> {
        request.validate()?;

        reporter.report(&ProgressEvent::CreatingTask);
        let body = request.create_task_request();
        let task = until_cancelled(cancel, self.api.create_task(&body))
            .await?
            .map_err(TryOnError::task_creation)?;

        Span::current().record("task_uuid", task.uuid.as_str());
        info!(task_uuid = %task.uuid, "Try-on task created");

        reporter.report(&ProgressEvent::UploadingModel);
        self.upload(
            cancel,
            &task.model_upload_url,
            &request.model,
            UploadSubject::Model,
        )
        .await?;

        reporter.report(&ProgressEvent::UploadingGarment);
        self.upload(
            cancel,
            &task.garment_upload_url,
            &request.garment,
            UploadSubject::Garment,
        )
        .await?;

        reporter.report(&ProgressEvent::SubmittingTask);
        until_cancelled(cancel, self.api.submit_task(&task.uuid))
            .await?
            .map_err(TryOnError::task_submission)?;

        reporter.report(&ProgressEvent::Processing);
        let polled = self.poller.poll(&task.uuid, reporter, cancel).await?;

        Ok(TryOnOutcome {
            task_uuid: task.uuid,
            result_url: polled.result_url,
            poll_attempts: polled.attempts,
        })
    }

    async fn upload(
        &self,
        cancel: &CancellationToken,
        upload_url: &str,
        payload: &ImagePayload,
        subject: UploadSubject,
    ) -> Result<(), TryOnError> {
        let subject_label = subject.as_str();
        let result = until_cancelled(cancel, self.api.upload_image(upload_url, payload)).await?;

        match result {
            Ok(()) => {
                metrics::UPLOADS_TOTAL
                    .with_label_values(&[subject_label, "success"])
                    .inc();
                metrics::UPLOAD_BYTES
                    .with_label_values(&[subject_label])
                    .inc_by(payload.len() as u64);
                Ok(())
            }
            Err(source) => {
                metrics::UPLOADS_TOTAL
                    .with_label_values(&[subject_label, "error"])
                    .inc();
                Err(TryOnError::Upload { subject, source })
            }
        }
    }
}

/// Await `fut` unless `cancel` fires first. Checks the token before polling.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, TryOnError> {
    if cancel.is_cancelled() {
        return Err(TryOnError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TryOnError::Cancelled),
        out = fut => Ok(out),
    }
}
