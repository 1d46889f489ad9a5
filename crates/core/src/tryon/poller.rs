//! Status polling for a submitted task.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::TryOnError;
use super::progress::{ProgressEvent, ProgressReporter};
use super::types::{ApiError, TaskStatus, TryOnApi};
use crate::config::PollerConfig;
use crate::metrics;

/// Result URL plus the number of status queries it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub result_url: String,
    pub attempts: u32,
}

/// Queries task status at a fixed interval until a terminal state or the
/// attempt budget runs out.
///
/// Every attempted query counts toward the budget, including ones that got
/// no response. Each non-terminal answer is reported, the last one included.
/// The first query runs immediately and there is no sleep after the last one.
pub struct Poller {
    api: Arc<dyn TryOnApi>,
    config: PollerConfig,
}

impl Poller {
    pub fn new(api: Arc<dyn TryOnApi>, config: PollerConfig) -> Self {
        Self { api, config }
    }

    pub async fn poll(
        &self,
        task_uuid: &str,
        reporter: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, TryOnError> {
        let interval = self.config.interval();
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(TryOnError::Cancelled);
            }
            if attempt > 1 {
                reporter.report(&ProgressEvent::WaitingForCompletion { attempt });
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TryOnError::Cancelled),
                r = self.api.get_task_info(task_uuid) => r,
            };

            let is_last = attempt == max_attempts;
            match response {
                Ok(info) => match info.status {
                    TaskStatus::Succeeded => {
                        let Some(result_url) = info.result_url else {
                            record_attempts("invalid", attempt);
                            return Err(TryOnError::status_check(ApiError::InvalidResponse(
                                "succeeded task has no result URL".to_string(),
                            )));
                        };
                        reporter.report(&ProgressEvent::Completed);
                        record_attempts("succeeded", attempt);
                        return Ok(PollOutcome {
                            result_url,
                            attempts: attempt,
                        });
                    }
                    TaskStatus::Failed => {
                        record_attempts("failed", attempt);
                        return Err(TryOnError::processing(info.error_message));
                    }
                    TaskStatus::Processing(status) => {
                        debug!(task_uuid, attempt, status = %status, "Task still processing");
                        reporter.report(&ProgressEvent::StillProcessing {
                            status,
                            retry_in: interval,
                        });
                    }
                },
                Err(e) if e.is_transport() => {
                    metrics::POLL_TRANSIENT_FAILURES.inc();
                    warn!(task_uuid, attempt, error = %e, "Status query got no response");
                    reporter.report(&ProgressEvent::NetworkRetry { retry_in: interval });
                }
                Err(e) => {
                    record_attempts("error", attempt);
                    return Err(TryOnError::status_check(e));
                }
            }

            if !is_last {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(TryOnError::Cancelled),
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        warn!(task_uuid, attempts = max_attempts, "Task polling timed out");
        record_attempts("timeout", max_attempts);
        Err(TryOnError::Timeout {
            attempts: max_attempts,
        })
    }
}

fn record_attempts(result: &str, attempts: u32) {
    metrics::POLL_ATTEMPTS
        .with_label_values(&[result])
        .observe(attempts as f64);
}
