//! In-memory registry of try-on jobs.
//!
//! Each submission becomes a job: the orchestrator runs in a background task
//! while progress lines, the outcome and any error are recorded here and
//! pushed to WebSocket clients. Nothing is persisted. Running jobs are always
//! kept; finished jobs (and the uploaded images kept for manual retry) are
//! dropped oldest-first once more than `max_finished` of them accumulate.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tryon_core::{
    Category, ProgressReporter, TryOnError, TryOnOrchestrator, TryOnOutcome, TryOnRequest,
};

use crate::api::WsBroadcaster;
use crate::metrics::{JOBS_FINISHED_TOTAL, JOBS_STARTED_TOTAL};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub const ALL: [JobState; 4] = [
        JobState::Running,
        JobState::Succeeded,
        JobState::Failed,
        JobState::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressLine {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Error recorded on a failed or cancelled job.
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    /// Stable error label (`task_creation`, `timeout`, ...).
    pub kind: String,
    /// User-facing message.
    pub message: String,
}

impl From<&TryOnError> for JobFailure {
    fn from(err: &TryOnError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Snapshot of a job as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub category: Category,
    pub caption: Option<String>,
    pub garment_filename: String,
    pub model_filename: String,
    pub latest_progress: Option<String>,
    pub progress: Vec<ProgressLine>,
    /// Remote task id, known once the run has succeeded.
    pub task_uuid: Option<String>,
    pub result_url: Option<String>,
    pub poll_attempts: Option<u32>,
    pub error: Option<JobFailure>,
    /// Job this one was retried from.
    pub retry_of: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    fn new(id: String, request: &TryOnRequest, retry_of: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Running,
            category: request.category,
            caption: request.caption.clone(),
            garment_filename: request.garment.filename.clone(),
            model_filename: request.model.filename.clone(),
            latest_progress: None,
            progress: Vec::new(),
            task_uuid: None,
            result_url: None,
            poll_attempts: None,
            error: None,
            retry_of,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    fn complete(&mut self, state: JobState) {
        let now = Utc::now();
        self.state = state;
        self.updated_at = now;
        self.finished_at = Some(now);
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is already {state}")]
    AlreadyFinished { id: String, state: JobState },

    #[error("Job {0} is still running")]
    StillRunning(String),
}

struct JobEntry {
    job: Job,
    /// Inputs kept for manual retry.
    request: Arc<TryOnRequest>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Jobs {
    entries: HashMap<String, JobEntry>,
    /// Insertion order, oldest first.
    order: Vec<String>,
}

impl Jobs {
    /// Drop the oldest finished jobs until at most `keep` remain.
    fn evict_finished(&mut self, keep: usize) -> usize {
        let finished = self
            .entries
            .values()
            .filter(|e| e.job.state.is_terminal())
            .count();
        let mut excess = finished.saturating_sub(keep);
        if excess == 0 {
            return 0;
        }

        let entries = &mut self.entries;
        let before = self.order.len();
        self.order.retain(|id| {
            let terminal = entries
                .get(id)
                .is_some_and(|e| e.job.state.is_terminal());
            if excess > 0 && terminal {
                entries.remove(id);
                excess -= 1;
                false
            } else {
                true
            }
        });
        before - self.order.len()
    }
}

/// Registry of jobs plus the machinery to run them.
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<Jobs>>,
    tracker: TaskTracker,
    orchestrator: Arc<TryOnOrchestrator>,
    broadcaster: WsBroadcaster,
    max_finished: usize,
}

impl JobRegistry {
    pub fn new(
        orchestrator: Arc<TryOnOrchestrator>,
        broadcaster: WsBroadcaster,
        max_finished: usize,
    ) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(Jobs::default())),
            tracker: TaskTracker::new(),
            orchestrator,
            broadcaster,
            max_finished,
        }
    }

    /// Register a job and start running it in the background.
    pub fn start(&self, request: TryOnRequest) -> Job {
        self.launch(Arc::new(request), None)
    }

    /// Start a fresh run with the inputs of a finished job.
    pub fn retry(&self, id: &str) -> Result<Job, JobError> {
        let request = {
            let jobs = self.read();
            let entry = jobs
                .entries
                .get(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            if !entry.job.state.is_terminal() {
                return Err(JobError::StillRunning(id.to_string()));
            }
            Arc::clone(&entry.request)
        };
        Ok(self.launch(request, Some(id.to_string())))
    }

    /// Cancel a running job. The job is marked cancelled immediately.
    pub fn cancel(&self, id: &str) -> Result<Job, JobError> {
        let snapshot = {
            let mut jobs = self.write();
            let entry = jobs
                .entries
                .get_mut(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            if entry.job.state.is_terminal() {
                return Err(JobError::AlreadyFinished {
                    id: id.to_string(),
                    state: entry.job.state,
                });
            }
            entry.cancel.cancel();
            entry.job.error = Some(JobFailure::from(&TryOnError::Cancelled));
            entry.job.complete(JobState::Cancelled);
            let snapshot = entry.job.clone();
            self.evict(&mut jobs);
            snapshot
        };

        info!(job_id = %id, "Try-on job cancelled");
        self.announce(&snapshot);
        Ok(snapshot)
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.read().entries.get(id).map(|e| e.job.clone())
    }

    /// All jobs, most recent first.
    pub fn list(&self) -> Vec<Job> {
        let jobs = self.read();
        jobs.order
            .iter()
            .rev()
            .filter_map(|id| jobs.entries.get(id))
            .map(|e| e.job.clone())
            .collect()
    }

    pub fn count_by_state(&self) -> HashMap<JobState, usize> {
        let jobs = self.read();
        let mut counts: HashMap<JobState, usize> =
            JobState::ALL.into_iter().map(|s| (s, 0)).collect();
        for entry in jobs.entries.values() {
            *counts.entry(entry.job.state).or_default() += 1;
        }
        counts
    }

    /// Signal every running job to stop. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let jobs = self.read();
        let mut signalled = 0;
        for entry in jobs.entries.values() {
            if !entry.job.state.is_terminal() {
                entry.cancel.cancel();
                signalled += 1;
            }
        }
        signalled
    }

    /// Wait for background runs to finish. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let idle = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        self.tracker.reopen();
        idle
    }

    fn launch(&self, request: Arc<TryOnRequest>, retry_of: Option<String>) -> Job {
        let id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let job = Job::new(id.clone(), &request, retry_of);

        {
            let mut jobs = self.write();
            jobs.order.push(id.clone());
            jobs.entries.insert(
                id.clone(),
                JobEntry {
                    job: job.clone(),
                    request: Arc::clone(&request),
                    cancel: cancel.clone(),
                },
            );
        }

        JOBS_STARTED_TOTAL.inc();
        info!(
            job_id = %id,
            category = %request.category,
            retry_of = ?job.retry_of,
            "Try-on job started"
        );

        let registry = self.clone();
        self.tracker.spawn(async move {
            let reporter = registry.reporter_for(&id);
            let result = registry
                .orchestrator
                .run_try_on_cancellable(&request, &reporter, cancel)
                .await;
            registry.finish(&id, result);
        });

        job
    }

    fn reporter_for(&self, id: &str) -> ProgressReporter {
        let jobs = Arc::clone(&self.jobs);
        let broadcaster = self.broadcaster.clone();
        let id = id.to_string();
        ProgressReporter::from_fn(move |message| {
            let recorded = {
                let mut jobs = jobs.write().unwrap_or_else(PoisonError::into_inner);
                match jobs.entries.get_mut(&id) {
                    Some(entry) if !entry.job.state.is_terminal() => {
                        let now = Utc::now();
                        entry.job.progress.push(ProgressLine {
                            message: message.to_string(),
                            at: now,
                        });
                        entry.job.latest_progress = Some(message.to_string());
                        entry.job.updated_at = now;
                        true
                    }
                    _ => false,
                }
            };
            if recorded {
                broadcaster.job_progress(&id, message);
            }
        })
    }

    fn finish(&self, id: &str, result: Result<TryOnOutcome, TryOnError>) {
        let snapshot = {
            let mut jobs = self.write();
            let Some(entry) = jobs.entries.get_mut(id) else {
                return;
            };
            // Already cancelled through the API.
            if entry.job.state.is_terminal() {
                return;
            }
            let job = &mut entry.job;
            match &result {
                Ok(outcome) => {
                    job.task_uuid = Some(outcome.task_uuid.clone());
                    job.result_url = Some(outcome.result_url.clone());
                    job.poll_attempts = Some(outcome.poll_attempts);
                    job.complete(JobState::Succeeded);
                }
                Err(e @ TryOnError::Cancelled) => {
                    job.error = Some(JobFailure::from(e));
                    job.complete(JobState::Cancelled);
                }
                Err(e) => {
                    job.error = Some(JobFailure::from(e));
                    job.complete(JobState::Failed);
                }
            }
            let snapshot = job.clone();
            self.evict(&mut jobs);
            snapshot
        };

        match &snapshot.error {
            None => info!(job_id = %id, "Try-on job succeeded"),
            Some(failure) => warn!(
                job_id = %id,
                kind = %failure.kind,
                error = %failure.message,
                "Try-on job did not succeed"
            ),
        }
        self.announce(&snapshot);
    }

    /// Count and broadcast a job that just reached a terminal state.
    fn announce(&self, job: &Job) {
        JOBS_FINISHED_TOTAL
            .with_label_values(&[job.state.as_str()])
            .inc();
        match (&job.result_url, &job.error) {
            (Some(result_url), _) => self.broadcaster.job_completed(
                &job.id,
                job.task_uuid.as_deref().unwrap_or_default(),
                result_url,
            ),
            (None, Some(failure)) => {
                self.broadcaster
                    .job_failed(&job.id, &failure.kind, &failure.message)
            }
            (None, None) => {}
        }
    }

    fn evict(&self, jobs: &mut Jobs) {
        let evicted = jobs.evict_finished(self.max_finished);
        if evicted > 0 {
            debug!(evicted, kept = self.max_finished, "Dropped oldest finished jobs");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Jobs> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Jobs> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
