//! Mock try-on API for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::tryon::{ApiError, CreateTaskRequest, CreatedTask, ImagePayload, TaskInfo, TryOnApi};

/// One call made against the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CreateTask(CreateTaskRequest),
    Upload {
        url: String,
        filename: String,
        mime_type: String,
        len: usize,
    },
    SubmitTask(String),
    GetTaskInfo(String),
}

impl RecordedCall {
    /// Operation name, matching the metric label.
    pub fn operation(&self) -> &'static str {
        match self {
            RecordedCall::CreateTask(_) => "create_task",
            RecordedCall::Upload { .. } => "upload_image",
            RecordedCall::SubmitTask(_) => "submit_task",
            RecordedCall::GetTaskInfo(_) => "get_task_info",
        }
    }
}

#[derive(Debug, Clone)]
struct Recorded {
    call: RecordedCall,
    #[allow(dead_code)]
    at: Instant,
}

/// Mock implementation of the TryOnApi trait.
///
/// Provides controllable behavior for testing:
/// - Scripted responses per operation, consumed in order
/// - Sensible defaults once a script runs dry
/// - Every call recorded, including ones that fail
/// - One-shot error injection for the next call of any operation
///
/// Defaults: `create_task` hands out `task-N` with mock upload URLs, uploads
/// and submits succeed, and `get_task_info` reports the default status
/// (`"processing"`) forever.
///
/// # Example
///
/// ```rust,ignore
/// use tryon_core::testing::MockTryOnApi;
///
/// let api = MockTryOnApi::new();
/// api.push_task_info(Ok(TaskInfo::processing("processing"))).await;
/// api.push_task_info(Ok(TaskInfo::succeeded("https://cdn/result.png"))).await;
///
/// // ... run the orchestrator against Arc::new(api) ...
///
/// assert_eq!(api.task_info_count().await, 2);
/// ```
#[derive(Debug)]
pub struct MockTryOnApi {
    create_responses: Arc<RwLock<VecDeque<Result<CreatedTask, ApiError>>>>,
    upload_responses: Arc<RwLock<VecDeque<Result<(), ApiError>>>>,
    submit_responses: Arc<RwLock<VecDeque<Result<(), ApiError>>>>,
    task_info_responses: Arc<RwLock<VecDeque<Result<TaskInfo, ApiError>>>>,
    /// Status reported once the task info script is empty.
    default_status: Arc<RwLock<String>>,
    /// If set, the next call of any operation fails with this error.
    next_error: Arc<RwLock<Option<ApiError>>>,
    calls: Arc<RwLock<Vec<Recorded>>>,
    task_counter: Arc<RwLock<u32>>,
}

impl Default for MockTryOnApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTryOnApi {
    pub fn new() -> Self {
        Self {
            create_responses: Arc::new(RwLock::new(VecDeque::new())),
            upload_responses: Arc::new(RwLock::new(VecDeque::new())),
            submit_responses: Arc::new(RwLock::new(VecDeque::new())),
            task_info_responses: Arc::new(RwLock::new(VecDeque::new())),
            default_status: Arc::new(RwLock::new("processing".to_string())),
            next_error: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
            task_counter: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn push_create(&self, response: Result<CreatedTask, ApiError>) {
        self.create_responses.write().await.push_back(response);
    }

    pub async fn push_upload(&self, response: Result<(), ApiError>) {
        self.upload_responses.write().await.push_back(response);
    }

    pub async fn push_submit(&self, response: Result<(), ApiError>) {
        self.submit_responses.write().await.push_back(response);
    }

    pub async fn push_task_info(&self, response: Result<TaskInfo, ApiError>) {
        self.task_info_responses.write().await.push_back(response);
    }

    /// Queue the same status query response `times` times.
    pub async fn push_task_info_repeated(&self, response: Result<TaskInfo, ApiError>, times: usize) {
        let mut queue = self.task_info_responses.write().await;
        for _ in 0..times {
            queue.push_back(response.clone());
        }
    }

    /// Status reported once the task info script is empty.
    pub async fn set_default_status(&self, status: &str) {
        *self.default_status.write().await = status.to_string();
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: ApiError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// All calls made so far, in order.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls
            .read()
            .await
            .iter()
            .map(|r| r.call.clone())
            .collect()
    }

    /// Operation names of all calls made so far, in order.
    pub async fn operations(&self) -> Vec<&'static str> {
        self.calls
            .read()
            .await
            .iter()
            .map(|r| r.call.operation())
            .collect()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    pub async fn task_info_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|r| matches!(r.call, RecordedCall::GetTaskInfo(_)))
            .count()
    }

    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, call: RecordedCall) {
        self.calls.write().await.push(Recorded {
            call,
            at: Instant::now(),
        });
    }

    async fn take_error(&self) -> Option<ApiError> {
        self.next_error.write().await.take()
    }

    async fn next_task(&self) -> CreatedTask {
        let mut counter = self.task_counter.write().await;
        *counter += 1;
        let uuid = format!("task-{}", *counter);
        CreatedTask {
            model_upload_url: format!("https://upload.mock/{}/model", uuid),
            garment_upload_url: format!("https://upload.mock/{}/garment", uuid),
            uuid,
        }
    }
}

#[async_trait]
impl TryOnApi for MockTryOnApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_task(&self, request: &CreateTaskRequest) -> Result<CreatedTask, ApiError> {
        self.record(RecordedCall::CreateTask(request.clone())).await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let scripted = self.create_responses.write().await.pop_front();
        match scripted {
            Some(response) => response,
            None => Ok(self.next_task().await),
        }
    }

    async fn upload_image(
        &self,
        upload_url: &str,
        payload: &ImagePayload,
    ) -> Result<(), ApiError> {
        self.record(RecordedCall::Upload {
            url: upload_url.to_string(),
            filename: payload.filename.clone(),
            mime_type: payload.mime_type.clone(),
            len: payload.len(),
        })
        .await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.upload_responses
            .write()
            .await
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn submit_task(&self, task_uuid: &str) -> Result<(), ApiError> {
        self.record(RecordedCall::SubmitTask(task_uuid.to_string()))
            .await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.submit_responses
            .write()
            .await
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn get_task_info(&self, task_uuid: &str) -> Result<TaskInfo, ApiError> {
        self.record(RecordedCall::GetTaskInfo(task_uuid.to_string()))
            .await;
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        let scripted = self.task_info_responses.write().await.pop_front();
        match scripted {
            Some(response) => response,
            None => Ok(TaskInfo::processing(
                self.default_status.read().await.clone(),
            )),
        }
    }
}
