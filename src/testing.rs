//! A scripted in-memory [`EnhanceService`] for tests.
//!
//! Responses are consumed in order; once a queue is down to its last entry
//! that entry is repeated forever, so "always fails" or "always processing"
//! needs a single scripted value.
//!
//! ```rust
//! use superres_client::testing::ScriptedService;
//! use superres_client::task::TaskStatus;
//!
//! let svc = ScriptedService::new()
//!     .submit_ok("task-1")
//!     .processing(2)
//!     .status_ok(TaskStatus::done("https://x/y.png", 800, 600));
//! assert_eq!(svc.submits(), 0);
//! ```

use crate::asset::ImageAsset;
use crate::error::TransportError;
use crate::service::EnhanceService;
use crate::task::{StatusResponse, SubmitData, SubmitResponse, TaskStatus};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type SubmitResult = Result<SubmitResponse, TransportError>;
type StatusResult = Result<StatusResponse, TransportError>;

#[derive(Default)]
pub struct ScriptedService {
    submits: Mutex<VecDeque<SubmitResult>>,
    statuses: Mutex<VecDeque<StatusResult>>,
    submit_delay: Option<Duration>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
    polled_ids: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_submit(self, result: SubmitResult) -> Self {
        lock(&self.submits).push_back(result);
        self
    }

    pub fn submit_ok(self, task_id: &str) -> Self {
        self.push_submit(Ok(SubmitResponse {
            data: Some(SubmitData {
                task_id: Some(task_id.to_string()),
            }),
        }))
    }

    pub fn push_status(self, result: StatusResult) -> Self {
        lock(&self.statuses).push_back(result);
        self
    }

    pub fn status_ok(self, status: TaskStatus) -> Self {
        self.push_status(Ok(StatusResponse { data: Some(status) }))
    }

    /// Queue `n` "still processing" statuses.
    pub fn processing(mut self, n: usize) -> Self {
        for _ in 0..n {
            self = self.status_ok(TaskStatus::processing());
        }
        self
    }

    /// Sleep this long inside every `submit` call.
    pub fn submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    /// Number of `submit` calls made so far.
    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_status` calls made so far.
    pub fn fetches(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Task ids passed to `fetch_status`, in call order.
    pub fn polled_ids(&self) -> Vec<String> {
        lock(&self.polled_ids).clone()
    }
}

#[async_trait]
impl EnhanceService for ScriptedService {
    async fn submit(&self, _asset: &ImageAsset) -> Result<SubmitResponse, TransportError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        next(&self.submits).unwrap_or_else(|| {
            Err(TransportError::NoResponse {
                reason: "no scripted submit response".into(),
            })
        })
    }

    async fn fetch_status(&self, task_id: &str) -> Result<StatusResponse, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.polled_ids).push(task_id.to_string());
        next(&self.statuses).unwrap_or_else(|| {
            Err(TransportError::NoResponse {
                reason: "no scripted status response".into(),
            })
        })
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Pop the front entry, repeating the last one once it is all that remains.
fn next<T: Clone>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    let mut q = lock(queue);
    if q.len() > 1 {
        q.pop_front()
    } else {
        q.front().cloned()
    }
}
