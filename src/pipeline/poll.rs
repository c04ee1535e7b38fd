//! Poll stage: wait for a task to leave the pending states.
//!
//! The loop is bounded by an explicit attempt counter: at most
//! `max_attempts + 1` status fetches, with a fixed pause between them.
//! Fetch failures are not retried here; retrying the whole upload-and-poll
//! sequence is the orchestrator's job.

use crate::error::{EnhanceError, ErrorKind};
use crate::progress::EnhanceProgressCallback;
use crate::service::EnhanceService;
use crate::task::{Task, TaskId, TaskState};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

pub const MAX_POLL_ATTEMPTS: u32 = 15;
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

pub const IMAGE_NOT_FOUND: &str = "Failed to fetch enhanced image! Image not found.";
pub const MAX_RETRIES_REACHED: &str = "Max retries reached. Please try again later.";

/// Poll bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_POLL_ATTEMPTS,
            interval: POLL_INTERVAL,
        }
    }
}

/// Poll `task_id` until it is done, failed, or the policy is exhausted.
///
/// Returns a `Done` task that carries a result URL. Every other ending is a
/// classified error: `Timeout` when still pending after the last allowed
/// fetch, `Processing` for a failed task or a result without an image, and
/// whatever the transport reported for fetch failures.
pub async fn poll(
    service: &dyn EnhanceService,
    task_id: TaskId,
    policy: PollPolicy,
    name: &str,
    progress: Option<&dyn EnhanceProgressCallback>,
) -> Result<Task, EnhanceError> {
    let mut task = Task::new(task_id);
    let mut attempt: u32 = 0;

    loop {
        let response = service.fetch_status(task.id().as_str()).await?;
        let status = response
            .data
            .ok_or_else(|| EnhanceError::new(ErrorKind::Processing, IMAGE_NOT_FOUND))?;
        task.observe(&status);

        if !task.state().is_pending() {
            break;
        }

        debug!(
            "Task {}: processing ({}/{})",
            task.id(),
            attempt,
            policy.max_attempts
        );
        if attempt >= policy.max_attempts {
            return Err(EnhanceError::new(ErrorKind::Timeout, MAX_RETRIES_REACHED)
                .with_cause(format!(
                    "task {} still pending after {} status checks",
                    task.id(),
                    attempt + 1
                )));
        }
        if let Some(cb) = progress {
            cb.on_poll(name, task.id().as_str(), attempt, policy.max_attempts);
        }
        sleep(policy.interval).await;
        attempt += 1;
    }

    match task.state() {
        TaskState::Done if task.result_url.is_some() => {
            info!("Task {} finished after {} status checks", task.id(), attempt + 1);
            Ok(task)
        }
        TaskState::Failed(code) => Err(EnhanceError::new(
            ErrorKind::Processing,
            "Failed to process the image. Please try again.",
        )
        .with_cause(format!("task {} reported failure state {code}", task.id()))),
        _ => Err(EnhanceError::new(ErrorKind::Processing, IMAGE_NOT_FOUND)
            .with_cause(format!("task {} finished without an image", task.id()))),
    }
}
