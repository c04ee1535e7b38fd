//! Server-side task model and wire payloads.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// State code the service uses for "still processing".
pub const STATE_PROCESSING: i64 = 4;
/// State code for "accepted, not started".
pub const STATE_QUEUED: i64 = 0;

/// Opaque task identifier returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a task as observed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Queued,
    Processing,
    Done,
    /// Terminal failure; carries the raw state code.
    Failed(i64),
}

impl TaskState {
    /// Map a raw state code: `4` processing, `0` queued, negative failed,
    /// anything else done.
    ///
    /// The service only documents `4` as in progress. `0` is deliberately
    /// kept pending as well, so a task that has not started yet is polled
    /// again instead of being read as a finished task with no image.
    pub fn from_code(code: i64) -> Self {
        match code {
            STATE_PROCESSING => TaskState::Processing,
            STATE_QUEUED => TaskState::Queued,
            c if c < 0 => TaskState::Failed(c),
            _ => TaskState::Done,
        }
    }

    /// Queued or processing.
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskState::Queued | TaskState::Processing)
    }

    fn rank(&self) -> u8 {
        match self {
            TaskState::Queued => 0,
            TaskState::Processing => 1,
            TaskState::Done | TaskState::Failed(_) => 2,
        }
    }
}

/// A task being tracked by the poller.
///
/// `id` is fixed at construction; `state` only moves forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    id: TaskId,
    state: TaskState,
    pub result_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Task {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            state: TaskState::Queued,
            result_url: None,
            width: None,
            height: None,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Fold a freshly fetched status into the task.
    ///
    /// A status that would move the state backwards (or sideways out of a
    /// terminal state) is ignored for the state field. Result fields are
    /// taken whenever the payload carries them.
    pub fn observe(&mut self, status: &TaskStatus) {
        let next = TaskState::from_code(status.state);
        if self.state.rank() < 2 && next.rank() >= self.state.rank() {
            self.state = next;
        } else if next != self.state {
            debug!(
                "Task {}: ignoring state regression {:?} -> {:?}",
                self.id, self.state, next
            );
        }
        if let Some(ref url) = status.image {
            if !url.is_empty() {
                self.result_url = Some(url.clone());
            }
        }
        if status.image_width.is_some() {
            self.width = status.image_width;
        }
        if status.image_height.is_some() {
            self.height = status.image_height;
        }
    }
}

// ── Wire payloads ────────────────────────────────────────────────────────

/// Body of a successful upload: `{ "data": { "task_id": "…" } }`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub data: Option<SubmitData>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubmitData {
    #[serde(default)]
    pub task_id: Option<String>,
}

impl SubmitResponse {
    /// The task id at `data.task_id`, if present and non-empty.
    pub fn task_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.task_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// Body of a status fetch: `{ "data": { "state": 4, "image": … } }`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub data: Option<TaskStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaskStatus {
    pub state: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_width: Option<u32>,
    #[serde(default)]
    pub image_height: Option<u32>,
}

impl TaskStatus {
    pub fn processing() -> Self {
        Self {
            state: STATE_PROCESSING,
            ..Default::default()
        }
    }

    pub fn done(image: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            state: 1,
            image: Some(image.into()),
            image_width: Some(width),
            image_height: Some(height),
        }
    }
}
