//! Result types returned to callers.

use crate::error::EnhanceError;
use crate::task::Task;
use serde::{Deserialize, Serialize};

/// The enhanced image produced by one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementOutcome {
    /// Result location: an HTTP(S) URL from the service, or a `data:` URI
    /// holding the original bytes when `degraded` is set.
    pub image_url: String,
    /// Width in pixels; 0 when unknown.
    pub width: u32,
    /// Height in pixels; 0 when unknown.
    pub height: u32,
    /// Service task that produced the result, if any.
    pub task_id: Option<String>,
    /// True when this is the pass-through fallback, not an enhanced image.
    pub degraded: bool,
    /// Upload-and-poll attempts made, including the successful one.
    pub attempts: u32,
}

impl EnhancementOutcome {
    /// Normalize a finished task. Missing dimensions become 0.
    pub(crate) fn from_task(task: Task, attempts: u32) -> Self {
        Self {
            image_url: task.result_url.clone().unwrap_or_default(),
            width: task.width.unwrap_or(0),
            height: task.height.unwrap_or(0),
            task_id: Some(task.id().to_string()),
            degraded: false,
            attempts,
        }
    }
}

/// One entry of a batch or stream run.
#[derive(Debug)]
pub struct BatchItem {
    /// Position of the asset in the input list.
    pub index: usize,
    /// Asset file name.
    pub name: String,
    pub result: Result<EnhancementOutcome, EnhanceError>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
