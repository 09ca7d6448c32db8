use serde::{Deserialize, Serialize};

/// Point-in-time view of the queue. `waiting` never includes the active job.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub waiting: usize,
    pub active: bool,
}
