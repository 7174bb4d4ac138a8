//! Process-lifetime job status per user.
//!
//! One mutex guards the whole map. Callers only get atomic get/set and
//! compare-and-set; the lock is never held across I/O.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tokio::sync::Mutex;

/// Lifecycle label of a user's sync work. A user with no entry is "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobStatus {
    /// Full sync running.
    Started,
    /// Store exists and no job is in flight.
    Pending,
    /// Incremental sync running.
    Updating,
    /// Legacy idle label, equivalent to `Pending`. Never set by this server.
    #[allow(dead_code)]
    Complete,
    /// Last attempt failed. Not terminal: the next request re-plans.
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "Started",
            Self::Pending => "Pending",
            Self::Updating => "Updating",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Store exists and nothing is running against it.
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Pending | Self::Complete)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
pub struct JobRegistry {
    statuses: Mutex<HashMap<String, JobStatus>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, user_id: &str) -> Option<JobStatus> {
        self.statuses.lock().await.get(user_id).copied()
    }

    pub async fn set(&self, user_id: &str, status: JobStatus) {
        let previous = self
            .statuses
            .lock()
            .await
            .insert(user_id.to_string(), status);
        tracing::debug!(user_id, ?previous, %status, "Job status set");
    }

    /// Set `user_id` to `new` only if its current status equals `expected`
    /// (`None` meaning unset). Returns whether the swap happened.
    pub async fn compare_and_set(
        &self,
        user_id: &str,
        expected: Option<JobStatus>,
        new: JobStatus,
    ) -> bool {
        let mut statuses = self.statuses.lock().await;
        if statuses.get(user_id).copied() != expected {
            return false;
        }
        statuses.insert(user_id.to_string(), new);
        drop(statuses);
        tracing::debug!(user_id, ?expected, %new, "Job status transition");
        true
    }
}
