use std::{cmp::Ordering, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// A queue of [`Job`]s shared between producer and consumer threads.
pub trait WorkQueue: Send + Sync + 'static {
    fn submit(&self, job: Job) -> Result<()>;

    /// Removes up to `n` jobs in service order.
    fn drain(&self, n: usize) -> Vec<Job>;

    /// Waits at most `timeout` for the next job. `Ok(None)` means the timeout elapsed.
    fn wait_next(&self, timeout: Duration) -> Result<Option<Job>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub priority: u64,
    /// Microseconds since the unix epoch, or any monotonically increasing stamp.
    pub enqueued_at: u64,
    pub payload: Vec<u8>,
}

impl Job {
    /// Service order: a higher `priority` is served first and, on equal priority, the job
    /// enqueued earlier wins. `Ordering::Less` means "served before".
    fn service_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.enqueued_at.cmp(&other.enqueued_at))
    }

    pub fn new(id: &str, priority: u64, enqueued_at: u64, payload: Vec<u8>) -> Self {
        Self {
            id: id.to_string(),
            priority,
            enqueued_at,
            payload,
        }
    }

    pub fn without_payload(id: &str, priority: u64, enqueued_at: u64) -> Self {
        Self::new(id, priority, enqueued_at, vec![])
    }
}

// region:    --- Ordering traits, so queues can use the natural order

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        self.service_order(other)
    }
}

// endregion: --- Ordering traits
