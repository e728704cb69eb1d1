use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::{Duration, Instant},
};

use prioq::{Cfg, Compare, Job, Natural, PriorityQueue, Result, WorkQueue};

/// Interval between polls while waiting for a job.
const RETRY_DELAY: Duration = Duration::from_micros(200);

/// A [`PriorityQueue`] behind a plain mutex.
///
/// There is no condition variable: waiting consumers poll. Serves as the baseline the
/// [`BlockingPriorityQueue`](crate::BlockingPriorityQueue) is measured against.
#[derive(Debug)]
pub struct LockedQueue<T, C = Natural> {
    pub storage: Arc<Mutex<PriorityQueue<T, C>>>,
}

impl<T, C> Clone for LockedQueue<T, C> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<T: Ord> LockedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        let cfg = Cfg::for_type::<T>().with_initial_capacity(capacity);
        Ok(Self {
            storage: Arc::new(Mutex::new(PriorityQueue::with_cfg(cfg, Natural)?)),
        })
    }
}

impl<T, C: Compare<T>> LockedQueue<T, C> {
    fn lock(&self) -> MutexGuard<'_, PriorityQueue<T, C>> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkQueue for LockedQueue<Job> {
    fn submit(&self, job: Job) -> Result<()> {
        self.lock().insert(job)
    }

    fn drain(&self, n: usize) -> Vec<Job> {
        let mut storage = self.lock();

        let mut items = Vec::with_capacity(n.min(storage.len()));
        for _ in 0..n {
            let Some(job) = storage.extract_min() else {
                break;
            };
            items.push(job);
        }

        items
    }

    fn wait_next(&self, timeout: Duration) -> Result<Option<Job>> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(job) = self.lock().extract_min() {
                return Ok(Some(job));
            }
            let delay = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    remaining.min(RETRY_DELAY)
                }
                None => RETRY_DELAY,
            };
            thread::sleep(delay);
        }
    }
}
