use std::sync::{
    Arc, Mutex, PoisonError, Weak,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

/// Something with threads parked on a condition that a cancellation must wake.
pub(crate) trait Wake: Send + Sync {
    /// Must notify under the same lock the waiters check the token under, otherwise a waiter
    /// that has checked but not yet parked misses the wakeup.
    fn wake_all(&self);
}

/// Cooperative cancellation for blocking waits.
///
/// Clones share one flag. Cancelling is permanent and wakes every wait currently registered
/// with the token; those waits fail with [`prioq::Error::CancelledWait`].
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    waiters: Mutex<Vec<(u64, Weak<dyn Wake>)>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        // Wake outside the registry lock: a waiter may hold its queue lock while registering.
        let waiters: Vec<Weak<dyn Wake>> = self
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, waker)| waker.clone())
            .collect();
        for waker in waiters.iter().filter_map(Weak::upgrade) {
            waker.wake_all();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Keeps `waker` registered until the returned guard is dropped.
    pub(crate) fn register(&self, waker: Weak<dyn Wake>) -> Registration<'_> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, waker));
        Registration { token: self, id }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.token
            .inner
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}
