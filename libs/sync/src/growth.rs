//! Election of the single thread allowed to allocate a larger store.
//!
//! The flag is only ever flipped with compare-and-swap and is never waited on while holding
//! the queue lock, so it cannot take part in a deadlock.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::utils::CachePadded;

#[derive(Debug, Default)]
pub(crate) struct AllocationFlag {
    claimed: CachePadded<AtomicBool>,
}

impl AllocationFlag {
    /// Claims the flag if it is free. The claim is released when the guard drops.
    pub(crate) fn try_claim(&self) -> Option<AllocationClaim<'_>> {
        if self.claimed.load(Ordering::Relaxed) {
            return None;
        }
        self.claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| AllocationClaim { flag: self })
    }

    #[cfg(test)]
    pub(crate) fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

#[must_use]
pub(crate) struct AllocationClaim<'a> {
    flag: &'a AllocationFlag,
}

impl Drop for AllocationClaim<'_> {
    fn drop(&mut self) {
        self.flag.claimed.store(false, Ordering::Release);
    }
}
