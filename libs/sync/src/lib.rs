//! Thread-safe priority queues built on [`prioq`].
//!
//! [`BlockingPriorityQueue`] is the real thing: one lock, a not-empty condition for blocking
//! consumers and growth that allocates outside the lock. [`LockedQueue`] wraps the
//! sequential queue in a mutex and is kept as a baseline for the stress tester and benches.

mod blocking;
mod cancel;
mod growth;
mod lock_based;
mod snapshot;


// region:    --- Exports
pub use blocking::BlockingPriorityQueue;
pub use cancel::CancelToken;
pub use lock_based::LockedQueue;
pub use snapshot::Iter;
// endregion: --- Exports
