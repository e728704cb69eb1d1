//! Array-backed binary-heap priority queues.
//!
//! This crate holds the heap algorithm shared by every queue in the workspace, the growth
//! policy, and the single-threaded [`PriorityQueue`]. The thread-safe blocking queue lives in
//! `prioq-sync` and is built on the same [`heap::HeapStore`].

mod cfg;
mod compare;
mod error;
mod export;
pub mod growth;
pub mod heap;
mod job;
mod sequential;
pub mod test;

// region:    --- Exports
pub use cfg::{Cfg, DEFAULT_INITIAL_CAPACITY};
pub use compare::{Compare, FnComparator, Natural, Reverse};
pub use error::{Error, Result};
pub use export::Export;
pub use job::{Job, WorkQueue};
pub use sequential::{Cursor, PriorityQueue};
// endregion: --- Exports
