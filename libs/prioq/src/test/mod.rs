//! Shared harnesses: a conformance suite every [`crate::WorkQueue`] implementation runs, and
//! the multi-threaded stress runner used by the `stress_tester` binary.
