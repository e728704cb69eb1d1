pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures reported by both queue flavours.
///
/// Every variant is raised at the call that observes the violation, and the queue that
/// raised it is left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Growing the backing store would exceed `max` elements. The insert that triggered the
    /// growth has not been applied.
    #[error("capacity exceeded: the queue cannot hold more than {max} elements")]
    CapacityExceeded { max: usize },

    #[error("queue was structurally modified outside of the cursor")]
    ConcurrentStructuralChange,

    #[error("no element to remove: call next() before remove(), and remove at most once per element")]
    IllegalIteratorState,

    #[error("wait for an element was cancelled")]
    CancelledWait,
}
