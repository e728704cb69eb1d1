use crate::{Error, Result, growth};

/// Capacity used by the convenience constructors.
pub const DEFAULT_INITIAL_CAPACITY: usize = 11;

/// Construction parameters shared by both queue flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cfg {
    /// Number of elements the queue holds before its first growth.
    pub initial_capacity: usize,
    /// Hard cap on growth. Inserting into a full queue at this capacity fails with
    /// [`Error::CapacityExceeded`].
    pub max_capacity: usize,
}

impl Cfg {
    /// Default configuration for a queue of `T`: the platform maximum as growth limit.
    pub fn for_type<T>() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_capacity: growth::max_capacity::<T>(),
        }
    }

    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(Error::InvalidArgument("initial capacity must be at least 1"));
        }
        if self.initial_capacity > self.max_capacity {
            return Err(Error::InvalidArgument(
                "initial capacity must not exceed the maximum capacity",
            ));
        }
        Ok(())
    }
}
