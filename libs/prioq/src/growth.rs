//! Capacity expansion policy shared by both queue flavours.

use std::mem::size_of;

use crate::{Error, Result};

/// Below this capacity the store roughly doubles, above it grows by half.
pub const DOUBLING_THRESHOLD: usize = 64;

/// Headroom kept below the largest allocation the platform can describe.
const SAFETY_MARGIN: usize = 8;

/// The largest number of `T` a heap store may ever hold on this platform.
pub fn max_capacity<T>() -> usize {
    isize::MAX as usize / size_of::<T>().max(1) - SAFETY_MARGIN
}

/// Computes the capacity that replaces `old` once a store of that capacity is full.
///
/// The result is clamped to `max`. Only a store that already holds `max` elements cannot
/// grow any more, which is reported as [`Error::CapacityExceeded`].
pub fn next_capacity(old: usize, max: usize) -> Result<usize> {
    let grown = if old < DOUBLING_THRESHOLD {
        old.saturating_mul(2).saturating_add(2)
    } else {
        old.saturating_add(old / 2)
    };

    if grown <= max {
        return Ok(grown);
    }
    if old >= max {
        return Err(Error::CapacityExceeded { max });
    }
    Ok(max)
}
