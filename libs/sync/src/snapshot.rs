use std::vec;

use prioq::{Compare, Error, Result};

use crate::BlockingPriorityQueue;

/// Iterator over a copy of a [`BlockingPriorityQueue`] taken when the iterator was created.
///
/// Yields elements in heap-array order, not priority order.
pub struct Iter<'a, T, C> {
    queue: &'a BlockingPriorityQueue<T, C>,
    snapshot: vec::IntoIter<(u64, T)>,
    last_seq: Option<u64>,
}

impl<'a, T, C> Iter<'a, T, C> {
    pub(crate) fn new(queue: &'a BlockingPriorityQueue<T, C>, snapshot: Vec<(u64, T)>) -> Self {
        Self {
            queue,
            snapshot: snapshot.into_iter(),
            last_seq: None,
        }
    }
}

impl<T, C: Compare<T>> Iter<'_, T, C> {
    /// Removes the element last returned by [`next`](Iterator::next) from the live queue.
    ///
    /// Only that exact element is removed, never an equal one inserted separately. If it has
    /// already left the queue nothing happens.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalIteratorState`] if nothing was returned since the last removal.
    pub fn remove(&mut self) -> Result<()> {
        let seq = self.last_seq.take().ok_or(Error::IllegalIteratorState)?;
        self.queue.remove_seq(seq);
        Ok(())
    }
}

impl<T, C> Iterator for Iter<'_, T, C> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let (seq, value) = self.snapshot.next()?;
        self.last_seq = Some(seq);
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.snapshot.size_hint()
    }
}

impl<T, C> ExactSizeIterator for Iter<'_, T, C> {}
