//! Single-threaded priority queue.
//!
//! [`PriorityQueue`] has no internal synchronization. Share it between threads only behind an
//! external lock (see `LockedQueue` in `prioq-sync`).

use std::{
    collections::VecDeque,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::{debug, warn};

use crate::{
    Cfg, Compare, Error, Natural, Result,
    cfg::DEFAULT_INITIAL_CAPACITY,
    heap::{HeapStore, Removed},
};

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

fn next_queue_id() -> u64 {
    NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed)
}

/// An unbounded min-priority queue over a binary heap.
///
/// The element comparing [`std::cmp::Ordering::Less`] than all others under `C` is served
/// first. Equal elements are served in unspecified order.
pub struct PriorityQueue<T, C = Natural> {
    store: HeapStore<T>,
    order: C,
    max_capacity: usize,
    /// Bumped on every structural change; cursors compare it to detect foreign mutation.
    version: u64,
    id: u64,
}

impl<T: Ord> PriorityQueue<T> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }

    pub fn with_capacity(initial_capacity: usize) -> Result<Self> {
        Self::with_cfg(
            Cfg::for_type::<T>().with_initial_capacity(initial_capacity),
            Natural,
        )
    }
}

impl<T: Ord> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Compare<T>> PriorityQueue<T, C> {
    pub fn with_comparator(order: C) -> Self {
        Self::from_store(
            HeapStore::new(DEFAULT_INITIAL_CAPACITY),
            order,
            crate::growth::max_capacity::<T>(),
        )
    }

    pub fn with_cfg(cfg: Cfg, order: C) -> Result<Self> {
        cfg.validate()?;
        let store = HeapStore::with_capacity(cfg.initial_capacity)?;
        let max_capacity = cfg.max_capacity.min(crate::growth::max_capacity::<T>());
        Ok(Self::from_store(store, order, max_capacity))
    }

    /// Builds a queue from elements in arbitrary order in linear time.
    pub fn from_vec(elements: Vec<T>, order: C) -> Self {
        let store = HeapStore::from_vec(elements, &order);
        Self::from_store(store, order, crate::growth::max_capacity::<T>())
    }

    fn from_store(store: HeapStore<T>, order: C, max_capacity: usize) -> Self {
        Self {
            store,
            order,
            max_capacity,
            version: 0,
            id: next_queue_id(),
        }
    }

    pub fn comparator(&self) -> &C {
        &self.order
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Inserts `value` in O(log n), growing the backing store first if it is full.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] when the store is already at its maximum capacity. The
    /// value is dropped and the queue is unchanged.
    pub fn insert(&mut self, value: T) -> Result<()> {
        let mut value = value;
        loop {
            match self.store.push(value, &self.order) {
                Ok(_) => {
                    self.version = self.version.wrapping_add(1);
                    return Ok(());
                }
                Err(rejected) => {
                    value = rejected;
                    self.grow()?;
                }
            }
        }
    }

    fn grow(&mut self) -> Result<()> {
        let old_capacity = self.store.capacity();
        let new_capacity = self
            .store
            .grow(self.max_capacity)
            .inspect_err(|e| warn!(old_capacity, error = %e, "rejecting insert"))?;
        debug!(old_capacity, new_capacity, "grew priority queue");
        Ok(())
    }

    /// Removes and returns the smallest element.
    pub fn extract_min(&mut self) -> Option<T> {
        let root = self.store.extract_root(&self.order)?;
        self.version = self.version.wrapping_add(1);
        Some(root)
    }

    pub fn peek_min(&self) -> Option<&T> {
        self.store.peek()
    }

    /// Drops all elements. The capacity is retained.
    pub fn clear(&mut self) {
        self.store.clear();
        self.version = self.version.wrapping_add(1);
    }

    /// Borrowing iterator in heap-array order, not priority order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.store.as_slice().iter()
    }

    /// Heap-array order, not priority order.
    pub fn as_slice(&self) -> &[T] {
        self.store.as_slice()
    }

    /// Starts a fail-fast traversal that supports removing the visited element.
    pub fn cursor(&self) -> Cursor<T> {
        Cursor {
            queue_id: self.id,
            expected_version: self.version,
            next: 0,
            last_index: None,
            last_bumped: None,
            bumped: VecDeque::new(),
        }
    }

    fn remove_index(&mut self, index: usize) -> Removed<T> {
        let removed = self.store.remove_at(index, &self.order);
        self.version = self.version.wrapping_add(1);
        removed
    }

    pub(crate) fn into_parts(self) -> (Vec<T>, C) {
        (self.store.into_vec(), self.order)
    }
}

impl<T: PartialEq, C: Compare<T>> PriorityQueue<T, C> {
    /// Linear scan by equality.
    pub fn contains(&self, value: &T) -> bool {
        self.store.position(|e| e == value).is_some()
    }

    /// Removes one element equal to `value`. Returns whether one was found.
    pub fn remove_value(&mut self, value: &T) -> bool {
        match self.store.position(|e| e == value) {
            Some(index) => {
                self.remove_index(index);
                true
            }
            None => false,
        }
    }
}

impl<T: Clone, C> PriorityQueue<T, C> {
    /// Snapshot in heap-array order; callers must not assume it is sorted.
    pub fn to_vec(&self) -> Vec<T> {
        self.store.as_slice().to_vec()
    }
}

impl<T: Clone, C: Clone> Clone for PriorityQueue<T, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            order: self.order.clone(),
            max_capacity: self.max_capacity,
            version: 0,
            id: next_queue_id(),
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for PriorityQueue<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.store.as_slice()).finish()
    }
}

impl<T: Ord> FromIterator<T> for PriorityQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect(), Natural)
    }
}

impl<'a, T, C> IntoIterator for &'a PriorityQueue<T, C> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.store.as_slice().iter()
    }
}

/// Fail-fast traversal over a [`PriorityQueue`] in heap-array order.
///
/// The cursor does not borrow the queue; every step is handed the queue explicitly. Any
/// structural change between two steps that did not go through [`Cursor::remove`] makes the
/// next step fail with [`Error::ConcurrentStructuralChange`].
///
/// Removing the visited element can pull the tail element *above* the cursor. Such an element
/// is remembered and yielded once the array is exhausted, so each element present for the
/// whole traversal is yielded exactly once.
#[derive(Debug)]
pub struct Cursor<T> {
    queue_id: u64,
    expected_version: u64,
    next: usize,
    last_index: Option<usize>,
    last_bumped: Option<T>,
    bumped: VecDeque<T>,
}

impl<T: Clone + PartialEq> Cursor<T> {
    /// Yields the next element, or `None` once the traversal is complete.
    pub fn advance<C: Compare<T>>(&mut self, queue: &PriorityQueue<T, C>) -> Result<Option<T>> {
        self.check(queue)?;
        if let Some(value) = queue.store.as_slice().get(self.next) {
            self.last_index = Some(self.next);
            self.next += 1;
            return Ok(Some(value.clone()));
        }

        self.last_index = None;
        self.last_bumped = self.bumped.pop_front();
        Ok(self.last_bumped.clone())
    }

    /// Removes the element most recently returned by [`Cursor::advance`].
    ///
    /// # Errors
    ///
    /// [`Error::IllegalIteratorState`] if `next` has not yielded an element since the last
    /// removal.
    pub fn remove<C: Compare<T>>(&mut self, queue: &mut PriorityQueue<T, C>) -> Result<()> {
        self.check(queue)?;
        if let Some(index) = self.last_index.take() {
            let removed = queue.remove_index(index);
            match removed.relocated_to {
                // The slot now holds an element that has not been visited yet.
                None => self.next -= 1,
                Some(at) => self.bumped.push_back(queue.store.as_slice()[at].clone()),
            }
        } else if let Some(value) = self.last_bumped.take() {
            // Every array slot has been visited by now, so any equal element will do.
            if let Some(index) = queue.store.position(|e| *e == value) {
                queue.remove_index(index);
            }
        } else {
            return Err(Error::IllegalIteratorState);
        }
        self.expected_version = queue.version;
        Ok(())
    }

    fn check<C>(&self, queue: &PriorityQueue<T, C>) -> Result<()> {
        if self.queue_id != queue.id || self.expected_version != queue.version {
            return Err(Error::ConcurrentStructuralChange);
        }
        Ok(())
    }
}
