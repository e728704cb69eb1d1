//! Array-backed binary heap maintenance shared by every queue in this workspace.
//!
//! [`HeapStore`] owns a contiguous slot array plus the logical capacity the queue advertises.
//! The only structural invariant is the heap property: for every `1 <= i < len`,
//! `order.compare(slot[i], slot[parent(i)]) != Less` with `parent(i) = (i - 1) / 2`.
//!
//! All repairs move whole elements with swaps, so the store stays a valid permutation of its
//! elements even if a comparator panics halfway through a sift.

use std::cmp::Ordering;

use crate::{Compare, Error, Result, growth};

#[inline]
const fn parent(index: usize) -> usize {
    (index - 1) / 2
}

#[inline]
const fn left_child(index: usize) -> usize {
    2 * index + 1
}

/// Outcome of [`HeapStore::remove_at`].
#[derive(Debug)]
pub struct Removed<E> {
    pub value: E,
    /// Set when the tail element that filled the hole had to move *up*, past the removed
    /// index, to restore the heap property. Holds the index it ended up at.
    pub relocated_to: Option<usize>,
}

#[derive(Debug)]
pub struct HeapStore<E> {
    slots: Vec<E>,
    capacity: usize,
}

impl<E: Clone> Clone for HeapStore<E> {
    fn clone(&self) -> Self {
        let mut slots = Vec::with_capacity(self.capacity);
        slots.extend_from_slice(&self.slots);
        Self {
            slots,
            capacity: self.capacity,
        }
    }
}

impl<E> HeapStore<E> {
    /// Allocates an empty store of `capacity` slots, aborting on allocation failure like the
    /// standard collections do.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Allocates an empty store able to hold `capacity` elements without growing.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| Error::CapacityExceeded { max: capacity })?;
        Ok(Self { slots, capacity })
    }

    /// Takes ownership of `slots` in arbitrary order and heapifies them in linear time.
    pub fn from_vec<C: Compare<E>>(mut slots: Vec<E>, order: &C) -> Self {
        let capacity = slots.len().max(1);
        slots.reserve_exact(capacity - slots.len());
        let mut store = Self { slots, capacity };
        store.heapify(order);
        store
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// The root, i.e. the element that is extracted next.
    #[inline]
    pub fn peek(&self) -> Option<&E> {
        self.slots.first()
    }

    /// Elements in heap-array order, which is not priority order.
    #[inline]
    pub fn as_slice(&self) -> &[E] {
        &self.slots
    }

    pub fn position(&self, predicate: impl FnMut(&E) -> bool) -> Option<usize> {
        self.slots.iter().position(predicate)
    }

    /// Drops every element and keeps the allocation.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn into_vec(self) -> Vec<E> {
        self.slots
    }

    /// Appends `value` and sifts it up. Hands the value back if the store is full.
    pub fn push<C: Compare<E>>(&mut self, value: E, order: &C) -> std::result::Result<usize, E> {
        if self.is_full() {
            return Err(value);
        }
        self.slots.push(value);
        Ok(self.sift_up(self.slots.len() - 1, order))
    }

    /// Bubbles the element at `index` towards the root while its parent compares greater.
    /// Returns the index the element settled at.
    pub fn sift_up<C: Compare<E>>(&mut self, mut index: usize, order: &C) -> usize {
        while index > 0 {
            let up = parent(index);
            if order.compare(&self.slots[index], &self.slots[up]) != Ordering::Less {
                break;
            }
            self.slots.swap(index, up);
            index = up;
        }
        index
    }

    /// Bubbles the element at `index` towards the leaves, always following the smaller child.
    /// Returns the index the element settled at.
    pub fn sift_down<C: Compare<E>>(&mut self, index: usize, order: &C) -> usize {
        self.sift_down_within(index, self.slots.len(), order)
    }

    fn sift_down_within<C: Compare<E>>(&mut self, mut index: usize, limit: usize, order: &C) -> usize {
        let half = limit / 2;
        while index < half {
            let mut child = left_child(index);
            let right = child + 1;
            if right < limit
                && order.compare(&self.slots[child], &self.slots[right]) == Ordering::Greater
            {
                child = right;
            }
            if order.compare(&self.slots[index], &self.slots[child]) != Ordering::Greater {
                break;
            }
            self.slots.swap(index, child);
            index = child;
        }
        index
    }

    /// Restores the heap property over arbitrarily ordered slots.
    pub fn heapify<C: Compare<E>>(&mut self, order: &C) {
        let len = self.slots.len();
        for index in (0..len / 2).rev() {
            self.sift_down_within(index, len, order);
        }
    }

    /// Removes the root, moving the last element into its place and sifting it down.
    pub fn extract_root<C: Compare<E>>(&mut self, order: &C) -> Option<E> {
        if self.slots.is_empty() {
            return None;
        }
        let root = self.slots.swap_remove(0);
        if !self.slots.is_empty() {
            self.sift_down(0, order);
        }
        Some(root)
    }

    /// Removes the element at `index`.
    ///
    /// The last element fills the hole and is sifted down. When it does not sink it may be
    /// smaller than its new parent, so it is sifted up as well; in that case the returned
    /// [`Removed::relocated_to`] reports where it went.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove_at<C: Compare<E>>(&mut self, index: usize, order: &C) -> Removed<E> {
        let value = self.slots.swap_remove(index);
        let mut relocated_to = None;
        if index < self.slots.len() && self.sift_down(index, order) == index {
            let settled = self.sift_up(index, order);
            if settled != index {
                relocated_to = Some(settled);
            }
        }
        Removed {
            value,
            relocated_to,
        }
    }

    /// Grows the logical capacity in place following [`growth::next_capacity`].
    pub fn grow(&mut self, max: usize) -> Result<usize> {
        let new_capacity = growth::next_capacity(self.capacity, max)?;
        self.slots
            .try_reserve_exact(new_capacity - self.slots.len())
            .map_err(|_| Error::CapacityExceeded { max })?;
        self.capacity = new_capacity;
        Ok(new_capacity)
    }

    /// Moves every element into `fresh`, which then replaces this store.
    ///
    /// `fresh` must be empty and at least as large as the current length.
    pub fn migrate(&mut self, mut fresh: HeapStore<E>) {
        debug_assert!(fresh.is_empty());
        debug_assert!(fresh.capacity >= self.slots.len());
        fresh.slots.append(&mut self.slots);
        *self = fresh;
    }

    pub fn is_heap<C: Compare<E>>(&self, order: &C) -> bool {
        (1..self.slots.len())
            .all(|i| order.compare(&self.slots[i], &self.slots[parent(i)]) != Ordering::Less)
    }
}
