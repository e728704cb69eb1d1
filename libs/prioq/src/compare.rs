//! Ordering relations a queue can be built with.
//!
//! A queue always serves the element that compares [`Ordering::Less`] than everything else
//! first. The relation is fixed when the queue is constructed.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub trait Compare<T: ?Sized> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// The element type's own [`Ord`] implementation: smallest element first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Natural;

/// The reverse of [`Ord`]: largest element first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reverse;

/// Adapts any `Fn(&T, &T) -> Ordering` into a [`Compare`].
#[derive(Debug, Clone, Copy)]
pub struct FnComparator<F>(pub F);

impl<T: Ord + ?Sized> Compare<T> for Natural {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T: Ord + ?Sized> Compare<T> for Reverse {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        b.cmp(a)
    }
}

impl<T: ?Sized, F> Compare<T> for FnComparator<F>
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.0)(a, b)
    }
}

impl<T: ?Sized, C: Compare<T> + ?Sized> Compare<T> for &C {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (**self).compare(a, b)
    }
}
