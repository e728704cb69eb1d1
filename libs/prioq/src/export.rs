//! Save/restore for queues.
//!
//! An [`Export`] carries the comparator and the element multiset, never the physical heap
//! layout. Importing heapifies the elements again, so extraction after an import yields the
//! same sequence the exported queue would have yielded.

use serde::{Deserialize, Serialize};

use crate::{Compare, Natural, PriorityQueue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export<T, C = Natural> {
    pub comparator: C,
    /// In no particular order.
    pub elements: Vec<T>,
}

impl<T, C> Export<T, C> {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T: Clone, C: Compare<T> + Clone> PriorityQueue<T, C> {
    pub fn export(&self) -> Export<T, C> {
        Export {
            comparator: self.comparator().clone(),
            elements: self.to_vec(),
        }
    }
}

impl<T, C: Compare<T>> PriorityQueue<T, C> {
    pub fn into_export(self) -> Export<T, C> {
        let (elements, comparator) = self.into_parts();
        Export {
            comparator,
            elements,
        }
    }

    pub fn import(export: Export<T, C>) -> Self {
        Self::from_vec(export.elements, export.comparator)
    }
}
