//! Fixed-capacity top-k heap.
//!
//! A min-heap over `T`'s ordering that never holds more than `capacity`
//! items. Once full, a new item is admitted only if it beats the current
//! minimum, which it then evicts. By default "beats" means strictly
//! greater; [`BoundedHeap::push_bounded_by`] takes a narrower test. Memory
//! and comparison work stay bounded however many items are offered.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone)]
pub struct BoundedHeap<T: Ord> {
    heap: BinaryHeap<Reverse<T>>,
    capacity: usize,
}

impl<T: Ord> BoundedHeap<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Smallest retained item.
    pub fn peek_min(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(item)| item)
    }

    /// Offer an item. Returns whether it was retained.
    pub fn push_bounded(&mut self, item: T) -> bool {
        self.push_bounded_by(item, |item, min| item > min)
    }

    /// Offer an item; when full, `admits(item, min)` decides whether it
    /// evicts the minimum. Returns whether it was retained.
    pub fn push_bounded_by(&mut self, item: T, admits: impl FnOnce(&T, &T) -> bool) -> bool {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(item));
            return true;
        }
        match self.heap.peek_mut() {
            Some(mut min) if admits(&item, &min.0) => {
                *min = Reverse(item);
                true
            }
            _ => false,
        }
    }

    /// Consume the heap, largest item first.
    pub fn drain_sorted_desc(self) -> Vec<T> {
        // Ascending over `Reverse<T>` is descending over `T`.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(item)| item)
            .collect()
    }
}
