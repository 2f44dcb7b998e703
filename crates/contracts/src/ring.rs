//! Bounded drop-oldest ring
//!
//! Shared by the ingestion buffer and per-subscriber backlogs: a push into a
//! full ring evicts the oldest element and hands it back to the caller so
//! the eviction can be counted.

use std::fmt;

use ringbuf::{traits::*, HeapRb};

/// Fixed-capacity FIFO that overwrites its oldest element when full
pub struct DropOldestRing<T> {
    inner: HeapRb<T>,
}

impl<T> fmt::Debug for DropOldestRing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropOldestRing")
            .field("len", &self.inner.occupied_len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T> DropOldestRing<T> {
    /// Create a ring; a capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: HeapRb::new(capacity.max(1)),
        }
    }

    /// Append an element, returning the evicted oldest one if the ring was full
    #[inline]
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.inner.is_full() {
            self.inner.try_pop()
        } else {
            None
        };
        // Cannot fail: at least one slot is free here
        let _ = self.inner.try_push(item);
        evicted
    }

    /// Remove the oldest element
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.inner.try_pop()
    }

    /// Remove up to `max` elements in FIFO order
    pub fn drain_up_to(&mut self, max: usize) -> Vec<T> {
        let n = max.min(self.inner.occupied_len());
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.inner.try_pop() {
                Some(item) => out.push(item),
                None => break,
            }
        }
        out
    }

    /// Iterate from oldest to newest without removing
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.inner.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    /// Drop every element, returning how many were removed
    pub fn clear(&mut self) -> usize {
        let n = self.len();
        while self.inner.try_pop().is_some() {}
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full_then_evict_oldest() {
        let mut ring = DropOldestRing::new(3);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert!(ring.is_full());

        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_drain_up_to_is_fifo() {
        let mut ring = DropOldestRing::new(5);
        for i in 0..5 {
            ring.push(i);
        }
        assert_eq!(ring.drain_up_to(2), vec![0, 1]);
        assert_eq!(ring.drain_up_to(10), vec![2, 3, 4]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut ring = DropOldestRing::new(0);
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.push("a"), None);
        assert_eq!(ring.push("b"), Some("a"));
        assert_eq!(ring.pop(), Some("b"));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_clear() {
        let mut ring = DropOldestRing::new(4);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.clear(), 2);
        assert!(ring.is_empty());
    }
}
