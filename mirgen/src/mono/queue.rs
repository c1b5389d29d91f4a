//! Keyed work queue

use std::collections::{HashSet, VecDeque};

/// FIFO of pending work items, deduplicated by canonical key
///
/// A key is remembered for the lifetime of the queue: once an item has been
/// pushed, later pushes under the same key are ignored even after the first
/// item was popped and processed.
#[derive(Debug)]
pub struct PendingQueue<T> {
    items: VecDeque<T>,
    seen: HashSet<String>,
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Enqueue `item` under `key`; returns false if the key was seen before
    pub fn push(&mut self, key: &str, item: T) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string());
        self.items.push_back(item);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Whether `key` was ever enqueued, pending or already processed
    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Pending items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every key ever enqueued
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_keys_are_ignored() {
        let mut q = PendingQueue::new();
        assert!(q.push("a", 1));
        assert!(!q.push("a", 2));
        assert!(q.push("b", 3));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(3));
        assert!(q.is_empty());
    }

    #[test]
    fn test_processed_keys_stay_seen() {
        let mut q = PendingQueue::new();
        q.push("a", ());
        q.pop();
        assert!(q.contains("a"));
        assert!(!q.push("a", ()));
        assert_eq!(q.seen_count(), 1);
    }
}
