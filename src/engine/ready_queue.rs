use std::collections::VecDeque;

/// FIFO of channels awaiting a synchronization pass, with capacity control.
///
/// Entries are drained strictly in the order they were pushed. The same
/// channel may appear more than once; stale entries are resolved by the
/// channel itself when it comes up.
#[derive(Debug)]
pub struct ReadyQueue<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> ReadyQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Appends `item`, or returns false when the queue is at capacity
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push_back(item);
        true
    }

    /// Removes the oldest entry
    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Entries in the order they will be drained
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}
