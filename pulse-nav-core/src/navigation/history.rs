//! Bounded record of recently settled route keys.

use std::collections::VecDeque;

/// Maximum number of route keys remembered
pub const ROUTE_HISTORY_CAPACITY: usize = 200;

/// FIFO of route keys, oldest evicted first. Used only for membership tests.
#[derive(Debug, Clone)]
pub struct RouteHistory {
    keys: VecDeque<String>,
    capacity: usize,
}

impl Default for RouteHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteHistory {
    pub fn new() -> Self {
        Self::with_capacity(ROUTE_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn push(&mut self, key: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.keys.len() >= self.capacity {
            self.keys.pop_front();
        }
        self.keys.push_back(key.into());
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Keys from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}
