//! Global thought ring buffer.

use std::collections::{HashSet, VecDeque};

use crate::types::Thought;

/// Oldest-first ring buffer of agent thoughts.
#[derive(Debug)]
pub struct ThoughtStore {
    items: VecDeque<Thought>,
    ids: HashSet<String>,
    capacity: usize,
}

impl ThoughtStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            ids: HashSet::new(),
            capacity,
        }
    }

    /// Append a live thought. Returns false if its id was already stored.
    pub fn add(&mut self, thought: Thought) -> bool {
        if self.ids.contains(&thought.id) {
            return false;
        }
        self.ids.insert(thought.id.clone());
        self.items.push_back(thought);
        self.evict();
        true
    }

    /// Merge a historical batch in timestamp order, keeping the newest.
    pub fn add_many(&mut self, thoughts: impl IntoIterator<Item = Thought>) -> usize {
        let mut merged: Vec<Thought> = Vec::new();
        for thought in thoughts {
            if self.ids.insert(thought.id.clone()) {
                merged.push(thought);
            }
        }
        if merged.is_empty() {
            return 0;
        }
        let added = merged.len();

        merged.extend(self.items.drain(..));
        merged.sort_by_key(|t| t.timestamp);
        self.items = merged.into();
        self.evict();
        added
    }

    fn evict(&mut self) {
        while self.items.len() > self.capacity {
            if let Some(old) = self.items.pop_front() {
                self.ids.remove(&old.id);
            }
        }
    }

    /// Thoughts, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Thought> {
        self.items.iter()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.ids.clear();
    }
}
