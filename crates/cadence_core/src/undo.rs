use std::collections::VecDeque;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::task::TaskId;

pub const UNDO_CAPACITY: usize = 10;

/// State needed to reverse one completion. The task is referenced by id;
/// resolving it is up to the owner of the task collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UndoEntry {
    pub task_id: TaskId,
    pub previous_last_completed_date: Option<NaiveDateTime>,
    pub previous_missed_count: u32,
    pub timestamp: NaiveDateTime,
}

/// Bounded LIFO of recent completions. Pushing past capacity drops the
/// oldest entry.
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_capacity(UNDO_CAPACITY)
    }
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, entry: UndoEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn peek(&self) -> Option<&UndoEntry> {
        self.entries.back()
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
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
}
