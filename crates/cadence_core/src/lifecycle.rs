//! Completion, undo and rescheduling transitions on a single task.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schedule::Recurring;
use crate::task::{CompletionRecord, Task};
use crate::undo::UndoEntry;

/// Derived from a task and the current time; never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Due,
    Overdue,
    CompletedOneOff,
}

impl Task {
    /// Records a completion at `at` and returns what is needed to undo it.
    /// Completing an already completed task appends another record.
    pub fn complete(&mut self, at: NaiveDateTime) -> UndoEntry {
        let entry = UndoEntry {
            task_id: self.id,
            previous_last_completed_date: self.last_completed_date,
            previous_missed_count: self.missed_count,
            timestamp: at,
        };
        self.completion_history.push(CompletionRecord {
            completion_date: at,
            missed_count_at_completion: self.missed_count,
        });
        self.last_completed_date = Some(at);
        self.missed_count = 0;
        debug!(task = %self.id, completed_at = %at, "task completed");
        entry
    }

    /// Drops the newest history record and restores the supplied values
    /// verbatim.
    pub fn undo_last_completion(
        &mut self,
        previous_date: Option<NaiveDateTime>,
        previous_missed_count: u32,
    ) {
        self.completion_history.pop();
        self.last_completed_date = previous_date;
        self.missed_count = previous_missed_count;
        debug!(task = %self.id, "completion undone");
    }

    /// Applies `entry` if it belongs to this task.
    pub fn apply_undo(&mut self, entry: &UndoEntry) -> bool {
        if entry.task_id != self.id {
            tracing::warn!(
                task = %self.id,
                entry_task = %entry.task_id,
                "undo entry belongs to another task"
            );
            return false;
        }
        self.undo_last_completion(entry.previous_last_completed_date, entry.previous_missed_count);
        true
    }

    /// Re-queues a completed one-off task. Returns false (and changes
    /// nothing) for repeating or not yet completed tasks.
    pub fn reschedule_one_off(&mut self) -> bool {
        if self.rule.is_repeating() || self.last_completed_date.is_none() {
            return false;
        }
        self.last_completed_date = None;
        debug!(task = %self.id, "one-off task rescheduled");
        true
    }

    pub fn recompute_missed_count(&mut self, now: NaiveDateTime) -> u32 {
        self.missed_count = self.compute_missed_count(now);
        self.missed_count
    }

    pub fn state(&self, now: NaiveDateTime) -> TaskState {
        if !self.rule.is_repeating() && self.last_completed_date.is_some() {
            return TaskState::CompletedOneOff;
        }
        if self.next_due_date() > now {
            return TaskState::Pending;
        }
        if self.compute_missed_count(now) == 0 {
            TaskState::Due
        } else {
            TaskState::Overdue
        }
    }
}

/// Completed one-off tasks, by name: the candidates for rescheduling.
pub fn completed_one_offs(tasks: &[Task]) -> Vec<&Task> {
    let mut done: Vec<&Task> = tasks
        .iter()
        .filter(|task| !task.rule.is_repeating() && task.last_completed_date.is_some())
        .collect();
    done.sort_by(|a, b| a.name.cmp(&b.name));
    done
}
