use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::rule::RecurrenceRule;
use crate::schedule::Recurring;
use crate::task::Task;

/// Flattened, serialisable view of a task for companion surfaces. It holds
/// everything needed to recompute due dates and active lists without the
/// full task, since the anchor is the creation date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub name: String,
    pub missed_count: u32,
    #[serde(flatten)]
    pub rule: RecurrenceRule,
    pub creation_date: NaiveDateTime,
    pub last_completed_date: Option<NaiveDateTime>,
    pub total_points: u32,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name().to_string(),
            missed_count: task.missed_count(),
            rule: *task.rule(),
            creation_date: task.creation_date(),
            last_completed_date: task.last_completed_date(),
            total_points: task.total_points(),
        }
    }
}

impl Recurring for TaskSnapshot {
    fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    fn creation_date(&self) -> NaiveDateTime {
        self.creation_date
    }

    fn last_completed_date(&self) -> Option<NaiveDateTime> {
        self.last_completed_date
    }

    fn missed_count(&self) -> u32 {
        self.missed_count
    }
}

pub fn to_json(snapshots: &[TaskSnapshot]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(snapshots)
}

pub fn from_json(payload: &str) -> serde_json::Result<Vec<TaskSnapshot>> {
    serde_json::from_str(payload)
}
