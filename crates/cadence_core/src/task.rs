use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::rule::RecurrenceRule;
use crate::schedule::Recurring;
use crate::scoring;

/// Stable identifier assigned by whoever owns the task collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRecord {
    pub completion_date: NaiveDateTime,
    pub missed_count_at_completion: u32,
}

impl CompletionRecord {
    pub fn points(&self) -> u32 {
        scoring::points(self.missed_count_at_completion)
    }
}

/// A recurring or one-off task. `missed_count` is a cache that only
/// [`Task::recompute_missed_count`] and the lifecycle transitions write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "TaskFields")]
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) rule: RecurrenceRule,
    pub(crate) creation_date: NaiveDateTime,
    pub(crate) last_completed_date: Option<NaiveDateTime>,
    pub(crate) missed_count: u32,
    pub(crate) completion_history: Vec<CompletionRecord>,
}

#[derive(Deserialize)]
struct TaskFields {
    id: TaskId,
    name: String,
    rule: RecurrenceRule,
    creation_date: NaiveDateTime,
    #[serde(default)]
    last_completed_date: Option<NaiveDateTime>,
    #[serde(default)]
    missed_count: u32,
    #[serde(default)]
    completion_history: Vec<CompletionRecord>,
}

impl TryFrom<TaskFields> for Task {
    type Error = ValidationError;

    fn try_from(fields: TaskFields) -> Result<Self, Self::Error> {
        let mut task = Task::new(fields.id, fields.name, fields.rule, fields.creation_date)?;
        task.last_completed_date = fields.last_completed_date;
        task.missed_count = fields.missed_count;
        task.completion_history = fields.completion_history;
        Ok(task)
    }
}

impl Task {
    pub fn new(
        id: TaskId,
        name: impl Into<String>,
        rule: RecurrenceRule,
        creation_date: NaiveDateTime,
    ) -> Result<Self, ValidationError> {
        let name = validate_name(name.into())?;
        Ok(Self {
            id,
            name,
            rule,
            creation_date,
            last_completed_date: None,
            missed_count: 0,
            completion_history: Vec::new(),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn history(&self) -> &[CompletionRecord] {
        &self.completion_history
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = validate_name(name.into())?;
        Ok(())
    }

    pub fn set_rule(&mut self, rule: RecurrenceRule) {
        self.rule = rule;
    }

    pub fn set_scheduled_hour(&mut self, scheduled_hour: u32) -> Result<(), ValidationError> {
        self.rule = self.rule.with_scheduled_hour(scheduled_hour)?;
        Ok(())
    }

    /// Moves the anchor. Pair with [`crate::rule::compute_anchor_date`] to
    /// retarget a weekday, day of month or month/day.
    pub fn set_creation_date(&mut self, creation_date: NaiveDateTime) {
        self.creation_date = creation_date;
    }

    pub fn total_points(&self) -> u32 {
        scoring::total_points(&self.completion_history)
    }

    pub fn average_points(&self) -> f64 {
        scoring::average_points(&self.completion_history)
    }
}

impl Recurring for Task {
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

fn validate_name(name: String) -> Result<String, ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name)
}
