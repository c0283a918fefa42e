use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use cadence_core::{
    lifecycle, schedule, RecurrenceRule, Recurring, Task, TaskId, TaskSnapshot, UndoEntry,
    UndoStack, ValidationError,
};
use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};
use tracing::instrument;

use crate::export::{self, SnapshotSink};

/// Owns a task collection and the process-wide undo stack, and keeps
/// companion surfaces up to date through an optional [`SnapshotSink`].
pub struct TaskService {
    tasks: RwLock<BTreeMap<TaskId, Task>>,
    undo: Mutex<UndoStack>,
    next_id: Mutex<u64>,
    snapshot_sink: Option<Box<dyn SnapshotSink>>,
}

pub struct TaskServiceBuilder {
    tasks: Vec<Task>,
    undo_capacity: usize,
    snapshot_sink: Option<Box<dyn SnapshotSink>>,
}

impl Default for TaskServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskServiceBuilder {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            undo_capacity: cadence_core::undo::UNDO_CAPACITY,
            snapshot_sink: None,
        }
    }

    /// Seeds the service with a stored task. A task whose id is already
    /// present is ignored.
    pub fn add_task(mut self, task: Task) -> Self {
        Self::push_unique(&mut self.tasks, task);
        self
    }

    pub fn add_tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        for task in tasks {
            Self::push_unique(&mut self.tasks, task);
        }
        self
    }

    pub fn with_undo_capacity(mut self, capacity: usize) -> Self {
        self.undo_capacity = capacity;
        self
    }

    pub fn with_snapshot_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.snapshot_sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<TaskService> {
        let next_id = self
            .tasks
            .iter()
            .map(|task| task.id().0)
            .max()
            .map_or(Ok(1), |max| {
                max.checked_add(1)
                    .ok_or_else(|| anyhow!("task id space exhausted"))
            })?;
        let tasks = self
            .tasks
            .into_iter()
            .map(|task| (task.id(), task))
            .collect();
        Ok(TaskService {
            tasks: RwLock::new(tasks),
            undo: Mutex::new(UndoStack::with_capacity(self.undo_capacity)),
            next_id: Mutex::new(next_id),
            snapshot_sink: self.snapshot_sink,
        })
    }

    fn push_unique(vec: &mut Vec<Task>, task: Task) {
        if vec.iter().any(|existing| existing.id() == task.id()) {
            tracing::warn!(task = %task.id(), "duplicate task id ignored");
            return;
        }
        vec.push(task);
    }
}

impl TaskService {
    pub fn builder() -> TaskServiceBuilder {
        TaskServiceBuilder::new()
    }

    #[instrument(skip(self, rule))]
    pub fn add_task(
        &self,
        name: &str,
        rule: RecurrenceRule,
        creation_date: NaiveDateTime,
    ) -> Result<TaskId> {
        let id = self.allocate_id()?;
        let task = Task::new(id, name, rule, creation_date)?;
        self.tasks.write().insert(id, task);
        tracing::info!(task = %id, "task added");
        self.publish();
        Ok(id)
    }

    pub fn insert_task(&self, task: Task) -> Result<()> {
        let id = task.id();
        {
            let mut tasks = self.tasks.write();
            anyhow::ensure!(!tasks.contains_key(&id), "task {id} already exists");
            tasks.insert(id, task);
        }
        {
            let mut next_id = self.next_id.lock();
            if id.0 >= *next_id {
                *next_id = id.0.saturating_add(1);
            }
        }
        self.publish();
        Ok(())
    }

    pub fn task(&self, id: TaskId) -> Result<Task> {
        self.tasks
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("task {id} not found"))
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.read().values().cloned().collect()
    }

    /// Applies an edit atomically: if `edit` fails the stored task is left
    /// untouched.
    pub fn update_task(
        &self,
        id: TaskId,
        edit: impl FnOnce(&mut Task) -> std::result::Result<(), ValidationError>,
    ) -> Result<()> {
        {
            let mut tasks = self.tasks.write();
            let task = tasks
                .get_mut(&id)
                .ok_or_else(|| anyhow!("task {id} not found"))?;
            let mut edited = task.clone();
            edit(&mut edited).with_context(|| format!("invalid edit for task {id}"))?;
            *task = edited;
        }
        self.publish();
        Ok(())
    }

    pub fn remove_task(&self, id: TaskId) -> Result<Task> {
        let removed = self
            .tasks
            .write()
            .remove(&id)
            .ok_or_else(|| anyhow!("task {id} not found"))?;
        self.publish();
        Ok(removed)
    }

    // Lock order: `tasks`, then `undo`. Both are held while a completion
    // or its undo is applied so stack order matches history order.

    #[instrument(skip(self))]
    pub fn complete_task(&self, id: TaskId, at: NaiveDateTime) -> Result<()> {
        {
            let mut tasks = self.tasks.write();
            let task = tasks
                .get_mut(&id)
                .ok_or_else(|| anyhow!("task {id} not found"))?;
            let entry = task.complete(at);
            self.undo.lock().push(entry);
        }
        self.publish();
        Ok(())
    }

    /// Reverts the most recent completion. `Ok(None)` when nothing was
    /// reverted: the stack is empty, or its newest entry names a task that
    /// has since been removed, in which case that entry is dropped.
    #[instrument(skip(self))]
    pub fn undo_last_completion(&self) -> Result<Option<UndoEntry>> {
        let mut tasks = self.tasks.write();
        let Some(entry) = self.undo.lock().pop() else {
            return Ok(None);
        };
        let Some(task) = tasks.get_mut(&entry.task_id) else {
            tracing::warn!(task = %entry.task_id, "undo skipped; task no longer exists");
            return Ok(None);
        };
        task.apply_undo(&entry);
        drop(tasks);
        self.publish();
        Ok(Some(entry))
    }

    pub fn can_undo(&self) -> bool {
        self.undo.lock().can_undo()
    }

    pub fn clear_undo(&self) {
        self.undo.lock().clear();
    }

    pub fn reschedule_one_off(&self, id: TaskId) -> Result<bool> {
        let changed = {
            let mut tasks = self.tasks.write();
            let task = tasks
                .get_mut(&id)
                .ok_or_else(|| anyhow!("task {id} not found"))?;
            task.reschedule_one_off()
        };
        if changed {
            self.publish();
        }
        Ok(changed)
    }

    /// Refreshes every cached missed count against `now`.
    #[instrument(skip(self))]
    pub fn recompute_missed_counts(&self, now: NaiveDateTime) {
        {
            let mut tasks = self.tasks.write();
            for task in tasks.values_mut() {
                task.recompute_missed_count(now);
            }
        }
        self.publish();
    }

    pub fn active_tasks(&self, now: NaiveDateTime) -> Vec<Task> {
        let tasks = self.tasks();
        schedule::active_tasks(&tasks, now)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn overdue_tasks(&self, now: NaiveDateTime) -> Vec<Task> {
        self.tasks
            .read()
            .values()
            .filter(|task| task.is_overdue(now))
            .cloned()
            .collect()
    }

    pub fn completed_one_offs(&self) -> Vec<Task> {
        let tasks = self.tasks();
        lifecycle::completed_one_offs(&tasks)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        self.tasks
            .read()
            .values()
            .map(TaskSnapshot::from)
            .collect()
    }

    pub fn export_snapshots(&self, path: impl AsRef<Path>) -> Result<()> {
        export::write_snapshots(path, &self.snapshots())
    }

    fn allocate_id(&self) -> Result<TaskId> {
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id = id
            .checked_add(1)
            .ok_or_else(|| anyhow!("task id space exhausted"))?;
        Ok(TaskId(id))
    }

    fn publish(&self) {
        if let Some(sink) = &self.snapshot_sink {
            sink.publish(&self.snapshots());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::PeriodUnit;
    use chrono::{Duration, NaiveDate};

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn daily(hour: u32) -> RecurrenceRule {
        RecurrenceRule::new(PeriodUnit::Day, 1, hour).unwrap()
    }

    #[test]
    fn builder_seeds_tasks_and_continues_ids() {
        let seeded = Task::new(TaskId(41), "Floss", daily(21), at(2025, 6, 1, 8)).unwrap();
        let duplicate = Task::new(TaskId(41), "Other", daily(9), at(2025, 6, 1, 8)).unwrap();
        let service = TaskService::builder()
            .add_task(seeded)
            .add_task(duplicate)
            .build()
            .unwrap();
        assert_eq!(service.tasks().len(), 1);
        assert_eq!(service.task(TaskId(41)).unwrap().name(), "Floss");

        let id = service
            .add_task("Stretch", daily(7), at(2025, 6, 2, 8))
            .unwrap();
        assert_eq!(id, TaskId(42));
    }

    #[test]
    fn complete_then_undo_restores_task() {
        let service = TaskService::builder().build().unwrap();
        let id = service
            .add_task("Stretch", daily(7), at(2025, 6, 1, 8))
            .unwrap();
        service.recompute_missed_counts(at(2025, 6, 5, 9));
        let before = service.task(id).unwrap();
        assert_eq!(before.missed_count(), 3);

        service.complete_task(id, at(2025, 6, 5, 9)).unwrap();
        let after = service.task(id).unwrap();
        assert_eq!(after.missed_count(), 0);
        assert_eq!(after.history().len(), 1);
        assert!(service.can_undo());

        let entry = service.undo_last_completion().unwrap().unwrap();
        assert_eq!(entry.task_id, id);
        assert_eq!(service.task(id).unwrap(), before);
        assert!(service.undo_last_completion().unwrap().is_none());
    }

    #[test]
    fn undo_for_removed_task_is_skipped() {
        let service = TaskService::builder().build().unwrap();
        let stretch = service
            .add_task("Stretch", daily(7), at(2025, 6, 1, 8))
            .unwrap();
        let floss = service
            .add_task("Floss", daily(21), at(2025, 6, 1, 8))
            .unwrap();
        service.complete_task(stretch, at(2025, 6, 2, 9)).unwrap();
        service.complete_task(floss, at(2025, 6, 2, 22)).unwrap();
        service.remove_task(floss).unwrap();

        assert!(service.undo_last_completion().unwrap().is_none());
        assert!(service.can_undo());
        let entry = service.undo_last_completion().unwrap().unwrap();
        assert_eq!(entry.task_id, stretch);
        assert!(service.task(stretch).unwrap().history().is_empty());
        assert!(!service.can_undo());
    }

    #[test]
    fn concurrent_completions_undo_in_history_order() {
        let service = TaskService::builder()
            .with_undo_capacity(64)
            .build()
            .unwrap();
        let id = service
            .add_task("Stretch", daily(7), at(2025, 6, 1, 8))
            .unwrap();
        let before = service.task(id).unwrap();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let service = &service;
                scope.spawn(move || {
                    for round in 0..8 {
                        let offset = Duration::minutes(worker * 100 + round);
                        service.complete_task(id, at(2025, 6, 2, 0) + offset).unwrap();
                    }
                });
            }
        });
        assert_eq!(service.task(id).unwrap().history().len(), 32);

        while service.undo_last_completion().unwrap().is_some() {
            let task = service.task(id).unwrap();
            let newest = task.history().last().map(|record| record.completion_date);
            assert_eq!(task.last_completed_date(), newest);
        }
        assert_eq!(service.task(id).unwrap(), before);
    }

    #[test]
    fn failed_edit_leaves_task_unchanged() {
        let service = TaskService::builder().build().unwrap();
        let id = service
            .add_task("Stretch", daily(7), at(2025, 6, 1, 8))
            .unwrap();
        let result = service.update_task(id, |task| {
            task.rename("Yoga")?;
            task.set_scheduled_hour(40)
        });
        assert!(result.is_err());
        assert_eq!(service.task(id).unwrap().name(), "Stretch");

        service
            .update_task(id, |task| task.rename("Yoga"))
            .unwrap();
        assert_eq!(service.task(id).unwrap().name(), "Yoga");
    }

    #[test]
    fn undo_capacity_is_configurable() {
        let service = TaskService::builder()
            .with_undo_capacity(2)
            .build()
            .unwrap();
        let id = service
            .add_task("Stretch", daily(7), at(2025, 6, 1, 8))
            .unwrap();
        for day in 2..6 {
            service.complete_task(id, at(2025, 6, day, 9)).unwrap();
        }
        assert!(service.undo_last_completion().unwrap().is_some());
        assert!(service.undo_last_completion().unwrap().is_some());
        assert!(service.undo_last_completion().unwrap().is_none());
        assert_eq!(service.task(id).unwrap().history().len(), 2);
    }

    #[test]
    fn reschedule_one_off_requeues_task() {
        let service = TaskService::builder().build().unwrap();
        let id = service
            .add_task(
                "Renew passport",
                RecurrenceRule::one_off(10).unwrap(),
                at(2025, 6, 1, 8),
            )
            .unwrap();
        assert!(!service.reschedule_one_off(id).unwrap());
        service.complete_task(id, at(2025, 6, 1, 11)).unwrap();
        assert_eq!(service.completed_one_offs().len(), 1);
        assert!(service.overdue_tasks(at(2025, 6, 3, 0)).is_empty());

        assert!(service.reschedule_one_off(id).unwrap());
        assert!(service.completed_one_offs().is_empty());
        assert_eq!(service.overdue_tasks(at(2025, 6, 3, 0)).len(), 1);
    }

    #[test]
    fn missing_task_operations_error() {
        let service = TaskService::builder().build().unwrap();
        assert!(service.task(TaskId(9)).is_err());
        assert!(service.complete_task(TaskId(9), at(2025, 6, 1, 8)).is_err());
        assert!(service.reschedule_one_off(TaskId(9)).is_err());
        assert!(service.remove_task(TaskId(9)).is_err());
    }
}
