pub mod calendar;
pub mod due;
pub mod error;
pub mod lifecycle;
pub mod missed;
pub mod rule;
pub mod schedule;
pub mod scoring;
pub mod snapshot;
pub mod task;
pub mod undo;

pub use crate::error::{ScheduleError, ValidationError};
pub use crate::lifecycle::TaskState;
pub use crate::rule::{compute_anchor_date, AnchorTarget, PeriodUnit, RecurrenceRule};
pub use crate::schedule::{active_tasks, Recurring};
pub use crate::snapshot::TaskSnapshot;
pub use crate::task::{CompletionRecord, Task, TaskId};
pub use crate::undo::{UndoEntry, UndoStack};
