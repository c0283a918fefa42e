use std::cmp::Ordering;

use chrono::NaiveDateTime;

use crate::due::next_due_date;
use crate::error::ScheduleError;
use crate::missed::{days_overdue, missed_periods};
use crate::rule::RecurrenceRule;

/// Anything carrying enough state to be scheduled: full tasks and the
/// flattened snapshot records handed to companion surfaces both implement
/// this, so both compute due dates with the same code.
pub trait Recurring {
    fn rule(&self) -> &RecurrenceRule;

    /// The anchor. Weekday, day of month and month/day targets are all read
    /// from this timestamp.
    fn creation_date(&self) -> NaiveDateTime;

    fn last_completed_date(&self) -> Option<NaiveDateTime>;

    /// The cached missed count as last recomputed.
    fn missed_count(&self) -> u32;

    fn try_next_due_date(&self) -> Result<NaiveDateTime, ScheduleError> {
        next_due_date(self.rule(), self.creation_date(), self.last_completed_date())
    }

    /// Next due date, falling back to the reference date (due now) when the
    /// computation fails.
    fn next_due_date(&self) -> NaiveDateTime {
        self.try_next_due_date().unwrap_or_else(|err| {
            tracing::warn!(%err, "due date computation failed; treating task as due");
            err.fallback()
        })
    }

    fn is_overdue(&self, now: NaiveDateTime) -> bool {
        self.next_due_date() < now
    }

    fn days_overdue(&self, now: NaiveDateTime) -> i64 {
        days_overdue(self.next_due_date(), now)
    }

    fn compute_missed_count(&self, now: NaiveDateTime) -> u32 {
        missed_periods(self.rule(), self.next_due_date(), now)
    }

    /// True when the task belongs on the list for `instant`: due on that
    /// calendar day, or already overdue.
    fn is_active_for(&self, instant: NaiveDateTime) -> bool {
        let due = self.next_due_date();
        due.date() == instant.date() || due < instant
    }
}

/// Items active at `instant`, most missed first, then earliest due.
pub fn active_tasks<T: Recurring>(items: &[T], instant: NaiveDateTime) -> Vec<&T> {
    let mut active: Vec<(&T, NaiveDateTime)> = items
        .iter()
        .filter(|item| item.is_active_for(instant))
        .map(|item| (item, item.next_due_date()))
        .collect();
    active.sort_by(|(a, a_due), (b, b_due)| compare_urgency(*a, *a_due, *b, *b_due));
    active.into_iter().map(|(item, _)| item).collect()
}

fn compare_urgency<T: Recurring>(
    a: &T,
    a_due: NaiveDateTime,
    b: &T,
    b_due: NaiveDateTime,
) -> Ordering {
    b.missed_count()
        .cmp(&a.missed_count())
        .then_with(|| a_due.cmp(&b_due))
}
