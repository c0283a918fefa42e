//! Next-due-date computation.
//!
//! A repeating task's occurrences are laid out on the calendar by its rule
//! and anchor; the next due date is the first occurrence strictly after the
//! reference point (last completion, or the anchor when never completed).
//! Completing a task off-cycle therefore never shifts later occurrences.

use chrono::{Datelike, NaiveDateTime};

use crate::calendar::{
    add_days, add_weeks, at_hour, month_day_in_year, month_with_day, weekday_in_week,
};
use crate::error::ScheduleError;
use crate::rule::{PeriodUnit, RecurrenceRule};

/// Upper bound on occurrences probed before giving up on a computation.
pub const MAX_ADVANCE_STEPS: u32 = 10_000;

/// Returned for completed one-off tasks, which never become due again.
pub const FAR_FUTURE: NaiveDateTime = NaiveDateTime::MAX;

pub fn next_due_date(
    rule: &RecurrenceRule,
    anchor: NaiveDateTime,
    last_completed: Option<NaiveDateTime>,
) -> Result<NaiveDateTime, ScheduleError> {
    if !rule.is_repeating() {
        if last_completed.is_some() {
            return Ok(FAR_FUTURE);
        }
        return at_hour(anchor.date(), rule.scheduled_hour())
            .ok_or(ScheduleError::CalendarArithmetic { reference: anchor });
    }

    let reference = last_completed.unwrap_or(anchor);
    advance_past(reference, |step| occurrence(rule, anchor, reference, step))
}

/// The occurrence `step` periods after the one in the reference's own
/// day/week/month/year.
fn occurrence(
    rule: &RecurrenceRule,
    anchor: NaiveDateTime,
    reference: NaiveDateTime,
    step: u32,
) -> Option<NaiveDateTime> {
    let offset = i64::from(step).checked_mul(i64::from(rule.period_count()))?;
    let base = reference.date();
    let date = match rule.period_unit() {
        PeriodUnit::Day => add_days(base, offset)?,
        PeriodUnit::Week => add_weeks(weekday_in_week(base, anchor.weekday())?, offset)?,
        PeriodUnit::Month => month_with_day(base.year(), base.month(), offset, anchor.day())?,
        PeriodUnit::Year => {
            let year = i32::try_from(i64::from(base.year()).checked_add(offset)?).ok()?;
            month_day_in_year(year, anchor.month(), anchor.day())?
        }
    };
    at_hour(date, rule.scheduled_hour())
}

fn advance_past(
    reference: NaiveDateTime,
    occurrence: impl Fn(u32) -> Option<NaiveDateTime>,
) -> Result<NaiveDateTime, ScheduleError> {
    for step in 0..=MAX_ADVANCE_STEPS {
        let candidate =
            occurrence(step).ok_or(ScheduleError::CalendarArithmetic { reference })?;
        if candidate > reference {
            return Ok(candidate);
        }
    }
    Err(ScheduleError::NonTerminating {
        reference,
        steps: MAX_ADVANCE_STEPS,
    })
}
