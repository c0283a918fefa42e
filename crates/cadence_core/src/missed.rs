use chrono::NaiveDateTime;

use crate::calendar::{whole_days_between, whole_months_between, whole_years_between};
use crate::rule::{PeriodUnit, RecurrenceRule};

/// Whole periods elapsed between `due` and `now`, divided by the rule's
/// period count. Zero for one-off tasks and for tasks not yet due.
pub fn missed_periods(rule: &RecurrenceRule, due: NaiveDateTime, now: NaiveDateTime) -> u32 {
    if !rule.is_repeating() || due >= now {
        return 0;
    }
    let elapsed = match rule.period_unit() {
        PeriodUnit::Day => whole_days_between(due, now),
        PeriodUnit::Week => whole_days_between(due, now) / 7,
        PeriodUnit::Month => whole_months_between(due, now),
        PeriodUnit::Year => whole_years_between(due, now),
    };
    let periods = elapsed.div_euclid(i64::from(rule.period_count())).max(0);
    u32::try_from(periods).unwrap_or(u32::MAX)
}

pub fn days_overdue(due: NaiveDateTime, now: NaiveDateTime) -> i64 {
    if due >= now {
        return 0;
    }
    whole_days_between(due, now).max(0)
}
