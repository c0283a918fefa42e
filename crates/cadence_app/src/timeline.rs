//! Refresh timeline for companion surfaces that cannot call back into the
//! service: the active list at now, just after each upcoming midnight, and
//! at regular points through the rest of today.

use cadence_core::{active_tasks, Recurring, TaskSnapshot};
use chrono::{Duration, NaiveDateTime};

/// Entries closer than this to the previous one are dropped.
const MERGE_WINDOW_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct TimelineEntry<'a> {
    pub at: NaiveDateTime,
    pub tasks: Vec<&'a TaskSnapshot>,
}

pub fn timeline_instants(now: NaiveDateTime, days: u32, refresh_hours: u32) -> Vec<NaiveDateTime> {
    let mut instants = vec![now];
    let next_midnight = now
        .date()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0));

    if let Some(next_midnight) = next_midnight {
        for offset in 0..=i64::from(days) {
            if let Some(instant) = next_midnight
                .checked_add_signed(Duration::days(offset) + Duration::seconds(1))
            {
                instants.push(instant);
            }
        }

        let step = Duration::hours(i64::from(refresh_hours.max(1)));
        let mut next = now;
        while let Some(candidate) = next.checked_add_signed(step) {
            if candidate >= next_midnight {
                break;
            }
            instants.push(candidate);
            next = candidate;
        }
    }

    instants.sort();
    let mut kept: Vec<NaiveDateTime> = Vec::with_capacity(instants.len());
    for instant in instants {
        let too_close = kept.last().is_some_and(|last| {
            (instant - *last).num_seconds().abs() <= MERGE_WINDOW_SECONDS
        });
        if !too_close {
            kept.push(instant);
        }
    }
    kept
}

pub fn build_timeline(
    snapshots: &[TaskSnapshot],
    now: NaiveDateTime,
    days: u32,
    refresh_hours: u32,
) -> Vec<TimelineEntry<'_>> {
    timeline_instants(now, days, refresh_hours)
        .into_iter()
        .map(|at| TimelineEntry {
            at,
            tasks: active_tasks(snapshots, at),
        })
        .collect()
}

pub fn render_entry(entry: &TimelineEntry<'_>) -> String {
    let stamp = entry.at.format("%a %Y-%m-%d %H:%M");
    if entry.tasks.is_empty() {
        return format!("{stamp}  All done!");
    }
    let count = entry.tasks.len();
    let marker = if entry.tasks.iter().any(|task| task.missed_count() > 0) {
        "! "
    } else {
        ""
    };
    let names = entry
        .tasks
        .iter()
        .map(|task| match task.missed_count() {
            0 => task.name.clone(),
            missed => format!("{} (missed {missed})", task.name),
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{stamp}  {marker}{count} task{} due: {names}",
        if count == 1 { "" } else { "s" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{PeriodUnit, RecurrenceRule};
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn snapshot(name: &str, hour: u32, created: NaiveDateTime, missed: u32) -> TaskSnapshot {
        TaskSnapshot {
            name: name.to_string(),
            missed_count: missed,
            rule: RecurrenceRule::new(PeriodUnit::Day, 2, hour).unwrap(),
            creation_date: created,
            last_completed_date: None,
            total_points: 0,
        }
    }

    #[test]
    fn instants_cover_today_and_upcoming_midnights() {
        let now = at(2025, 6, 10, 17, 30);
        let instants = timeline_instants(now, 3, 2);
        let midnight = |d| at(2025, 6, d, 0, 0) + Duration::seconds(1);
        assert_eq!(
            instants,
            vec![
                now,
                at(2025, 6, 10, 19, 30),
                at(2025, 6, 10, 21, 30),
                at(2025, 6, 10, 23, 30),
                midnight(11),
                midnight(12),
                midnight(13),
                midnight(14),
            ]
        );
    }

    #[test]
    fn instants_near_midnight_are_merged() {
        let now = at(2025, 6, 10, 23, 59) + Duration::seconds(30);
        let instants = timeline_instants(now, 1, 2);
        assert_eq!(instants, vec![now, at(2025, 6, 12, 0, 0) + Duration::seconds(1)]);
    }

    #[test]
    fn timeline_tracks_tasks_becoming_active() {
        let now = at(2025, 6, 10, 20, 0);
        let snapshots = vec![
            snapshot("Water plants", 8, at(2025, 6, 9, 9, 0), 0),
            snapshot("Take out bins", 6, at(2025, 6, 1, 9, 0), 3),
        ];
        let timeline = build_timeline(&snapshots, now, 1, 2);
        let first = &timeline[0];
        assert_eq!(first.at, now);
        assert_eq!(first.tasks.len(), 1);
        assert_eq!(first.tasks[0].name, "Take out bins");

        let after_midnight = timeline
            .iter()
            .find(|entry| entry.at == at(2025, 6, 11, 0, 0) + Duration::seconds(1))
            .unwrap();
        let names: Vec<&str> = after_midnight
            .tasks
            .iter()
            .map(|task| task.name.as_str())
            .collect();
        assert_eq!(names, vec!["Take out bins", "Water plants"]);

        assert_eq!(
            render_entry(first),
            "Tue 2025-06-10 20:00  ! 1 task due: Take out bins (missed 3)"
        );
    }

    #[test]
    fn renders_empty_entry() {
        let entry = TimelineEntry {
            at: at(2025, 6, 10, 8, 0),
            tasks: Vec::new(),
        };
        assert_eq!(render_entry(&entry), "Tue 2025-06-10 08:00  All done!");
    }
}
