use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{
    add_days, add_weeks, at_hour, days_in_month, month_day_in_year, month_with_day,
};
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodUnit {
    #[serde(rename = "Days")]
    Day,
    #[serde(rename = "Weeks")]
    Week,
    #[serde(rename = "Months")]
    Month,
    #[serde(rename = "Years")]
    Year,
}

impl PeriodUnit {
    pub const ALL: [PeriodUnit; 4] = [
        PeriodUnit::Day,
        PeriodUnit::Week,
        PeriodUnit::Month,
        PeriodUnit::Year,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodUnit::Day => "Days",
            PeriodUnit::Week => "Weeks",
            PeriodUnit::Month => "Months",
            PeriodUnit::Year => "Years",
        }
    }
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "days" | "d" => Ok(PeriodUnit::Day),
            "week" | "weeks" | "w" => Ok(PeriodUnit::Week),
            "month" | "months" | "m" => Ok(PeriodUnit::Month),
            "year" | "years" | "y" => Ok(PeriodUnit::Year),
            other => Err(ValidationError::InvalidTarget(format!(
                "unknown period unit `{other}`"
            ))),
        }
    }
}

/// How a task repeats. The target weekday, day of month or month and day
/// are not stored here: they are read off the task's anchor date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "RuleFields")]
pub struct RecurrenceRule {
    period_unit: PeriodUnit,
    period_count: u32,
    scheduled_hour: u32,
    is_repeating: bool,
}

#[derive(Deserialize)]
struct RuleFields {
    period_unit: PeriodUnit,
    period_count: u32,
    #[serde(default)]
    scheduled_hour: u32,
    #[serde(default = "default_repeating")]
    is_repeating: bool,
}

fn default_repeating() -> bool {
    true
}

impl TryFrom<RuleFields> for RecurrenceRule {
    type Error = ValidationError;

    fn try_from(fields: RuleFields) -> Result<Self, Self::Error> {
        Ok(RecurrenceRule::new(fields.period_unit, fields.period_count, fields.scheduled_hour)?
            .with_repeating(fields.is_repeating))
    }
}

impl RecurrenceRule {
    /// A repeating rule: every `period_count` units at `scheduled_hour`:00.
    pub fn new(
        period_unit: PeriodUnit,
        period_count: u32,
        scheduled_hour: u32,
    ) -> Result<Self, ValidationError> {
        validate_period_count(period_count)?;
        validate_hour(scheduled_hour)?;
        Ok(Self {
            period_unit,
            period_count,
            scheduled_hour,
            is_repeating: true,
        })
    }

    /// A rule that is due once, on the anchor date at `scheduled_hour`.
    pub fn one_off(scheduled_hour: u32) -> Result<Self, ValidationError> {
        Ok(Self::new(PeriodUnit::Day, 1, scheduled_hour)?.with_repeating(false))
    }

    pub fn with_repeating(mut self, is_repeating: bool) -> Self {
        self.is_repeating = is_repeating;
        self
    }

    pub fn with_scheduled_hour(mut self, scheduled_hour: u32) -> Result<Self, ValidationError> {
        validate_hour(scheduled_hour)?;
        self.scheduled_hour = scheduled_hour;
        Ok(self)
    }

    pub fn period_unit(&self) -> PeriodUnit {
        self.period_unit
    }

    pub fn period_count(&self) -> u32 {
        self.period_count
    }

    pub fn scheduled_hour(&self) -> u32 {
        self.scheduled_hour
    }

    pub fn is_repeating(&self) -> bool {
        self.is_repeating
    }

    /// Human readable cadence, e.g. "Every 2 weeks".
    pub fn describe(&self) -> String {
        if !self.is_repeating {
            return "Once".to_string();
        }
        let unit = self.period_unit.as_str().to_ascii_lowercase();
        if self.period_count == 1 {
            format!("Every {}", unit.trim_end_matches('s'))
        } else {
            format!("Every {} {}", self.period_count, unit)
        }
    }
}

fn validate_period_count(period_count: u32) -> Result<(), ValidationError> {
    if period_count < 1 {
        return Err(ValidationError::PeriodCount(period_count));
    }
    Ok(())
}

fn validate_hour(scheduled_hour: u32) -> Result<(), ValidationError> {
    if scheduled_hour > 23 {
        return Err(ValidationError::ScheduledHour(scheduled_hour));
    }
    Ok(())
}

/// The sub-unit a user picks when editing a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorTarget {
    /// Daily rules have no sub-unit.
    Day,
    Weekday(Weekday),
    DayOfMonth(u32),
    MonthDay { month: u32, day: u32 },
}

impl AnchorTarget {
    fn validate(self, unit: PeriodUnit) -> Result<(), ValidationError> {
        let matches_unit = matches!(
            (unit, self),
            (PeriodUnit::Day, AnchorTarget::Day)
                | (PeriodUnit::Week, AnchorTarget::Weekday(_))
                | (PeriodUnit::Month, AnchorTarget::DayOfMonth(_))
                | (PeriodUnit::Year, AnchorTarget::MonthDay { .. })
        );
        if !matches_unit {
            return Err(ValidationError::TargetMismatch { unit, target: self });
        }
        match self {
            AnchorTarget::DayOfMonth(day) if !(1..=31).contains(&day) => Err(
                ValidationError::InvalidTarget(format!("day of month {day} is outside 1..=31")),
            ),
            AnchorTarget::MonthDay { month, .. } if !(1..=12).contains(&month) => Err(
                ValidationError::InvalidTarget(format!("month {month} is outside 1..=12")),
            ),
            // Leap year 2000 admits Feb 29.
            AnchorTarget::MonthDay { month, day }
                if day < 1 || day > days_in_month(2000, month) =>
            {
                Err(ValidationError::InvalidTarget(format!(
                    "day {day} does not exist in month {month}"
                )))
            }
            _ => Ok(()),
        }
    }

    fn matches(self, date: NaiveDate) -> bool {
        match self {
            AnchorTarget::Day => true,
            AnchorTarget::Weekday(weekday) => date.weekday() == weekday,
            AnchorTarget::DayOfMonth(day) => date.day() == day,
            AnchorTarget::MonthDay { month, day } => date.month() == month && date.day() == day,
        }
    }
}

/// Translates "repeat every N units on `target`, first due around
/// `first_due`" into the anchor date to store on the task.
///
/// The anchor sits a whole number of periods before the occurrence of
/// `target` nearest to `first_due`, at the rule's scheduled hour. Normally
/// that is exactly one period. When the month or year one period back lacks
/// the target day (day 31, Feb 29), the anchor keeps stepping back until it
/// can carry the target day itself; occurrences in between fall on the
/// month's last day.
pub fn compute_anchor_date(
    target: AnchorTarget,
    rule: &RecurrenceRule,
    first_due: NaiveDate,
) -> Result<NaiveDateTime, ValidationError> {
    target.validate(rule.period_unit())?;
    let out_of_range =
        || ValidationError::InvalidTarget(format!("first due date {first_due} is out of range"));

    let occurrence = nearest_occurrence(target, first_due).ok_or_else(out_of_range)?;
    let count = i64::from(rule.period_count());
    let (periods, anchor) = (1..=ANCHOR_SEARCH_PERIODS)
        .find_map(|periods| {
            let date = step_back(target, occurrence, count.checked_mul(periods)?)?;
            target.matches(date).then_some((periods, date))
        })
        .ok_or_else(out_of_range)?;

    if periods > 1 {
        tracing::debug!(?target, %occurrence, %anchor, periods, "stepped past short months");
    }
    at_hour(anchor, rule.scheduled_hour()).ok_or_else(out_of_range)
}

/// A full Gregorian cycle; any target day recurs within this many periods.
const ANCHOR_SEARCH_PERIODS: i64 = 400;

fn step_back(target: AnchorTarget, occurrence: NaiveDate, units: i64) -> Option<NaiveDate> {
    match target {
        AnchorTarget::Day => add_days(occurrence, -units),
        AnchorTarget::Weekday(_) => add_weeks(occurrence, -units),
        AnchorTarget::DayOfMonth(day) => {
            month_with_day(occurrence.year(), occurrence.month(), -units, day)
        }
        AnchorTarget::MonthDay { month, day } => {
            let year = i64::from(occurrence.year()).checked_sub(units)?;
            month_day_in_year(i32::try_from(year).ok()?, month, day)
        }
    }
}

fn nearest_occurrence(target: AnchorTarget, around: NaiveDate) -> Option<NaiveDate> {
    let candidates: Vec<NaiveDate> = match target {
        AnchorTarget::Day => vec![around],
        AnchorTarget::Weekday(weekday) => {
            let forward = (i64::from(weekday.num_days_from_monday())
                - i64::from(around.weekday().num_days_from_monday()))
            .rem_euclid(7);
            let offset = if forward > 3 { forward - 7 } else { forward };
            vec![add_days(around, offset)?]
        }
        AnchorTarget::DayOfMonth(day) => (-1..=1)
            .filter_map(|offset| month_with_day(around.year(), around.month(), offset, day))
            .collect(),
        // Leap days can be eight years apart.
        AnchorTarget::MonthDay { month, day } => (-8..=8)
            .filter_map(|offset| month_day_in_year(around.year().checked_add(offset)?, month, day))
            .collect(),
    };
    // Ties go to the later date.
    candidates
        .into_iter()
        .filter(|candidate| target.matches(*candidate))
        .min_by_key(|candidate| {
            let distance = candidate.signed_duration_since(around).num_days();
            (distance.abs(), distance < 0)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_invalid_rules() {
        assert_eq!(
            RecurrenceRule::new(PeriodUnit::Day, 0, 8),
            Err(ValidationError::PeriodCount(0))
        );
        assert_eq!(
            RecurrenceRule::new(PeriodUnit::Week, 1, 24),
            Err(ValidationError::ScheduledHour(24))
        );
        let rule = RecurrenceRule::new(PeriodUnit::Week, 1, 23).unwrap();
        assert!(rule.with_scheduled_hour(30).is_err());
    }

    #[test]
    fn deserialization_validates_fields() {
        let ok: RecurrenceRule = serde_json::from_str(
            r#"{"period_unit":"Weeks","period_count":2,"scheduled_hour":9,"is_repeating":true}"#,
        )
        .unwrap();
        assert_eq!(ok.period_unit(), PeriodUnit::Week);
        assert_eq!(ok.period_count(), 2);

        let bad = serde_json::from_str::<RecurrenceRule>(
            r#"{"period_unit":"Days","period_count":0,"scheduled_hour":9,"is_repeating":true}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn period_unit_round_trips_through_strings() {
        for unit in PeriodUnit::ALL {
            assert_eq!(unit.as_str().parse::<PeriodUnit>(), Ok(unit));
        }
        assert!("fortnights".parse::<PeriodUnit>().is_err());
    }

    #[test]
    fn describes_cadence() {
        let weekly = RecurrenceRule::new(PeriodUnit::Week, 1, 8).unwrap();
        assert_eq!(weekly.describe(), "Every week");
        let quarterly = RecurrenceRule::new(PeriodUnit::Month, 3, 8).unwrap();
        assert_eq!(quarterly.describe(), "Every 3 months");
        assert_eq!(RecurrenceRule::one_off(8).unwrap().describe(), "Once");
    }

    #[test]
    fn weekly_anchor_steps_back_from_nearest_weekday() {
        let rule = RecurrenceRule::new(PeriodUnit::Week, 2, 9).unwrap();
        // 2025-06-14 is a Saturday.
        let anchor =
            compute_anchor_date(AnchorTarget::Weekday(Weekday::Sat), &rule, date(2025, 6, 13))
                .unwrap();
        assert_eq!(anchor, date(2025, 5, 31).and_hms_opt(9, 0, 0).unwrap());
        assert_eq!(anchor.weekday(), Weekday::Sat);
    }

    #[test]
    fn monthly_anchor_keeps_target_day() {
        let rule = RecurrenceRule::new(PeriodUnit::Month, 2, 18).unwrap();
        let anchor =
            compute_anchor_date(AnchorTarget::DayOfMonth(14), &rule, date(2025, 6, 20)).unwrap();
        assert_eq!(anchor, date(2025, 4, 14).and_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn short_month_anchor_keeps_exact_target_day() {
        let monthly = RecurrenceRule::new(PeriodUnit::Month, 1, 9).unwrap();
        let anchor =
            compute_anchor_date(AnchorTarget::DayOfMonth(31), &monthly, date(2025, 3, 31)).unwrap();
        assert_eq!(anchor.date(), date(2025, 1, 31));
        // The nearest real 31st to mid-February is in January.
        let anchor =
            compute_anchor_date(AnchorTarget::DayOfMonth(31), &monthly, date(2025, 2, 15)).unwrap();
        assert_eq!(anchor.date(), date(2024, 12, 31));

        let quarterly = RecurrenceRule::new(PeriodUnit::Month, 3, 9).unwrap();
        let anchor =
            compute_anchor_date(AnchorTarget::DayOfMonth(30), &quarterly, date(2025, 5, 30))
                .unwrap();
        assert_eq!(anchor.date(), date(2024, 11, 30));

        let yearly = RecurrenceRule::new(PeriodUnit::Year, 1, 9).unwrap();
        let leap_day = AnchorTarget::MonthDay { month: 2, day: 29 };
        let anchor = compute_anchor_date(leap_day, &yearly, date(2028, 2, 29)).unwrap();
        assert_eq!(anchor.date(), date(2024, 2, 29));
        // From a non-leap year the nearest real leap day is 2028's.
        let anchor = compute_anchor_date(leap_day, &yearly, date(2027, 3, 1)).unwrap();
        assert_eq!(anchor.date(), date(2024, 2, 29));
    }

    #[test]
    fn yearly_anchor_picks_nearest_year() {
        let rule = RecurrenceRule::new(PeriodUnit::Year, 1, 0).unwrap();
        let anchor = compute_anchor_date(
            AnchorTarget::MonthDay { month: 1, day: 2 },
            &rule,
            date(2025, 12, 30),
        )
        .unwrap();
        assert_eq!(anchor.date(), date(2025, 1, 2));
    }

    #[test]
    fn rejects_mismatched_or_impossible_targets() {
        let weekly = RecurrenceRule::new(PeriodUnit::Week, 1, 9).unwrap();
        assert!(matches!(
            compute_anchor_date(AnchorTarget::DayOfMonth(3), &weekly, date(2025, 6, 1)),
            Err(ValidationError::TargetMismatch { .. })
        ));
        let monthly = RecurrenceRule::new(PeriodUnit::Month, 1, 9).unwrap();
        assert!(matches!(
            compute_anchor_date(AnchorTarget::DayOfMonth(32), &monthly, date(2025, 6, 1)),
            Err(ValidationError::InvalidTarget(_))
        ));
        let yearly = RecurrenceRule::new(PeriodUnit::Year, 1, 9).unwrap();
        assert!(compute_anchor_date(
            AnchorTarget::MonthDay { month: 2, day: 30 },
            &yearly,
            date(2025, 6, 1)
        )
        .is_err());
    }
}
