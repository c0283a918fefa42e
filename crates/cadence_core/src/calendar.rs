//! Gregorian calendar helpers shared by the due-date calculator and the
//! missed-period counter. Every operation is checked: `None` means the
//! result is not representable.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

pub fn at_hour(date: NaiveDate, hour: u32) -> Option<NaiveDateTime> {
    date.and_hms_opt(hour, 0, 0)
}

pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

pub fn add_weeks(date: NaiveDate, weeks: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_weeks(weeks)?)
}

/// Moves by whole months, clamping the day to the target month's length.
pub fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    month_with_day(date.year(), date.month(), months, date.day())
}

/// Moves by whole years, clamping Feb 29 to Feb 28 outside leap years.
pub fn add_years(date: NaiveDate, years: i64) -> Option<NaiveDate> {
    let target_year = i32::try_from(i64::from(date.year()).checked_add(years)?).ok()?;
    let target_month = date.month();
    let day = date.day().min(days_in_month(target_year, target_month));
    NaiveDate::from_ymd_opt(target_year, target_month, day)
}

/// The month `offset` months after (`year`, `month`), with `day` clamped to
/// that month's length.
pub fn month_with_day(year: i32, month: u32, offset: i64, day: u32) -> Option<NaiveDate> {
    let total_months = i64::from(year) * 12 + i64::from(month) - 1 + offset;
    let target_year = i32::try_from(total_months.div_euclid(12)).ok()?;
    let target_month = u32::try_from(total_months.rem_euclid(12) + 1).ok()?;
    let day = day.min(days_in_month(target_year, target_month));
    NaiveDate::from_ymd_opt(target_year, target_month, day)
}

/// `month`/`day` in `year`, with the day clamped to the month's length.
pub fn month_day_in_year(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day.min(days_in_month(year, month)))
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    add_days(date, -i64::from(date.weekday().num_days_from_monday()))
}

/// The given weekday within the ISO week containing `date`.
pub fn weekday_in_week(date: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    add_days(week_start(date)?, i64::from(weekday.num_days_from_monday()))
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Whole days elapsed from `start` to `end`; negative when `end` is earlier.
pub fn whole_days_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    end.signed_duration_since(start).num_days()
}

/// Whole calendar months elapsed from `start` to `end`.
///
/// A month counts once `start` moved forward by that many months (with day
/// clamping, see [`add_months`]) is not after `end`. Jan 31 to Feb 28 is one
/// full month under this convention.
pub fn whole_months_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    if end <= start {
        return 0;
    }
    let mut months = i64::from(end.year() - start.year()) * 12
        + (i64::from(end.month()) - i64::from(start.month()));
    while months > 0 {
        match add_months(start.date(), months) {
            Some(date) if date.and_time(start.time()) <= end => break,
            _ => months -= 1,
        }
    }
    months.max(0)
}

/// Whole calendar years elapsed from `start` to `end`, using the same
/// convention as [`whole_months_between`].
pub fn whole_years_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    if end <= start {
        return 0;
    }
    let mut years = i64::from(end.year() - start.year());
    while years > 0 {
        match add_years(start.date(), years) {
            Some(date) if date.and_time(start.time()) <= end => break,
            _ => years -= 1,
        }
    }
    years.max(0)
}
