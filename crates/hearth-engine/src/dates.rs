//! Calendar-date arithmetic shared by the expander and the view calculator.
//!
//! Everything here works on `NaiveDate` (a local calendar date) and never
//! panics: out-of-range results come back as `None`.

use chrono::{Datelike, Months, NaiveDate, Weekday};

/// How many days `weekday` is past `week_start` (0..=6).
pub fn days_from_week_start(weekday: Weekday, week_start: Weekday) -> i64 {
    let w = weekday.num_days_from_monday() as i64;
    let s = week_start.num_days_from_monday() as i64;
    (w - s + 7) % 7
}

/// First day of the week containing `date`.
pub fn start_of_week(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    date - chrono::Duration::days(days_from_week_start(date.weekday(), week_start))
}

/// Last day of the week containing `date`.
pub fn end_of_week(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    start_of_week(date, week_start) + chrono::Duration::days(6)
}

/// Last calendar day of `month` in `year`.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()
}

/// Resolve a signed month day (`-1` = last day) to a date, if it exists.
pub fn month_day(year: i32, month: u32, day: i32) -> Option<NaiveDate> {
    if day > 0 {
        NaiveDate::from_ymd_opt(year, month, day as u32)
    } else if day < 0 {
        let last = last_day_of_month(year, month)?;
        let offset = (-day - 1) as i64;
        let date = last - chrono::Duration::days(offset);
        (date.month() == month).then_some(date)
    } else {
        None
    }
}

/// Every date in `[first, last]` that falls on `weekday`.
pub fn weekdays_between(first: NaiveDate, last: NaiveDate, weekday: Weekday) -> Vec<NaiveDate> {
    let diff = days_from_week_start(weekday, first.weekday());
    let mut cursor = first + chrono::Duration::days(diff);
    let mut out = Vec::new();
    while cursor <= last {
        out.push(cursor);
        cursor += chrono::Duration::weeks(1);
    }
    out
}

/// The Nth `weekday` in `[first, last]`. `ordinal < 0` counts from the end
/// (`-1` = last, `-2` = second to last).
pub fn nth_weekday_between(
    first: NaiveDate,
    last: NaiveDate,
    weekday: Weekday,
    ordinal: i32,
) -> Option<NaiveDate> {
    let target = if ordinal > 0 {
        let diff = days_from_week_start(weekday, first.weekday());
        first + chrono::Duration::days(diff) + chrono::Duration::weeks((ordinal - 1) as i64)
    } else if ordinal < 0 {
        let diff = days_from_week_start(last.weekday(), weekday);
        last - chrono::Duration::days(diff) - chrono::Duration::weeks((-ordinal - 1) as i64)
    } else {
        return None;
    };
    (first <= target && target <= last).then_some(target)
}

/// Shift a date by whole months (negative goes back), clamping to the end of
/// shorter months.
pub fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}
