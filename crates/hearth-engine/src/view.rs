//! Visible date windows for day, week, month, year and agenda views.
//!
//! Windows are local wall-clock values; [`ViewWindow::to_utc`] turns one into
//! the UTC query window the expander takes.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::zone;

// ── Configurable week start ─────────────────────────────────────────────────

/// Which day begins a week in week and month views.
///
/// Independent of a recurrence rule's `WKST`: changing the view's week start
/// never changes which dates a rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStartDay {
    /// ISO 8601 standard.
    #[default]
    Monday,
    /// US/Canada convention.
    Sunday,
}

impl WeekStartDay {
    /// From the common `0 = Sunday, 1 = Monday` setting value.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(WeekStartDay::Sunday),
            1 => Some(WeekStartDay::Monday),
            _ => None,
        }
    }

    pub fn to_weekday(self) -> Weekday {
        match self {
            WeekStartDay::Monday => Weekday::Mon,
            WeekStartDay::Sunday => Weekday::Sun,
        }
    }
}

// ── Views ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Day,
    Week,
    Month,
    Year,
    Agenda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Prev,
}

/// Days an agenda view looks ahead of its anchor.
pub const AGENDA_DAYS: i64 = 28;

/// Inclusive local window: `start` at midnight, `end` at 23:59:59.999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ViewWindow {
    fn days(first: NaiveDate, last: NaiveDate) -> Self {
        ViewWindow {
            start: first.and_time(NaiveTime::MIN),
            end: end_of_day(last),
        }
    }

    /// The UTC query window covering this view in `tz`.
    ///
    /// The end is exclusive: the instant just after the last visible
    /// millisecond, which is the next local midnight.
    pub fn to_utc(&self, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = zone::local_to_utc(self.start, tz);
        let end = zone::local_to_utc(self.end, tz) + chrono::Duration::milliseconds(1);
        (start, end)
    }

    /// `true` when the local value falls inside the window.
    pub fn contains(&self, local: NaiveDateTime) -> bool {
        self.start <= local && local <= self.end
    }
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or(NaiveDateTime::MAX)
}

/// The window `view` shows around `anchor`.
///
/// - day: the anchor day
/// - week: the week containing the anchor
/// - month: from the start of the week containing the 1st to the end of the
///   week containing the last day, so the grid has whole weeks
/// - year: Jan 1 to Dec 31
/// - agenda: the anchor day through [`AGENDA_DAYS`] days later
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use hearth_engine::view::{view_range, ViewKind, WeekStartDay};
///
/// let anchor = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap();
/// let window = view_range(anchor, ViewKind::Month, WeekStartDay::Monday);
/// assert_eq!(window.start.date(), NaiveDate::from_ymd_opt(2024, 1, 29).unwrap());
/// assert_eq!(window.end.date(), NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
/// ```
pub fn view_range(anchor: NaiveDate, view: ViewKind, week_start: WeekStartDay) -> ViewWindow {
    let ws = week_start.to_weekday();
    match view {
        ViewKind::Day => ViewWindow::days(anchor, anchor),
        ViewKind::Week => ViewWindow::days(
            dates::start_of_week(anchor, ws),
            dates::end_of_week(anchor, ws),
        ),
        ViewKind::Month => {
            let first = anchor.with_day(1).unwrap_or(anchor);
            let last = dates::last_day_of_month(anchor.year(), anchor.month()).unwrap_or(anchor);
            ViewWindow::days(
                dates::start_of_week(first, ws),
                dates::end_of_week(last, ws),
            )
        }
        ViewKind::Year => {
            let first = NaiveDate::from_ymd_opt(anchor.year(), 1, 1).unwrap_or(anchor);
            let last = NaiveDate::from_ymd_opt(anchor.year(), 12, 31).unwrap_or(anchor);
            ViewWindow::days(first, last)
        }
        ViewKind::Agenda => ViewWindow::days(
            anchor,
            anchor + chrono::Duration::days(AGENDA_DAYS),
        ),
    }
}

/// Move `anchor` one view-length forward or back.
///
/// Month steps clamp to the end of shorter months (Jan 31 → Feb 29).
/// Year steps are twelve month steps. Agenda steps like week.
pub fn navigate(anchor: NaiveDate, view: ViewKind, direction: Direction) -> NaiveDate {
    let sign: i64 = match direction {
        Direction::Next => 1,
        Direction::Prev => -1,
    };
    let moved = match view {
        ViewKind::Day => anchor.checked_add_signed(chrono::Duration::days(sign)),
        ViewKind::Week | ViewKind::Agenda => {
            anchor.checked_add_signed(chrono::Duration::days(7 * sign))
        }
        ViewKind::Month => dates::add_months(anchor, sign),
        ViewKind::Year => dates::add_months(anchor, 12 * sign),
    };
    moved.unwrap_or(anchor)
}
