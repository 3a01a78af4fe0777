//! Recurrence expansion: master event + window → concrete occurrences.
//!
//! Candidates are produced lazily and in increasing order, one base period
//! (day, week, month, year) at a time, so a query window ends the walk as
//! soon as a candidate starts past it. `COUNT`, `UNTIL` and the
//! `max_instances` cap bound the rest.
//!
//! Calendar arithmetic happens on local wall-clock dates in the event's zone:
//! a 09:00 weekly meeting stays at 09:00 across a DST change.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dates;
use crate::rrule::{ByDay, Frequency, RecurrenceRule};
use crate::zone;

/// Default hard cap on occurrences returned by one expansion.
pub const DEFAULT_MAX_INSTANCES: usize = 1000;

/// Consecutive base periods without a single candidate before the walk gives
/// up (filters such as `BYMONTH=2;BYMONTHDAY=30` never match).
const MAX_IDLE_PERIODS: u32 = 10_000;

/// The stored definition an expansion starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterEvent {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub recurrence: Option<RecurrenceRule>,
    /// IANA label for the zone whose wall clock the rule follows.
    pub timezone: Option<String>,
}

/// One concrete instance of a master event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedOccurrence {
    /// `"{master_event_id}_{start epoch millis}"`, stable across calls.
    pub id: String,
    pub master_event_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub is_recurrence_instance: bool,
}

/// Knobs for [`expand_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Hard cap on emitted occurrences, independent of `COUNT`.
    pub max_instances: usize,
    /// Zone used for wall-clock arithmetic when the master has no usable
    /// timezone label of its own.
    pub zone: Tz,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        ExpandOptions {
            max_instances: DEFAULT_MAX_INSTANCES,
            zone: Tz::UTC,
        }
    }
}

/// Expand `master` into the occurrences overlapping `[range_start, range_end)`,
/// with at most [`DEFAULT_MAX_INSTANCES`] results and UTC wall-clock arithmetic.
///
/// See [`expand_with_options`].
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use hearth_engine::expander::{expand, MasterEvent};
/// use hearth_engine::rrule::parse_rrule;
///
/// let master = MasterEvent {
///     id: "standup".into(),
///     start: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
///     end: Utc.with_ymd_and_hms(2024, 1, 1, 9, 15, 0).unwrap(),
///     all_day: false,
///     recurrence: parse_rrule("FREQ=DAILY;COUNT=3"),
///     timezone: None,
/// };
/// let occurrences = expand(
///     &master,
///     Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
/// );
/// assert_eq!(occurrences.len(), 3);
/// ```
pub fn expand(
    master: &MasterEvent,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> Vec<ExpandedOccurrence> {
    expand_with_options(master, range_start, range_end, &ExpandOptions::default())
}

/// Expand `master` into the occurrences overlapping `[range_start, range_end)`.
///
/// Non-recurring masters yield themselves when they overlap the window.
/// Recurring masters yield every rule match (plus rdates) that overlaps,
/// minus exdates, in ascending start order, each with the master's duration.
/// Overlap is half-open (`start < range_end && end > range_start`); a
/// zero-length event counts when `range_start <= start < range_end`.
///
/// This never fails: a rule with `interval == 0` is stepped as 1, and the
/// output is truncated at `options.max_instances`.
pub fn expand_with_options(
    master: &MasterEvent,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    options: &ExpandOptions,
) -> Vec<ExpandedOccurrence> {
    let duration = (master.end - master.start).max(chrono::Duration::zero());
    let is_instance = master.recurrence.is_some();
    let mut out = Vec::new();

    for start in occurrences(master, options) {
        if start >= range_end {
            break;
        }
        let end = start + duration;
        if !overlaps_window(start, end, range_start, range_end) {
            continue;
        }
        if out.len() >= options.max_instances {
            tracing::debug!(
                master = %master.id,
                cap = options.max_instances,
                "expansion truncated at instance cap"
            );
            break;
        }
        out.push(ExpandedOccurrence {
            id: occurrence_id(&master.id, start),
            master_event_id: master.id.clone(),
            start,
            end,
            all_day: master.all_day,
            is_recurrence_instance: is_instance,
        });
    }

    tracing::trace!(master = %master.id, count = out.len(), "expanded");
    out
}

/// The lazy stream of occurrence starts for `master`, independent of any window.
///
/// For a non-recurring master this yields `master.start` once. Unbounded rules
/// give an unbounded iterator; take what you need. The iterator is `Clone`,
/// so a saved copy restarts from the same point.
pub fn occurrences(master: &MasterEvent, options: &ExpandOptions) -> Occurrences {
    Occurrences::new(master, options)
}

/// Deterministic id for the occurrence of `master_id` starting at `start`.
pub fn occurrence_id(master_id: &str, start: DateTime<Utc>) -> String {
    format!("{}_{}", master_id, start.timestamp_millis())
}

fn overlaps_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> bool {
    if start == end {
        range_start <= start && start < range_end
    } else {
        start < range_end && end > range_start
    }
}

// ── Occurrences ─────────────────────────────────────────────────────────────

/// Iterator over occurrence starts. See [`occurrences`].
#[derive(Debug, Clone)]
pub struct Occurrences {
    candidates: Option<RuleCandidates>,
    zone: Tz,
    time: NaiveTime,
    count: Option<u32>,
    until: Option<DateTime<Utc>>,
    /// Rule matches produced so far, exdated ones included.
    generated: u32,
    pending: Option<DateTime<Utc>>,
    rdates: Vec<DateTime<Utc>>,
    next_rdate: usize,
    exdates: BTreeSet<DateTime<Utc>>,
    exdate_days: BTreeSet<NaiveDate>,
}

impl Occurrences {
    fn new(master: &MasterEvent, options: &ExpandOptions) -> Self {
        let zone = zone::resolve_or(master.timezone.as_deref(), options.zone);
        let local_start = zone::utc_to_local(master.start, &zone);

        let Some(rule) = &master.recurrence else {
            return Occurrences {
                candidates: None,
                zone,
                time: local_start.time(),
                count: None,
                until: None,
                generated: 0,
                pending: None,
                rdates: vec![master.start],
                next_rdate: 0,
                exdates: BTreeSet::new(),
                exdate_days: BTreeSet::new(),
            };
        };

        if rule.interval == 0 {
            tracing::warn!(master = %master.id, "recurrence interval 0 treated as 1");
        }

        let exdate_days = if master.all_day {
            rule.exdates
                .iter()
                .map(|x| zone::utc_to_local(*x, &zone).date())
                .collect()
        } else {
            BTreeSet::new()
        };

        Occurrences {
            candidates: Some(RuleCandidates::new(rule, local_start.date())),
            zone,
            time: local_start.time(),
            count: rule.count,
            until: rule.until,
            generated: 0,
            pending: None,
            rdates: rule.rdates.iter().copied().collect(),
            next_rdate: 0,
            exdates: rule.exdates.clone(),
            exdate_days,
        }
    }

    /// Next rule match, honouring `COUNT` and `UNTIL`. Exdates are not applied here.
    fn next_rule_instance(&mut self) -> Option<DateTime<Utc>> {
        if self.count.is_some_and(|c| self.generated >= c) {
            self.candidates = None;
            return None;
        }
        let Some(date) = self.candidates.as_mut().and_then(Iterator::next) else {
            self.candidates = None;
            return None;
        };
        let instant = zone::local_to_utc(date.and_time(self.time), &self.zone);
        if self.until.is_some_and(|until| instant > until) {
            self.candidates = None;
            return None;
        }
        self.generated += 1;
        Some(instant)
    }

    fn is_excluded(&self, instant: DateTime<Utc>) -> bool {
        if self.exdates.contains(&instant) {
            return true;
        }
        !self.exdate_days.is_empty()
            && self
                .exdate_days
                .contains(&zone::utc_to_local(instant, &self.zone).date())
    }
}

impl Iterator for Occurrences {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<DateTime<Utc>> {
        loop {
            if self.pending.is_none() {
                self.pending = self.next_rule_instance();
            }
            let rdate = self.rdates.get(self.next_rdate).copied();

            let pick = match (self.pending, rdate) {
                (Some(rule), Some(extra)) if extra < rule => {
                    self.next_rdate += 1;
                    extra
                }
                (Some(rule), Some(extra)) if extra == rule => {
                    self.next_rdate += 1;
                    self.pending = None;
                    rule
                }
                (Some(rule), _) => {
                    self.pending = None;
                    rule
                }
                (None, Some(extra)) => {
                    self.next_rdate += 1;
                    extra
                }
                (None, None) => return None,
            };

            if self.is_excluded(pick) {
                continue;
            }
            return Some(pick);
        }
    }
}

// ── RuleCandidates ──────────────────────────────────────────────────────────

/// Local dates matching a rule, ascending, never before the first date.
#[derive(Debug, Clone)]
struct RuleCandidates {
    frequency: Frequency,
    interval: u64,
    by_day: Vec<ByDay>,
    by_month_day: Vec<i32>,
    by_month: Vec<u32>,
    week_start: chrono::Weekday,
    first: NaiveDate,
    /// First day of the period that contains `first`.
    anchor: NaiveDate,
    period: u64,
    buffer: VecDeque<NaiveDate>,
    idle: u32,
    exhausted: bool,
}

impl RuleCandidates {
    fn new(rule: &RecurrenceRule, first: NaiveDate) -> Self {
        let week_start = rule.effective_week_start();
        let anchor = match rule.frequency {
            Frequency::Daily => first,
            Frequency::Weekly => dates::start_of_week(first, week_start),
            Frequency::Monthly => first.with_day(1).unwrap_or(first),
            Frequency::Yearly => NaiveDate::from_ymd_opt(first.year(), 1, 1).unwrap_or(first),
        };
        RuleCandidates {
            frequency: rule.frequency,
            interval: u64::from(rule.effective_interval()),
            by_day: rule.by_day.clone(),
            by_month_day: rule.by_month_day.clone(),
            by_month: rule.by_month.clone(),
            week_start,
            first,
            anchor,
            period: 0,
            buffer: VecDeque::new(),
            idle: 0,
            exhausted: false,
        }
    }

    /// First day of the `k`th period, or `None` past the end of the calendar.
    fn period_start(&self, k: u64) -> Option<NaiveDate> {
        let steps = k.checked_mul(self.interval)?;
        match self.frequency {
            Frequency::Daily => self.anchor.checked_add_days(Days::new(steps)),
            Frequency::Weekly => self.anchor.checked_add_days(Days::new(steps.checked_mul(7)?)),
            Frequency::Monthly => dates::add_months(self.anchor, i64::try_from(steps).ok()?),
            Frequency::Yearly => {
                dates::add_months(self.anchor, i64::try_from(steps.checked_mul(12)?).ok()?)
            }
        }
    }

    fn dates_in_period(&self, period_start: NaiveDate) -> Vec<NaiveDate> {
        match self.frequency {
            Frequency::Daily => {
                let day = period_start;
                let keep = self.month_allowed(day.month())
                    && self.month_day_allowed(day)
                    && (self.by_day.is_empty()
                        || self.by_day.iter().any(|b| b.weekday == day.weekday()));
                if keep {
                    vec![day]
                } else {
                    Vec::new()
                }
            }
            Frequency::Weekly => {
                let offset = |wd| {
                    period_start
                        + chrono::Duration::days(dates::days_from_week_start(wd, self.week_start))
                };
                let days: Vec<NaiveDate> = if self.by_day.is_empty() {
                    vec![offset(self.first.weekday())]
                } else {
                    self.by_day.iter().map(|b| offset(b.weekday)).collect()
                };
                days.into_iter()
                    .filter(|d| self.month_allowed(d.month()) && self.month_day_allowed(*d))
                    .collect()
            }
            Frequency::Monthly => {
                if self.month_allowed(period_start.month()) {
                    self.month_candidates(period_start.year(), period_start.month())
                } else {
                    Vec::new()
                }
            }
            Frequency::Yearly => self.year_candidates(period_start.year()),
        }
    }

    fn year_candidates(&self, year: i32) -> Vec<NaiveDate> {
        if !self.by_day.is_empty() && self.by_month.is_empty() && self.by_month_day.is_empty() {
            // Weekday positions count through the whole year.
            let (Some(first), Some(last)) = (
                NaiveDate::from_ymd_opt(year, 1, 1),
                NaiveDate::from_ymd_opt(year, 12, 31),
            ) else {
                return Vec::new();
            };
            return self.weekday_candidates(first, last);
        }

        let months: Vec<u32> = if !self.by_month.is_empty() {
            self.by_month.clone()
        } else if !self.by_month_day.is_empty() || !self.by_day.is_empty() {
            (1..=12).collect()
        } else {
            vec![self.first.month()]
        };
        months
            .into_iter()
            .flat_map(|m| self.month_candidates(year, m))
            .collect()
    }

    fn month_candidates(&self, year: i32, month: u32) -> Vec<NaiveDate> {
        if !self.by_day.is_empty() {
            let (Some(first), Some(last)) = (
                NaiveDate::from_ymd_opt(year, month, 1),
                dates::last_day_of_month(year, month),
            ) else {
                return Vec::new();
            };
            let mut days = self.weekday_candidates(first, last);
            days.retain(|d| self.month_day_allowed(*d));
            days
        } else if !self.by_month_day.is_empty() {
            self.by_month_day
                .iter()
                .filter_map(|md| dates::month_day(year, month, *md))
                .collect()
        } else {
            NaiveDate::from_ymd_opt(year, month, self.first.day())
                .into_iter()
                .collect()
        }
    }

    fn weekday_candidates(&self, first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
        self.by_day
            .iter()
            .flat_map(|b| match b.position {
                Some(n) => dates::nth_weekday_between(first, last, b.weekday, n)
                    .into_iter()
                    .collect(),
                None => dates::weekdays_between(first, last, b.weekday),
            })
            .collect()
    }

    fn month_allowed(&self, month: u32) -> bool {
        self.by_month.is_empty() || self.by_month.contains(&month)
    }

    fn month_day_allowed(&self, day: NaiveDate) -> bool {
        self.by_month_day.is_empty()
            || self
                .by_month_day
                .iter()
                .any(|md| dates::month_day(day.year(), day.month(), *md) == Some(day))
    }
}

impl Iterator for RuleCandidates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            if let Some(day) = self.buffer.pop_front() {
                return Some(day);
            }
            if self.exhausted {
                return None;
            }
            let Some(period_start) = self.period_start(self.period) else {
                self.exhausted = true;
                return None;
            };
            self.period += 1;

            let mut days = self.dates_in_period(period_start);
            days.retain(|d| *d >= self.first);
            days.sort_unstable();
            days.dedup();

            if days.is_empty() {
                self.idle += 1;
                if self.idle >= MAX_IDLE_PERIODS {
                    tracing::debug!(
                        frequency = self.frequency.as_str(),
                        "no rule match in {MAX_IDLE_PERIODS} periods, ending expansion"
                    );
                    self.exhausted = true;
                }
            } else {
                self.idle = 0;
                self.buffer.extend(days);
            }
        }
    }
}
