//! RFC 5545 `RRULE` value codec.
//!
//! [`parse_rrule`] turns a rule string such as `FREQ=WEEKLY;BYDAY=MO,WE,FR`
//! into a [`RecurrenceRule`]; [`serialize_rrule`] writes it back in a stable,
//! canonical order. Parsing is lenient: anything that is not a usable rule
//! yields `None` ("does not recur") instead of an error, unknown keys are
//! skipped, and bad list entries are dropped one by one.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::HearthError;
use crate::zone;

/// How often a rule's base period repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// The RFC 5545 `FREQ` token.
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    fn from_token(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// One `BYDAY` entry: a weekday, optionally pinned to the Nth (or Nth-from-last)
/// occurrence inside the month or year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByDay {
    pub weekday: Weekday,
    /// `1` = first, `-1` = last. `None` means every such weekday.
    pub position: Option<i32>,
}

impl ByDay {
    pub fn every(weekday: Weekday) -> Self {
        ByDay {
            weekday,
            position: None,
        }
    }

    pub fn nth(position: i32, weekday: Weekday) -> Self {
        ByDay {
            weekday,
            position: Some(position),
        }
    }

    fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim().to_ascii_uppercase();
        if entry.len() < 2 || !entry.is_ascii() {
            return None;
        }
        let (prefix, code) = entry.split_at(entry.len() - 2);
        let weekday = parse_weekday_code(code)?;
        let position = if prefix.is_empty() {
            None
        } else {
            let n: i32 = prefix.parse().ok()?;
            if n == 0 || n.abs() > 53 {
                return None;
            }
            Some(n)
        };
        Some(ByDay { weekday, position })
    }
}

impl fmt::Display for ByDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.position {
            write!(f, "{n}")?;
        }
        f.write_str(weekday_code(self.weekday))
    }
}

/// A structured recurrence rule.
///
/// `count` and `until` should not both be set; when they are, both bound the
/// expansion and [`serialize_rrule`] keeps only `COUNT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Period multiplier. Values below 1 are treated as 1.
    #[serde(default = "default_interval", deserialize_with = "lenient_interval")]
    pub interval: u32,
    #[serde(default)]
    pub count: Option<u32>,
    /// Inclusive upper bound on occurrence starts.
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub by_day: Vec<ByDay>,
    /// 1..=31, or -1..=-31 counting back from the end of the month.
    #[serde(default)]
    pub by_month_day: Vec<i32>,
    /// 1..=12.
    #[serde(default)]
    pub by_month: Vec<u32>,
    /// `WKST`. `None` means Monday.
    #[serde(default)]
    pub week_start: Option<Weekday>,
    /// Instants to suppress from the expansion.
    #[serde(default)]
    pub exdates: BTreeSet<DateTime<Utc>>,
    /// Extra instants merged into the expansion.
    #[serde(default)]
    pub rdates: BTreeSet<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

/// Structured rules get the same clamp as `INTERVAL=` in rule text.
fn lenient_interval<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = i64::deserialize(deserializer)?;
    Ok(clamp_interval(raw).unwrap_or_else(|| {
        tracing::warn!(interval = raw, "non-positive interval, using 1");
        1
    }))
}

fn clamp_interval(raw: i64) -> Option<u32> {
    (raw >= 1).then(|| u32::try_from(raw).unwrap_or(u32::MAX))
}

impl RecurrenceRule {
    /// An unbounded rule with every optional part empty.
    pub fn new(frequency: Frequency) -> Self {
        RecurrenceRule {
            frequency,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_month: Vec::new(),
            week_start: None,
            exdates: BTreeSet::new(),
            rdates: BTreeSet::new(),
        }
    }

    /// The interval actually used for stepping.
    pub fn effective_interval(&self) -> u32 {
        self.interval.max(1)
    }

    /// The week start actually used for weekly periods.
    pub fn effective_week_start(&self) -> Weekday {
        self.week_start.unwrap_or(Weekday::Mon)
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize_rrule(self))
    }
}

impl FromStr for RecurrenceRule {
    type Err = HearthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rrule(s).ok_or_else(|| {
            HearthError::InvalidRule(format!("'{}' has no supported FREQ", s.trim()))
        })
    }
}

// ── parse ───────────────────────────────────────────────────────────────────

/// Parse an `RRULE` value, reading floating `UNTIL` values as UTC.
///
/// # Examples
///
/// ```
/// use hearth_engine::rrule::{parse_rrule, ByDay, Frequency};
/// use chrono::Weekday;
///
/// let rule = parse_rrule("RRULE:FREQ=MONTHLY;BYDAY=-1FR").unwrap();
/// assert_eq!(rule.frequency, Frequency::Monthly);
/// assert_eq!(rule.by_day, vec![ByDay::nth(-1, Weekday::Fri)]);
///
/// assert!(parse_rrule("FREQ=HOURLY").is_none());
/// ```
pub fn parse_rrule(text: &str) -> Option<RecurrenceRule> {
    parse_rrule_in_zone(text, &Tz::UTC)
}

/// Parse an `RRULE` value, reading floating and date-only `UNTIL` values in `tz`.
///
/// Returns `None` when `FREQ` is missing or not one of DAILY, WEEKLY, MONTHLY,
/// YEARLY.
pub fn parse_rrule_in_zone(text: &str, tz: &Tz) -> Option<RecurrenceRule> {
    let body = strip_rrule_prefix(text.trim());

    let mut frequency = None;
    let mut rule = RecurrenceRule::new(Frequency::Daily);

    for token in body.split(';') {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_uppercase().as_str() {
            "FREQ" => frequency = Frequency::from_token(value),
            "INTERVAL" => rule.interval = parse_interval(value),
            "COUNT" => rule.count = value.parse::<u32>().ok().filter(|n| *n > 0),
            "UNTIL" => rule.until = parse_until(value, tz),
            "BYDAY" => rule.by_day = value.split(',').filter_map(ByDay::parse).collect(),
            "BYMONTHDAY" => {
                rule.by_month_day = parse_int_list(value)
                    .filter(|d| (1..=31).contains(&d.abs()))
                    .collect()
            }
            "BYMONTH" => {
                rule.by_month = parse_int_list(value)
                    .filter(|m| (1..=12).contains(m))
                    .map(|m| m as u32)
                    .collect()
            }
            "WKST" => rule.week_start = parse_weekday_code(value),
            other => tracing::trace!(key = other, "ignoring unknown RRULE part"),
        }
    }

    let Some(frequency) = frequency else {
        tracing::debug!(rule = text, "RRULE has no supported FREQ");
        return None;
    };
    rule.frequency = frequency;
    Some(rule)
}

fn strip_rrule_prefix(s: &str) -> &str {
    match s.get(..6) {
        Some(head) if head.eq_ignore_ascii_case("RRULE:") => &s[6..],
        _ => s,
    }
}

fn parse_interval(value: &str) -> u32 {
    match value.parse::<i64>().ok().and_then(clamp_interval) {
        Some(n) => n,
        None => {
            tracing::warn!(interval = value, "non-positive or invalid INTERVAL, using 1");
            1
        }
    }
}

fn parse_int_list(value: &str) -> impl Iterator<Item = i32> + '_ {
    value
        .split(',')
        .filter_map(|entry| entry.trim().parse::<i32>().ok())
}

/// `UNTIL` as UTC (`...Z`), floating local (`YYYYMMDDTHHMMSS`) or a whole local day (`YYYYMMDD`).
fn parse_until(value: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let value = value.to_ascii_uppercase();
    let value = value.as_str();
    if let Some(utc) = value.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| dt.and_utc());
    }
    if value.contains('T') {
        return NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
            .ok()
            .map(|dt| zone::local_to_utc(dt, tz));
    }
    let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
    Some(zone::local_to_utc(date.and_hms_opt(23, 59, 59)?, tz))
}

// ── serialize ───────────────────────────────────────────────────────────────

/// Render a rule as an `RRULE` value (without the `RRULE:` prefix).
///
/// Order is fixed: `FREQ`, `INTERVAL` (only when not 1), `COUNT` or `UNTIL`,
/// `BYDAY`, `BYMONTHDAY`, `BYMONTH`, `WKST`. Empty parts are omitted.
/// Exdates and rdates are not part of an `RRULE` value.
///
/// # Examples
///
/// ```
/// use hearth_engine::rrule::{serialize_rrule, ByDay, Frequency, RecurrenceRule};
/// use chrono::Weekday;
///
/// let mut rule = RecurrenceRule::new(Frequency::Weekly);
/// rule.interval = 2;
/// rule.by_day = vec![ByDay::every(Weekday::Mon), ByDay::every(Weekday::Thu)];
/// assert_eq!(serialize_rrule(&rule), "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,TH");
/// ```
pub fn serialize_rrule(rule: &RecurrenceRule) -> String {
    let mut parts = vec![format!("FREQ={}", rule.frequency.as_str())];

    let interval = rule.effective_interval();
    if interval != 1 {
        parts.push(format!("INTERVAL={interval}"));
    }

    if let Some(count) = rule.count {
        parts.push(format!("COUNT={count}"));
    } else if let Some(until) = rule.until {
        parts.push(format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")));
    }

    if !rule.by_day.is_empty() {
        parts.push(format!("BYDAY={}", join(&rule.by_day)));
    }
    if !rule.by_month_day.is_empty() {
        parts.push(format!("BYMONTHDAY={}", join(&rule.by_month_day)));
    }
    if !rule.by_month.is_empty() {
        parts.push(format!("BYMONTH={}", join(&rule.by_month)));
    }
    if let Some(wkst) = rule.week_start {
        parts.push(format!("WKST={}", weekday_code(wkst)));
    }

    parts.join(";")
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// ── weekday codes ───────────────────────────────────────────────────────────

/// Two-letter RFC 5545 weekday code.
pub fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Parse a two-letter RFC 5545 weekday code (case-insensitive).
pub fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code.trim().to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // ── parse tests ─────────────────────────────────────────────────────

    #[test]
    fn test_parse_simple_daily() {
        let rule = parse_rrule("FREQ=DAILY").unwrap();
        assert_eq!(rule, RecurrenceRule::new(Frequency::Daily));
    }

    #[test]
    fn test_parse_accepts_prefix_any_case() {
        assert!(parse_rrule("RRULE:FREQ=WEEKLY").is_some());
        assert!(parse_rrule("rrule:freq=weekly").is_some());
    }

    #[test]
    fn test_parse_missing_freq_is_none() {
        assert!(parse_rrule("INTERVAL=2;COUNT=3").is_none());
        assert!(parse_rrule("").is_none());
    }

    #[test]
    fn test_parse_unsupported_freq_is_none() {
        assert!(parse_rrule("FREQ=HOURLY;COUNT=3").is_none());
        assert!(parse_rrule("FREQ=SECONDLY").is_none());
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let rule = parse_rrule("FREQ=DAILY;X-NAME=foo;BYSETPOS=1;COUNT=4").unwrap();
        assert_eq!(rule.count, Some(4));
    }

    #[test]
    fn test_parse_byday_positions() {
        let rule = parse_rrule("FREQ=WEEKLY;BYDAY=1MO").unwrap();
        assert_eq!(rule.by_day, vec![ByDay::nth(1, Weekday::Mon)]);

        let rule = parse_rrule("FREQ=MONTHLY;BYDAY=-1FR").unwrap();
        assert_eq!(rule.by_day[0].position, Some(-1));
        assert_eq!(rule.by_day[0].weekday, Weekday::Fri);
    }

    #[test]
    fn test_parse_byday_list_keeps_order() {
        let rule = parse_rrule("FREQ=WEEKLY;BYDAY=FR,MO,+2WE").unwrap();
        assert_eq!(
            rule.by_day,
            vec![
                ByDay::every(Weekday::Fri),
                ByDay::every(Weekday::Mon),
                ByDay::nth(2, Weekday::Wed),
            ]
        );
    }

    #[test]
    fn test_parse_byday_skips_garbage_entries() {
        let rule = parse_rrule("FREQ=WEEKLY;BYDAY=MO,XX,0TU,,SU").unwrap();
        assert_eq!(
            rule.by_day,
            vec![ByDay::every(Weekday::Mon), ByDay::every(Weekday::Sun)]
        );
    }

    #[test]
    fn test_parse_until_utc() {
        let rule = parse_rrule("FREQ=DAILY;UNTIL=20240131T235959Z").unwrap();
        assert_eq!(
            rule.until,
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap())
        );
    }

    #[test]
    fn test_parse_until_floating_uses_zone() {
        let rule =
            parse_rrule_in_zone("FREQ=DAILY;UNTIL=20240131T090000", &chrono_tz::Europe::Berlin)
                .unwrap();
        assert_eq!(
            rule.until,
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_until_date_covers_whole_day() {
        let rule = parse_rrule("FREQ=DAILY;UNTIL=20240131").unwrap();
        assert_eq!(
            rule.until,
            Some(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap())
        );
    }

    #[test]
    fn test_parse_month_lists() {
        let rule = parse_rrule("FREQ=YEARLY;BYMONTH=1,7,13;BYMONTHDAY=1,-1,32").unwrap();
        assert_eq!(rule.by_month, vec![1, 7]);
        assert_eq!(rule.by_month_day, vec![1, -1]);
    }

    #[test]
    fn test_parse_interval_clamps_non_positive() {
        assert_eq!(parse_rrule("FREQ=DAILY;INTERVAL=0").unwrap().interval, 1);
        assert_eq!(parse_rrule("FREQ=DAILY;INTERVAL=-3").unwrap().interval, 1);
        assert_eq!(parse_rrule("FREQ=DAILY;INTERVAL=abc").unwrap().interval, 1);
        assert_eq!(parse_rrule("FREQ=DAILY;INTERVAL=3").unwrap().interval, 3);
    }

    #[test]
    fn test_parse_keeps_both_count_and_until() {
        let rule = parse_rrule("FREQ=DAILY;COUNT=5;UNTIL=20240110T000000Z").unwrap();
        assert_eq!(rule.count, Some(5));
        assert!(rule.until.is_some());
    }

    #[test]
    fn test_parse_wkst() {
        let rule = parse_rrule("FREQ=WEEKLY;WKST=SU").unwrap();
        assert_eq!(rule.week_start, Some(Weekday::Sun));
        assert_eq!(rule.effective_week_start(), Weekday::Sun);
        assert_eq!(
            parse_rrule("FREQ=WEEKLY").unwrap().effective_week_start(),
            Weekday::Mon
        );
    }

    #[test]
    fn test_from_str_reports_invalid_rule() {
        let err = "FREQ=MINUTELY".parse::<RecurrenceRule>().unwrap_err();
        assert!(err.to_string().contains("Invalid RRULE"), "got: {err}");
    }

    // ── serialize tests ─────────────────────────────────────────────────

    #[test]
    fn test_serialize_canonical_order() {
        let rule = parse_rrule("WKST=SU;BYMONTH=3;BYDAY=2SU;FREQ=YEARLY;INTERVAL=1").unwrap();
        assert_eq!(serialize_rrule(&rule), "FREQ=YEARLY;BYDAY=2SU;BYMONTH=3;WKST=SU");
    }

    #[test]
    fn test_serialize_prefers_count_over_until() {
        let mut rule = RecurrenceRule::new(Frequency::Daily);
        rule.count = Some(3);
        rule.until = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(serialize_rrule(&rule), "FREQ=DAILY;COUNT=3");
    }

    #[test]
    fn test_serialize_until_in_utc() {
        let mut rule = RecurrenceRule::new(Frequency::Monthly);
        rule.until = Some(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap());
        rule.by_month_day = vec![15, -1];
        assert_eq!(
            serialize_rrule(&rule),
            "FREQ=MONTHLY;UNTIL=20241231T235959Z;BYMONTHDAY=15,-1"
        );
    }

    #[test]
    fn test_serialize_zero_interval_is_omitted() {
        let mut rule = RecurrenceRule::new(Frequency::Weekly);
        rule.interval = 0;
        assert_eq!(serialize_rrule(&rule), "FREQ=WEEKLY");
    }

    #[test]
    fn test_display_matches_serialize() {
        let rule = parse_rrule("FREQ=WEEKLY;BYDAY=MO,WE,FR").unwrap();
        assert_eq!(rule.to_string(), "FREQ=WEEKLY;BYDAY=MO,WE,FR");
    }

    #[test]
    fn test_round_trip_positional_byday() {
        let text = "FREQ=MONTHLY;INTERVAL=2;COUNT=10;BYDAY=1MO,-1FR;WKST=SU";
        let rule = parse_rrule(text).unwrap();
        assert_eq!(serialize_rrule(&rule), text);
        assert_eq!(parse_rrule(&serialize_rrule(&rule)).unwrap(), rule);
    }
}
