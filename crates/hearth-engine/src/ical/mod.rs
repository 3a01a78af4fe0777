//! iCalendar (RFC 5545) import and export.
//!
//! - [`parse_ical`] reads VEVENTs out of `.ics` text into [`ICalEventRecord`]s.
//! - [`ICalEventRecord::to_event`] turns a record into a stored event.
//! - [`generate_ical`] writes a calendar and its events back out.
//!
//! Only the subset a family calendar exchanges is covered: no VTIMEZONE
//! definitions (TZID labels are resolved as IANA names), no VTODO/VJOURNAL.

mod convert;
mod generate;
pub mod lexer;
mod parse;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::zone;

pub use generate::{generate_ical, PRODID};
pub use parse::parse_ical;

/// A `DTSTART`/`DTEND`/`EXDATE` value as written in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ICalTime {
    /// `VALUE=DATE`: a calendar day, no time and no zone.
    Date(NaiveDate),
    /// A wall-clock value: UTC (`Z` suffix), in `tzid`, or floating.
    DateTime {
        value: NaiveDateTime,
        utc: bool,
        tzid: Option<String>,
    },
}

impl ICalTime {
    /// Parse `YYYYMMDD` or `YYYYMMDDTHHMMSS[Z]`. Eight bare digits read as a
    /// date even without `VALUE=DATE`.
    pub fn parse(value: &str, date_only: bool, tzid: Option<&str>) -> Option<ICalTime> {
        let value = value.trim();
        if date_only || (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit())) {
            return NaiveDate::parse_from_str(value.get(..8)?, "%Y%m%d")
                .ok()
                .map(ICalTime::Date);
        }
        let (body, utc) = match value.strip_suffix(['Z', 'z']) {
            Some(body) => (body, true),
            None => (value, false),
        };
        let value = NaiveDateTime::parse_from_str(body, "%Y%m%dT%H%M%S").ok()?;
        Some(ICalTime::DateTime {
            value,
            utc,
            tzid: if utc { None } else { tzid.map(str::to_string) },
        })
    }

    pub fn is_date(&self) -> bool {
        matches!(self, ICalTime::Date(_))
    }

    /// The instant this value denotes. Dates are local midnight in `local`;
    /// floating times are read in `local`; TZID times in their own zone when
    /// the label is known, else in `local`.
    pub fn to_utc(&self, local: &Tz) -> DateTime<Utc> {
        match self {
            ICalTime::Date(date) => zone::local_midnight(*date, local),
            ICalTime::DateTime {
                value, utc: true, ..
            } => value.and_utc(),
            ICalTime::DateTime { value, tzid, .. } => {
                let tz = zone::resolve_or(tzid.as_deref(), *local);
                zone::local_to_utc(*value, &tz)
            }
        }
    }

    /// TZID label, when the value carries one.
    pub fn tzid(&self) -> Option<&str> {
        match self {
            ICalTime::DateTime { tzid, .. } => tzid.as_deref(),
            ICalTime::Date(_) => None,
        }
    }
}

/// One VEVENT as read from a document, before conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ICalEventRecord {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub dtstart: ICalTime,
    pub dtend: ICalTime,
    /// Raw RRULE value; parsed on conversion.
    pub rrule: Option<String>,
    /// Raw STATUS token.
    pub status: Option<String>,
    pub categories: Vec<String>,
    pub exdates: Vec<ICalTime>,
    /// Raw TRANSP token.
    pub transparency: Option<String>,
    /// Minutes before start, one per VALARM.
    pub reminders: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_time_forms() {
        assert_eq!(
            ICalTime::parse("20240115", false, None),
            Some(ICalTime::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()))
        );
        let utc = ICalTime::parse("20240115T140000Z", false, Some("Europe/Oslo")).unwrap();
        assert_eq!(utc.tzid(), None);
        assert_eq!(
            utc.to_utc(&Tz::UTC),
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
        );
        assert!(ICalTime::parse("2024-01-15", false, None).is_none());
        assert!(ICalTime::parse("20240115T25", false, None).is_none());
    }

    #[test]
    fn test_date_value_is_local_midnight() {
        let date = ICalTime::parse("20240115", true, None).unwrap();
        assert_eq!(
            date.to_utc(&chrono_tz::America::New_York),
            Utc.with_ymd_and_hms(2024, 1, 15, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_tzid_overrides_local_zone() {
        let t = ICalTime::parse("20240115T090000", false, Some("Europe/Berlin")).unwrap();
        assert_eq!(
            t.to_utc(&chrono_tz::America::New_York),
            Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
        );
        let floating = ICalTime::parse("20240115T090000", false, None).unwrap();
        assert_eq!(
            floating.to_utc(&chrono_tz::America::New_York),
            Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
        );
    }
}
