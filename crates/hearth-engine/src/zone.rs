//! Binding of the timezone-resolution collaborator onto `chrono-tz`.
//!
//! The engine stores instants in UTC and does all calendar arithmetic
//! (start of day, weekday tests, "same wall-clock time next week") on local
//! wall-clock values. These helpers are the only place where the two meet.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::HearthError;

/// Parse an IANA timezone label into `Tz`.
///
/// # Errors
///
/// Returns [`HearthError::InvalidTimezone`] if the label is not a known IANA name.
///
/// # Examples
///
/// ```
/// use hearth_engine::zone::resolve_timezone;
///
/// assert!(resolve_timezone("Europe/Berlin").is_ok());
/// assert!(resolve_timezone("Mars/Olympus_Mons").is_err());
/// ```
pub fn resolve_timezone(label: &str) -> Result<Tz, HearthError> {
    label
        .trim()
        .parse::<Tz>()
        .map_err(|_| HearthError::InvalidTimezone(format!("'{}'", label)))
}

/// Resolve an optional label, falling back to `fallback` when it is absent or unknown.
pub fn resolve_or(label: Option<&str>, fallback: Tz) -> Tz {
    match label {
        Some(l) => resolve_timezone(l).unwrap_or_else(|_| {
            tracing::debug!(label = l, "unknown timezone label, using fallback");
            fallback
        }),
        None => fallback,
    }
}

/// Map a local wall-clock value to the UTC instant it denotes in `tz`.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times that
/// do not exist (DST spring-forward gap) are read with the offset in force
/// before the gap, which lands them the length of the gap later on the clock.
pub fn local_to_utc(naive: NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let before_gap = naive - chrono::Duration::days(1);
            let offset = tz.offset_from_utc_datetime(&before_gap).fix();
            (naive - chrono::Duration::seconds(offset.local_minus_utc() as i64)).and_utc()
        }
    }
}

/// The local wall-clock value of a UTC instant in `tz`.
pub fn utc_to_local(dt: DateTime<Utc>, tz: &Tz) -> NaiveDateTime {
    dt.with_timezone(tz).naive_local()
}

/// The UTC instant of local midnight on `date` in `tz`.
pub fn local_midnight(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    local_to_utc(date.and_time(NaiveTime::MIN), tz)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_resolve_known_zone() {
        let tz = resolve_timezone("America/New_York").unwrap();
        assert_eq!(tz, chrono_tz::America::New_York);
    }

    #[test]
    fn test_resolve_unknown_zone_is_error() {
        let err = resolve_timezone("Nowhere/Special").unwrap_err().to_string();
        assert!(err.contains("Invalid timezone"), "got: {err}");
    }

    #[test]
    fn test_resolve_or_falls_back() {
        assert_eq!(resolve_or(Some("Bogus/Zone"), Tz::UTC), Tz::UTC);
        assert_eq!(resolve_or(None, Tz::Asia__Tokyo), Tz::Asia__Tokyo);
        assert_eq!(
            resolve_or(Some("Europe/Paris"), Tz::UTC),
            chrono_tz::Europe::Paris
        );
    }

    #[test]
    fn test_local_to_utc_plain() {
        let utc = local_to_utc(naive(2024, 1, 15, 9, 0), &chrono_tz::America::New_York);
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap());
    }

    #[test]
    fn test_local_to_utc_spring_forward_gap() {
        // 2024-03-10 02:30 does not exist in New York; read with EST (-05:00)
        let utc = local_to_utc(naive(2024, 3, 10, 2, 30), &chrono_tz::America::New_York);
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap());
        assert_eq!(
            utc_to_local(utc, &chrono_tz::America::New_York),
            naive(2024, 3, 10, 3, 30)
        );
    }

    #[test]
    fn test_local_to_utc_fall_back_takes_earliest() {
        // 2024-11-03 01:30 happens twice in New York; first one is EDT (-04:00)
        let utc = local_to_utc(naive(2024, 11, 3, 1, 30), &chrono_tz::America::New_York);
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap());
    }

    #[test]
    fn test_local_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(
            local_midnight(date, &chrono_tz::Europe::Berlin),
            Utc.with_ymd_and_hms(2024, 6, 30, 22, 0, 0).unwrap()
        );
    }
}
