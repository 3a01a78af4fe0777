use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use super::lexer::{escape_param_value, escape_text, fold_line};
use crate::model::{Attendee, Calendar, CalendarEvent};
use crate::rrule::serialize_rrule;
use crate::zone;

/// `PRODID` written on every generated document.
pub const PRODID: &str = "-//Hearth//Family Calendar//EN";

/// Domain appended to event ids to form `UID` values.
pub(super) const UID_DOMAIN: &str = "hearth.calendar";
const GUEST_DOMAIN: &str = "hearth.local";

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Render `calendar` and `events` as an `.ics` document.
///
/// `now` stamps `DTSTAMP` and stands in for missing created/updated times,
/// so the output depends only on the arguments. Lines are CRLF-terminated
/// and folded at 75 octets.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use hearth_engine::ical::generate_ical;
/// use hearth_engine::model::{Calendar, CalendarEvent};
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let event = CalendarEvent::new(
///     "e1",
///     "family",
///     "Dinner at Grandma's",
///     Utc.with_ymd_and_hms(2024, 1, 7, 17, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2024, 1, 7, 19, 0, 0).unwrap(),
/// );
/// let ics = generate_ical(&Calendar::new("family", "Family"), &[event], now);
/// assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
/// assert!(ics.contains("UID:e1@hearth.calendar\r\n"));
/// ```
pub fn generate_ical(calendar: &Calendar, events: &[CalendarEvent], now: DateTime<Utc>) -> String {
    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".into(),
        "VERSION:2.0".into(),
        format!("PRODID:{PRODID}"),
        "CALSCALE:GREGORIAN".into(),
        "METHOD:PUBLISH".into(),
        format!("X-WR-CALNAME:{}", escape_text(&calendar.name)),
    ];
    if let Some(description) = &calendar.description {
        lines.push(format!("X-WR-CALDESC:{}", escape_text(description)));
    }
    if let Some(tz) = &calendar.timezone {
        lines.push(format!("X-WR-TIMEZONE:{tz}"));
    }

    let calendar_zone = zone::resolve_or(calendar.timezone.as_deref(), Tz::UTC);
    for event in events {
        write_event(&mut lines, event, calendar_zone, now);
    }
    lines.push("END:VCALENDAR".into());

    tracing::debug!(calendar = %calendar.id, events = events.len(), "generated iCalendar document");
    lines.iter().map(|l| fold_line(l)).collect()
}

fn write_event(lines: &mut Vec<String>, event: &CalendarEvent, calendar_zone: Tz, now: DateTime<Utc>) {
    lines.push("BEGIN:VEVENT".into());
    lines.push(format!("UID:{}@{UID_DOMAIN}", event.id));
    lines.push(format!("DTSTAMP:{}", format_utc(now)));
    lines.push(format!("CREATED:{}", format_utc(event.created_at.unwrap_or(now))));
    lines.push(format!(
        "LAST-MODIFIED:{}",
        format_utc(event.updated_at.unwrap_or(now))
    ));

    let event_zone = zone::resolve_or(event.timezone.as_deref(), calendar_zone);
    if event.all_day {
        let (start, end) = all_day_dates(event, &event_zone);
        lines.push(format!("DTSTART;VALUE=DATE:{}", format_date(start)));
        lines.push(format!("DTEND;VALUE=DATE:{}", format_date(end)));
    } else {
        lines.push(format!("DTSTART:{}", format_utc(event.start)));
        lines.push(format!("DTEND:{}", format_utc(event.end)));
    }

    lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
    if let Some(description) = &event.description {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    if let Some(location) = &event.location {
        lines.push(format!("LOCATION:{}", escape_text(location)));
    }
    lines.push(format!("STATUS:{}", event.status.as_ical()));
    lines.push(format!("TRANSP:{}", event.busy_status.as_transparency()));
    if let Some(category) = &event.category {
        lines.push(format!("CATEGORIES:{}", escape_text(&category.to_uppercase())));
    }

    if let Some(rule) = &event.recurrence {
        lines.push(format!("RRULE:{}", serialize_rrule(rule)));
        // EXDATE takes the value type of DTSTART
        for exdate in &rule.exdates {
            if event.all_day {
                let date = zone::utc_to_local(*exdate, &event_zone).date();
                lines.push(format!("EXDATE;VALUE=DATE:{}", format_date(date)));
            } else {
                lines.push(format!("EXDATE:{}", format_utc(*exdate)));
            }
        }
    }

    for reminder in &event.reminders {
        lines.push("BEGIN:VALARM".into());
        lines.push("ACTION:DISPLAY".into());
        lines.push("DESCRIPTION:Reminder".into());
        if reminder.minutes == 0 {
            lines.push("TRIGGER:PT0S".into());
        } else {
            lines.push(format!("TRIGGER:-PT{}M", reminder.minutes));
        }
        lines.push("END:VALARM".into());
    }

    for (i, attendee) in event.attendees.iter().enumerate() {
        lines.push(attendee_line(attendee, i + 1));
    }

    lines.push("END:VEVENT".into());
}

/// Local start and exclusive end dates of an all-day event. An end that is
/// not local midnight covers the rest of its day.
fn all_day_dates(event: &CalendarEvent, tz: &Tz) -> (NaiveDate, NaiveDate) {
    let start = zone::utc_to_local(event.start, tz).date();
    let end_local = zone::utc_to_local(event.end, tz);
    let mut end = if end_local.time() == NaiveTime::MIN {
        end_local.date()
    } else {
        end_local.date().succ_opt().unwrap_or(end_local.date())
    };
    if end <= start {
        end = start.succ_opt().unwrap_or(start);
    }
    (start, end)
}

fn attendee_line(attendee: &Attendee, ordinal: usize) -> String {
    let guest = format!("guest-{ordinal}");
    let address = match &attendee.email {
        Some(email) => format!("mailto:{email}"),
        None => format!(
            "mailto:{}@{GUEST_DOMAIN}",
            attendee.user_id.as_deref().unwrap_or(&guest)
        ),
    };
    let cn = attendee
        .name
        .as_deref()
        .or(attendee.email.as_deref())
        .or(attendee.user_id.as_deref())
        .unwrap_or(&guest);
    format!(
        "ATTENDEE;CN={};ROLE={};PARTSTAT={}:{}",
        escape_param_value(cn),
        attendee.role.as_ical(),
        attendee.status.as_ical(),
        address
    )
}
