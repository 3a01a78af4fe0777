//! Typed decode boundary for untyped JSON payloads.
//!
//! Stored events and calendars arrive as loose JSON (snake_case or camelCase
//! keys, optional fields omitted or `null`). This is the one place that
//! checks them and applies defaults; everything past it works on
//! [`CalendarEvent`] and [`Calendar`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::model::{Attendee, BusyStatus, Calendar, CalendarEvent, EventStatus, Reminder};
use crate::rrule::{parse_rrule_in_zone, RecurrenceRule};
use crate::zone;

type Object = Map<String, Value>;

/// A reminder written as bare minutes or as `{ "minutes": n }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReminderInput {
    Minutes(u32),
    Object(Reminder),
}

/// A recurrence written as an RRULE string or as a structured rule.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecurrenceInput {
    Text(String),
    Rule(RecurrenceRule),
}

fn as_object(value: &Value) -> Result<&Object, DecodeError> {
    value.as_object().ok_or(DecodeError::NotAnObject)
}

/// Look up the first present, non-null key among `names`; the first name is
/// the one reported in errors.
fn optional<T: DeserializeOwned>(
    obj: &Object,
    names: &[&'static str],
) -> Result<Option<T>, DecodeError> {
    let field = names[0];
    let found = names
        .iter()
        .filter_map(|n| obj.get(*n))
        .find(|v| !v.is_null());
    match found {
        None => Ok(None),
        Some(v) => T::deserialize(v)
            .map(Some)
            .map_err(|e| DecodeError::InvalidField {
                field,
                reason: e.to_string(),
            }),
    }
}

fn required<T: DeserializeOwned>(obj: &Object, names: &[&'static str]) -> Result<T, DecodeError> {
    optional(obj, names)?.ok_or(DecodeError::MissingField(names[0]))
}

/// Decode a stored event.
///
/// Requires `id`, `title`, `start` and `end` (RFC 3339). Defaults: status
/// confirmed, busy status busy, `all_day` false, no reminders or attendees.
/// `recurrence` may be an RRULE string (floating `UNTIL` read in the event's
/// `timezone`) or a structured rule object.
///
/// # Errors
///
/// - [`DecodeError::NotAnObject`] if `value` is not a JSON object.
/// - [`DecodeError::MissingField`] if a required field is absent or null.
/// - [`DecodeError::InvalidField`] if a field has the wrong shape, the
///   recurrence is not a rule, the timezone is unknown, or the event ends
///   before it starts.
///
/// # Examples
///
/// ```
/// use hearth_engine::decode::decode_event;
/// use serde_json::json;
///
/// let event = decode_event(&json!({
///     "id": "e1",
///     "calendarId": "family",
///     "title": "Swim practice",
///     "start": "2024-01-08T17:00:00Z",
///     "end": "2024-01-08T18:00:00Z",
///     "recurrence": "FREQ=WEEKLY;BYDAY=MO",
/// }))
/// .unwrap();
/// assert_eq!(event.calendar_id, "family");
/// assert!(event.recurrence.is_some());
/// ```
pub fn decode_event(value: &Value) -> Result<CalendarEvent, DecodeError> {
    let obj = as_object(value)?;

    let id: String = required(obj, &["id"])?;
    let title: String = required(obj, &["title"])?;
    let start: DateTime<Utc> = required(obj, &["start"])?;
    let end: DateTime<Utc> = required(obj, &["end"])?;
    if end < start {
        return Err(DecodeError::InvalidField {
            field: "end",
            reason: "ends before it starts".into(),
        });
    }

    let timezone: Option<String> = optional(obj, &["timezone", "timeZone"])?;
    let tz = match timezone.as_deref() {
        Some(label) => zone::resolve_timezone(label).map_err(|e| DecodeError::InvalidField {
            field: "timezone",
            reason: e.to_string(),
        })?,
        None => chrono_tz::Tz::UTC,
    };

    let recurrence = match optional::<RecurrenceInput>(obj, &["recurrence", "rrule"])? {
        None => None,
        Some(RecurrenceInput::Rule(rule)) => Some(rule),
        Some(RecurrenceInput::Text(text)) if text.trim().is_empty() => None,
        Some(RecurrenceInput::Text(text)) => {
            Some(parse_rrule_in_zone(&text, &tz).ok_or_else(|| DecodeError::InvalidField {
                field: "recurrence",
                reason: format!("'{text}' is not a recurrence rule"),
            })?)
        }
    };

    let reminders = optional::<Vec<ReminderInput>>(obj, &["reminders"])?
        .unwrap_or_default()
        .into_iter()
        .map(|r| match r {
            ReminderInput::Minutes(minutes) => Reminder { minutes },
            ReminderInput::Object(reminder) => reminder,
        })
        .collect();

    let mut event = CalendarEvent::new(
        id,
        optional::<String>(obj, &["calendar_id", "calendarId"])?.unwrap_or_default(),
        title,
        start,
        end,
    );
    event.description = optional(obj, &["description"])?;
    event.location = optional(obj, &["location"])?;
    event.all_day = optional(obj, &["all_day", "allDay"])?.unwrap_or(false);
    event.timezone = timezone;
    event.status = optional::<EventStatus>(obj, &["status"])?.unwrap_or_default();
    event.busy_status =
        optional::<BusyStatus>(obj, &["busy_status", "busyStatus"])?.unwrap_or_default();
    event.category = optional(obj, &["category"])?;
    event.recurrence = recurrence;
    event.reminders = reminders;
    event.attendees = optional::<Vec<Attendee>>(obj, &["attendees"])?.unwrap_or_default();
    event.created_at = optional(obj, &["created_at", "createdAt"])?;
    event.updated_at = optional(obj, &["updated_at", "updatedAt"])?;
    Ok(event)
}

/// Decode a calendar. Requires `id` and `name`; a `timezone`, when given,
/// must be a known IANA label.
///
/// # Errors
///
/// Same taxonomy as [`decode_event`].
pub fn decode_calendar(value: &Value) -> Result<Calendar, DecodeError> {
    let obj = as_object(value)?;

    let mut calendar = Calendar::new(
        required::<String>(obj, &["id"])?,
        required::<String>(obj, &["name"])?,
    );
    calendar.description = optional(obj, &["description"])?;
    calendar.color = optional(obj, &["color"])?;
    calendar.timezone = optional(obj, &["timezone", "timeZone"])?;
    if let Some(label) = calendar.timezone.as_deref() {
        zone::resolve_timezone(label).map_err(|e| DecodeError::InvalidField {
            field: "timezone",
            reason: e.to_string(),
        })?;
    }
    Ok(calendar)
}
