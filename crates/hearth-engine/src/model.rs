//! Calendar and event records as the rest of the application stores them.
//!
//! These are the typed shapes the decode boundary produces, the `.ics`
//! importer converts into, and the generator writes out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::expander::MasterEvent;
use crate::rrule::RecurrenceRule;

/// A calendar that owns events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// IANA timezone label, e.g. `"Europe/Oslo"`.
    pub timezone: Option<String>,
    pub color: Option<String>,
}

impl Calendar {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Calendar {
            id: id.into(),
            name: name.into(),
            description: None,
            timezone: None,
            color: None,
        }
    }
}

/// Whether an event is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    /// RFC 5545 `STATUS` token.
    pub fn as_ical(self) -> &'static str {
        match self {
            EventStatus::Confirmed => "CONFIRMED",
            EventStatus::Tentative => "TENTATIVE",
            EventStatus::Cancelled => "CANCELLED",
        }
    }

    /// Map a `STATUS` token back; anything unknown is confirmed.
    pub fn from_ical(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "TENTATIVE" => EventStatus::Tentative,
            "CANCELLED" | "CANCELED" => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        }
    }
}

/// How the event shows up for availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusyStatus {
    #[default]
    Busy,
    Free,
    Tentative,
    OutOfOffice,
}

impl BusyStatus {
    /// RFC 5545 `TRANSP` token: only free time is transparent.
    pub fn as_transparency(self) -> &'static str {
        match self {
            BusyStatus::Free => "TRANSPARENT",
            _ => "OPAQUE",
        }
    }

    pub fn from_transparency(token: &str) -> Self {
        if token.trim().eq_ignore_ascii_case("TRANSPARENT") {
            BusyStatus::Free
        } else {
            BusyStatus::Busy
        }
    }
}

/// A reminder `minutes` before the event starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendeeRole {
    #[default]
    Required,
    Optional,
    Informational,
    Chair,
}

impl AttendeeRole {
    pub fn as_ical(self) -> &'static str {
        match self {
            AttendeeRole::Required => "REQ-PARTICIPANT",
            AttendeeRole::Optional => "OPT-PARTICIPANT",
            AttendeeRole::Informational => "NON-PARTICIPANT",
            AttendeeRole::Chair => "CHAIR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseStatus {
    #[default]
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
}

impl ResponseStatus {
    pub fn as_ical(self) -> &'static str {
        match self {
            ResponseStatus::NeedsAction => "NEEDS-ACTION",
            ResponseStatus::Accepted => "ACCEPTED",
            ResponseStatus::Declined => "DECLINED",
            ResponseStatus::Tentative => "TENTATIVE",
        }
    }
}

/// A participant. Family members have a `user_id` and often no email.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Attendee {
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: AttendeeRole,
    pub status: ResponseStatus,
}

/// A stored event. Recurring events are stored once, as the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub calendar_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub timezone: Option<String>,
    pub status: EventStatus,
    pub busy_status: BusyStatus,
    pub category: Option<String>,
    pub recurrence: Option<RecurrenceRule>,
    pub reminders: Vec<Reminder>,
    pub attendees: Vec<Attendee>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CalendarEvent {
    /// A confirmed, busy, single-instance event with everything optional empty.
    pub fn new(
        id: impl Into<String>,
        calendar_id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        CalendarEvent {
            id: id.into(),
            calendar_id: calendar_id.into(),
            title: title.into(),
            description: None,
            location: None,
            start,
            end,
            all_day: false,
            timezone: None,
            status: EventStatus::default(),
            busy_status: BusyStatus::default(),
            category: None,
            recurrence: None,
            reminders: Vec::new(),
            attendees: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// The expansion input for this event.
    pub fn to_master(&self) -> MasterEvent {
        MasterEvent {
            id: self.id.clone(),
            start: self.start,
            end: self.end,
            all_day: self.all_day,
            recurrence: self.recurrence.clone(),
            timezone: self.timezone.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_round_trip() {
        for status in [
            EventStatus::Confirmed,
            EventStatus::Tentative,
            EventStatus::Cancelled,
        ] {
            assert_eq!(EventStatus::from_ical(status.as_ical()), status);
        }
        assert_eq!(EventStatus::from_ical("x-unknown"), EventStatus::Confirmed);
    }

    #[test]
    fn test_only_free_is_transparent() {
        assert_eq!(BusyStatus::Free.as_transparency(), "TRANSPARENT");
        assert_eq!(BusyStatus::Busy.as_transparency(), "OPAQUE");
        assert_eq!(BusyStatus::Tentative.as_transparency(), "OPAQUE");
        assert_eq!(BusyStatus::OutOfOffice.as_transparency(), "OPAQUE");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&BusyStatus::OutOfOffice).unwrap();
        assert_eq!(json, "\"out-of-office\"");
        let status: ResponseStatus = serde_json::from_str("\"needs-action\"").unwrap();
        assert_eq!(status, ResponseStatus::NeedsAction);
    }
}
