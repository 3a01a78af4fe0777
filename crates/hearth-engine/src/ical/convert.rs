use chrono_tz::Tz;

use super::generate::UID_DOMAIN;
use super::ICalEventRecord;
use crate::model::{BusyStatus, CalendarEvent, EventStatus, Reminder};
use crate::rrule::parse_rrule_in_zone;
use crate::zone;

impl ICalEventRecord {
    /// Convert into a stored event on `calendar_id`.
    ///
    /// `zone` is the importing calendar's zone: date-only and floating values
    /// are read in it, and so is the recurrence unless `DTSTART` names its
    /// own TZID. An unreadable RRULE leaves the event non-recurring.
    ///
    /// Returns `None` when the end precedes the start.
    pub fn to_event(&self, calendar_id: &str, zone: &Tz) -> Option<CalendarEvent> {
        let event_zone = self
            .dtstart
            .tzid()
            .and_then(|label| zone::resolve_timezone(label).ok())
            .unwrap_or(*zone);

        let start = self.dtstart.to_utc(&event_zone);
        let end = self.dtend.to_utc(&event_zone);
        if end < start {
            tracing::debug!(uid = %self.uid, "dropping event that ends before it starts");
            return None;
        }

        let mut recurrence = self.rrule.as_deref().and_then(|text| {
            let rule = parse_rrule_in_zone(text, &event_zone);
            if rule.is_none() {
                tracing::debug!(uid = %self.uid, rrule = text, "unreadable RRULE, importing as single event");
            }
            rule
        });
        if let Some(rule) = recurrence.as_mut() {
            rule.exdates
                .extend(self.exdates.iter().map(|x| x.to_utc(&event_zone)));
        }

        let mut event = CalendarEvent::new(
            event_id(&self.uid),
            calendar_id,
            self.summary.clone(),
            start,
            end,
        );
        event.description = self.description.clone();
        event.location = self.location.clone();
        event.all_day = self.dtstart.is_date();
        event.timezone = Some(event_zone.name().to_string());
        event.status = self
            .status
            .as_deref()
            .map(EventStatus::from_ical)
            .unwrap_or_default();
        event.busy_status = self
            .transparency
            .as_deref()
            .map(BusyStatus::from_transparency)
            .unwrap_or_default();
        event.category = self.categories.first().map(|c| c.to_lowercase());
        event.recurrence = recurrence;
        event.reminders = self
            .reminders
            .iter()
            .map(|&minutes| Reminder { minutes })
            .collect();
        Some(event)
    }
}

/// The stored id for `uid`: our own exports carry `{id}@hearth.calendar`.
fn event_id(uid: &str) -> String {
    uid.strip_suffix(UID_DOMAIN)
        .and_then(|rest| rest.strip_suffix('@'))
        .filter(|id| !id.is_empty())
        .unwrap_or(uid)
        .to_string()
}
