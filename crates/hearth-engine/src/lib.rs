//! # hearth-engine
//!
//! Deterministic recurrence and iCalendar computation for a family calendar.
//!
//! Events are stored once as masters with an optional RFC 5545 rule; this
//! crate turns them into concrete occurrences for a visible window, lays
//! those out on a grid, and moves them in and out of `.ics` documents. Every
//! function is pure: the caller passes in "now" and the timezone.
//!
//! ## Modules
//!
//! - [`rrule`]: RRULE string ↔ structured [`RecurrenceRule`]
//! - [`expander`]: master event + window → list of occurrences
//! - [`ical`]: `.ics` text → event records → events, and events → `.ics`
//! - [`layout`]: overlap groups, columns and pixel boxes for day/week grids
//! - [`view`]: visible window and navigation for day/week/month/year/agenda
//! - [`decode`]: untyped JSON payloads → typed [`CalendarEvent`]/[`Calendar`]
//! - [`zone`]: IANA zone resolution and local ↔ UTC conversion
//! - [`model`]: stored calendar and event records
//! - [`error`]: Error types

mod dates;
pub mod decode;
pub mod error;
pub mod expander;
pub mod ical;
pub mod layout;
pub mod model;
pub mod rrule;
pub mod view;
pub mod zone;

pub use decode::{decode_calendar, decode_event};
pub use error::{DecodeError, HearthError};
pub use expander::{
    expand, expand_with_options, occurrences, ExpandOptions, ExpandedOccurrence, MasterEvent,
    DEFAULT_MAX_INSTANCES,
};
pub use ical::{generate_ical, parse_ical, ICalEventRecord, ICalTime};
pub use layout::{assign_columns, group_overlapping, overlaps, position, ColumnSlot, EventBox, Span, TimeSpan};
pub use model::{
    Attendee, AttendeeRole, BusyStatus, Calendar, CalendarEvent, EventStatus, Reminder,
    ResponseStatus,
};
pub use rrule::{parse_rrule, parse_rrule_in_zone, serialize_rrule, ByDay, Frequency, RecurrenceRule};
pub use view::{navigate, view_range, Direction, ViewKind, ViewWindow, WeekStartDay};
pub use zone::{local_to_utc, resolve_timezone, utc_to_local};
