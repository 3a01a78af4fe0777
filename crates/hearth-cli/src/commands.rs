use std::io::Read;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use hearth_engine::{
    decode_calendar, decode_event, expand_with_options, generate_ical, navigate, parse_ical,
    parse_rrule_in_zone, resolve_timezone, serialize_rrule, view_range, zone, CalendarEvent,
    Direction, ExpandOptions, ExpandedOccurrence, RecurrenceRule, ViewKind, ViewWindow,
    WeekStartDay,
};
use serde::{Deserialize, Serialize};

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn zone_arg(label: &str) -> Result<Tz> {
    resolve_timezone(label).context("bad --tz")
}

/// Import every convertible VEVENT, reporting how many were kept on stderr.
fn import_events(path: &str, tz: &Tz, calendar_id: &str) -> Result<Vec<CalendarEvent>> {
    let text = read_input(path)?;
    let records = parse_ical(&text);
    let events: Vec<CalendarEvent> = records
        .iter()
        .filter_map(|r| r.to_event(calendar_id, tz))
        .collect();
    eprintln!("imported {} of {} events", events.len(), records.len());
    Ok(events)
}

// ── rrule ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RuleReport<'a> {
    canonical: String,
    rule: &'a RecurrenceRule,
}

pub fn rrule(text: &str, tz: Option<&str>) -> Result<()> {
    let tz = match tz {
        Some(label) => zone_arg(label)?,
        None => Tz::UTC,
    };
    let Some(rule) = parse_rrule_in_zone(text, &tz) else {
        bail!("'{text}' is not a recurrence rule (FREQ must be DAILY, WEEKLY, MONTHLY or YEARLY)");
    };
    print_json(&RuleReport {
        canonical: serialize_rrule(&rule),
        rule: &rule,
    })
}

// ── import ──────────────────────────────────────────────────────────────────

pub fn import(path: &str, tz: &str, calendar_id: &str) -> Result<()> {
    let tz = zone_arg(tz)?;
    let events = import_events(path, &tz, calendar_id)?;
    print_json(&events)
}

// ── expand ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OccurrenceRow<'a> {
    title: &'a str,
    #[serde(flatten)]
    occurrence: ExpandedOccurrence,
}

pub fn expand(path: &str, from: NaiveDate, to: NaiveDate, tz: &str, max: usize) -> Result<()> {
    if to < from {
        bail!("--to {to} is before --from {from}");
    }
    let tz = zone_arg(tz)?;
    let events = import_events(path, &tz, "imported")?;

    let range_start = zone::local_midnight(from, &tz);
    let last = to.succ_opt().context("--to is out of range")?;
    let range_end = zone::local_midnight(last, &tz);
    let options = ExpandOptions {
        max_instances: max,
        zone: tz,
    };

    let mut rows: Vec<OccurrenceRow> = events
        .iter()
        .flat_map(|event| {
            expand_with_options(&event.to_master(), range_start, range_end, &options)
                .into_iter()
                .map(move |occurrence| OccurrenceRow {
                    title: &event.title,
                    occurrence,
                })
        })
        .collect();
    rows.sort_by(|a, b| {
        a.occurrence
            .start
            .cmp(&b.occurrence.start)
            .then_with(|| a.occurrence.id.cmp(&b.occurrence.id))
    });
    tracing::debug!(events = events.len(), occurrences = rows.len(), "expanded file");
    print_json(&rows)
}

// ── export ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ExportInput {
    calendar: serde_json::Value,
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

pub fn export(path: &str, now: DateTime<Utc>) -> Result<()> {
    let text = read_input(path)?;
    let input: ExportInput =
        serde_json::from_str(&text).context("expected {\"calendar\": {...}, \"events\": [...]}")?;

    let calendar = decode_calendar(&input.calendar).context("invalid calendar")?;
    let events = input
        .events
        .iter()
        .enumerate()
        .map(|(i, value)| decode_event(value).with_context(|| format!("invalid event #{i}")))
        .collect::<Result<Vec<_>>>()?;

    print!("{}", generate_ical(&calendar, &events, now));
    Ok(())
}

// ── range ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RangeReport {
    view: ViewKind,
    anchor: NaiveDate,
    #[serde(flatten)]
    window: ViewWindow,
}

pub fn range(
    view: ViewKind,
    anchor: NaiveDate,
    week_start: WeekStartDay,
    step: Option<Direction>,
) -> Result<()> {
    let anchor = match step {
        Some(direction) => navigate(anchor, view, direction),
        None => anchor,
    };
    print_json(&RangeReport {
        view,
        anchor,
        window: view_range(anchor, view, week_start),
    })
}
