use super::lexer::{self, ContentLine};
use super::{ICalEventRecord, ICalTime};

/// Fields collected for one VEVENT until its `END:VEVENT`.
#[derive(Debug, Default)]
struct EventDraft {
    uid: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    dtstart: Option<ICalTime>,
    dtend: Option<ICalTime>,
    rrule: Option<String>,
    status: Option<String>,
    categories: Vec<String>,
    exdates: Vec<ICalTime>,
    transparency: Option<String>,
    reminders: Vec<u32>,
    /// First property whose value could not be read.
    invalid: Option<&'static str>,
}

impl EventDraft {
    fn apply(&mut self, line: &ContentLine) {
        match line.name.as_str() {
            "UID" => self.uid = non_empty(line.value.trim()),
            "SUMMARY" => self.summary = Some(lexer::unescape_text(&line.value)),
            "DESCRIPTION" => self.description = Some(lexer::unescape_text(&line.value)),
            "LOCATION" => self.location = Some(lexer::unescape_text(&line.value)),
            "DTSTART" => self.dtstart = self.time_value(line, "DTSTART"),
            "DTEND" => self.dtend = self.time_value(line, "DTEND"),
            "RRULE" => self.rrule = non_empty(line.value.trim()),
            "STATUS" => self.status = non_empty(line.value.trim()),
            "TRANSP" => self.transparency = non_empty(line.value.trim()),
            "CATEGORIES" => self.categories.extend(lexer::split_text_list(&line.value)),
            "EXDATE" => {
                let date_only = line.is_date_value();
                for part in line.value.split(',') {
                    match ICalTime::parse(part, date_only, line.param("TZID")) {
                        Some(t) => self.exdates.push(t),
                        None => tracing::trace!(value = part, "skipping unreadable EXDATE"),
                    }
                }
            }
            _ => {}
        }
    }

    fn apply_alarm(&mut self, line: &ContentLine) {
        if line.name != "TRIGGER" {
            return;
        }
        match trigger_minutes(&line.value) {
            Some(minutes) => self.reminders.push(minutes),
            None => tracing::trace!(value = %line.value, "ignoring TRIGGER"),
        }
    }

    fn time_value(&mut self, line: &ContentLine, field: &'static str) -> Option<ICalTime> {
        let parsed = ICalTime::parse(&line.value, line.is_date_value(), line.param("TZID"));
        if parsed.is_none() {
            self.invalid.get_or_insert(field);
        }
        parsed
    }

    fn finish(self) -> Result<ICalEventRecord, &'static str> {
        if let Some(field) = self.invalid {
            return Err(field);
        }
        Ok(ICalEventRecord {
            uid: self.uid.ok_or("UID")?,
            summary: self.summary.ok_or("SUMMARY")?,
            description: self.description,
            location: self.location,
            dtstart: self.dtstart.ok_or("DTSTART")?,
            dtend: self.dtend.ok_or("DTEND")?,
            rrule: self.rrule,
            status: self.status,
            categories: self.categories,
            exdates: self.exdates,
            transparency: self.transparency,
            reminders: self.reminders,
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Minutes before start for a relative `TRIGGER` such as `-PT15M`, `-P1D`
/// or `PT0S`. Absolute and after-start triggers give `None`.
fn trigger_minutes(value: &str) -> Option<u32> {
    let value = value.trim();
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let body = body.strip_prefix(['P', 'p'])?;

    let mut seconds: i64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    for c in body.chars() {
        match c.to_ascii_uppercase() {
            'T' => in_time = true,
            d if d.is_ascii_digit() => number.push(d),
            unit => {
                let n: i64 = number.parse().ok()?;
                number.clear();
                let scale = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                seconds = seconds.checked_add(n.checked_mul(scale)?)?;
            }
        }
    }
    if !number.is_empty() {
        return None;
    }

    if seconds == 0 {
        Some(0)
    } else if negative {
        u32::try_from(seconds / 60).ok()
    } else {
        None
    }
}

/// Parse `.ics` text into one record per readable VEVENT.
///
/// Components are tracked with a `BEGIN`/`END` stack, so only properties
/// directly inside a VEVENT fill its record (a VALARM's `DESCRIPTION` does
/// not overwrite the event's); a VALARM's `TRIGGER` becomes a reminder.
///
/// A VEVENT without `UID`, `SUMMARY`, `DTSTART` and `DTEND`, or with a date
/// that cannot be read, is skipped, and so is one whose `END:VEVENT` never
/// comes before the next `BEGIN:VEVENT`. The rest of the document is unaffected.
/// This never fails: garbage in gives an empty list.
///
/// # Examples
///
/// ```
/// use hearth_engine::ical::parse_ical;
///
/// let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:1\r\nSUMMARY:Dentist\r\n\
///            DTSTART:20240115T140000Z\r\nDTEND:20240115T150000Z\r\nEND:VEVENT\r\n\
///            END:VCALENDAR\r\n";
/// let records = parse_ical(ics);
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].summary, "Dentist");
/// ```
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse_ical(input: &str) -> Vec<ICalEventRecord> {
    let mut records = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut draft: Option<EventDraft> = None;
    let mut dropped = 0usize;

    for raw in lexer::split_lines(input) {
        let Some(line) = lexer::parse_content_line(&raw) else {
            tracing::trace!(line = %raw, "skipping line without ':'");
            continue;
        };

        match line.name.as_str() {
            "BEGIN" => {
                let component = line.value.trim().to_ascii_uppercase();
                if component == "VEVENT" {
                    // A VEVENT never nests: an open one was left unterminated.
                    if let Some(pos) = stack.iter().position(|c| c == "VEVENT") {
                        stack.truncate(pos);
                    }
                    if draft.replace(EventDraft::default()).is_some() {
                        dropped += 1;
                        tracing::debug!("dropping VEVENT without END:VEVENT");
                    }
                }
                stack.push(component);
            }
            "END" => {
                let component = line.value.trim().to_ascii_uppercase();
                let Some(pos) = stack.iter().rposition(|c| *c == component) else {
                    tracing::trace!(component = %component, "END without BEGIN");
                    continue;
                };
                stack.truncate(pos);
                if component == "VEVENT" && !stack.iter().any(|c| c == "VEVENT") {
                    if let Some(done) = draft.take() {
                        match done.finish() {
                            Ok(record) => records.push(record),
                            Err(field) => {
                                dropped += 1;
                                tracing::debug!(field, "dropping VEVENT with missing or invalid property");
                            }
                        }
                    }
                }
            }
            _ => {
                let Some(current) = draft.as_mut() else {
                    continue;
                };
                let depth = stack.len();
                match stack.last().map(String::as_str) {
                    Some("VEVENT") => current.apply(&line),
                    Some("VALARM") if depth >= 2 && stack[depth - 2] == "VEVENT" => {
                        current.apply_alarm(&line)
                    }
                    _ => {}
                }
            }
        }
    }

    if draft.is_some() {
        dropped += 1;
        tracing::debug!("dropping unterminated VEVENT");
    }
    tracing::debug!(parsed = records.len(), dropped, "parsed iCalendar document");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn wrap(body: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{body}END:VCALENDAR\r\n")
    }

    const DENTIST: &str = "BEGIN:VEVENT\r\n\
        UID:dentist-1\r\n\
        SUMMARY:Dentist\\, Dr. Lee\r\n\
        DTSTART:20240115T140000Z\r\n\
        DTEND:20240115T150000Z\r\n\
        END:VEVENT\r\n";

    // ── basic records ───────────────────────────────────────────────────

    #[test]
    fn test_parse_single_event() {
        let records = parse_ical(&wrap(DENTIST));
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.uid, "dentist-1");
        assert_eq!(r.summary, "Dentist, Dr. Lee");
        assert!(!r.dtstart.is_date());
        assert!(r.rrule.is_none());
    }

    #[test]
    fn test_parse_all_day_event() {
        let body = "BEGIN:VEVENT\r\nUID:d\r\nSUMMARY:Field trip\r\n\
            DTSTART;VALUE=DATE:20240115\r\nDTEND;VALUE=DATE:20240116\r\nEND:VEVENT\r\n";
        let records = parse_ical(&wrap(body));
        assert_eq!(
            records[0].dtstart,
            ICalTime::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
    }

    #[test]
    fn test_parse_lf_only_and_folded_summary() {
        let body = "BEGIN:VEVENT\nUID:f\nSUMMARY:Piano lesson with the\n  new coach\n\
            DTSTART:20240115T140000Z\nDTEND:20240115T150000Z\nEND:VEVENT\n";
        let records = parse_ical(&wrap(body));
        assert_eq!(records[0].summary, "Piano lesson with the new coach");
    }

    #[test]
    fn test_parse_optional_properties() {
        let body = "BEGIN:VEVENT\r\nUID:o\r\nSUMMARY:Soccer\r\n\
            DESCRIPTION:Bring water\\nand shin guards\r\nLOCATION:Field 3\r\n\
            DTSTART;TZID=Europe/Oslo:20240115T170000\r\nDTEND;TZID=Europe/Oslo:20240115T180000\r\n\
            RRULE:FREQ=WEEKLY;BYDAY=MO\r\nSTATUS:TENTATIVE\r\nTRANSP:TRANSPARENT\r\n\
            CATEGORIES:SPORTS,KIDS\r\nEXDATE:20240122T160000Z,20240129T160000Z\r\nEND:VEVENT\r\n";
        let r = &parse_ical(&wrap(body))[0];
        assert_eq!(r.description.as_deref(), Some("Bring water\nand shin guards"));
        assert_eq!(r.location.as_deref(), Some("Field 3"));
        assert_eq!(r.dtstart.tzid(), Some("Europe/Oslo"));
        assert_eq!(r.rrule.as_deref(), Some("FREQ=WEEKLY;BYDAY=MO"));
        assert_eq!(r.status.as_deref(), Some("TENTATIVE"));
        assert_eq!(r.transparency.as_deref(), Some("TRANSPARENT"));
        assert_eq!(r.categories, vec!["SPORTS", "KIDS"]);
        assert_eq!(r.exdates.len(), 2);
    }

    // ── nesting ─────────────────────────────────────────────────────────

    #[test]
    fn test_valarm_does_not_overwrite_event_fields() {
        let body = "BEGIN:VEVENT\r\nUID:a\r\nSUMMARY:Recital\r\nDESCRIPTION:Main hall\r\n\
            DTSTART:20240115T140000Z\r\nDTEND:20240115T150000Z\r\n\
            BEGIN:VALARM\r\nACTION:DISPLAY\r\nDESCRIPTION:Reminder\r\nTRIGGER:-PT15M\r\nEND:VALARM\r\n\
            BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:PT0S\r\nEND:VALARM\r\n\
            END:VEVENT\r\n";
        let r = &parse_ical(&wrap(body))[0];
        assert_eq!(r.description.as_deref(), Some("Main hall"));
        assert_eq!(r.reminders, vec![15, 0]);
    }

    #[test]
    fn test_vtimezone_properties_ignored() {
        let body = "BEGIN:VTIMEZONE\r\nTZID:Europe/Oslo\r\nBEGIN:STANDARD\r\n\
            DTSTART:19701025T030000\r\nEND:STANDARD\r\nEND:VTIMEZONE\r\n";
        let records = parse_ical(&wrap(&format!("{body}{DENTIST}")));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uid, "dentist-1");
    }

    // ── dropped events ──────────────────────────────────────────────────

    #[test_log::test]
    fn test_missing_dtend_dropped_siblings_kept() {
        let broken = "BEGIN:VEVENT\r\nUID:broken\r\nSUMMARY:No end\r\n\
            DTSTART:20240115T140000Z\r\nEND:VEVENT\r\n";
        let records = parse_ical(&wrap(&format!("{DENTIST}{broken}{DENTIST}")));
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.uid == "dentist-1"));
    }

    #[test_log::test]
    fn test_unterminated_event_does_not_swallow_next() {
        let open = "BEGIN:VEVENT\r\nUID:open\r\nSUMMARY:Never closed\r\n\
            DTSTART:20240115T090000Z\r\n";
        let records = parse_ical(&wrap(&format!("{open}{DENTIST}{DENTIST}")));
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.uid == "dentist-1"));
        assert_eq!(records[0].summary, "Dentist, Dr. Lee");
    }

    #[test]
    fn test_unreadable_date_dropped() {
        let broken = "BEGIN:VEVENT\r\nUID:bad\r\nSUMMARY:Bad\r\n\
            DTSTART:tomorrow\r\nDTEND:20240115T150000Z\r\nEND:VEVENT\r\n";
        assert!(parse_ical(&wrap(broken)).is_empty());
    }

    #[test]
    fn test_garbage_input() {
        assert!(parse_ical("").is_empty());
        assert!(parse_ical("not a calendar at all").is_empty());
        assert!(parse_ical("BEGIN:VEVENT\r\nUID:x\r\n").is_empty());
    }

    // ── triggers ────────────────────────────────────────────────────────

    #[test]
    fn test_trigger_minutes() {
        assert_eq!(trigger_minutes("-PT15M"), Some(15));
        assert_eq!(trigger_minutes("-PT1H30M"), Some(90));
        assert_eq!(trigger_minutes("-P1D"), Some(1440));
        assert_eq!(trigger_minutes("-P1DT2H"), Some(1560));
        assert_eq!(trigger_minutes("PT0S"), Some(0));
        assert_eq!(trigger_minutes("PT15M"), None);
        assert_eq!(trigger_minutes("20240115T140000Z"), None);
    }
}
