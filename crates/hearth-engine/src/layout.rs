//! Overlap grouping and pixel geometry for day and week grids.
//!
//! Everything is generic over [`TimeSpan`], so the same code lays out
//! expanded occurrences, stored events or bare spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::expander::ExpandedOccurrence;
use crate::model::CalendarEvent;

/// Minimum rendered height of an event box, in pixels.
pub const MIN_EVENT_HEIGHT: f64 = 20.0;

/// Anything with a start and end instant.
pub trait TimeSpan {
    fn start(&self) -> DateTime<Utc>;
    fn end(&self) -> DateTime<Utc>;
}

/// A bare `[start, end)` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan for Span {
    fn start(&self) -> DateTime<Utc> {
        self.start
    }
    fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl TimeSpan for ExpandedOccurrence {
    fn start(&self) -> DateTime<Utc> {
        self.start
    }
    fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl TimeSpan for CalendarEvent {
    fn start(&self) -> DateTime<Utc> {
        self.start
    }
    fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Vertical placement of one event in a day column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventBox {
    pub top: f64,
    pub height: f64,
}

/// Side-by-side placement of one event within its overlap group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSlot {
    /// Zero-based column index.
    pub column: usize,
    /// Columns the whole group needs.
    pub columns: usize,
}

/// Half-open overlap: touching intervals do not overlap.
pub fn overlaps<A: TimeSpan + ?Sized, B: TimeSpan + ?Sized>(a: &A, b: &B) -> bool {
    a.start() < b.end() && a.end() > b.start()
}

/// Partition `events` into groups connected by overlap chains.
///
/// Events are stably sorted by start; an event joins the current group when
/// it starts before the latest end seen in that group. `A` overlapping `B`
/// and `B` overlapping `C` puts all three together even if `A` and `C` are
/// disjoint.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use hearth_engine::layout::{group_overlapping, Span};
///
/// let at = |h, m| Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap();
/// let groups = group_overlapping(&[
///     Span { start: at(10, 0), end: at(11, 0) },
///     Span { start: at(10, 30), end: at(11, 30) },
///     Span { start: at(14, 0), end: at(15, 0) },
/// ]);
/// assert_eq!(groups.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1]);
/// ```
pub fn group_overlapping<T: TimeSpan + Clone>(events: &[T]) -> Vec<Vec<T>> {
    let mut sorted: Vec<&T> = events.iter().collect();
    sorted.sort_by_key(|e| e.start());

    let mut groups: Vec<Vec<T>> = Vec::new();
    let mut group_end: Option<DateTime<Utc>> = None;

    for event in sorted {
        match (groups.last_mut(), group_end) {
            (Some(group), Some(end)) if event.start() < end => {
                group.push(event.clone());
                group_end = Some(end.max(event.end()));
            }
            _ => {
                groups.push(vec![event.clone()]);
                group_end = Some(event.end());
            }
        }
    }

    groups
}

/// Box for `event` in a column whose top edge is `day_start`.
///
/// `top` is minutes since `day_start` scaled by `pixels_per_hour`; `height`
/// is the duration scaled the same way, never less than
/// [`MIN_EVENT_HEIGHT`]. Events starting before `day_start` get a negative
/// `top`; clipping is the caller's call.
pub fn position<T: TimeSpan + ?Sized>(
    event: &T,
    day_start: DateTime<Utc>,
    pixels_per_hour: f64,
) -> EventBox {
    let offset_minutes = (event.start() - day_start).num_minutes() as f64;
    let duration_minutes = (event.end() - event.start()).num_minutes() as f64;
    EventBox {
        top: offset_minutes / 60.0 * pixels_per_hour,
        height: (duration_minutes / 60.0 * pixels_per_hour).max(MIN_EVENT_HEIGHT),
    }
}

/// First-fit column assignment for one overlap group.
///
/// Returns one slot per input event, in input order. Events are placed by
/// start time into the leftmost column whose last event has ended.
pub fn assign_columns<T: TimeSpan>(group: &[T]) -> Vec<ColumnSlot> {
    let mut order: Vec<usize> = (0..group.len()).collect();
    order.sort_by_key(|&i| group[i].start());

    let mut column_ends: Vec<DateTime<Utc>> = Vec::new();
    let mut columns = vec![0usize; group.len()];

    for i in order {
        let event = &group[i];
        let free = column_ends.iter().position(|end| *end <= event.start());
        let column = match free {
            Some(c) => {
                column_ends[c] = event.end();
                c
            }
            None => {
                column_ends.push(event.end());
                column_ends.len() - 1
            }
        };
        columns[i] = column;
    }

    let total = column_ends.len();
    columns
        .into_iter()
        .map(|column| ColumnSlot {
            column,
            columns: total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    fn span(sh: u32, sm: u32, eh: u32, em: u32) -> Span {
        Span {
            start: at(sh, sm),
            end: at(eh, em),
        }
    }

    // ── overlaps ────────────────────────────────────────────────────────

    #[test]
    fn test_overlaps_half_open() {
        assert!(overlaps(&span(10, 0, 11, 0), &span(10, 30, 11, 30)));
        assert!(!overlaps(&span(10, 0, 11, 0), &span(11, 0, 12, 0)));
        assert!(overlaps(&span(9, 0, 17, 0), &span(12, 0, 13, 0)));
    }

    // ── grouping ────────────────────────────────────────────────────────

    #[test]
    fn test_group_overlapping_basic() {
        let groups = group_overlapping(&[
            span(14, 0, 15, 0),
            span(10, 30, 11, 30),
            span(10, 0, 11, 0),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![span(10, 0, 11, 0), span(10, 30, 11, 30)]);
        assert_eq!(groups[1], vec![span(14, 0, 15, 0)]);
    }

    #[test]
    fn test_group_overlapping_chains() {
        // A overlaps B, B overlaps C, A and C are disjoint
        let groups = group_overlapping(&[
            span(9, 0, 10, 0),
            span(9, 30, 11, 0),
            span(10, 30, 12, 0),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn test_group_uses_running_max_end() {
        // A long event keeps the group open past a short one
        let groups = group_overlapping(&[
            span(8, 0, 12, 0),
            span(8, 30, 9, 0),
            span(11, 0, 11, 30),
        ]);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_group_touching_events_split() {
        let groups = group_overlapping(&[span(9, 0, 10, 0), span(10, 0, 11, 0)]);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_group_empty() {
        assert!(group_overlapping::<Span>(&[]).is_empty());
    }

    // ── geometry ────────────────────────────────────────────────────────

    #[test]
    fn test_position() {
        let b = position(&span(9, 30, 11, 0), at(0, 0), 60.0);
        assert_eq!(b.top, 570.0);
        assert_eq!(b.height, 90.0);
    }

    #[test]
    fn test_position_minimum_height() {
        let b = position(&span(9, 0, 9, 5), at(0, 0), 48.0);
        assert_eq!(b.top, 432.0);
        assert_eq!(b.height, MIN_EVENT_HEIGHT);
    }

    // ── columns ─────────────────────────────────────────────────────────

    #[test]
    fn test_assign_columns_first_fit() {
        let group = [
            span(9, 0, 10, 0),
            span(9, 30, 11, 0),
            span(10, 0, 10, 30),
        ];
        let slots = assign_columns(&group);
        assert_eq!(
            slots.iter().map(|s| s.column).collect::<Vec<_>>(),
            vec![0, 1, 0]
        );
        assert!(slots.iter().all(|s| s.columns == 2));
    }

    #[test]
    fn test_assign_columns_keeps_input_order() {
        let group = [span(10, 0, 11, 0), span(9, 0, 12, 0)];
        let slots = assign_columns(&group);
        assert_eq!(slots[0].column, 1);
        assert_eq!(slots[1].column, 0);
    }
}
