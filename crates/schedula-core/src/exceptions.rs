//! Applies per-occurrence exceptions (skip / override) to a generated
//! occurrence stream, per §4.2.
//!
//! An exception is keyed by the occurrence's originally scheduled start
//! instant, not by its position in the stream, so a series edit that shifts
//! `dtstart` or the weekday set never silently reattaches an exception to
//! the wrong occurrence. A `skip` drops the occurrence entirely; an
//! `override` replaces whichever fields it sets and leaves the rest as
//! scheduled, then re-checks the result against the window.

use std::collections::HashMap;

use crate::models::{ExceptionKind, Occurrence, RecurringException};
use crate::recurrence::Window;

/// Apply `exceptions` to `occurrences`, which must already be the output of
/// [`crate::recurrence::expand`] over `window`. Order is preserved for
/// surviving, non-overridden occurrences; an override that moves an
/// occurrence's start keeps its original position in the output rather than
/// being re-sorted, since sorting is the caller's concern if it matters.
pub fn apply(
    occurrences: Vec<Occurrence>,
    exceptions: &[RecurringException],
    window: &Window,
) -> Vec<Occurrence> {
    let by_start: HashMap<i64, &RecurringException> = exceptions
        .iter()
        .filter_map(|e| e.occurrence_start.timestamp_nanos_opt().map(|ns| (ns, e)))
        .collect();

    occurrences
        .into_iter()
        .filter_map(|occ| {
            let key = occ.start.timestamp_nanos_opt()?;
            match by_start.get(&key) {
                None => Some(occ),
                Some(exception) => apply_one(occ, exception, window),
            }
        })
        .collect()
}

fn apply_one(
    occ: Occurrence,
    exception: &RecurringException,
    window: &Window,
) -> Option<Occurrence> {
    match exception.kind {
        ExceptionKind::Skip => None,
        ExceptionKind::Override => {
            let start = exception.override_start.unwrap_or(occ.start);
            let end = exception.override_end.unwrap_or(occ.end);
            let title = exception.override_title.clone().unwrap_or(occ.title);
            let notes = exception.override_notes.clone().unwrap_or(occ.notes);

            if !(start < window.end && end > window.start) {
                return None;
            }

            Some(Occurrence {
                id: Occurrence::occurrence_id(occ.start),
                series_id: occ.series_id,
                user_id: occ.user_id,
                title,
                notes,
                start,
                end,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn occ(start: DateTime<Utc>) -> Occurrence {
        Occurrence {
            id: Occurrence::occurrence_id(start),
            series_id: Uuid::now_v7(),
            user_id: "u1".into(),
            title: "Standup".into(),
            notes: String::new(),
            start,
            end: start + Duration::minutes(30),
        }
    }

    fn window_around(start: DateTime<Utc>) -> Window {
        Window::new(start - Duration::weeks(4), start + Duration::weeks(4))
    }

    #[test]
    fn skip_drops_the_occurrence() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let occurrence = occ(start);
        let exception = RecurringException {
            id: Uuid::now_v7(),
            series_id: occurrence.series_id,
            occurrence_start: start,
            kind: ExceptionKind::Skip,
            override_start: None,
            override_end: None,
            override_title: None,
            override_notes: None,
        };
        let out = apply(vec![occurrence], &[exception], &window_around(start));
        assert!(out.is_empty());
    }

    #[test]
    fn override_replaces_only_set_fields() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let occurrence = occ(start);
        let new_start = start + Duration::hours(2);
        let exception = RecurringException {
            id: Uuid::now_v7(),
            series_id: occurrence.series_id,
            occurrence_start: start,
            kind: ExceptionKind::Override,
            override_start: Some(new_start),
            override_end: None,
            override_title: Some("Standup (moved)".into()),
            override_notes: None,
        };
        let out = apply(vec![occurrence.clone()], &[exception], &window_around(start));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start, new_start);
        assert_eq!(out[0].end, occurrence.end); // untouched field carried forward
        assert_eq!(out[0].title, "Standup (moved)");
        assert_eq!(out[0].notes, occurrence.notes);
    }

    #[test]
    fn override_moving_occurrence_out_of_window_is_dropped() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let occurrence = occ(start);
        let window = Window::new(start - Duration::hours(1), start + Duration::hours(1));
        let exception = RecurringException {
            id: Uuid::now_v7(),
            series_id: occurrence.series_id,
            occurrence_start: start,
            kind: ExceptionKind::Override,
            override_start: Some(start + Duration::days(10)),
            override_end: Some(start + Duration::days(10) + Duration::minutes(30)),
            override_title: None,
            override_notes: None,
        };
        let out = apply(vec![occurrence], &[exception], &window);
        assert!(out.is_empty());
    }

    #[test]
    fn non_exceptional_occurrences_pass_through_unchanged() {
        let start = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let occurrence = occ(start);
        let out = apply(vec![occurrence.clone()], &[], &window_around(start));
        assert_eq!(out, vec![occurrence]);
    }

    #[test]
    fn exceptions_keyed_by_occurrence_start_not_by_position() {
        let s1 = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let s2 = Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap();
        let occurrences = vec![occ(s1), occ(s2)];
        let exception = RecurringException {
            id: Uuid::now_v7(),
            series_id: occurrences[1].series_id,
            occurrence_start: s2,
            kind: ExceptionKind::Skip,
            override_start: None,
            override_end: None,
            override_title: None,
            override_notes: None,
        };
        let out = apply(occurrences, &[exception], &window_around(s1));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start, s1);
    }

    #[test]
    fn preserves_order_of_surviving_occurrences() {
        let s1 = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let s2 = Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap();
        let s3 = Utc.with_ymd_and_hms(2026, 1, 19, 9, 0, 0).unwrap();
        let occurrences = vec![occ(s1), occ(s2), occ(s3)];
        let out = apply(occurrences, &[], &window_around(s1));
        assert_eq!(out.iter().map(|o| o.start).collect::<Vec<_>>(), vec![s1, s2, s3]);
    }
}
