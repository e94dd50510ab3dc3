//! Property-based checks on the weekly recurrence engine: determinism,
//! count-honoring, and window-boundary correctness hold across the whole
//! input space, not just the handful of examples in `src/recurrence.rs`.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use schedula_core::models::RecurringSeries;
use schedula_core::recurrence::{self, Window};
use uuid::Uuid;

fn arb_weekdays() -> impl Strategy<Value = Vec<i16>> {
    prop::collection::btree_set(1i16..=7, 1..=4).prop_map(|s| s.into_iter().collect())
}

fn arb_series() -> impl Strategy<Value = RecurringSeries> {
    (
        1i64..1_000_000i64, // minutes offset for dtstart, keeps dates in a sane range
        arb_weekdays(),
        1u32..=4,
        1u32..200,
        60i64..=86_400,
    )
        .prop_map(|(dtstart_offset_min, weekdays, interval, count, duration_seconds)| {
            let dtstart = Utc.with_ymd_and_hms(2020, 1, 6, 9, 0, 0).unwrap()
                + Duration::minutes(dtstart_offset_min);
            RecurringSeries {
                id: Uuid::now_v7(),
                user_id: "prop-user".to_string(),
                title: "Prop Series".to_string(),
                notes: String::new(),
                duration_seconds,
                dtstart,
                time_zone: "UTC".to_string(),
                interval: interval as i32,
                weekdays,
                until: None,
                count: Some(count as i32),
                created_at: dtstart,
                updated_at: dtstart,
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn expand_is_deterministic(series in arb_series()) {
        let window = Window::new(series.dtstart, series.dtstart + Duration::days(3650));
        let a = recurrence::expand(&series, &window).unwrap();
        let b = recurrence::expand(&series, &window).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn expand_never_exceeds_count(series in arb_series()) {
        let window = Window::new(series.dtstart, series.dtstart + Duration::days(3650));
        let occurrences = recurrence::expand(&series, &window).unwrap();
        let count = series.count.unwrap() as usize;
        prop_assert!(occurrences.len() <= count);
    }

    #[test]
    fn expand_outputs_are_strictly_ascending(series in arb_series()) {
        let window = Window::new(series.dtstart, series.dtstart + Duration::days(3650));
        let occurrences = recurrence::expand(&series, &window).unwrap();
        for pair in occurrences.windows(2) {
            prop_assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn expand_never_emits_before_dtstart(series in arb_series()) {
        let window = Window::new(
            series.dtstart - Duration::days(30),
            series.dtstart + Duration::days(3650),
        );
        let occurrences = recurrence::expand(&series, &window).unwrap();
        for occ in &occurrences {
            prop_assert!(occ.start >= series.dtstart);
        }
    }

    #[test]
    fn expand_respects_window_bounds(series in arb_series()) {
        let window = Window::new(
            series.dtstart + Duration::days(7),
            series.dtstart + Duration::days(21),
        );
        let occurrences = recurrence::expand(&series, &window).unwrap();
        for occ in &occurrences {
            prop_assert!(occ.start < window.end);
            prop_assert!(occ.end > window.start);
        }
    }

    #[test]
    fn narrowing_window_never_adds_occurrences(series in arb_series()) {
        let wide = Window::new(series.dtstart, series.dtstart + Duration::days(3650));
        let narrow = Window::new(series.dtstart, series.dtstart + Duration::days(90));
        let wide_out = recurrence::expand(&series, &wide).unwrap();
        let narrow_out = recurrence::expand(&series, &narrow).unwrap();
        prop_assert!(narrow_out.len() <= wide_out.len());
    }
}
