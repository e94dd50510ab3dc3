//! The weekly recurrence engine.
//!
//! Pure and allocation-bounded by the size of its output: given a series and
//! a window, it produces the occurrences whose intervals intersect that
//! window, honoring `interval`, `weekdays`, `until`, and `count`. It never
//! touches the database and never applies a fixed UTC offset — every
//! occurrence start is derived by combining the series's wall-clock time of
//! day with a target local calendar date and performing one zone->UTC
//! conversion at emission time (see [`crate::timezone::local_to_utc`]).

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::error::CoreError;
use crate::models::{Occurrence, RecurringSeries};
use crate::timezone;

/// A half-open UTC window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

pub const MAX_APPOINTMENT_DURATION: Duration = Duration::hours(24);

fn validate_duration(duration: Duration) -> Result<(), CoreError> {
    if duration <= Duration::zero() {
        return Err(CoreError::validation("series duration must be positive"));
    }
    if duration > MAX_APPOINTMENT_DURATION {
        return Err(CoreError::validation(
            "series duration must not exceed 24 hours",
        ));
    }
    Ok(())
}

/// Expand `series` into occurrences intersecting `window`, honoring the
/// series's `until` and `count` bounds. This is the entry point used by
/// `ListOccurrences`.
pub fn expand(series: &RecurringSeries, window: &Window) -> Result<Vec<Occurrence>, CoreError> {
    let rule = series.rule()?;
    expand_impl(series, window, rule.count)
}

/// Expand `series` over `window` ignoring `count` entirely. Used by the
/// conflict checker, which expands over the full conflict horizon and then
/// truncates to `count` itself (§4.4 step 1) — the two need the same
/// generation order, which `expand_impl` guarantees by construction.
pub fn expand_ignoring_count(
    series: &RecurringSeries,
    window: &Window,
) -> Result<Vec<Occurrence>, CoreError> {
    expand_impl(series, window, None)
}

fn expand_impl(
    series: &RecurringSeries,
    window: &Window,
    count_limit: Option<u32>,
) -> Result<Vec<Occurrence>, CoreError> {
    let rule = series.rule()?;
    if rule.weekdays.is_empty() {
        return Err(CoreError::validation("weekly rule must name at least one weekday"));
    }
    let duration = series.duration();
    validate_duration(duration)?;
    let zone = timezone::resolve(&series.time_zone)?;
    let interval = rule.interval.max(1) as i64;

    let wall_time = timezone::wall_clock_time(series.dtstart, zone);
    let anchor_date = timezone::wall_clock_date(series.dtstart, zone);
    let week0_monday = anchor_date - Duration::days(anchor_date.weekday().num_days_from_monday() as i64);

    let mut occurrences = Vec::new();
    let mut global_index: u32 = 0;

    'weeks: for week_n in 0i64.. {
        let week_monday = week0_monday + Duration::days(week_n * interval * 7);

        for &weekday in &rule.weekdays {
            let candidate_date = week_monday + Duration::days(weekday.offset_from_monday());
            let candidate_start = timezone::local_to_utc(candidate_date, wall_time, zone);

            // First-week gating: candidates before dtstart are never emitted
            // and never counted toward the count-based global index.
            if candidate_start < series.dtstart {
                continue;
            }

            if let Some(until) = rule.until {
                if candidate_start > until {
                    break 'weeks;
                }
            }

            global_index += 1;
            if let Some(count) = count_limit {
                if global_index > count {
                    break 'weeks;
                }
            }

            let candidate_end = candidate_start + duration;

            if window.intersects(candidate_start, candidate_end) {
                occurrences.push(Occurrence {
                    id: Occurrence::occurrence_id(candidate_start),
                    series_id: series.id,
                    user_id: series.user_id.clone(),
                    title: series.title.clone(),
                    notes: series.notes.clone(),
                    start: candidate_start,
                    end: candidate_end,
                });
            }

            // Once a candidate starts at or after the window's end, every
            // later candidate (weeks and weekdays are generated in strictly
            // ascending start order) is also past the window; stop scanning.
            if candidate_start >= window.end {
                break 'weeks;
            }
        }
    }

    Ok(occurrences)
}

/// Verify that the series admits at least one occurrence within
/// `[dtstart, dtstart + horizon]` (or before `until` if it precedes the
/// horizon), per the series creation invariant in §3. Returns the number of
/// occurrences available within that bound, for count-horizon validation.
pub fn count_within_horizon(
    series: &RecurringSeries,
    horizon: Duration,
) -> Result<usize, CoreError> {
    let horizon_end = series.dtstart + horizon;
    let end = match series.rule()?.until {
        Some(until) if until < horizon_end => until + Duration::nanoseconds(1),
        _ => horizon_end,
    };
    let window = Window::new(series.dtstart, end);
    Ok(expand_ignoring_count(series, &window)?.len())
}
