//! IANA timezone validation and the single wall-clock <-> UTC conversion
//! point used by the recurrence engine.

use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate an IANA timezone name, returning the parsed zone.
pub fn resolve(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone)
        .map_err(|_| CoreError::validation(format!("invalid time zone: {timezone}")))
}

/// The wall-clock time of day (hour/minute/second/nanosecond) that `instant`
/// reads as in `zone`. This is the one quantity the recurrence engine carries
/// forward across weeks; it never touches a UTC offset directly.
pub fn wall_clock_time(instant: DateTime<Utc>, zone: Tz) -> NaiveTime {
    instant.with_timezone(&zone).time()
}

/// The local calendar date that `instant` falls on in `zone`.
pub fn wall_clock_date(instant: DateTime<Utc>, zone: Tz) -> NaiveDate {
    instant.with_timezone(&zone).date_naive()
}

/// Combine a local calendar date with a local time-of-day in `zone` and
/// convert the result to UTC. This is the single zone->UTC conversion used
/// by the recurrence engine to emit an occurrence start: it never applies a
/// fixed offset, so the result is automatically correct across a DST
/// transition between `dtstart` and `date`.
///
/// Local-time ambiguity (the "fall back" hour that occurs twice) resolves to
/// the earlier of the two instants. Local-time non-existence (the "spring
/// forward" hour that's skipped) resolves by walking forward until a
/// representable local time is found, mirroring how calendar software keeps
/// a meeting from silently vanishing rather than propagating the gap.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, zone: Tz) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match zone.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earliest, _latest) => earliest.with_timezone(&Utc),
        chrono::LocalResult::None => {
            let mut probe = time;
            for _ in 0..120 {
                probe = probe.overflowing_add_signed(chrono::Duration::minutes(1)).0;
                let candidate = date.and_time(probe);
                if let chrono::LocalResult::Single(dt) = zone.from_local_datetime(&candidate) {
                    return dt.with_timezone(&Utc);
                }
            }
            // Unreachable for any real IANA zone (DST gaps are well under an
            // hour), but never panic over a calendar date.
            zone.from_utc_datetime(&naive).with_timezone(&Utc)
        }
    }
}
