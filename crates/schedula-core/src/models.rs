//! The shared data model: one-off appointments, recurring series, their
//! exceptions, and the derived (never persisted) occurrence type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::CoreError;

/// A single weekday, 1=Monday .. 7=Sunday, per the wire encoding in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Weekday(u8);

impl Weekday {
    pub const MONDAY: Weekday = Weekday(1);
    pub const SUNDAY: Weekday = Weekday(7);

    /// chrono's `Weekday::Mon` is the 0th day of its own week numbering;
    /// this maps chrono's ordering onto the 1..=7 (Monday-first) encoding.
    pub fn from_chrono(day: chrono::Weekday) -> Self {
        use chrono::Weekday as C;
        Weekday(match day {
            C::Mon => 1,
            C::Tue => 2,
            C::Wed => 3,
            C::Thu => 4,
            C::Fri => 5,
            C::Sat => 6,
            C::Sun => 7,
        })
    }

    pub fn to_chrono(self) -> chrono::Weekday {
        use chrono::Weekday as C;
        match self.0 {
            1 => C::Mon,
            2 => C::Tue,
            3 => C::Wed,
            4 => C::Thu,
            5 => C::Fri,
            6 => C::Sat,
            _ => C::Sun,
        }
    }

    /// Offset from Monday, 0..=6, used to index into a week.
    pub fn offset_from_monday(self) -> i64 {
        (self.0 - 1) as i64
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Weekday {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=7).contains(&value) {
            Ok(Weekday(value))
        } else {
            Err(CoreError::validation(format!(
                "weekday must be in 1..=7 (1=Monday, 7=Sunday), got {value}"
            )))
        }
    }
}

/// A one-off calendar entry bounded by the half-open interval `[start, end)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub notes: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input to create a single appointment, already trimmed and UTC-normalized
/// by the service layer. `id` is either derived from an idempotency key or
/// freshly generated; it is never left to the store to invent.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub notes: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl NewAppointment {
    /// Field-for-field equality used by the idempotent-replay reconciliation
    /// in §4.3 step 4. Deliberately excludes `id` (that's the lookup key).
    pub fn payload_eq(&self, existing: &Appointment) -> bool {
        self.user_id == existing.user_id
            && self.title == existing.title
            && self.notes == existing.notes
            && self.start_at == existing.start_at
            && self.end_at == existing.end_at
    }
}

/// The weekly recurrence rule embedded in a series. `until` and/or `count`
/// bound the occurrence set; at least one must be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyRule {
    pub interval: u32,
    pub weekdays: BTreeSet<Weekday>,
    pub until: Option<DateTime<Utc>>,
    pub count: Option<u32>,
}

/// A recurring weekly series: template payload plus the anchor and rule that
/// the recurrence engine expands into occurrences.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecurringSeries {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub notes: String,
    pub duration_seconds: i64,
    pub dtstart: DateTime<Utc>,
    pub time_zone: String,
    pub interval: i32,
    /// Weekdays 1..=7, stored sorted ascending, deduplicated.
    pub weekdays: Vec<i16>,
    pub until: Option<DateTime<Utc>>,
    pub count: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringSeries {
    pub fn rule(&self) -> Result<WeeklyRule, CoreError> {
        let weekdays = self
            .weekdays
            .iter()
            .map(|&d| Weekday::try_from(d as u8))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(WeeklyRule {
            interval: self.interval.max(1) as u32,
            weekdays,
            until: self.until,
            count: self.count.map(|c| c as u32),
        })
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.duration_seconds)
    }
}

/// Input to create a new series, already validated and normalized by the
/// service layer.
#[derive(Debug, Clone)]
pub struct NewRecurringSeries {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub notes: String,
    pub duration_seconds: i64,
    pub dtstart: DateTime<Utc>,
    pub time_zone: String,
    pub rule: WeeklyRule,
}

impl NewRecurringSeries {
    /// Build the `RecurringSeries` shape the recurrence engine and conflict
    /// checker operate on, before the row actually exists. `created_at` and
    /// `updated_at` are set to `dtstart` since they have no meaning yet.
    pub fn to_recurring_series(&self) -> RecurringSeries {
        RecurringSeries {
            id: self.id,
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            notes: self.notes.clone(),
            duration_seconds: self.duration_seconds,
            dtstart: self.dtstart,
            time_zone: self.time_zone.clone(),
            interval: self.rule.interval as i32,
            weekdays: self.rule.weekdays.iter().map(|w| w.value() as i16).collect(),
            until: self.rule.until,
            count: self.rule.count.map(|c| c as i32),
            created_at: self.dtstart,
            updated_at: self.dtstart,
        }
    }
}

/// The kind of deviation a [`RecurringException`] applies to a single
/// occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ExceptionKind {
    Skip,
    Override,
}

/// A per-occurrence modifier keyed by the original scheduled occurrence
/// start. `(series_id, occurrence_start)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecurringException {
    pub id: Uuid,
    pub series_id: Uuid,
    pub occurrence_start: DateTime<Utc>,
    pub kind: ExceptionKind,
    pub override_start: Option<DateTime<Utc>>,
    pub override_end: Option<DateTime<Utc>>,
    pub override_title: Option<String>,
    pub override_notes: Option<String>,
}

/// A derived, never-persisted calendar entry belonging to a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Base-10 string of `start`'s UTC nanosecond instant.
    pub id: String,
    pub series_id: Uuid,
    pub user_id: String,
    pub title: String,
    pub notes: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Occurrence {
    pub fn occurrence_id(start: DateTime<Utc>) -> String {
        start
            .timestamp_nanos_opt()
            .expect("occurrence instants stay well within chrono's representable range")
            .to_string()
    }
}
