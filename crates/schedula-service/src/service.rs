//! Input validation, normalization, and orchestration in front of the store.
//!
//! Nothing here touches SQL directly; `AppointmentService` depends only on
//! the [`CalendarStore`] trait, so it can be exercised against a fake store
//! in tests without a live database.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use schedula_core::models::{NewAppointment, NewRecurringSeries, Weekday, WeeklyRule};
use schedula_core::recurrence::{self, Window};
use schedula_core::{timezone, CoreError};
use schedula_store::CalendarStore;
use uuid::Uuid;

use crate::idempotency;

const MAX_TITLE_BYTES: usize = 512;
const HORIZON: Duration = Duration::days(180);

pub struct AppointmentService {
    store: Arc<dyn CalendarStore>,
}

impl AppointmentService {
    pub fn new(store: Arc<dyn CalendarStore>) -> Self {
        Self { store }
    }

    pub async fn create_appointment(
        &self,
        user_id: String,
        title: String,
        notes: String,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> Result<schedula_core::models::Appointment, CoreError> {
        let user_id = require_non_empty(user_id, "user id")?;
        let title = require_title(title)?;

        if end_at <= start_at {
            return Err(CoreError::validation("appointment end must be after start"));
        }
        if end_at - start_at > recurrence::MAX_APPOINTMENT_DURATION {
            return Err(CoreError::validation("appointment duration must not exceed 24 hours"));
        }

        let id = match idempotency_key {
            Some(key) => {
                let key = key.trim().to_string();
                if key.is_empty() {
                    return Err(CoreError::validation("idempotency key must not be empty"));
                }
                idempotency::validate_key_length(&key)?;
                idempotency::derive_appointment_id(&user_id, &key)
            }
            None => Uuid::now_v7(),
        };

        let new = NewAppointment {
            id,
            user_id,
            title,
            notes,
            start_at,
            end_at,
        };

        self.store.create_appointment(new).await
    }

    pub async fn list_appointments(
        &self,
        user_id: String,
        window: Window,
    ) -> Result<Vec<schedula_core::models::Appointment>, CoreError> {
        let user_id = require_non_empty(user_id, "user id")?;
        require_valid_window(&window)?;
        self.store.list_appointments(&user_id, window).await
    }

    pub async fn delete_appointment(&self, user_id: String, id: Uuid) -> Result<(), CoreError> {
        let user_id = require_non_empty(user_id, "user id")?;
        if id.is_nil() {
            return Err(CoreError::validation("appointment id must not be nil"));
        }
        self.store.delete_appointment(&user_id, id).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_series(
        &self,
        user_id: String,
        title: String,
        notes: String,
        duration: Duration,
        dtstart: DateTime<Utc>,
        time_zone: String,
        interval: u32,
        weekdays: Vec<u8>,
        until: Option<DateTime<Utc>>,
        count: Option<u32>,
    ) -> Result<schedula_core::models::RecurringSeries, CoreError> {
        let user_id = require_non_empty(user_id, "user id")?;
        let title = require_title(title)?;
        let zone = timezone::resolve(&time_zone)?;

        if duration.num_seconds() <= 0 {
            return Err(CoreError::validation("appointment duration must be positive"));
        }
        if duration > recurrence::MAX_APPOINTMENT_DURATION {
            return Err(CoreError::validation("appointment duration must not exceed 24 hours"));
        }

        let interval = if interval == 0 { 1 } else { interval };

        let weekdays: BTreeSet<Weekday> = if weekdays.is_empty() {
            let default_day = Weekday::from_chrono(timezone::wall_clock_date(dtstart, zone).weekday());
            BTreeSet::from([default_day])
        } else {
            weekdays
                .into_iter()
                .map(Weekday::try_from)
                .collect::<Result<BTreeSet<_>, _>>()?
        };

        if until.is_none() && count.is_none() {
            return Err(CoreError::validation(
                "recurring series must specify either an end date or an occurrence count",
            ));
        }
        if let Some(u) = until {
            if u < dtstart {
                return Err(CoreError::validation("series end date must not precede the start"));
            }
        }
        if count.is_none() && until.map_or(true, |u| u > dtstart + HORIZON) {
            return Err(CoreError::validation(
                "a series with no occurrence count must end within 180 days of its start",
            ));
        }

        let rule = WeeklyRule {
            interval,
            weekdays,
            until,
            count,
        };

        let new = NewRecurringSeries {
            id: Uuid::now_v7(),
            user_id,
            title,
            notes,
            duration_seconds: duration.num_seconds(),
            dtstart,
            time_zone: time_zone.clone(),
            rule,
        };

        self.enforce_horizon(&new)?;

        self.store.create_series(new).await
    }

    /// Spec §4.5: a series with no `until` must still produce at least one
    /// occurrence within the 180-day horizon, and an explicit `count` must
    /// be achievable before `until` or the horizon, whichever binds first.
    fn enforce_horizon(&self, new: &NewRecurringSeries) -> Result<(), CoreError> {
        let preview = new.to_recurring_series();
        let available = recurrence::count_within_horizon(&preview, HORIZON)?;

        if available == 0 {
            return Err(CoreError::validation(
                "series produces no occurrences within its end date and the 180-day creation horizon",
            ));
        }

        if let Some(count) = new.rule.count {
            if count as usize > available {
                let bound = match new.rule.until {
                    Some(_) => "before its end date",
                    None => "within the 180-day creation horizon",
                };
                return Err(CoreError::validation(format!(
                    "series requests {count} occurrences but only {available} are available {bound}"
                )));
            }
        }

        Ok(())
    }

    pub async fn list_occurrences(
        &self,
        user_id: String,
        window: Window,
    ) -> Result<Vec<schedula_core::models::Occurrence>, CoreError> {
        let user_id = require_non_empty(user_id, "user id")?;
        require_valid_window(&window)?;
        self.store.list_occurrences(&user_id, window).await
    }
}

fn require_non_empty(value: String, field: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn require_title(title: String) -> Result<String, CoreError> {
    let trimmed = title.trim().to_string();
    if trimmed.is_empty() {
        return Err(CoreError::validation("title must not be empty"));
    }
    if trimmed.len() > MAX_TITLE_BYTES {
        return Err(CoreError::validation(format!(
            "title must be at most {MAX_TITLE_BYTES} bytes"
        )));
    }
    Ok(trimmed)
}

fn require_valid_window(window: &Window) -> Result<(), CoreError> {
    if window.end <= window.start {
        return Err(CoreError::validation("window end must be after window start"));
    }
    Ok(())
}
