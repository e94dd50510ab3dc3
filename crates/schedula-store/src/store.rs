//! The `CalendarStore` trait and its PostgreSQL implementation: the only
//! layer that talks to the database.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chrono::Utc;
use schedula_core::exceptions;
use schedula_core::models::{Appointment, NewAppointment, NewRecurringSeries, Occurrence, RecurringSeries};
use schedula_core::recurrence::{self, Window};
use schedula_core::CoreError;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::conflict;

const EXCEPTION_BUFFER_DAYS: i64 = 14;

/// SQLSTATE for a GiST exclusion constraint violation (overlapping range).
const SQLSTATE_EXCLUSION_VIOLATION: &str = "23P01";
/// SQLSTATE for a unique/primary-key violation (idempotent replay candidate).
const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// The data access surface the service layer depends on. A trait so the
/// service can be tested against a fake without a live database.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, CoreError>;
    async fn list_appointments(&self, user_id: &str, window: Window) -> Result<Vec<Appointment>, CoreError>;
    async fn delete_appointment(&self, user_id: &str, id: Uuid) -> Result<(), CoreError>;
    async fn create_series(&self, new: NewRecurringSeries) -> Result<RecurringSeries, CoreError>;
    async fn list_occurrences(&self, user_id: &str, window: Window) -> Result<Vec<Occurrence>, CoreError>;
    async fn delete_series(&self, user_id: &str, id: Uuid) -> Result<(), CoreError>;
}

pub struct PgCalendarStore {
    pool: PgPool,
}

impl PgCalendarStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A stable, process- and instance-independent lock key for `user_id`.
    /// `pg_advisory_xact_lock` takes a `bigint`; `DefaultHasher` is
    /// deterministic across runs (fixed SipHash keys), unlike the randomized
    /// hasher `HashMap` uses by default.
    fn lock_key(user_id: &str) -> i64 {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        hasher.finish() as i64
    }

    async fn acquire_user_lock(tx: &mut Transaction<'_, Postgres>, user_id: &str) -> Result<(), CoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(Self::lock_key(user_id))
            .execute(&mut **tx)
            .await
            .map_err(|e| CoreError::internal(format!("failed to acquire user lock: {e}")))?;
        Ok(())
    }

    fn sqlstate(error: &sqlx::Error) -> Option<std::borrow::Cow<'_, str>> {
        match error {
            sqlx::Error::Database(db_err) => db_err.code(),
            _ => None,
        }
    }
}

#[async_trait]
impl CalendarStore for PgCalendarStore {
    async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::internal(format!("failed to start transaction: {e}")))?;

        Self::acquire_user_lock(&mut tx, &new.user_id).await?;

        // The insert runs inside its own SAVEPOINT: a unique-violation leaves
        // the outer transaction usable only if the savepoint (not the whole
        // transaction) is rolled back first. Without this, the reconciliation
        // SELECT below would run against an aborted transaction and fail.
        let mut savepoint = tx
            .begin()
            .await
            .map_err(|e| CoreError::internal(format!("failed to open savepoint: {e}")))?;

        let insert_result: Result<Appointment, sqlx::Error> = sqlx::query_as(
            r#"INSERT INTO appointments (id, user_id, title, notes, start_at, end_at, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
               RETURNING *"#,
        )
        .bind(new.id)
        .bind(&new.user_id)
        .bind(&new.title)
        .bind(&new.notes)
        .bind(new.start_at)
        .bind(new.end_at)
        .bind(Utc::now())
        .fetch_one(&mut *savepoint)
        .await;

        let appointment = match insert_result {
            Ok(appointment) => {
                savepoint
                    .commit()
                    .await
                    .map_err(|e| CoreError::internal(format!("failed to release savepoint: {e}")))?;
                appointment
            }
            Err(err) => {
                let sqlstate = Self::sqlstate(&err).map(|s| s.into_owned());
                savepoint
                    .rollback()
                    .await
                    .map_err(|e| CoreError::internal(format!("failed to roll back savepoint: {e}")))?;

                match sqlstate.as_deref() {
                    Some(SQLSTATE_EXCLUSION_VIOLATION) => {
                        return Err(CoreError::conflict(
                            "appointment overlaps an existing appointment for this user",
                        ));
                    }
                    Some(SQLSTATE_UNIQUE_VIOLATION) => {
                        let existing: Appointment = sqlx::query_as("SELECT * FROM appointments WHERE id = $1")
                            .bind(new.id)
                            .fetch_one(&mut *tx)
                            .await
                            .map_err(|e| CoreError::internal(format!("failed to load existing appointment: {e}")))?;

                        if new.payload_eq(&existing) {
                            tx.commit()
                                .await
                                .map_err(|e| CoreError::internal(format!("failed to commit transaction: {e}")))?;
                            return Ok(existing);
                        }
                        return Err(CoreError::IdempotencyConflict);
                    }
                    _ => return Err(CoreError::internal(format!("insert failed: {err}"))),
                }
            }
        };

        tx.commit()
            .await
            .map_err(|e| CoreError::internal(format!("failed to commit transaction: {e}")))?;

        Ok(appointment)
    }

    async fn list_appointments(&self, user_id: &str, window: Window) -> Result<Vec<Appointment>, CoreError> {
        let appointments = sqlx::query_as(
            r#"SELECT * FROM appointments
               WHERE user_id = $1 AND start_at < $2 AND end_at > $3
               ORDER BY start_at ASC"#,
        )
        .bind(user_id)
        .bind(window.end)
        .bind(window.start)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::internal(format!("failed to list appointments: {e}")))?;

        Ok(appointments)
    }

    async fn delete_appointment(&self, user_id: &str, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::internal(format!("failed to delete appointment: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("appointment {id} not found")));
        }
        Ok(())
    }

    async fn create_series(&self, new: NewRecurringSeries) -> Result<RecurringSeries, CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::internal(format!("failed to start transaction: {e}")))?;

        Self::acquire_user_lock(&mut tx, &new.user_id).await?;

        let candidate = new.to_recurring_series();

        conflict::check_series_conflict(&mut tx, &candidate).await?;

        let inserted: RecurringSeries = sqlx::query_as(
            r#"INSERT INTO recurring_series
                   (id, user_id, title, notes, duration_seconds, dtstart, time_zone, interval, weekdays, until, count, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
               RETURNING *"#,
        )
        .bind(candidate.id)
        .bind(&candidate.user_id)
        .bind(&candidate.title)
        .bind(&candidate.notes)
        .bind(candidate.duration_seconds)
        .bind(candidate.dtstart)
        .bind(&candidate.time_zone)
        .bind(candidate.interval)
        .bind(&candidate.weekdays)
        .bind(candidate.until)
        .bind(candidate.count)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CoreError::internal(format!("failed to insert series: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| CoreError::internal(format!("failed to commit transaction: {e}")))?;

        Ok(inserted)
    }

    async fn list_occurrences(&self, user_id: &str, window: Window) -> Result<Vec<Occurrence>, CoreError> {
        let series_list: Vec<RecurringSeries> = sqlx::query_as(
            r#"SELECT * FROM recurring_series WHERE user_id = $1 AND dtstart < $2"#,
        )
        .bind(user_id)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::internal(format!("failed to list series: {e}")))?;

        let exception_window = Window::new(
            window.start - chrono::Duration::days(EXCEPTION_BUFFER_DAYS),
            window.end + chrono::Duration::days(EXCEPTION_BUFFER_DAYS),
        );

        let mut all_occurrences = Vec::new();
        for series in &series_list {
            let expanded = recurrence::expand(series, &window)?;

            let series_exceptions = sqlx::query_as(
                r#"SELECT * FROM recurring_exceptions
                   WHERE series_id = $1 AND occurrence_start < $2 AND occurrence_start >= $3"#,
            )
            .bind(series.id)
            .bind(exception_window.end)
            .bind(exception_window.start)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::internal(format!("failed to list series exceptions: {e}")))?;

            let merged = exceptions::apply(expanded, &series_exceptions, &window);
            all_occurrences.extend(merged);
        }

        all_occurrences.sort_by(|a, b| a.start.cmp(&b.start));
        Ok(all_occurrences)
    }

    async fn delete_series(&self, user_id: &str, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM recurring_series WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::internal(format!("failed to delete series: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("series {id} not found")));
        }
        Ok(())
    }
}
