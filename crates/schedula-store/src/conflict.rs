//! The series-vs-calendar conflict check run before a new recurring series
//! is inserted, per §4.4.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use schedula_core::exceptions;
use schedula_core::models::{RecurringException, RecurringSeries};
use schedula_core::recurrence::{self, Window};
use schedula_core::CoreError;
use sqlx::{Postgres, Transaction};

const CONFLICT_HORIZON: ChronoDuration = ChronoDuration::days(180);
const EXCEPTION_BUFFER: ChronoDuration = ChronoDuration::days(14);

#[derive(Debug, Clone, Copy)]
struct Span {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

fn overlaps(a: Span, b: Span) -> bool {
    a.start < b.end && a.end > b.start
}

fn horizon_window(series: &RecurringSeries) -> Result<Window, CoreError> {
    let rule = series.rule()?;
    let max_end = series.dtstart + CONFLICT_HORIZON;
    let end = match rule.until {
        Some(until) if until < max_end => until + ChronoDuration::nanoseconds(1),
        _ => max_end,
    };
    Ok(Window::new(series.dtstart, end))
}

/// Verify that `candidate` (not yet inserted; `candidate.id` is already
/// assigned) does not overlap any existing appointment or any other series'
/// occurrences belonging to the same user, within the conflict horizon. Runs
/// inside `tx` so the caller can insert immediately on success without a
/// second round-trip.
pub async fn check_series_conflict(
    tx: &mut Transaction<'_, Postgres>,
    candidate: &RecurringSeries,
) -> Result<(), CoreError> {
    let horizon = horizon_window(candidate)?;
    let new_occurrences = recurrence::expand(candidate, &horizon)?;

    for pair in new_occurrences.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(CoreError::conflict(
                "the series' own occurrences overlap one another",
            ));
        }
    }

    let comparison_end = new_occurrences
        .last()
        .map(|o| o.end.max(horizon.end))
        .unwrap_or(horizon.end);
    let comparison_window = Window::new(horizon.start, comparison_end);

    let mut existing_spans = fetch_existing_appointment_spans(tx, &candidate.user_id, &comparison_window).await?;
    existing_spans.extend(
        fetch_other_series_spans(tx, &candidate.user_id, candidate.id, &comparison_window).await?,
    );

    for new_occ in &new_occurrences {
        let new_span = Span {
            start: new_occ.start,
            end: new_occ.end,
        };
        if existing_spans.iter().any(|&e| overlaps(new_span, e)) {
            return Err(CoreError::conflict(
                "the series conflicts with an existing appointment or series on this calendar",
            ));
        }
    }

    Ok(())
}

async fn fetch_existing_appointment_spans(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    window: &Window,
) -> Result<Vec<Span>, CoreError> {
    let rows: Vec<(DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
        r#"SELECT start_at, end_at FROM appointments
           WHERE user_id = $1 AND start_at < $2 AND end_at > $3"#,
    )
    .bind(user_id)
    .bind(window.end)
    .bind(window.start)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| CoreError::internal(format!("failed to fetch existing appointments: {e}")))?;

    Ok(rows
        .into_iter()
        .map(|(start, end)| Span { start, end })
        .collect())
}

async fn fetch_other_series_spans(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    excluding_series_id: uuid::Uuid,
    window: &Window,
) -> Result<Vec<Span>, CoreError> {
    let other_series: Vec<RecurringSeries> = sqlx::query_as(
        r#"SELECT * FROM recurring_series WHERE user_id = $1 AND id != $2 AND dtstart < $3"#,
    )
    .bind(user_id)
    .bind(excluding_series_id)
    .bind(window.end)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| CoreError::internal(format!("failed to fetch other series: {e}")))?;

    let mut spans = Vec::new();
    for series in &other_series {
        let occurrences = recurrence::expand(series, window)?;
        let exception_window = Window::new(window.start - EXCEPTION_BUFFER, window.end + EXCEPTION_BUFFER);
        let series_exceptions = fetch_series_exceptions(tx, series.id, &exception_window).await?;
        let merged = exceptions::apply(occurrences, &series_exceptions, window);
        spans.extend(merged.into_iter().map(|o| Span {
            start: o.start,
            end: o.end,
        }));
    }
    Ok(spans)
}

async fn fetch_series_exceptions(
    tx: &mut Transaction<'_, Postgres>,
    series_id: uuid::Uuid,
    window: &Window,
) -> Result<Vec<RecurringException>, CoreError> {
    let exceptions: Vec<RecurringException> = sqlx::query_as(
        r#"SELECT * FROM recurring_exceptions
           WHERE series_id = $1 AND occurrence_start < $2 AND occurrence_start >= $3"#,
    )
    .bind(series_id)
    .bind(window.end)
    .bind(window.start)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| CoreError::internal(format!("failed to fetch series exceptions: {e}")))?;

    Ok(exceptions)
}
