//! The gRPC adapter: decodes requests, validates required fields, enforces
//! a default deadline, extracts the idempotency key from metadata, and
//! maps [`CoreError`] kinds to transport statuses (§7).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use schedula_core::recurrence::Window;
use schedula_core::CoreError;
use schedula_service::AppointmentService;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};
use uuid::Uuid;

use crate::pb;

pub struct SchedulaRpc {
    service: Arc<AppointmentService>,
    default_deadline: Duration,
}

impl SchedulaRpc {
    pub fn new(service: Arc<AppointmentService>, default_deadline: Duration) -> Self {
        Self {
            service,
            default_deadline,
        }
    }

    async fn with_deadline<F, T>(&self, fut: F) -> Result<T, Status>
    where
        F: std::future::Future<Output = Result<T, Status>>,
    {
        tokio::time::timeout(self.default_deadline, fut)
            .await
            .unwrap_or_else(|_| Err(Status::deadline_exceeded("request exceeded its deadline")))
    }
}

#[tonic::async_trait]
impl pb::schedula_server::Schedula for SchedulaRpc {
    #[tracing::instrument(skip(self, request), fields(rpc = "CreateAppointment"))]
    async fn create_appointment(
        &self,
        request: Request<pb::CreateAppointmentRequest>,
    ) -> Result<Response<pb::Appointment>, Status> {
        let idempotency_key = extract_idempotency_key(request.metadata());
        let req = request.into_inner();

        self.with_deadline(async {
            let start_time = require_timestamp(req.start_time, "start_time")?;
            let end_time = require_timestamp(req.end_time, "end_time")?;
            let key = idempotency_key.or(req.idempotency_key);

            let appointment = self
                .service
                .create_appointment(req.user_id, req.title, req.notes, start_time, end_time, key)
                .await
                .map_err(map_core_error)?;

            Ok(Response::new(to_pb_appointment(appointment)))
        })
        .await
    }

    #[tracing::instrument(skip(self, request), fields(rpc = "ListAppointments"))]
    async fn list_appointments(
        &self,
        request: Request<pb::ListAppointmentsRequest>,
    ) -> Result<Response<pb::ListAppointmentsResponse>, Status> {
        let req = request.into_inner();

        self.with_deadline(async {
            let window_start = require_timestamp(req.window_start, "window_start")?;
            let window_end = require_timestamp(req.window_end, "window_end")?;

            let appointments = self
                .service
                .list_appointments(req.user_id, Window::new(window_start, window_end))
                .await
                .map_err(map_core_error)?
                .into_iter()
                .map(to_pb_appointment)
                .collect();

            Ok(Response::new(pb::ListAppointmentsResponse { appointments }))
        })
        .await
    }

    #[tracing::instrument(skip(self, request), fields(rpc = "DeleteAppointment"))]
    async fn delete_appointment(&self, request: Request<pb::DeleteAppointmentRequest>) -> Result<Response<()>, Status> {
        let req = request.into_inner();

        self.with_deadline(async {
            let id = parse_uuid(&req.appointment_id, "appointment_id")?;
            self.service
                .delete_appointment(req.user_id, id)
                .await
                .map_err(map_core_error)?;
            Ok(Response::new(()))
        })
        .await
    }

    #[tracing::instrument(skip(self, request), fields(rpc = "CreateRecurringSeries"))]
    async fn create_recurring_series(
        &self,
        request: Request<pb::CreateRecurringSeriesRequest>,
    ) -> Result<Response<pb::RecurringSeries>, Status> {
        let req = request.into_inner();

        self.with_deadline(async {
            let start_time = require_timestamp(req.start_time, "start_time")?;
            let end_time = require_timestamp(req.end_time, "end_time")?;
            let weekly = req
                .weekly
                .ok_or_else(|| Status::invalid_argument("weekly rule is required"))?;

            let duration = end_time - start_time;
            let weekdays = weekly
                .weekdays
                .iter()
                .filter(|&&d| d != pb::Weekday::WeekdayUnspecified as i32)
                .map(|&d| d as u8)
                .collect();
            let until = weekly
                .until
                .map(timestamp_to_datetime)
                .transpose()
                .map_err(|_| Status::invalid_argument("until is not a valid timestamp"))?;

            let series = self
                .service
                .create_series(
                    req.user_id,
                    req.title,
                    req.notes,
                    duration,
                    start_time,
                    weekly.time_zone,
                    weekly.interval.max(0) as u32,
                    weekdays,
                    until,
                    weekly.count,
                )
                .await
                .map_err(map_core_error)?;

            Ok(Response::new(to_pb_series(series)))
        })
        .await
    }

    #[tracing::instrument(skip(self, request), fields(rpc = "ListOccurrences"))]
    async fn list_occurrences(
        &self,
        request: Request<pb::ListOccurrencesRequest>,
    ) -> Result<Response<pb::ListOccurrencesResponse>, Status> {
        let req = request.into_inner();

        self.with_deadline(async {
            let window_start = require_timestamp(req.window_start, "window_start")?;
            let window_end = require_timestamp(req.window_end, "window_end")?;

            let occurrences = self
                .service
                .list_occurrences(req.user_id, Window::new(window_start, window_end))
                .await
                .map_err(map_core_error)?
                .into_iter()
                .map(to_pb_occurrence)
                .collect();

            Ok(Response::new(pb::ListOccurrencesResponse { occurrences }))
        })
        .await
    }
}

fn extract_idempotency_key(metadata: &MetadataMap) -> Option<String> {
    metadata
        .get("idempotency-key")
        .or_else(|| metadata.get("x-idempotency-key"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn require_timestamp(value: Option<prost_types::Timestamp>, field: &str) -> Result<DateTime<Utc>, Status> {
    let value = value.ok_or_else(|| Status::invalid_argument(format!("{field} is required")))?;
    timestamp_to_datetime(value).map_err(|_| Status::invalid_argument(format!("{field} is not a valid timestamp")))
}

fn timestamp_to_datetime(ts: prost_types::Timestamp) -> Result<DateTime<Utc>, ()> {
    Utc.timestamp_opt(ts.seconds, ts.nanos.max(0) as u32).single().ok_or(())
}

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(raw).map_err(|_| Status::invalid_argument(format!("{field} is not a valid id")))
}

fn map_core_error(err: CoreError) -> Status {
    match err {
        CoreError::Validation(msg) => Status::invalid_argument(msg),
        CoreError::Conflict(msg) => Status::failed_precondition(msg),
        CoreError::IdempotencyConflict => Status::failed_precondition(err.to_string()),
        CoreError::NotFound(msg) => Status::not_found(msg),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "internal error");
            Status::internal("internal error")
        }
    }
}

fn to_pb_appointment(appointment: schedula_core::models::Appointment) -> pb::Appointment {
    pb::Appointment {
        id: appointment.id.to_string(),
        user_id: appointment.user_id,
        title: appointment.title,
        notes: appointment.notes,
        start_time: Some(datetime_to_timestamp(appointment.start_at)),
        end_time: Some(datetime_to_timestamp(appointment.end_at)),
        created_at: Some(datetime_to_timestamp(appointment.created_at)),
        updated_at: Some(datetime_to_timestamp(appointment.updated_at)),
    }
}

fn to_pb_occurrence(occurrence: schedula_core::models::Occurrence) -> pb::Occurrence {
    pb::Occurrence {
        id: occurrence.id,
        series_id: occurrence.series_id.to_string(),
        user_id: occurrence.user_id,
        title: occurrence.title,
        notes: occurrence.notes,
        start_time: Some(datetime_to_timestamp(occurrence.start)),
        end_time: Some(datetime_to_timestamp(occurrence.end)),
    }
}

fn to_pb_series(series: schedula_core::models::RecurringSeries) -> pb::RecurringSeries {
    pb::RecurringSeries {
        id: series.id.to_string(),
        user_id: series.user_id,
        title: series.title,
        notes: series.notes,
        dtstart: Some(datetime_to_timestamp(series.dtstart)),
        time_zone: series.time_zone,
        interval: series.interval,
        weekdays: series.weekdays.iter().map(|&d| d as i32).collect(),
        until: series.until.map(datetime_to_timestamp),
        count: series.count.map(|c| c as u32),
    }
}

fn datetime_to_timestamp(dt: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}
