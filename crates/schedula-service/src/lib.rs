//! Validation, normalization, and orchestration in front of the calendar
//! store: the layer an RPC or CLI adapter talks to.
//!
//! `schedula-service` reuses [`schedula_core::CoreError`] as its error type
//! rather than introducing a separate wrapper — every kind an adapter needs
//! to translate to a transport status (validation, conflict, idempotency
//! conflict, not found, internal) is already modeled there.

pub mod idempotency;
pub mod service;

pub use service::AppointmentService;
