//! # Schedula Store
//!
//! The PostgreSQL-backed calendar store: durable state for appointments,
//! recurring series, and their exceptions, plus the two mechanisms that keep
//! concurrent writers honest — per-user advisory-lock serialization and the
//! overlap exclusion constraint enforced by the database itself.
//!
//! [`store::CalendarStore`] is the trait the service layer depends on;
//! [`store::PgCalendarStore`] is the only implementation. [`conflict`] holds
//! the series-vs-calendar conflict check used before a new series is
//! inserted. [`pool`] builds the connection pool and runs migrations.

pub mod conflict;
pub mod pool;
pub mod store;

pub use pool::{build_pool, PoolConfig};
pub use store::{CalendarStore, PgCalendarStore};
