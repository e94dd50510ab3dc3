//! # Schedula Core
//!
//! Pure domain logic for the Schedula appointment calendar service: the
//! data model shared by the whole system, the timezone-aware weekly
//! recurrence engine, and the exception merger that applies per-occurrence
//! skip/override rules to a generated occurrence stream.
//!
//! Nothing in this crate touches I/O. The database-backed calendar store
//! and conflict checker live in `schedula-store`; orchestration and input
//! validation live in `schedula-service`.
//!
//! ## Core modules
//!
//! - [`models`]: `Appointment`, `RecurringSeries`, `RecurringException`, `Occurrence` and their DTOs.
//! - [`recurrence`]: the weekly expansion engine, wall-clock/DST correct.
//! - [`exceptions`]: applies skip/override exceptions to an occurrence stream.
//! - [`timezone`]: IANA timezone validation and wall-clock <-> UTC conversion helpers.
//! - [`error`]: the sealed error taxonomy shared by every layer above this one.

pub mod error;
pub mod exceptions;
pub mod models;
pub mod recurrence;
pub mod timezone;

pub use error::CoreError;
