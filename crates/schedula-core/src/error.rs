use thiserror::Error;

/// The sealed error taxonomy shared by every layer of the service.
///
/// Only this set of kinds crosses a layer boundary as `Err`; the store and
/// service crates wrap lower-level faults (`sqlx::Error`, I/O) into
/// [`CoreError::Internal`] rather than letting them leak upward untyped.
/// The RPC adapter is the only place that knows how to map a kind to a
/// transport status.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Input fails a service-level precondition: empty user, empty title
    /// after trimming, bad weekday, bad timezone, reversed window, and so on.
    #[error("{0}")]
    Validation(String),

    /// An overlap was detected, either by the insertion path's exclusion
    /// constraint or by the pre-insert series conflict check.
    #[error("{0}")]
    Conflict(String),

    /// A prior row with the idempotency-derived id exists but its payload
    /// differs from the request.
    #[error("idempotency key already used with a different payload")]
    IdempotencyConflict,

    /// The delete target does not exist for the given user.
    #[error("{0}")]
    NotFound(String),

    /// Any unclassified fault: I/O, a malformed stored row, an unexpected
    /// constraint violation that doesn't map to a known kind above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
