//! Deterministic id derivation for idempotent appointment creation.

use uuid::Uuid;

const MAX_KEY_BYTES: usize = 256;

/// Derive the id an appointment created with `(user_id, key)` must carry,
/// so retried creates with the same key and user always target the same
/// row. `key` must already be trimmed by the caller.
///
/// The name-based UUID (v5) is portable across languages: any runtime that
/// reproduces the namespaced string `schedula:create_appointment:<user>:<key>`
/// and hashes it the same way arrives at the same id.
pub fn derive_appointment_id(user_id: &str, key: &str) -> Uuid {
    let name = format!("schedula:create_appointment:{user_id}:{key}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

pub fn validate_key_length(key: &str) -> Result<(), schedula_core::CoreError> {
    if key.len() > MAX_KEY_BYTES {
        return Err(schedula_core::CoreError::validation(format!(
            "idempotency key must be at most {MAX_KEY_BYTES} bytes"
        )));
    }
    Ok(())
}
