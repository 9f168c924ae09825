//! System-credential check for the first-available bypass.

use tenantgate_types::error::AccessError;

/// Decide whether `presented` matches the configured system credential.
///
/// - No configured credential (unset or blank): the bypass is disabled and
///   every request is refused.
/// - No presented credential: `Missing`.
/// - Otherwise the two must match, ignoring ASCII case.
pub fn authorize_master(configured: Option<&str>, presented: Option<&str>) -> Result<(), AccessError> {
    let configured = match configured.map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => return Err(AccessError::Disabled),
    };
    let presented = match presented.map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => return Err(AccessError::Missing),
    };
    if configured.eq_ignore_ascii_case(presented) {
        Ok(())
    } else {
        Err(AccessError::Forbidden)
    }
}
