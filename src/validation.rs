//! Field rules shared by entity invariants. Each returns the first violation only.
use super::error::ValidationError;
use super::types::TimeStamp;
use super::utils::text_len;

pub fn require_present(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(())
}

pub fn require_min_len(field: &'static str, value: &str, min: usize) -> Result<(), ValidationError> {
    require_present(field, value)?;

    let actual = text_len(value);
    if actual < min {
        return Err(ValidationError::TooShort { field, min, actual });
    }
    Ok(())
}

pub fn require_future(
    field: &'static str,
    at: TimeStamp,
    now: TimeStamp,
) -> Result<(), ValidationError> {
    if at <= now {
        return Err(ValidationError::NotInFuture { field });
    }
    Ok(())
}

/// Instant the store can persist; roughly years 1677 to 2262.
pub fn require_storable(field: &'static str, at: Option<TimeStamp>) -> Result<(), ValidationError> {
    match at {
        Some(at) if !at.is_storable() => Err(ValidationError::OutOfRange { field }),
        _ => Ok(()),
    }
}

pub fn require_not_before(
    actual_field: &'static str,
    actual: Option<TimeStamp>,
    planned_field: &'static str,
    planned: TimeStamp,
) -> Result<(), ValidationError> {
    match actual {
        Some(actual) if actual < planned => Err(ValidationError::PrecedesPlanned {
            actual: actual_field,
            planned: planned_field,
        }),
        _ => Ok(()),
    }
}

/// Trims and drops blank optional text.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
