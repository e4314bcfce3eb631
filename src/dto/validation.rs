//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a field contains at least one non-whitespace character.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that an identifier stays within one line and a sane length.
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    validate_not_blank(value)?;
    if value.len() > 64 {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some("identifier must be at most 64 characters".into());
        return Err(err);
    }
    if value.chars().any(|c| c.is_control()) {
        let mut err = ValidationError::new("identifier_format");
        err.message = Some("identifier must not contain control characters".into());
        return Err(err);
    }
    Ok(())
}
