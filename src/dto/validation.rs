//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::config::MAX_CODE_LENGTH;

/// Validates a room code as typed by a player: ASCII letters and digits only,
/// surrounding whitespace ignored, case ignored.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("k7p2qx")   // Ok
/// validate_room_code(" K7P2QX ") // Ok
/// validate_room_code("K7-P2")    // Err - punctuation
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.is_empty() || code.len() > MAX_CODE_LENGTH {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be between 1 and {MAX_CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Rejects strings that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}
