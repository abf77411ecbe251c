//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest keypad identifier accepted during identification.
const MAX_KEYPAD_ID_LEN: usize = 64;

/// Validates that a keypad ID is 1 to 64 printable ASCII characters without spaces.
///
/// # Examples
///
/// ```ignore
/// validate_keypad_id("desk-keypad") // Ok
/// validate_keypad_id("")            // Err - empty
/// validate_keypad_id("front desk")  // Err - space
/// ```
pub fn validate_keypad_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_KEYPAD_ID_LEN {
        let mut err = ValidationError::new("keypad_id_length");
        err.message = Some(
            format!(
                "Keypad ID must be 1 to {MAX_KEYPAD_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id.chars().all(|c| c.is_ascii_graphic()) {
        let mut err = ValidationError::new("keypad_id_format");
        err.message = Some("Keypad ID must contain only printable ASCII characters".into());
        return Err(err);
    }

    Ok(())
}
