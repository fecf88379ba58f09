//! Validation helpers for DTOs and caller identity.

use validator::ValidationError;

/// Longest accepted user identifier or label, in characters.
pub const MAX_IDENTITY_LEN: usize = 128;

/// Validates a user identifier: non-blank, at most [`MAX_IDENTITY_LEN`] characters,
/// no control characters.
///
/// # Examples
///
/// ```ignore
/// validate_user_id("auth0|5f1c")  // Ok
/// validate_user_id("   ")         // Err - blank
/// validate_user_id("a\nb")        // Err - control character
/// ```
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    validate_identity_field(id, "user_id")
}

/// Validates a display label with the same rules as [`validate_user_id`].
pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    validate_identity_field(label, "label")
}

fn validate_identity_field(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("identity_blank");
        err.message = Some(format!("{field} must not be empty").into());
        return Err(err);
    }

    let len = value.chars().count();
    if len > MAX_IDENTITY_LEN {
        let mut err = ValidationError::new("identity_length");
        err.message = Some(
            format!("{field} must be at most {MAX_IDENTITY_LEN} characters (got {len})").into(),
        );
        return Err(err);
    }

    if value.chars().any(char::is_control) {
        let mut err = ValidationError::new("identity_format");
        err.message = Some(format!("{field} must not contain control characters").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id_valid() {
        assert!(validate_user_id("auth0|5f1c2a").is_ok());
        assert!(validate_user_id("u1").is_ok());
        assert!(validate_user_id(&"x".repeat(MAX_IDENTITY_LEN)).is_ok());
    }

    #[test]
    fn test_validate_user_id_blank() {
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id("   ").is_err());
    }

    #[test]
    fn test_validate_user_id_invalid() {
        assert!(validate_user_id(&"x".repeat(MAX_IDENTITY_LEN + 1)).is_err());
        assert!(validate_user_id("a\nb").is_err());
        assert!(validate_label("tab\there").is_err());
    }
}
