//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum length accepted for a participant or session display name.
const DISPLAY_NAME_MAX: usize = 50;

/// Validates that a display name is non-blank and at most 50 characters.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("display name must not be blank".into());
        return Err(err);
    }

    if name.chars().count() > DISPLAY_NAME_MAX {
        let mut err = ValidationError::new("display_name_length");
        err.message = Some(
            format!("display name must be at most {DISPLAY_NAME_MAX} characters").into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a proof range is ordered and within the plausible span
/// for bottled whiskey.
pub fn validate_proof_range(min: f32, max: f32) -> Result<(), ValidationError> {
    if !(1.0..=200.0).contains(&min) || !(1.0..=200.0).contains(&max) {
        let mut err = ValidationError::new("proof_range_bounds");
        err.message = Some("proof values must be between 1 and 200".into());
        return Err(err);
    }

    if min > max {
        let mut err = ValidationError::new("proof_range_order");
        err.message = Some("proof range minimum exceeds its maximum".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_must_not_be_blank() {
        assert!(validate_display_name("Islay Pete").is_ok());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name("").is_err());
    }

    #[test]
    fn display_names_are_capped() {
        assert!(validate_display_name(&"x".repeat(50)).is_ok());
        assert!(validate_display_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn proof_ranges_must_be_ordered() {
        assert!(validate_proof_range(80.0, 120.0).is_ok());
        assert!(validate_proof_range(120.0, 80.0).is_err());
        assert!(validate_proof_range(0.0, 80.0).is_err());
        assert!(validate_proof_range(80.0, 250.0).is_err());
    }
}
