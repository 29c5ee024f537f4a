//! Validation of user-supplied job parameters.
//!
//! Job identifiers end up as directory names, so they are restricted to a
//! conservative character set that can never escape the lessons root.

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::{Result, SplatflowError};

/// Model variants the training toolkit accepts.
pub const KNOWN_MODEL_VARIANTS: [&str; 4] =
    ["splatfacto", "splatfacto-big", "splatfacto-w", "splatfacto-w-light"];

const MAX_SEGMENT_LEN: usize = 128;

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("segment pattern is a valid regex")
    })
}

/// Validates a value used as a single path segment.
///
/// # Errors
///
/// Returns [`SplatflowError::InvalidJob`] when the value is empty, too long,
/// or contains anything besides ASCII letters, digits, `.`, `_` and `-`
/// (a leading `.` is rejected as well).
pub fn validate_path_segment(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(SplatflowError::invalid_job(format!("{field} must not be empty")));
    }
    if value.len() > MAX_SEGMENT_LEN {
        return Err(SplatflowError::invalid_job(format!(
            "{field} exceeds {MAX_SEGMENT_LEN} characters"
        )));
    }
    if !segment_pattern().is_match(value) {
        return Err(SplatflowError::invalid_job(format!(
            "{field} '{value}' may only contain letters, digits, '.', '_' and '-'"
        )));
    }
    Ok(())
}

/// Validates the training model variant.
///
/// # Errors
///
/// Returns [`SplatflowError::InvalidJob`] for an unknown variant.
pub fn validate_model_variant(model: &str) -> Result<()> {
    if KNOWN_MODEL_VARIANTS.contains(&model) {
        Ok(())
    } else {
        Err(SplatflowError::invalid_job(format!(
            "unknown model variant '{model}', expected one of: {}",
            KNOWN_MODEL_VARIANTS.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_segments() {
        assert!(validate_path_segment("lesson_id", "42").is_ok());
        assert!(validate_path_segment("lesson_name", "Intro-to_3D.v2").is_ok());
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(validate_path_segment("lesson_name", "..").is_err());
        assert!(validate_path_segment("lesson_name", "a/b").is_err());
        assert!(validate_path_segment("lesson_name", ".hidden").is_err());
        assert!(validate_path_segment("lesson_name", "").is_err());
    }

    #[test]
    fn test_rejects_overlong_segment() {
        let long = "a".repeat(MAX_SEGMENT_LEN + 1);
        assert!(validate_path_segment("lesson_id", &long).is_err());
    }

    #[test]
    fn test_model_variants() {
        assert!(validate_model_variant("splatfacto-big").is_ok());
        let err = validate_model_variant("nerfacto").unwrap_err();
        assert!(err.to_string().contains("splatfacto-w-light"));
    }
}
