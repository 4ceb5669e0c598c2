use validator::ValidationError;

/// Rejects values that are empty once surrounding whitespace is removed.
/// Length limits still apply to the raw value.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}
