//! Request-level validation helpers for the ingest path.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

pub type ValidationResult = Result<(), ValidationError>;

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

/// Parses a decimal amount string. Amounts are financial: they stay in
/// fixed-point decimal form end to end, never a binary float.
pub fn parse_positive_amount(raw: &str) -> Result<BigDecimal, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::new("amount", "must not be empty"));
    }

    let amount = BigDecimal::from_str(raw)
        .map_err(|_| ValidationError::new("amount", "must be a decimal number"))?;

    if amount <= BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(amount)
}
