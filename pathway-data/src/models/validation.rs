//! Validation error types

use std::fmt;

/// Validation error for domain models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },
    /// Number below the accepted range
    Negative { field: &'static str, value: i64 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::Negative { field, value } => {
                write!(f, "{} must not be negative, got {}", field, value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
