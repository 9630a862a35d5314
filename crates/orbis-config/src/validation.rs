//! Range checks for renderer configurations.
//!
//! [`RendererConfig::validate`](crate::RendererConfig::validate) collects
//! every violation instead of stopping at the first one, so a broken file
//! can be fixed in one pass.

use thiserror::Error;

/// A configuration value outside its valid range.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A count or rate that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// Value out of range.
    #[error("{field} value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Dotted name of the field, e.g. `renderer.lock_distance`.
        field: &'static str,
        /// The value that was out of range.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// Unsupported choice for an enumerated setting.
    #[error("unsupported {field} '{value}'")]
    Unsupported {
        /// Dotted name of the field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Accumulates violations found while walking a configuration.
#[derive(Debug, Default)]
pub(crate) struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub(crate) fn positive(&mut self, field: &'static str, value: usize) {
        if value == 0 {
            self.errors.push(ValidationError::Zero(field));
        }
    }

    pub(crate) fn in_range(&mut self, field: &'static str, value: f64, min: f64, max: f64) {
        // NaN fails both comparisons
        if !(value >= min && value <= max) {
            self.errors.push(ValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            });
        }
    }

    pub(crate) fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub(crate) fn finish(mut self) -> ValidationResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ValidationError::Multiple(self.errors)),
        }
    }
}
