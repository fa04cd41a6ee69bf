//! Configuration validation for Pie Planner.
//!
//! Checks that configured values are present and within valid ranges
//! before any front end acts on them.

use thiserror::Error;

use crate::config::{Config, ImportConfig};

/// Accepted values for `log_level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Accepted values for `log_format`.
pub const LOG_FORMATS: &[&str] = &["pretty", "json"];

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Validate for ImportConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.header_markers.is_empty() {
            return Err(ValidationError::MissingField {
                field: "import.headerMarkers".into(),
            });
        }
        if self.header_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(ValidationError::InvalidValue {
                field: "import.headerMarkers".into(),
                reason: "markers must not be blank".into(),
            });
        }
        Ok(())
    }
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(ValidationError::InvalidValue {
                field: "logLevel".into(),
                reason: format!("'{}' is not one of {:?}", self.log_level, LOG_LEVELS),
            });
        }

        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            errors.push(ValidationError::InvalidValue {
                field: "logFormat".into(),
                reason: format!("'{}' is not one of {:?}", self.log_format, LOG_FORMATS),
            });
        }

        let amount = self.default_investment_amount;
        if !amount.is_finite() || amount < 0.0 {
            errors.push(ValidationError::InvalidValue {
                field: "defaultInvestmentAmount".into(),
                reason: format!("{amount} must be a finite, non-negative number"),
            });
        }

        if let Err(e) = self.import.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}
