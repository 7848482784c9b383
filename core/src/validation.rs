//! Input validation.
//!
//! Validation is a stateless service injected into each workflow. Inputs
//! describe their own field rules through [`Validate`]; a [`Validator`]
//! decides which limits apply and turns the collected field errors into a
//! pass/fail result. Services treat any failure as
//! [`TicketError::InvalidInput`](crate::error::TicketError::InvalidInput)
//! and do no work.

use serde::Serialize;
use std::fmt;

/// A single field-level validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name as it appears on the wire
    pub field: &'static str,
    /// What is wrong with it
    pub message: String,
}

/// Collected field errors for one input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Empty error set.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Error set with exactly one entry.
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a failure for `field`.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Require a non-blank string no longer than `max_len` characters.
    pub fn require_text(&mut self, field: &'static str, value: &str, max_len: usize) {
        if value.trim().is_empty() {
            self.add(field, "is required");
        } else {
            self.limit_text(field, value, max_len);
        }
    }

    /// Reject strings longer than `max_len` characters.
    pub fn limit_text(&mut self, field: &'static str, value: &str, max_len: usize) {
        if value.chars().count() > max_len {
            self.add(field, format!("must be at most {max_len} characters"));
        }
    }

    /// Require a reference id to be present (positive).
    pub fn require_id(&mut self, field: &'static str, value: i64) {
        if value <= 0 {
            self.add(field, "is required");
        }
    }

    /// Require an optional value to be present.
    pub fn require_some<T>(&mut self, field: &'static str, value: Option<&T>) {
        if value.is_none() {
            self.add(field, "is required");
        }
    }

    /// Whether no failures were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Recorded failures, in the order they were found.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether `field` has at least one failure.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the collected errors when at least one was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Length limits applied by [`FieldValidator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLimits {
    /// Max characters in a ticket code
    pub ticket_code: usize,
    /// Max characters in a ticket description
    pub description: usize,
    /// Max characters in a comment
    pub comment: usize,
    /// Max characters in resolution notes
    pub resolution_notes: usize,
    /// Max characters in an attachment reference or URL
    pub attachment: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            ticket_code: 50,
            description: 2000,
            comment: 2000,
            resolution_notes: 2000,
            attachment: 500,
        }
    }
}

/// Field rules of an input struct.
pub trait Validate {
    /// Record every rule violation into `errors`.
    fn validate_fields(&self, limits: &FieldLimits, errors: &mut ValidationErrors);
}

/// Validation service passed explicitly to each workflow.
pub trait Validator: Send + Sync {
    /// Validate an input.
    ///
    /// # Errors
    ///
    /// Returns every field failure found.
    fn validate(&self, input: &dyn Validate) -> Result<(), ValidationErrors>;
}

/// Default validator: required fields plus configured length limits.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldValidator {
    limits: FieldLimits,
}

impl FieldValidator {
    /// Validator with the given limits.
    #[must_use]
    pub const fn new(limits: FieldLimits) -> Self {
        Self { limits }
    }

    /// Limits in force.
    #[must_use]
    pub const fn limits(&self) -> &FieldLimits {
        &self.limits
    }
}

impl Validator for FieldValidator {
    fn validate(&self, input: &dyn Validate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        input.validate_fields(&self.limits, &mut errors);
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named<'a>(&'a str);

    impl Validate for Named<'_> {
        fn validate_fields(&self, limits: &FieldLimits, errors: &mut ValidationErrors) {
            errors.require_text("name", self.0, limits.ticket_code);
        }
    }

    #[test]
    fn blank_text_is_missing() {
        let result = FieldValidator::default().validate(&Named("   "));
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.to_string(), "name: is required");
    }

    #[test]
    fn length_is_counted_in_chars() {
        let limits = FieldLimits {
            ticket_code: 3,
            ..FieldLimits::default()
        };
        let validator = FieldValidator::new(limits);
        assert!(validator.validate(&Named("äöü")).is_ok());
        let errors = validator.validate(&Named("äöüß")).unwrap_err();
        assert!(errors.has_field("name"));
    }

    #[test]
    fn ids_must_be_positive() {
        let mut errors = ValidationErrors::new();
        errors.require_id("cause_id", 0);
        errors.require_id("solution_id", -4);
        errors.require_id("ticket_id", 9);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.to_string(), "cause_id: is required; solution_id: is required");
    }

    #[test]
    fn empty_set_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
