//! Lifecycle service configuration.

use crate::validation::FieldLimits;
use std::time::Duration;

/// Configuration shared by the lifecycle, resolution and history services.
///
/// # Example
///
/// ```
/// use helpdesk_core::config::LifecycleConfig;
/// use std::time::Duration;
///
/// let config = LifecycleConfig::new()
///     .with_operation_timeout(Duration::from_secs(5))
///     .with_max_description_len(500);
///
/// assert_eq!(config.operation_timeout, Duration::from_secs(5));
/// assert_eq!(config.field_limits().description, 500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Deadline for one operation, transaction included
    pub operation_timeout: Duration,

    /// Maximum ticket code length in characters
    pub max_ticket_code_len: usize,

    /// Maximum description length in characters
    pub max_description_len: usize,

    /// Maximum comment length in characters
    pub max_comment_len: usize,

    /// Maximum resolution notes length in characters
    pub max_resolution_notes_len: usize,

    /// Maximum attachment reference / URL length in characters
    pub max_attachment_len: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        let limits = FieldLimits::default();
        Self {
            operation_timeout: Duration::from_secs(30),
            max_ticket_code_len: limits.ticket_code,
            max_description_len: limits.description,
            max_comment_len: limits.comment,
            max_resolution_notes_len: limits.resolution_notes,
            max_attachment_len: limits.attachment,
        }
    }
}

impl LifecycleConfig {
    /// Create configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-operation deadline.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the maximum ticket code length.
    #[must_use]
    pub const fn with_max_ticket_code_len(mut self, len: usize) -> Self {
        self.max_ticket_code_len = len;
        self
    }

    /// Set the maximum description length.
    #[must_use]
    pub const fn with_max_description_len(mut self, len: usize) -> Self {
        self.max_description_len = len;
        self
    }

    /// Set the maximum comment length.
    #[must_use]
    pub const fn with_max_comment_len(mut self, len: usize) -> Self {
        self.max_comment_len = len;
        self
    }

    /// Set the maximum resolution notes length.
    #[must_use]
    pub const fn with_max_resolution_notes_len(mut self, len: usize) -> Self {
        self.max_resolution_notes_len = len;
        self
    }

    /// Set the maximum attachment length.
    #[must_use]
    pub const fn with_max_attachment_len(mut self, len: usize) -> Self {
        self.max_attachment_len = len;
        self
    }

    /// Length limits for the default [`FieldValidator`](crate::validation::FieldValidator).
    #[must_use]
    pub const fn field_limits(&self) -> FieldLimits {
        FieldLimits {
            ticket_code: self.max_ticket_code_len,
            description: self.max_description_len,
            comment: self.max_comment_len,
            resolution_notes: self.max_resolution_notes_len,
            attachment: self.max_attachment_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.operation_timeout, Duration::from_secs(30));
        assert_eq!(config.max_ticket_code_len, 50);
        assert_eq!(config.max_description_len, 2000);
        assert_eq!(config.max_comment_len, 2000);
        assert_eq!(config.max_resolution_notes_len, 2000);
        assert_eq!(config.field_limits(), FieldLimits::default());
    }

    #[test]
    fn builder_overrides() {
        let config = LifecycleConfig::new()
            .with_max_ticket_code_len(8)
            .with_max_comment_len(10)
            .with_max_resolution_notes_len(12)
            .with_max_attachment_len(14);
        let limits = config.field_limits();
        assert_eq!(limits.ticket_code, 8);
        assert_eq!(limits.comment, 10);
        assert_eq!(limits.resolution_notes, 12);
        assert_eq!(limits.attachment, 14);
    }
}
