//! Structured error types for audit runs and bulk imports.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Fatal collection errors
    SourceUnavailable,
    InvalidConfigShape,

    // Isolated per-entry errors
    SpecialCaseValidatorFailure,

    // Storage and import errors
    DatabaseError,
    ImportError,

    // Internal errors
    InternalError,
}

impl ErrorCode {
    /// Whether an error with this code aborts the run.
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorCode::SpecialCaseValidatorFailure)
    }
}

/// Structured error for audit runs.
#[derive(Debug, Error, Serialize)]
#[error("{message}")]
pub struct AuditError {
    pub code: ErrorCode,
    pub message: String,
    /// The resource (file, store, namespace) the error is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
            details: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn source_unavailable(resource: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::SourceUnavailable,
            format!("Source unavailable: {} ({})", resource, reason),
        )
        .with_resource(resource)
    }

    pub fn invalid_shape(namespace: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidConfigShape,
            format!("Invalid config shape in namespace '{}': {}", namespace, reason),
        )
        .with_resource(namespace)
    }

    pub fn validator_failure(key: &str, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::SpecialCaseValidatorFailure,
            format!("Validator for {} failed: {}", key, err),
        )
        .with_resource(key)
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn import(line: u64, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ImportError,
            format!("Import failed at line {}: {}", line, reason),
        )
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for AuditError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to AuditError first
        match err.downcast::<AuditError>() {
            Ok(audit_err) => audit_err,
            Err(err) => AuditError::internal(err),
        }
    }
}

impl From<rusqlite::Error> for AuditError {
    fn from(err: rusqlite::Error) -> Self {
        AuditError::database(err)
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unavailable_names_resource() {
        let err = AuditError::source_unavailable("config/baseline.yaml", "not found");
        assert_eq!(err.code, ErrorCode::SourceUnavailable);
        assert_eq!(err.resource.as_deref(), Some("config/baseline.yaml"));
        assert!(err.to_string().contains("config/baseline.yaml"));
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_code() {
        let original = AuditError::invalid_shape("Order", "expected a mapping");
        let wrapped: anyhow::Error = original.into();
        let back = AuditError::from(wrapped);
        assert_eq!(back.code, ErrorCode::InvalidConfigShape);
    }

    #[test]
    fn test_only_validator_failures_are_non_fatal() {
        assert!(ErrorCode::SourceUnavailable.is_fatal());
        assert!(ErrorCode::InvalidConfigShape.is_fatal());
        assert!(!ErrorCode::SpecialCaseValidatorFailure.is_fatal());
    }

    #[test]
    fn test_serializes_codes_screaming_snake() {
        let err = AuditError::source_unavailable("db", "locked");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "SOURCE_UNAVAILABLE");
        assert!(json.get("details").is_none());
    }
}
