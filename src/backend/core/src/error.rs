//! Error handling for Sift Core.
//!
//! This module provides:
//! - Comprehensive error types with context and chaining
//! - HTTP status code mapping for API responses
//! - Error codes for machine-readable API responses
//! - User-friendly messages vs detailed internal messages
//! - Error logging with tracing integration
//! - Metrics integration for error tracking
//!
//! # Usage
//!
//! ```rust,ignore
//! use sift_core::error::{SiftError, Result, ErrorContext};
//!
//! fn my_function() -> Result<()> {
//!     some_operation()
//!         .context("Failed to perform operation")?;
//!     Ok(())
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Sift operations.
pub type Result<T> = std::result::Result<T, SiftError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Document Errors (1000-1099)
    DocumentNotFound,
    FileTooLarge,
    UnsupportedFileType,
    EmptyUpload,
    StorageFailed,

    // Evaluation Errors (1100-1199)
    EvaluationNotFound,
    EvaluationFailed,
    InvalidEvaluationState,

    // Rate Limiting Errors (1200-1299)
    RateLimitConfigInvalid,
    RateLimitStoreUnavailable,

    // Database Errors (2000-2099)
    DatabaseError,
    DatabaseConnectionFailed,
    DatabaseQueryFailed,
    RecordNotFound,
    DuplicateRecord,

    // Cache Errors (2100-2199)
    CacheError,
    CacheConnectionFailed,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,
    InvalidJson,

    // Queue Errors (2300-2399)
    QueueError,
    QueueUnavailable,

    // Validation Errors (4100-4199)
    ValidationError,
    InvalidInput,
    MissingRequiredField,
    InvalidFormat,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
    UnknownError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            // Document Errors
            Self::DocumentNotFound => 1000,
            Self::FileTooLarge => 1001,
            Self::UnsupportedFileType => 1002,
            Self::EmptyUpload => 1003,
            Self::StorageFailed => 1004,

            // Evaluation Errors
            Self::EvaluationNotFound => 1100,
            Self::EvaluationFailed => 1101,
            Self::InvalidEvaluationState => 1102,

            // Rate Limiting Errors
            Self::RateLimitConfigInvalid => 1200,
            Self::RateLimitStoreUnavailable => 1201,

            // Database Errors
            Self::DatabaseError => 2000,
            Self::DatabaseConnectionFailed => 2001,
            Self::DatabaseQueryFailed => 2002,
            Self::RecordNotFound => 2003,
            Self::DuplicateRecord => 2004,

            // Cache Errors
            Self::CacheError => 2100,
            Self::CacheConnectionFailed => 2101,

            // Serialization Errors
            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,
            Self::InvalidJson => 2202,

            // Queue Errors
            Self::QueueError => 2300,
            Self::QueueUnavailable => 2301,

            // Validation Errors
            Self::ValidationError => 4100,
            Self::InvalidInput => 4101,
            Self::MissingRequiredField => 4102,
            Self::InvalidFormat => 4103,

            // Configuration Errors
            Self::ConfigurationError => 5000,
            Self::MissingConfiguration => 5001,
            Self::InvalidConfiguration => 5002,

            // Internal Errors
            Self::InternalError => 9000,
            Self::UnknownError => 9099,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            // Not Found (404)
            Self::DocumentNotFound | Self::EvaluationNotFound | Self::RecordNotFound => {
                StatusCode::NOT_FOUND
            }

            // Payload Too Large (413)
            Self::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            // Unsupported Media Type (415)
            Self::UnsupportedFileType => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // Conflict (409)
            Self::DuplicateRecord | Self::InvalidEvaluationState => StatusCode::CONFLICT,

            // Unprocessable Entity (422)
            Self::EmptyUpload
            | Self::ValidationError
            | Self::InvalidInput
            | Self::MissingRequiredField
            | Self::InvalidFormat => StatusCode::UNPROCESSABLE_ENTITY,

            // Service Unavailable (503)
            Self::RateLimitStoreUnavailable
            | Self::DatabaseConnectionFailed
            | Self::CacheConnectionFailed
            | Self::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            // Internal Server Error (500)
            Self::StorageFailed
            | Self::EvaluationFailed
            | Self::RateLimitConfigInvalid
            | Self::DatabaseError
            | Self::DatabaseQueryFailed
            | Self::CacheError
            | Self::SerializationError
            | Self::DeserializationError
            | Self::InvalidJson
            | Self::QueueError
            | Self::ConfigurationError
            | Self::MissingConfiguration
            | Self::InvalidConfiguration
            | Self::InternalError
            | Self::UnknownError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseConnectionFailed
                | Self::DatabaseQueryFailed
                | Self::CacheConnectionFailed
                | Self::CacheError
                | Self::QueueUnavailable
                | Self::RateLimitStoreUnavailable
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "document",
            1100..=1199 => "evaluation",
            1200..=1299 => "rate_limit",
            2000..=2099 => "database",
            2100..=2199 => "cache",
            2200..=2299 => "serialization",
            2300..=2399 => "queue",
            4100..=4199 => "validation",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging and alerting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// User errors (bad input, validation failures)
    Low,
    /// Operational issues (queue backpressure, degraded stores)
    Medium,
    /// System errors (database failures, critical bugs)
    High,
    /// Critical errors requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            // Low severity - user errors
            ErrorCode::DocumentNotFound
            | ErrorCode::EvaluationNotFound
            | ErrorCode::RecordNotFound
            | ErrorCode::FileTooLarge
            | ErrorCode::UnsupportedFileType
            | ErrorCode::EmptyUpload
            | ErrorCode::DuplicateRecord
            | ErrorCode::InvalidEvaluationState
            | ErrorCode::ValidationError
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFormat => Self::Low,

            // Medium severity - operational
            ErrorCode::EvaluationFailed
            | ErrorCode::RateLimitStoreUnavailable
            | ErrorCode::QueueError
            | ErrorCode::QueueUnavailable => Self::Medium,

            // High severity - system errors
            ErrorCode::StorageFailed
            | ErrorCode::RateLimitConfigInvalid
            | ErrorCode::DatabaseError
            | ErrorCode::DatabaseQueryFailed
            | ErrorCode::CacheError
            | ErrorCode::SerializationError
            | ErrorCode::DeserializationError
            | ErrorCode::InvalidJson
            | ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration => Self::High,

            // Critical severity
            ErrorCode::DatabaseConnectionFailed
            | ErrorCode::CacheConnectionFailed
            | ErrorCode::InternalError
            | ErrorCode::UnknownError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (document, evaluation, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Retry information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Sift Core.
///
/// This error type supports:
/// - Structured error codes for API responses
/// - Error chaining with context
/// - User-friendly vs internal messages
/// - HTTP status code mapping
/// - Metrics integration
#[derive(Error, Debug)]
pub struct SiftError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for SiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl SiftError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An internal error occurred",
            message,
        )
    }

    /// Create a not found error.
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        let code = match entity_type.as_str() {
            "document" => ErrorCode::DocumentNotFound,
            "evaluation" => ErrorCode::EvaluationNotFound,
            _ => ErrorCode::RecordNotFound,
        };
        Self::new(code, format!("{} not found: {}", entity_type, entity_id))
            .with_details(ErrorDetails::new().with_entity(&entity_type, &entity_id))
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message.into())
    }

    /// Create a file-too-large error for a rejected upload.
    pub fn file_too_large(size: u64, max_size: u64) -> Self {
        Self::new(
            ErrorCode::FileTooLarge,
            format!(
                "File size {} bytes exceeds the maximum of {} bytes",
                size, max_size
            ),
        )
        .with_context("size", size)
        .with_context("max_size", max_size)
    }

    /// Create an unsupported-file-type error for a rejected upload.
    pub fn unsupported_file_type(got: impl Into<String>) -> Self {
        let got = got.into();
        Self::new(
            ErrorCode::UnsupportedFileType,
            format!("Unsupported file type: {}. Only PDF files are accepted", got),
        )
        .with_context("content_type", &got)
    }

    /// Create an error for a rate-limit store that is down while the
    /// limiter is configured fail-closed.
    pub fn rate_limit_store_unavailable(internal: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::RateLimitStoreUnavailable,
            "Service temporarily unavailable",
            internal,
        )
    }

    /// Create a queue error.
    pub fn queue(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::QueueError, message.into())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metrics
    // ─────────────────────────────────────────────────────────────────────────

    /// Record error metrics.
    fn record_metrics(&self) {
        counter!(
            "sift_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
            "retryable" => self.is_retryable().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Whether the request was successful (always false for errors)
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code
    pub numeric_code: u32,

    /// User-friendly error message
    pub message: String,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&SiftError> for ErrorResponse {
    fn from(error: &SiftError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.context.is_empty()
                    && error.details.entity_id.is_none()
                    && error.details.retry_after_secs.is_none()
                {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for SiftError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| SiftError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| SiftError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| SiftError::new(ErrorCode::RecordNotFound, message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| SiftError::new(code, "Resource not found"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<sqlx::Error> for SiftError {
    fn from(error: sqlx::Error) -> Self {
        let (code, user_msg) = match &error {
            sqlx::Error::RowNotFound => (
                ErrorCode::RecordNotFound,
                "The requested record was not found",
            ),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("unique") || constraint.contains("pkey") {
                        return Self::with_internal(
                            ErrorCode::DuplicateRecord,
                            "A record with this identifier already exists",
                            format!("Constraint violation: {}", constraint),
                        )
                        .with_source(error);
                    }
                }
                (ErrorCode::DatabaseQueryFailed, "A database error occurred")
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => (
                ErrorCode::DatabaseConnectionFailed,
                "Unable to connect to the database",
            ),
            _ => (ErrorCode::DatabaseError, "A database error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<redis::RedisError> for SiftError {
    fn from(error: redis::RedisError) -> Self {
        let (code, user_msg) = if error.is_connection_refusal() || error.is_connection_dropped() {
            (
                ErrorCode::CacheConnectionFailed,
                "Unable to connect to cache",
            )
        } else if error.is_timeout() {
            (ErrorCode::CacheError, "Cache operation timed out")
        } else {
            (ErrorCode::CacheError, "A cache error occurred")
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for SiftError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() {
            ErrorCode::DeserializationError
        } else if error.is_eof() {
            ErrorCode::InvalidJson
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string())
            .with_source(error)
    }
}

impl From<std::io::Error> for SiftError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, user_msg) = match error.kind() {
            ErrorKind::NotFound => (ErrorCode::RecordNotFound, "File or resource not found"),
            ErrorKind::PermissionDenied => (ErrorCode::StorageFailed, "Permission denied"),
            _ => (ErrorCode::StorageFailed, "An I/O error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<anyhow::Error> for SiftError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<SiftError>() {
            Ok(sift_error) => sift_error,
            Err(error) => Self::with_internal(
                ErrorCode::InternalError,
                "An internal error occurred",
                error.to_string(),
            ),
        }
    }
}

impl From<config::ConfigError> for SiftError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (
                ErrorCode::ConfigurationError,
                "Configuration error occurred",
            ),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for SiftError {
    fn from(error: axum::extract::multipart::MultipartError) -> Self {
        Self::with_internal(
            ErrorCode::InvalidInput,
            "Failed to read multipart upload",
            error.to_string(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(
            ErrorCode::DocumentNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::FileTooLarge.http_status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ErrorCode::UnsupportedFileType.http_status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ErrorCode::RateLimitStoreUnavailable.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_code_is_retryable() {
        assert!(ErrorCode::DatabaseConnectionFailed.is_retryable());
        assert!(ErrorCode::RateLimitStoreUnavailable.is_retryable());
        assert!(!ErrorCode::ValidationError.is_retryable());
        assert!(!ErrorCode::DocumentNotFound.is_retryable());
    }

    #[test]
    fn test_not_found_picks_domain_code() {
        let error = SiftError::not_found("document", uuid::Uuid::new_v4().to_string());
        assert_eq!(error.code(), ErrorCode::DocumentNotFound);
        assert_eq!(error.http_status(), StatusCode::NOT_FOUND);

        let error = SiftError::not_found("evaluation", "abc");
        assert_eq!(error.code(), ErrorCode::EvaluationNotFound);
    }

    #[test]
    fn test_error_context() {
        let error = SiftError::new(ErrorCode::ValidationError, "Invalid input")
            .with_context("field", "job_title")
            .with_context("reason", "empty");

        assert!(error.details().context.contains_key("field"));
        assert!(error.details().context.contains_key("reason"));
    }

    #[test]
    fn test_file_too_large_details() {
        let error = SiftError::file_too_large(20_000_000, 10_485_760);
        assert_eq!(error.code(), ErrorCode::FileTooLarge);
        assert!(error.details().context.contains_key("max_size"));
    }

    #[test]
    fn test_error_response_serialization() {
        let error = SiftError::validation("job_title must not be empty");
        let response = ErrorResponse::from(&error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("VALIDATION_ERROR"));
        assert!(json.contains("job_title must not be empty"));
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::ValidationError),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::QueueError),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::DatabaseQueryFailed),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::DatabaseConnectionFailed),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_error_display() {
        let error = SiftError::with_internal(
            ErrorCode::DatabaseError,
            "Database connection failed",
            "Connection refused: localhost:5432",
        );

        let display = format!("{}", error);
        assert!(display.contains("DatabaseError"));
        assert!(display.contains("Database connection failed"));
        assert!(display.contains("Connection refused"));
    }
}
