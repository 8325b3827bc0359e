//! Shared HTTP error body for Nova services.
//!
//! Every service renders its domain errors into [`ErrorResponse`] so clients
//! can branch on `error_type` / `code` without parsing the message text.

use serde::{Deserialize, Serialize};

/// Uniform API error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP reason phrase, e.g. "Bad Request"
    pub error: String,

    /// Human readable message. Never carries storage or driver detail.
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Coarse category, one of the [`error_types`] constants
    pub error_type: String,

    /// Stable machine code, one of the [`error_codes`] constants
    pub code: String,

    /// Request correlation id, when the caller sent or was assigned one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            trace_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

/// Reason phrase for the status codes services actually emit
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        503 => "Service Unavailable",
        500 => "Internal Server Error",
        _ => "Error",
    }
}

pub mod error_codes {
    // Authentication
    pub const TOKEN_MISSING: &str = "TOKEN_MISSING";
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";

    // Request validation
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const MISSING_FIELDS: &str = "MISSING_FIELDS";
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";

    // Messaging
    pub const SENDER_MISMATCH: &str = "SENDER_MISMATCH";

    // Devices
    pub const DEVICE_NOT_FOUND: &str = "DEVICE_NOT_FOUND";
    pub const DEVICE_OWNED_BY_OTHER_USER: &str = "DEVICE_OWNED_BY_OTHER_USER";

    // Database/System
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
}

pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const CONFLICT_ERROR: &str = "conflict_error";
    pub const SERVER_ERROR: &str = "server_error";
    pub const SERVICE_UNAVAILABLE_ERROR: &str = "service_unavailable_error";
}
