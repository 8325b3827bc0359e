use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use error_types::{error_codes, error_types as kinds, reason_phrase, ErrorResponse};
use thiserror::Error;

use crate::store::StoreError;
use db_pool::env::EnvError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    MissingFields(String),

    #[error("{0}")]
    UserNotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    DeviceNotFound(String),

    #[error("{0}")]
    DeviceConflict(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<EnvError> for AppError {
    fn from(e: EnvError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Invalid(msg) => AppError::BadRequest(msg.to_string()),
            StoreError::UnknownUser => AppError::UserNotFound("user does not exist".into()),
            StoreError::DeviceOwnedByOtherUser => {
                AppError::DeviceConflict("device is registered to another user".into())
            }
            StoreError::Database(db) => AppError::Database(db.to_string()),
        }
    }
}

impl AppError {
    fn kind_and_code(&self) -> (&'static str, &'static str) {
        match self {
            AppError::BadRequest(_) => (kinds::VALIDATION_ERROR, error_codes::INVALID_REQUEST),
            AppError::MissingFields(_) => (kinds::VALIDATION_ERROR, error_codes::MISSING_FIELDS),
            AppError::UserNotFound(_) => (kinds::VALIDATION_ERROR, error_codes::USER_NOT_FOUND),
            AppError::Forbidden(_) => (kinds::AUTHORIZATION_ERROR, error_codes::SENDER_MISMATCH),
            AppError::DeviceNotFound(_) => (kinds::NOT_FOUND_ERROR, error_codes::DEVICE_NOT_FOUND),
            AppError::DeviceConflict(_) => (
                kinds::CONFLICT_ERROR,
                error_codes::DEVICE_OWNED_BY_OTHER_USER,
            ),
            AppError::ServiceUnavailable(_) => (
                kinds::SERVICE_UNAVAILABLE_ERROR,
                error_codes::SERVICE_UNAVAILABLE,
            ),
            AppError::Database(_) => (kinds::SERVER_ERROR, error_codes::DATABASE_ERROR),
            AppError::Config(_) | AppError::StartServer(_) => {
                (kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Text safe to show to callers. Server-side failures are opaque.
    fn public_message(&self) -> String {
        match self {
            AppError::BadRequest(_)
            | AppError::MissingFields(_)
            | AppError::UserNotFound(_)
            | AppError::Forbidden(_)
            | AppError::DeviceNotFound(_)
            | AppError::DeviceConflict(_) => self.to_string(),
            AppError::ServiceUnavailable(_) => "service unavailable".to_string(),
            AppError::Database(_) | AppError::Config(_) | AppError::StartServer(_) => {
                "internal server error".to_string()
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::MissingFields(_) | AppError::UserNotFound(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DeviceConflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Config(_) | AppError::StartServer(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let (kind, code) = self.kind_and_code();
        let body = ErrorResponse::new(
            reason_phrase(status.as_u16()),
            &self.public_message(),
            status.as_u16(),
            kind,
            code,
        );
        HttpResponse::build(status).json(body)
    }
}
