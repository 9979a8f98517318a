//! Ledger error types with HTTP status code mapping.
//!
//! [`LedgerError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "insufficient balance. Available: 425 SAR, Requested: 500 SAR",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                   |
/// |-----------|-----------------|-------------------------------|
/// | 1000–1999 | Validation/Auth | 400 / 401 / 403               |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict  |
/// | 3000–3999 | Server          | 500 Internal Server Error     |
/// | 4000–4999 | Ledger          | 422 Unprocessable Entity      |
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Inbound gateway payload is malformed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Caller identity is missing or unreadable.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the role or ownership for the operation.
    ///
    /// The message is deliberately generic so it does not reveal whether
    /// the target entity exists.
    #[error("access denied")]
    Forbidden,

    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (e.g. `"booking"`).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Operation is not valid in the entity's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Withdrawal exceeds the available earnings balance.
    #[error(
        "insufficient balance. Available: {} SAR, Requested: {} SAR",
        available.normalize(),
        requested.normalize()
    )]
    InsufficientBalance {
        /// Balance available at request time.
        available: Decimal,
        /// Amount the consultant asked for.
        requested: Decimal,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Shorthand for a [`LedgerError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidPayload(_) => 1002,
            Self::Unauthorized(_) => 1003,
            Self::Forbidden => 1004,
            Self::NotFound { .. } => 2001,
            Self::InvalidState(_) => 2002,
            Self::InsufficientBalance { .. } => 4001,
            Self::Persistence(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
