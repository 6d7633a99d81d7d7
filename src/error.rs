//! Cart error types with HTTP status code mapping.
//!
//! [`CartError`] is the central error type of the crate. Each variant maps to
//! a numeric code and an HTTP status, and renders as a structured JSON error
//! response when returned from a handler.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: invalid price for product 42",
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

/// Crate-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category   | HTTP Status               |
/// |-----------|------------|---------------------------|
/// | 1000–1999 | Validation | 400 Bad Request           |
/// | 3000–3999 | Server     | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A product id was empty.
    #[error("invalid product id: {0:?}")]
    InvalidProductId(String),

    /// The key-value backend failed to read or write.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Cart contents could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cart was requested outside of a provider scope.
    #[error("use_cart must be used within a CartProvider")]
    OutsideProvider,

    /// A configuration value was present but unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A background task backing a request failed to complete.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CartError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidProductId(_) => 1002,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Serialization(_) => 3002,
            Self::OutsideProvider => 3003,
            Self::Config(_) => 3004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidProductId(_) => StatusCode::BAD_REQUEST,
            Self::Persistence(_)
            | Self::Serialization(_)
            | Self::OutsideProvider
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds the JSON body for this error.
    #[must_use]
    pub fn to_response_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        }
    }
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<std::io::Error> for CartError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Body extraction failures (malformed JSON, missing fields, wrong content
/// type) surface as validation errors.
impl From<JsonRejection> for CartError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for CartError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = axum::Json(self.to_response_body()).into_response();
        *response.status_mut() = status;
        response
    }
}
