use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Standard JSON error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Bad Request", "Payment Required")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Error taxonomy for the checkout flow. Cart and gateway layers return typed
/// failures for expected conditions; the orchestrator is the only layer that
/// runs multi-step transactions and it converts any mid-flight failure into
/// exactly one of these after rolling back.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart total {0} is not payable")]
    InvalidTotal(Decimal),

    #[error("Payment reference is required")]
    MissingReference,

    #[error("Payment initialization failed: {0}")]
    GatewayInit(String),

    #[error("Payment verification unavailable: {0}")]
    VerificationUnavailable(String),

    #[error("Payment was not successful (gateway status: {0})")]
    PaymentNotSuccessful(String),

    #[error("Amount mismatch: expected {expected}, paid {paid}")]
    AmountMismatch { expected: Decimal, paid: Decimal },

    #[error("Order could not be persisted: {0}")]
    OrderPersistence(String),

    #[error("Duplicate payment reference: {0}")]
    DuplicateReference(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::EmptyCart
            | Self::InvalidTotal(_)
            | Self::MissingReference
            | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::AuthError(_) => StatusCode::UNAUTHORIZED,
            Self::GatewayInit(_) | Self::VerificationUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::PaymentNotSuccessful(_) | Self::AmountMismatch { .. } => {
                StatusCode::PAYMENT_REQUIRED
            }
            Self::OrderPersistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DuplicateReference(_) | Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// text so storage and gateway internals never reach the client.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::OrderPersistence(_) => {
                "Order could not be persisted; no charge was recorded".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}
