use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "code": "CART_NOT_FOUND",
    "message": "Cart not found: no active cart for user role 42",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Stable machine-readable error code clients can branch on
    #[schema(example = "CART_NOT_FOUND")]
    pub code: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details (validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

/// Failure taxonomy shared by every checkout operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Unauthorized,
    Conflict,
    BusinessRuleViolation,
    SystemFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Cart not found: {0}")]
    CartNotFound(String),

    #[error("Cart is empty: {0}")]
    CartEmpty(String),

    #[error("Cart is not active: {0}")]
    CartNotActive(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Product is inactive: {0}")]
    ProductInactive(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Invalid card number: {0}")]
    InvalidCardNumber(String),

    #[error("Invalid card data: {0}")]
    InvalidCardData(String),

    #[error("Invalid payment type: {0}")]
    InvalidPaymentType(String),

    #[error("Invalid expiration date: {0}")]
    InvalidExpirationDate(String),

    #[error("Malformed card payload: {0}")]
    DecodeError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Could not generate a unique payment reference after {0} attempts")]
    ReferenceGenerationFailed(u32),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CartNotFound(_) | Self::ProductNotFound(_) | Self::PaymentNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::InvalidQuantity(_)
            | Self::ProductInactive(_)
            | Self::InvalidCardNumber(_)
            | Self::InvalidCardData(_)
            | Self::InvalidPaymentType(_)
            | Self::InvalidExpirationDate(_)
            | Self::DecodeError(_)
            | Self::CartEmpty(_)
            | Self::ValidationError(_) => ErrorKind::InvalidInput,
            Self::Unauthorized(_) | Self::Unauthenticated(_) => ErrorKind::Unauthorized,
            Self::Conflict(_) | Self::CartNotActive(_) => ErrorKind::Conflict,
            Self::InsufficientStock(_) => ErrorKind::BusinessRuleViolation,
            Self::ReferenceGenerationFailed(_)
            | Self::DatabaseError(_)
            | Self::InternalError(_) => ErrorKind::SystemFailure,
        }
    }

    /// Stable machine-readable code carried on every error response.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CartNotFound(_) => "CART_NOT_FOUND",
            Self::CartEmpty(_) => "CART_EMPTY",
            Self::CartNotActive(_) => "CART_NOT_ACTIVE",
            Self::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            Self::ProductInactive(_) => "PRODUCT_INACTIVE",
            Self::InvalidQuantity(_) => "INVALID_QUANTITY",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::InvalidCardNumber(_) => "INVALID_CARD_NUMBER",
            Self::InvalidCardData(_) => "INVALID_CARD_DATA",
            Self::InvalidPaymentType(_) => "INVALID_PAYMENT_TYPE",
            Self::InvalidExpirationDate(_) => "INVALID_EXPIRATION_DATE",
            Self::DecodeError(_) => "DECODE_ERROR",
            Self::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            Self::Conflict(_) => "CONFLICT",
            Self::ReferenceGenerationFailed(_) => "REFERENCE_GENERATION_FAILED",
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        if let Self::Unauthenticated(_) = self {
            return StatusCode::UNAUTHORIZED;
        }
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::Conflict | ErrorKind::BusinessRuleViolation => StatusCode::CONFLICT,
            ErrorKind::SystemFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::DecodeError(_) => "Card payload could not be decoded".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self.kind() {
            ErrorKind::SystemFailure => tracing::error!(code = self.code(), error = %self, "request failed"),
            _ => tracing::debug!(code = self.code(), error = %self, "request rejected"),
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            code: self.code().to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn service_error_response_includes_request_id_and_code() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::CartNotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.code, "CART_NOT_FOUND");
    }

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::CartNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InvalidQuantity("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidExpirationDate("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthorized("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Unauthenticated("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::InsufficientStock("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::CartNotActive("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ReferenceGenerationFailed(5).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn reference_exhaustion_is_a_system_failure() {
        assert_eq!(
            ServiceError::ReferenceGenerationFailed(5).kind(),
            ErrorKind::SystemFailure
        );
        assert_eq!(
            ServiceError::ReferenceGenerationFailed(5).code(),
            "REFERENCE_GENERATION_FAILED"
        );
    }

    #[test]
    fn service_error_response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("SELECT * FROM carts".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::InternalError("stack".into()).response_message(),
            "Internal server error"
        );

        assert_eq!(
            ServiceError::CartEmpty("cart has no items".into()).response_message(),
            "Cart is empty: cart has no items"
        );
    }
}
