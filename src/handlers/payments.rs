use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::{
    common::{created_response, success_response, validate_input},
    AppState,
};
use crate::services::payments::{PaymentDetails, PaymentReceipt};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "cart_id": "550e8400-e29b-41d4-a716-446655440000",
    "encrypted_card_data": "eyJjYXJkTnVtYmVyIjoiNDExMTExMTExMTExMTExMSJ9"
}))]
pub struct CreatePaymentRequest {
    /// Cart to check out; defaults to the caller's active cart
    pub cart_id: Option<Uuid>,

    /// Encoded card payload
    #[validate(length(min = 1, max = 8192))]
    pub encrypted_card_data: String,
}

/// Check out a cart and create a pending payment
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment created", body = crate::ApiResponse<PaymentReceipt>,
            headers(
                ("X-Request-Id" = String, description = "Unique request identifier"),
            )
        ),
        (status = 400, description = "Invalid card data or empty cart", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse),
        (status = 403, description = "Cart belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock or cart already checked out", body = crate::errors::ErrorResponse),
        (status = 500, description = "Reference generation failed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
async fn process_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&request)?;

    let receipt = state
        .services
        .payments
        .process_payment(user.user_role_id, request.cart_id, &request.encrypted_card_data)
        .await?;

    Ok(created_response(receipt))
}

/// Get a payment by its reference number
#[utoipa::path(
    get,
    path = "/api/v1/payments/{reference}",
    params(
        ("reference" = String, Path, description = "Payment reference number")
    ),
    responses(
        (status = 200, description = "Payment details", body = crate::ApiResponse<PaymentDetails>),
        (status = 403, description = "Payment belongs to another user", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
async fn get_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state
        .services
        .payments
        .get_payment_by_reference(&reference, user.user_role_id)
        .await?;

    Ok(success_response(payment))
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(process_payment))
        .route("/:reference", get(get_payment))
}
