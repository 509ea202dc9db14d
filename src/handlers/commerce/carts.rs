use crate::handlers::common::{no_content_response, success_response, validate_input};
use crate::{
    auth::AuthenticatedUser,
    entities::commerce::CartItemModel,
    errors::ServiceError,
    services::commerce::{CartSummary, StockVerdict},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart_summary))
        .route("/stock", get(validate_stock))
        .route("/items", post(add_to_cart))
        // PUT addresses a product, DELETE addresses a cart item
        .route("/items/:id", put(set_item_quantity).delete(remove_cart_item))
}

/// Add a product to the caller's active cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Cart line stored", body = crate::ApiResponse<CartItemResponse>),
        (status = 400, description = "Invalid quantity or inactive product", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let item = state
        .services
        .cart
        .add_item(user.user_role_id, payload.product_id, payload.quantity)
        .await?;

    Ok(success_response(CartItemResponse::from(item)))
}

/// Overwrite the quantity of a product in the caller's active cart
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Cart line stored", body = crate::ApiResponse<CartItemResponse>),
        (status = 400, description = "Invalid quantity or inactive product", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
async fn set_item_quantity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let item = state
        .services
        .cart
        .add_item(user.user_role_id, product_id, payload.quantity)
        .await?;

    Ok(success_response(CartItemResponse::from(item)))
}

/// Remove an item from the caller's active cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{item_id}",
    params(
        ("item_id" = Uuid, Path, description = "Cart item ID")
    ),
    responses(
        (status = 204, description = "Item removed"),
        (status = 403, description = "Item is not in an active cart of the caller", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .cart
        .remove_item(item_id, user.user_role_id)
        .await?;

    Ok(no_content_response())
}

/// Priced summary of the caller's active cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart summary", body = crate::ApiResponse<CartSummary>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
async fn get_cart_summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state.services.cart.get_summary(user.user_role_id).await?;
    Ok(success_response(summary))
}

/// Check the caller's active cart against inventory. Shortfalls are
/// reported in the body, never as an error status.
#[utoipa::path(
    get,
    path = "/api/v1/cart/stock",
    responses(
        (status = 200, description = "Stock verdict", body = crate::ApiResponse<StockVerdict>),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
        (status = 404, description = "No active cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
async fn validate_stock(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let verdict = state.services.stock.validate(user.user_role_id).await?;
    Ok(success_response(verdict))
}

// Request DTOs

// The lower quantity bound is checked by CartService::add_item
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(max = 10000))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    #[validate(range(max = 10000))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItemResponse {
    pub item_id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

impl From<CartItemModel> for CartItemResponse {
    fn from(item: CartItemModel) -> Self {
        Self {
            item_id: item.id,
            cart_id: item.cart_id,
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}
