use crate::AppState;
use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Checkout API",
        version = "1.0.0",
        description = r#"
# Checkout API

Cart pricing, stock gating and payment initiation.

## Authentication

Every cart and payment endpoint requires a JWT issued by the identity
provider. The token's `user_role_id` claim identifies the cart owner:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Errors carry a stable machine readable `code`:

```json
{
  "error": "Bad Request",
  "code": "INVALID_EXPIRATION_DATE",
  "message": "Expiration date '13/25' must use MM/YY with month 01-12",
  "request_id": "7f6c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

A stock shortfall is not an error: `GET /cart/stock` answers 200 and
reports the shortfalls in its body.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Cart", description = "Cart and stock endpoints"),
        (name = "Payments", description = "Checkout and payment lookup endpoints")
    ),
    paths(
        // Cart
        crate::handlers::commerce::carts::add_to_cart,
        crate::handlers::commerce::carts::set_item_quantity,
        crate::handlers::commerce::carts::remove_cart_item,
        crate::handlers::commerce::carts::get_cart_summary,
        crate::handlers::commerce::carts::validate_stock,

        // Payments
        crate::handlers::payments::process_payment,
        crate::handlers::payments::get_payment,
    ),
    components(
        schemas(
            crate::handlers::commerce::carts::AddItemRequest,
            crate::handlers::commerce::carts::UpdateQuantityRequest,
            crate::handlers::commerce::carts::CartItemResponse,
            crate::services::commerce::CartSummary,
            crate::services::commerce::CartLine,
            crate::services::commerce::PriceCalculation,
            crate::services::commerce::StockVerdict,
            crate::services::commerce::Shortfall,
            crate::handlers::payments::CreatePaymentRequest,
            crate::services::payments::PaymentReceipt,
            crate::services::payments::PaymentDetails,
            crate::entities::payments::PaymentType,
            crate::entities::payments::PaymentStatus,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
