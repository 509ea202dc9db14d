mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{card_blob, debit_card, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn cart_routes_require_a_token() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/cart", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response_json(response).await;
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn forged_token_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/cart", None, Some("not.a.jwt"))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn add_item_then_read_summary() {
    let app = TestApp::new().await;
    let product = app.seed_product("Notebook", dec!(12), dec!(0), 20).await;

    let response = app
        .request_as(
            51,
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 3 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["quantity"], 3);

    let response = app
        .request_as(
            51,
            Method::PUT,
            &format!("/api/v1/cart/items/{}", product.id),
            Some(json!({ "quantity": 4 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request_as(51, Method::GET, "/api/v1/cart", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total_items"], 4);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["items"][0]["product_name"], "Notebook");
}

#[tokio::test]
async fn zero_quantity_is_bad_request() {
    let app = TestApp::new().await;
    let product = app.seed_product("Notebook", dec!(12), dec!(0), 20).await;

    let response = app
        .request_as(
            52,
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 0 })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["code"], "INVALID_QUANTITY");
}

#[tokio::test]
async fn stock_shortfall_is_reported_with_ok_status() {
    let app = TestApp::new().await;
    let product = app.seed_product("Tent", dec!(150), dec!(0), 1).await;
    app.request_as(
        53,
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id, "quantity": 2 })),
    )
    .await;

    let response = app
        .request_as(53, Method::GET, "/api/v1/cart/stock", None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["available"], false);
    assert_eq!(body["data"]["shortfalls"][0]["missing"], 1);
}

#[tokio::test]
async fn stock_without_cart_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request_as(54, Method::GET, "/api/v1/cart/stock", None)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["code"], "CART_NOT_FOUND");
}

#[tokio::test]
async fn checkout_returns_created_and_payment_is_readable() {
    let app = TestApp::new().await;
    let product = app.seed_product("Boots", dec!(90), dec!(0), 5).await;
    app.request_as(
        55,
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id, "quantity": 1 })),
    )
    .await;

    let response = app
        .request_as(
            55,
            Method::POST,
            "/api/v1/payments",
            Some(json!({ "encrypted_card_data": card_blob(debit_card("1234-5678-1234-5678")) })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "Pending");
    let reference = body["data"]["reference_number"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request_as(55, Method::GET, &format!("/api/v1/payments/{}", reference), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["card_last_four"], "5678");

    let response = app
        .request_as(56, Method::GET, &format!("/api/v1/payments/{}", reference), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_expiry_maps_to_stable_error_code() {
    let app = TestApp::new().await;
    let product = app.seed_product("Boots", dec!(90), dec!(0), 5).await;
    app.request_as(
        57,
        Method::POST,
        "/api/v1/cart/items",
        Some(json!({ "product_id": product.id, "quantity": 1 })),
    )
    .await;
    let mut card = debit_card("1234567812345678");
    card["expirationDate"] = json!("13/25");

    let response = app
        .request_as(
            57,
            Method::POST,
            "/api/v1/payments",
            Some(json!({ "encrypted_card_data": card_blob(card) })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["code"], "INVALID_EXPIRATION_DATE");
    assert!(body["timestamp"].is_string());
    assert_eq!(app.payment_count().await, 0);
}

#[tokio::test]
async fn delete_item_returns_no_content() {
    let app = TestApp::new().await;
    let product = app.seed_product("Scarf", dec!(15), dec!(0), 5).await;
    let response = app
        .request_as(
            58,
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": 1 })),
        )
        .await;
    let body = response_json(response).await;
    let item_id = body["data"]["item_id"].as_str().unwrap().to_string();

    let response = app
        .request_as(59, Method::DELETE, &format!("/api/v1/cart/items/{}", item_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request_as(58, Method::DELETE, &format!("/api/v1/cart/items/{}", item_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn request_id_header_is_echoed() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header("x-request-id", "checkout-test-1")
        .body(Body::empty())
        .unwrap();

    let response = checkout_api::app(app.state.clone())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("checkout-test-1")
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["info"]["title"], "Checkout API");
    assert!(body["paths"]["/api/v1/cart/stock"].is_object());
}
