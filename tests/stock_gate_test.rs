mod common;

use assert_matches::assert_matches;
use checkout_api::errors::ServiceError;
use common::TestApp;
use rust_decimal_macros::dec;

#[tokio::test]
async fn validate_without_cart_is_not_found() {
    let app = TestApp::new().await;

    assert_matches!(
        app.state.services.stock.validate(21).await,
        Err(ServiceError::CartNotFound(_))
    );
}

#[tokio::test]
async fn validate_emptied_cart_is_empty() {
    let app = TestApp::new().await;
    let product = app.seed_product("Kettle", dec!(30), dec!(0), 3).await;
    let item = app
        .state
        .services
        .cart
        .add_item(21, product.id, 1)
        .await
        .unwrap();
    app.state.services.cart.remove_item(item.id, 21).await.unwrap();

    assert_matches!(
        app.state.services.stock.validate(21).await,
        Err(ServiceError::CartEmpty(_))
    );
}

#[tokio::test]
async fn validate_reports_each_shortfall() {
    let app = TestApp::new().await;
    let a = app.seed_product("Chair", dec!(40), dec!(0), 4).await;
    let b = app.seed_product("Desk", dec!(120), dec!(0), 1).await;
    let cart = app.state.services.cart.clone();
    cart.add_item(21, a.id, 10).await.unwrap();
    cart.add_item(21, b.id, 1).await.unwrap();

    let verdict = app.state.services.stock.validate(21).await.unwrap();

    assert!(!verdict.available);
    assert_eq!(verdict.total_products_in_cart, 2);
    assert_eq!(verdict.products_with_issues, 1);
    let shortfall = &verdict.shortfalls[0];
    assert_eq!(shortfall.product_id, a.id);
    assert_eq!(shortfall.product_name.as_deref(), Some("Chair"));
    assert_eq!(shortfall.requested, 10);
    assert_eq!(shortfall.available, 4);
    assert_eq!(shortfall.missing, 6);
}

#[tokio::test]
async fn validate_passes_when_stock_covers_cart() {
    let app = TestApp::new().await;
    let product = app.seed_product("Lamp", dec!(25), dec!(0), 2).await;
    app.state
        .services
        .cart
        .add_item(22, product.id, 2)
        .await
        .unwrap();

    let verdict = app.state.services.stock.validate(22).await.unwrap();

    assert!(verdict.available);
    assert!(verdict.shortfalls.is_empty());
    assert_eq!(verdict.total_products_in_cart, 1);
}

#[tokio::test]
async fn validate_has_no_side_effects() {
    let app = TestApp::new().await;
    let product = app.seed_product("Rug", dec!(60), dec!(10), 1).await;
    app.state
        .services
        .cart
        .add_item(23, product.id, 5)
        .await
        .unwrap();

    let before = serde_json::to_value(app.state.services.cart.get_summary(23).await.unwrap()).unwrap();
    app.state.services.stock.validate(23).await.unwrap();
    app.state.services.stock.validate(23).await.unwrap();
    let after = serde_json::to_value(app.state.services.cart.get_summary(23).await.unwrap()).unwrap();

    assert_eq!(before, after);
    let product = app
        .state
        .services
        .product_catalog
        .find_product(product.id)
        .await
        .unwrap();
    assert_eq!(product.available_quantity, 1);
}
