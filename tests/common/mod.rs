#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use checkout_api::{
    auth::Claims,
    config::AppConfig,
    db,
    entities::{commerce::product, payments::Payment},
    events::{self, EventSender},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Helper harness for spinning up an application state backed by SQLite.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: Option<TempDir>,
}

fn test_config(database_url: String) -> AppConfig {
    AppConfig::new(
        database_url,
        TEST_JWT_SECRET.to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    )
}

impl TestApp {
    /// Construct a new test application with fresh in-memory database state.
    pub async fn new() -> Self {
        let mut cfg = test_config("sqlite::memory:".to_string());
        // A single connection keeps every query on the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        Self::with_config(cfg, None).await
    }

    /// Test application on a temporary database file with a multi-connection
    /// pool, so concurrent calls really overlap.
    pub async fn on_file() -> Self {
        let dir = TempDir::new().expect("create temp dir for test database");
        let path = dir.path().join("checkout.db");
        let mut cfg = test_config(format!("sqlite://{}?mode=rwc", path.display()));
        cfg.db_max_connections = 8;
        cfg.db_min_connections = 1;

        Self::with_config(cfg, Some(dir)).await
    }

    async fn with_config(cfg: AppConfig, db_dir: Option<TempDir>) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        let router = checkout_api::app(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Mint a bearer token for the given user-role.
    pub fn token_for(&self, user_role_id: i32) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: format!("user-{}", user_role_id),
            user_role_id,
            exp: (now + chrono::Duration::hours(1)).timestamp(),
            iat: Some(now.timestamp()),
            iss: None,
            aud: None,
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        )
        .expect("encode access token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for requests made as a given user-role.
    pub async fn request_as(
        &self,
        user_role_id: i32,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let token = self.token_for(user_role_id);
        self.request(method, uri, body, Some(&token)).await
    }

    /// Insert a catalog product directly.
    pub async fn seed_product(
        &self,
        name: &str,
        unit_price: Decimal,
        tax_percentage: Decimal,
        available_quantity: i32,
    ) -> product::Model {
        self.seed_product_with_status(name, unit_price, tax_percentage, available_quantity, true)
            .await
    }

    pub async fn seed_product_with_status(
        &self,
        name: &str,
        unit_price: Decimal,
        tax_percentage: Decimal,
        available_quantity: i32,
        is_active: bool,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            unit_price: Set(unit_price),
            tax_percentage: Set(tax_percentage),
            is_active: Set(is_active),
            available_quantity: Set(available_quantity),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
    }

    pub async fn payment_count(&self) -> u64 {
        Payment::find()
            .count(&*self.state.db)
            .await
            .expect("count payments")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Encode a card payload the way clients send it.
pub fn card_blob(card: Value) -> String {
    STANDARD.encode(card.to_string())
}

pub fn debit_card(number: &str) -> Value {
    serde_json::json!({
        "cardNumber": number,
        "cardHolderName": "Ana Perez",
        "expirationDate": "08/29",
        "cvv": "123",
        "paymentType": "debito"
    })
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
