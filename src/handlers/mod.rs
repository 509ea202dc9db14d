pub mod commerce;
pub mod common;
pub mod payments;

use crate::events::EventSender;
use crate::services::{CartService, PaymentService, ProductCatalogService, StockService};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub product_catalog: Arc<ProductCatalogService>,
    pub cart: Arc<CartService>,
    pub stock: Arc<StockService>,
    pub payments: Arc<PaymentService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        max_reference_attempts: u32,
    ) -> Self {
        let stock = StockService::new(db.clone(), event_sender.clone());

        Self {
            product_catalog: Arc::new(ProductCatalogService::new(db.clone())),
            cart: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            payments: Arc::new(PaymentService::new(
                db,
                event_sender,
                stock.clone(),
                max_reference_attempts,
            )),
            stock: Arc::new(stock),
        }
    }
}
