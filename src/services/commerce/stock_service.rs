use crate::{
    entities::commerce::{CartItemModel, CartModel, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::cart_service::{find_active_cart_on, load_cart_lines_on},
};
use metrics::counter;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Requested-vs-available deficit for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Shortfall {
    pub product_id: Uuid,
    /// `None` when the product has left the catalog
    pub product_name: Option<String>,
    pub requested: i32,
    pub available: i32,
    pub missing: i32,
}

/// Outcome of a stock check. An unavailable verdict is a business result,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockVerdict {
    pub cart_id: Uuid,
    pub available: bool,
    pub total_products_in_cart: usize,
    pub products_with_issues: usize,
    pub shortfalls: Vec<Shortfall>,
}

/// Stock gate: compares cart quantities with live product inventory.
///
/// The check is advisory. No hold is placed on inventory, so stock that is
/// sufficient here can be depleted by other checkouts before a payment
/// commits.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl StockService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Checks the caller's active cart against inventory.
    #[instrument(skip(self))]
    pub async fn validate(&self, user_role_id: i32) -> Result<StockVerdict, ServiceError> {
        let cart = find_active_cart_on(&*self.db, user_role_id)
            .await?
            .ok_or_else(|| {
                ServiceError::CartNotFound(format!(
                    "No active cart for user role {}",
                    user_role_id
                ))
            })?;

        self.evaluate_cart(&cart).await
    }

    /// Checks an already resolved cart. Fails with `CartEmpty` when the cart
    /// has no items.
    #[instrument(skip(self, cart), fields(cart_id = %cart.id))]
    pub async fn evaluate_cart(&self, cart: &CartModel) -> Result<StockVerdict, ServiceError> {
        let lines = load_cart_lines_on(&*self.db, cart.id).await?;
        if lines.is_empty() {
            return Err(ServiceError::CartEmpty(format!("Cart {} has no items", cart.id)));
        }

        let verdict = build_verdict(cart.id, &lines);

        if verdict.available {
            info!("Stock available for all {} products", verdict.total_products_in_cart);
        } else {
            warn!(
                "Stock shortfall on {} of {} products",
                verdict.products_with_issues, verdict.total_products_in_cart
            );
            counter!("checkout.stock.shortfalls", verdict.products_with_issues as u64);
        }

        self.event_sender
            .send_or_log(Event::StockValidated {
                cart_id: cart.id,
                available: verdict.available,
                products_with_issues: verdict.products_with_issues,
            })
            .await;

        Ok(verdict)
    }
}

/// A product missing from the catalog counts as zero available.
pub(crate) fn build_verdict(
    cart_id: Uuid,
    lines: &[(CartItemModel, Option<ProductModel>)],
) -> StockVerdict {
    let shortfalls: Vec<Shortfall> = lines
        .iter()
        .filter_map(|(item, product)| {
            let available = product.as_ref().map_or(0, |p| p.available_quantity.max(0));
            if item.quantity <= available {
                return None;
            }
            Some(Shortfall {
                product_id: item.product_id,
                product_name: product.as_ref().map(|p| p.name.clone()),
                requested: item.quantity,
                available,
                missing: (item.quantity - available).max(0),
            })
        })
        .collect();

    StockVerdict {
        cart_id,
        available: shortfalls.is_empty(),
        total_products_in_cart: lines.len(),
        products_with_issues: shortfalls.len(),
        shortfalls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, available: Option<i32>) -> (CartItemModel, Option<ProductModel>) {
        let product_id = Uuid::new_v4();
        let now = Utc::now();
        let item = CartItemModel {
            id: Uuid::new_v4(),
            cart_id: Uuid::nil(),
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        let product = available.map(|available_quantity| ProductModel {
            id: product_id,
            name: format!("product-{}", quantity),
            unit_price: dec!(1.00),
            tax_percentage: dec!(0),
            is_active: true,
            available_quantity,
            created_at: now,
            updated_at: now,
        });
        (item, product)
    }

    #[test]
    fn all_lines_satisfied() {
        let lines = vec![line(2, Some(2)), line(1, Some(50))];
        let verdict = build_verdict(Uuid::nil(), &lines);

        assert!(verdict.available);
        assert_eq!(verdict.total_products_in_cart, 2);
        assert_eq!(verdict.products_with_issues, 0);
        assert!(verdict.shortfalls.is_empty());
    }

    #[test]
    fn reports_only_understocked_products() {
        let lines = vec![line(10, Some(4)), line(1, Some(1))];
        let verdict = build_verdict(Uuid::nil(), &lines);

        assert!(!verdict.available);
        assert_eq!(verdict.total_products_in_cart, 2);
        assert_eq!(verdict.products_with_issues, 1);
        let shortfall = &verdict.shortfalls[0];
        assert_eq!(shortfall.product_id, lines[0].0.product_id);
        assert_eq!(shortfall.requested, 10);
        assert_eq!(shortfall.available, 4);
        assert_eq!(shortfall.missing, 6);
    }

    #[test]
    fn missing_product_counts_as_zero_stock() {
        let lines = vec![line(3, None)];
        let verdict = build_verdict(Uuid::nil(), &lines);

        assert!(!verdict.available);
        assert_eq!(verdict.shortfalls[0].available, 0);
        assert_eq!(verdict.shortfalls[0].missing, 3);
        assert_eq!(verdict.shortfalls[0].product_name, None);
    }

    #[test]
    fn negative_inventory_is_clamped() {
        let lines = vec![line(1, Some(-5))];
        let verdict = build_verdict(Uuid::nil(), &lines);

        assert_eq!(verdict.shortfalls[0].available, 0);
        assert_eq!(verdict.shortfalls[0].missing, 1);
    }
}
