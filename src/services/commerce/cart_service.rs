use crate::{
    db::is_unique_violation,
    entities::commerce::{cart, cart_item, Cart, CartItem, CartItemModel, CartModel, CartStatus, Product, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::{
        pricing_service::{PriceCalculation, PricingEngine},
        product_catalog_service::find_product_on,
    },
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Query, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// One priced line of a cart summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub calculation: PriceCalculation,
}

/// Read projection of the caller's active cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartSummary {
    pub cart_id: Option<Uuid>,
    pub items: Vec<CartLine>,
    pub total_items: i64,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total_price: Decimal,
}

impl CartSummary {
    fn empty() -> Self {
        Self {
            cart_id: None,
            items: Vec::new(),
            total_items: 0,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_price: Decimal::ZERO,
        }
    }
}

/// Cart store: one active cart per user role, item upserts with set
/// semantics and ownership-checked removal.
///
/// Active cart uniqueness is enforced by a partial unique index on
/// `carts(user_role_id) WHERE status = 'active'`; a caller that loses the
/// creation race re-reads the winner's row.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the active cart of a user role, if any.
    #[instrument(skip(self))]
    pub async fn get_active_cart(&self, user_role_id: i32) -> Result<Option<CartModel>, ServiceError> {
        find_active_cart_on(&*self.db, user_role_id).await
    }

    /// Returns the active cart for the user role, creating it on first use.
    #[instrument(skip(self))]
    pub async fn find_or_create_active_cart(
        &self,
        user_role_id: i32,
    ) -> Result<CartModel, ServiceError> {
        if let Some(cart) = self.get_active_cart(user_role_id).await? {
            return Ok(cart);
        }

        let now = Utc::now();
        let cart_id = Uuid::new_v4();
        let new_cart = cart::ActiveModel {
            id: Set(cart_id),
            user_role_id: Set(user_role_id),
            status: Set(CartStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match new_cart.insert(&*self.db).await {
            Ok(cart) => {
                self.event_sender
                    .send_or_log(Event::CartCreated {
                        cart_id,
                        user_role_id,
                    })
                    .await;
                info!("Created cart {} for user role {}", cart_id, user_role_id);
                Ok(cart)
            }
            Err(err) if is_unique_violation(&err) => {
                debug!(
                    "Concurrent cart creation for user role {}; using existing cart",
                    user_role_id
                );
                self.get_active_cart(user_role_id).await?.ok_or_else(|| {
                    ServiceError::Conflict(format!(
                        "Active cart for user role {} changed during creation",
                        user_role_id
                    ))
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Adds a product to the caller's active cart or overwrites the quantity
    /// of an existing line. This is a set, not an increment.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_role_id: i32,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartItemModel, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidQuantity(format!(
                "Quantity must be greater than zero, got {}",
                quantity
            )));
        }

        let product = find_product_on(&*self.db, product_id).await?;
        if !product.is_active {
            return Err(ServiceError::ProductInactive(format!(
                "Product {} is not available for sale",
                product_id
            )));
        }

        let cart = self.find_or_create_active_cart(user_role_id).await?;

        let item = match self.set_existing_quantity(cart.id, product_id, quantity).await? {
            Some(item) => item,
            None => {
                let now = Utc::now();
                let new_item = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                };

                match new_item.insert(&*self.db).await {
                    Ok(item) => item,
                    // A concurrent add inserted the same (cart, product) pair first
                    Err(err) if is_unique_violation(&err) => self
                        .set_existing_quantity(cart.id, product_id, quantity)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::Conflict(format!(
                                "Cart line for product {} changed concurrently",
                                product_id
                            ))
                        })?,
                    Err(err) => return Err(err.into()),
                }
            }
        };

        self.event_sender
            .send_or_log(Event::CartItemUpserted {
                cart_id: cart.id,
                product_id,
                quantity,
            })
            .await;
        counter!("checkout.cart.items_upserted", 1);

        info!(
            "Set quantity {} for product {} in cart {}",
            quantity, product_id, cart.id
        );
        Ok(item)
    }

    async fn set_existing_quantity(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItemModel>, ServiceError> {
        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        match existing {
            Some(item) => {
                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(quantity);
                item.updated_at = Set(Utc::now());
                Ok(Some(item.update(&*self.db).await?))
            }
            None => Ok(None),
        }
    }

    /// Deletes an item only if it sits in an active cart owned by the caller.
    ///
    /// Existence, cart status and ownership are checked by the same statement
    /// that deletes the row, so a missing item, someone else's item and an
    /// item in a processing cart are indistinguishable: all are `Unauthorized`.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, item_id: Uuid, user_role_id: i32) -> Result<(), ServiceError> {
        let owned_active_carts = Query::select()
            .column(cart::Column::Id)
            .from(Cart)
            .and_where(cart::Column::UserRoleId.eq(user_role_id))
            .and_where(cart::Column::Status.eq(CartStatus::Active))
            .to_owned();

        let result = CartItem::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::CartId.in_subquery(owned_active_carts))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            warn!(
                "Rejected removal of item {} by user role {}",
                item_id, user_role_id
            );
            return Err(ServiceError::Unauthorized(format!(
                "Item {} does not belong to an active cart of this user",
                item_id
            )));
        }

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                item_id,
                user_role_id,
            })
            .await;

        info!("Removed item {} for user role {}", item_id, user_role_id);
        Ok(())
    }

    /// Prices every line of the active cart. An absent cart yields an empty summary.
    #[instrument(skip(self))]
    pub async fn get_summary(&self, user_role_id: i32) -> Result<CartSummary, ServiceError> {
        let Some(cart) = self.get_active_cart(user_role_id).await? else {
            return Ok(CartSummary::empty());
        };

        let mut items = Vec::new();
        for (item, product) in load_cart_lines_on(&*self.db, cart.id).await? {
            let product = product.ok_or_else(|| {
                ServiceError::ProductNotFound(format!(
                    "Product {} in cart {} no longer exists",
                    item.product_id, cart.id
                ))
            })?;

            items.push(CartLine {
                item_id: item.id,
                product_id: product.id,
                product_name: product.name,
                calculation: PricingEngine::calculate(
                    product.unit_price,
                    product.tax_percentage,
                    item.quantity,
                ),
            });
        }

        let totals = PricingEngine::aggregate(items.iter().map(|line| &line.calculation));

        Ok(CartSummary {
            cart_id: Some(cart.id),
            items,
            total_items: totals.total_items,
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            total_price: totals.total_price,
        })
    }
}

pub(crate) async fn find_active_cart_on<C>(
    conn: &C,
    user_role_id: i32,
) -> Result<Option<CartModel>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(Cart::find()
        .filter(cart::Column::UserRoleId.eq(user_role_id))
        .filter(cart::Column::Status.eq(CartStatus::Active))
        .one(conn)
        .await?)
}

/// Items of a cart joined with their catalog product, in insertion order.
/// The product side is `None` when the catalog no longer has it.
pub(crate) async fn load_cart_lines_on<C>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Vec<(CartItemModel, Option<ProductModel>)>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .order_by_asc(cart_item::Column::Id)
        .find_also_related(Product)
        .all(conn)
        .await?)
}
