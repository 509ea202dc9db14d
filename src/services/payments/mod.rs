//! Payment processor: turns a validated cart into a pending payment.

pub mod card;
pub mod reference;

pub use card::{Base64JsonCardDecoder, CardPayload, CardPayloadDecoder, ValidatedCard};
pub use reference::{DbReferenceStore, RandomSource, ReferenceGenerator, ReferenceStore, ThreadRandom};

use crate::{
    entities::{
        commerce::{cart, cart_item, Cart, CartItem, CartModel, CartStatus},
        payments::{
            payment, payment_credit, payment_debit, Payment, PaymentCredit, PaymentDebit,
            PaymentStatus, PaymentType,
        },
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::{cart_service::find_active_cart_on, StockService},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Result of a successful checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentReceipt {
    pub payment_id: Uuid,
    pub reference_number: String,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
}

/// Stored payment with its type-specific detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentDetails {
    pub payment_id: Uuid,
    pub cart_id: Uuid,
    pub reference_number: String,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    pub card_holder_name: Option<String>,
    pub card_last_four: Option<String>,
    /// Only set for credit payments
    pub installments: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    stock: StockService,
    references: ReferenceGenerator,
    decoder: Arc<dyn CardPayloadDecoder>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        stock: StockService,
        max_reference_attempts: u32,
    ) -> Self {
        let references = ReferenceGenerator::from_db(db.clone(), max_reference_attempts);
        Self::with_components(db, event_sender, stock, references, Arc::new(Base64JsonCardDecoder))
    }

    pub fn with_components(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        stock: StockService,
        references: ReferenceGenerator,
        decoder: Arc<dyn CardPayloadDecoder>,
    ) -> Self {
        Self {
            db,
            event_sender,
            stock,
            references,
            decoder,
        }
    }

    /// Runs one checkout attempt.
    ///
    /// Cart, card and stock checks happen before anything is written. The
    /// payment rows and the `active -> processing` cart transition share one
    /// transaction; the transition only applies to a cart that is still
    /// active, so a second attempt on the same cart fails with
    /// `CartNotActive` and writes nothing.
    ///
    /// Stock is checked, not reserved. Inventory can still run out between
    /// the check and the commit.
    #[instrument(skip(self, encrypted_card_data))]
    pub async fn process_payment(
        &self,
        user_role_id: i32,
        cart_id: Option<Uuid>,
        encrypted_card_data: &str,
    ) -> Result<PaymentReceipt, ServiceError> {
        let cart = self.resolve_cart(user_role_id, cart_id).await?;

        let item_count = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .count(&*self.db)
            .await?;
        if item_count == 0 {
            return Err(ServiceError::CartEmpty(format!("Cart {} has no items", cart.id)));
        }

        let payload = self.decoder.decode(encrypted_card_data)?;
        let card = card::validate_card(&payload)?;

        let verdict = self.stock.evaluate_cart(&cart).await?;
        if !verdict.available {
            return Err(ServiceError::InsufficientStock(format!(
                "{} of {} products in cart {} lack stock",
                verdict.products_with_issues, verdict.total_products_in_cart, cart.id
            )));
        }

        let reference_number = self.references.generate_unique().await?;

        let now = Utc::now();
        let payment_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        payment::ActiveModel {
            id: Set(payment_id),
            cart_id: Set(cart.id),
            payment_type: Set(card.payment_type),
            status: Set(PaymentStatus::Pending),
            reference_number: Set(reference_number.clone()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        match card.payment_type {
            PaymentType::Debit => {
                payment_debit::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    payment_id: Set(payment_id),
                    card_holder_name: Set(card.card_holder_name.clone()),
                    card_last_four: Set(card.last_four().to_string()),
                    created_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
            PaymentType::Credit => {
                payment_credit::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    payment_id: Set(payment_id),
                    card_holder_name: Set(card.card_holder_name.clone()),
                    card_last_four: Set(card.last_four().to_string()),
                    installments: Set(card.installments.unwrap_or(1)),
                    created_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }
        }

        let transition = Cart::update_many()
            .col_expr(cart::Column::Status, Expr::value(CartStatus::Processing))
            .col_expr(cart::Column::UpdatedAt, Expr::value(now))
            .filter(cart::Column::Id.eq(cart.id))
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .exec(&txn)
            .await?;

        if transition.rows_affected == 0 {
            txn.rollback().await?;
            warn!("Cart {} left the active state during checkout", cart.id);
            return Err(ServiceError::CartNotActive(format!(
                "Cart {} is already being checked out",
                cart.id
            )));
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::PaymentInitiated {
                payment_id,
                cart_id: cart.id,
                reference_number: reference_number.clone(),
                payment_type: card.payment_type,
            })
            .await;
        self.event_sender
            .send_or_log(Event::CartStatusChanged {
                cart_id: cart.id,
                old_status: CartStatus::Active.to_string(),
                new_status: CartStatus::Processing.to_string(),
            })
            .await;
        counter!("checkout.payments.created", 1);

        info!(
            payment_id = %payment_id,
            reference = %reference_number,
            "Created {} payment for cart {}",
            card.payment_type,
            cart.id
        );

        Ok(PaymentReceipt {
            payment_id,
            reference_number,
            status: PaymentStatus::Pending,
            payment_type: card.payment_type,
        })
    }

    /// An explicit cart id must belong to the caller and still be active;
    /// without one the caller's active cart is used.
    async fn resolve_cart(
        &self,
        user_role_id: i32,
        cart_id: Option<Uuid>,
    ) -> Result<CartModel, ServiceError> {
        match cart_id {
            Some(cart_id) => {
                let cart = Cart::find_by_id(cart_id)
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| ServiceError::CartNotFound(format!("Cart {} not found", cart_id)))?;

                if cart.user_role_id != user_role_id {
                    warn!(
                        "User role {} attempted checkout of cart {}",
                        user_role_id, cart_id
                    );
                    return Err(ServiceError::Unauthorized(format!(
                        "Cart {} does not belong to this user",
                        cart_id
                    )));
                }
                if cart.status != CartStatus::Active {
                    return Err(ServiceError::CartNotActive(format!(
                        "Cart {} is {}",
                        cart_id, cart.status
                    )));
                }
                Ok(cart)
            }
            None => find_active_cart_on(&*self.db, user_role_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::CartNotFound(format!(
                        "No active cart for user role {}",
                        user_role_id
                    ))
                }),
        }
    }

    /// Looks up a payment by reference. Only the owner of the paid cart may
    /// read it.
    #[instrument(skip(self))]
    pub async fn get_payment_by_reference(
        &self,
        reference: &str,
        user_role_id: i32,
    ) -> Result<PaymentDetails, ServiceError> {
        let reference = reference.trim().to_uppercase();

        let (payment, cart) = Payment::find()
            .filter(payment::Column::ReferenceNumber.eq(reference.as_str()))
            .find_also_related(Cart)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::PaymentNotFound(format!("Payment {} not found", reference)))?;

        if cart.map(|c| c.user_role_id) != Some(user_role_id) {
            return Err(ServiceError::Unauthorized(format!(
                "Payment {} does not belong to this user",
                reference
            )));
        }

        let (card_holder_name, card_last_four, installments) = match payment.payment_type {
            PaymentType::Debit => PaymentDebit::find()
                .filter(payment_debit::Column::PaymentId.eq(payment.id))
                .one(&*self.db)
                .await?
                .map_or((None, None, None), |d| {
                    (Some(d.card_holder_name), Some(d.card_last_four), None)
                }),
            PaymentType::Credit => PaymentCredit::find()
                .filter(payment_credit::Column::PaymentId.eq(payment.id))
                .one(&*self.db)
                .await?
                .map_or((None, None, None), |c| {
                    (Some(c.card_holder_name), Some(c.card_last_four), Some(c.installments))
                }),
        };

        Ok(PaymentDetails {
            payment_id: payment.id,
            cart_id: payment.cart_id,
            reference_number: payment.reference_number,
            status: payment.status,
            payment_type: payment.payment_type,
            card_holder_name,
            card_last_four,
            installments,
            created_at: payment.created_at,
        })
    }
}
