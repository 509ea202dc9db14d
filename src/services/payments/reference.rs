use crate::{
    db::is_unique_violation,
    entities::payments::{payment_reference, PaymentReference},
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{error, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Storage of issued payment references.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn exists(&self, reference: &str) -> Result<bool, ServiceError>;

    /// Persists the reference. Returns `false` if a concurrent writer
    /// claimed it between the existence check and the insert.
    async fn insert(&self, reference: &str) -> Result<bool, ServiceError>;
}

/// Source of 128-bit random values.
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource: Send + Sync {
    fn next_u128(&self) -> u128;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_u128(&self) -> u128 {
        rand::random()
    }
}

/// `payment_references` table backed store.
#[derive(Clone)]
pub struct DbReferenceStore {
    db: Arc<DatabaseConnection>,
}

impl DbReferenceStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReferenceStore for DbReferenceStore {
    async fn exists(&self, reference: &str) -> Result<bool, ServiceError> {
        let count = PaymentReference::find()
            .filter(payment_reference::Column::Reference.eq(reference))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }

    async fn insert(&self, reference: &str) -> Result<bool, ServiceError> {
        let row = payment_reference::ActiveModel {
            id: Set(Uuid::new_v4()),
            reference: Set(reference.to_string()),
            created_at: Set(Utc::now()),
        };

        match row.insert(&*self.db).await {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Issues globally unique, uppercase 36 character payment references with
/// a bounded number of attempts.
#[derive(Clone)]
pub struct ReferenceGenerator {
    store: Arc<dyn ReferenceStore>,
    random: Arc<dyn RandomSource>,
    max_attempts: u32,
}

impl ReferenceGenerator {
    pub fn new(store: Arc<dyn ReferenceStore>, random: Arc<dyn RandomSource>, max_attempts: u32) -> Self {
        Self {
            store,
            random,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_db(db: Arc<DatabaseConnection>, max_attempts: u32) -> Self {
        Self::new(
            Arc::new(DbReferenceStore::new(db)),
            Arc::new(ThreadRandom),
            max_attempts,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn render(value: u128) -> String {
        uuid::Builder::from_random_bytes(value.to_be_bytes())
            .into_uuid()
            .hyphenated()
            .to_string()
            .to_uppercase()
    }

    /// Draws candidates until one is both absent and successfully stored.
    /// Repeated collisions point at a broken random source, so exhaustion is
    /// fatal for the caller and not retried.
    #[instrument(skip(self))]
    pub async fn generate_unique(&self) -> Result<String, ServiceError> {
        for attempt in 1..=self.max_attempts {
            let candidate = Self::render(self.random.next_u128());

            if !self.store.exists(&candidate).await? && self.store.insert(&candidate).await? {
                return Ok(candidate);
            }

            counter!("checkout.reference.collisions", 1);
            warn!(attempt, "Payment reference collision");
        }

        error!(
            attempts = self.max_attempts,
            "Exhausted payment reference attempts"
        );
        Err(ServiceError::ReferenceGenerationFailed(self.max_attempts))
    }
}
