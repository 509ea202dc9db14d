use crate::{
    entities::commerce::{Product, ProductModel},
    errors::ServiceError,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Read-only view of the product catalog.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn find_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        find_product_on(&*self.db, product_id).await
    }
}

/// Catalog lookup usable inside a caller's transaction.
pub(crate) async fn find_product_on<C>(conn: &C, product_id: Uuid) -> Result<ProductModel, ServiceError>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::ProductNotFound(format!("Product {} not found", product_id)))
}
