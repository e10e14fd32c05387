use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::catalog::Product;

#[async_trait]
pub trait CatalogRepository: Send + Sync + 'static {
    /// Inserts or replaces a product (keyed by id; slugs must stay unique).
    async fn upsert_product(&self, product: Product) -> Result<Product, RepoError>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError>;
    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepoError>;
    async fn list_products(&self) -> Result<Vec<Product>, RepoError>;
    /// Atomic `view_count += 1`.
    async fn record_view(&self, id: Uuid) -> Result<(), RepoError>;
}
