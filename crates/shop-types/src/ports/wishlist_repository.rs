use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::wishlist::Wishlist;

#[async_trait]
pub trait WishlistRepository: Send + Sync + 'static {
    /// Atomic upsert keyed on the customer.
    async fn get_or_create_wishlist(&self, customer_id: Uuid) -> Result<Wishlist, RepoError>;
    async fn find_wishlist(&self, customer_id: Uuid) -> Result<Option<Wishlist>, RepoError>;
    /// Replaces the persisted items with `wishlist.items` in one transaction.
    async fn save_wishlist(&self, wishlist: &Wishlist) -> Result<Wishlist, RepoError>;
}
