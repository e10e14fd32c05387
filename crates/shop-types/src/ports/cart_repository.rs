use async_trait::async_trait;

use super::RepoError;
use crate::domain::cart::{Cart, CartOwner};

#[async_trait]
pub trait CartRepository: Send + Sync + 'static {
    /// Atomic upsert keyed on the owner: concurrent callers for the same
    /// owner always observe the same cart.
    async fn get_or_create_cart(&self, owner: &CartOwner) -> Result<Cart, RepoError>;
    /// Active cart for the owner, without creating one.
    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, RepoError>;
    /// Replaces the persisted lines with `cart.lines` in one transaction and
    /// returns the re-hydrated cart.
    async fn save_cart(&self, cart: &Cart) -> Result<Cart, RepoError>;
}
