use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::order::Order;

#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    /// Persists a new order. When the order carries an applied coupon its
    /// usage count is incremented in the same transaction, guarded by the
    /// usage limit; `CouponExhausted` means nothing was written. A clashing
    /// order number yields `Duplicate`.
    async fn place_order(&self, order: Order) -> Result<Order, RepoError>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError>;
    async fn get_order_by_number(&self, order_number: &str) -> Result<Option<Order>, RepoError>;
    async fn list_orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, RepoError>;
    /// Writes back status, payment status and history. `None` if missing.
    async fn update_order(&self, order: Order) -> Result<Option<Order>, RepoError>;
}
