use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::payment::{Payment, PaymentWebhook, Refund};

#[async_trait]
pub trait PaymentRepository: Send + Sync + 'static {
    /// `Duplicate` when the transaction id is already recorded.
    async fn create_payment(&self, payment: Payment) -> Result<Payment, RepoError>;
    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, RepoError>;
    async fn list_payments(&self, order_id: Uuid) -> Result<Vec<Payment>, RepoError>;
    async fn create_refund(&self, refund: Refund) -> Result<Refund, RepoError>;
    async fn list_refunds(&self, payment_id: Uuid) -> Result<Vec<Refund>, RepoError>;
    /// Stores the webhook unless its id was seen before. Returns the stored
    /// row and whether it was newly inserted.
    async fn store_webhook(&self, webhook: PaymentWebhook) -> Result<(PaymentWebhook, bool), RepoError>;
}
