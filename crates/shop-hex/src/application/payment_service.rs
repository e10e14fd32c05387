use std::sync::Arc;

use rust_decimal::Decimal;
use shop_types::domain::order::PaymentStatus;
use shop_types::domain::payment::{
    NewPayment, Payment, PaymentWebhook, Refund, RefundStatus, TransactionStatus, TransactionType,
};
use shop_types::ports::order_repository::OrderRepository;
use shop_types::ports::payment_repository::PaymentRepository;
use shop_types::ports::{RepoError, ShopRepository};
use uuid::Uuid;

use crate::errors::AppError;

/// Records what a payment gateway reported. No gateway is called from here.
pub struct PaymentService<R: ShopRepository> {
    repo: Arc<R>,
}

impl<R: ShopRepository> PaymentService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    #[tracing::instrument(skip(self, input), fields(order_id = %input.order_id, transaction_id = %input.transaction_id))]
    pub async fn record_payment(&self, input: NewPayment) -> Result<Payment, AppError> {
        if input.transaction_id.trim().is_empty() {
            return Err(AppError::BadRequest("transaction_id is required".into()));
        }
        let mut order = self
            .repo
            .get_order(input.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {}", input.order_id)))?;

        let payment = Payment::record(input, order.customer_id, &order.currency)?;
        let payment = match self.repo.create_payment(payment).await {
            Ok(p) => p,
            Err(RepoError::Duplicate(what)) => {
                return Err(AppError::Conflict(format!("{what} already recorded")))
            }
            Err(e) => return Err(e.into()),
        };

        let changed = match (payment.transaction_type, payment.status) {
            (TransactionType::Payment, TransactionStatus::Completed) => {
                order.set_payment_status(PaymentStatus::Paid);
                true
            }
            (TransactionType::Payment, TransactionStatus::Failed) => order.record_failed_payment(),
            _ => false,
        };
        if changed {
            let status = order.payment_status;
            self.repo.update_order(order).await?;
            tracing::info!(payment_status = ?status, "order payment status updated");
        }
        Ok(payment)
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_refund(
        &self,
        payment_id: Uuid,
        amount: Decimal,
        reason: String,
    ) -> Result<Refund, AppError> {
        let payment = self
            .repo
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {payment_id}")))?;

        let already: Decimal = self
            .repo
            .list_refunds(payment_id)
            .await?
            .iter()
            .filter(|r| !matches!(r.status, RefundStatus::Failed | RefundStatus::Cancelled))
            .map(|r| r.amount)
            .sum();

        let refund = Refund::against(&payment, already, amount, reason)?;
        let full = refund.is_full(&payment, already);
        let refund = self.repo.create_refund(refund).await?;

        if let Some(mut order) = self.repo.get_order(payment.order_id).await? {
            order.set_payment_status(if full {
                PaymentStatus::Refunded
            } else {
                PaymentStatus::PartiallyRefunded
            });
            self.repo.update_order(order).await?;
        }
        tracing::info!(refund_id = %refund.refund_id, %amount, full, "refund recorded");
        Ok(refund)
    }

    /// Stores a gateway webhook once per id. Replays return the stored copy.
    pub async fn store_webhook(
        &self,
        provider: &str,
        webhook_id: &str,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(PaymentWebhook, bool), AppError> {
        if webhook_id.trim().is_empty() {
            return Err(AppError::BadRequest("webhook id is required".into()));
        }
        let webhook = PaymentWebhook::received(webhook_id.trim(), provider, event_type, data);
        let (stored, fresh) = self.repo.store_webhook(webhook).await?;
        if !fresh {
            tracing::debug!(%provider, %webhook_id, "webhook replay ignored");
        }
        Ok((stored, fresh))
    }
}
