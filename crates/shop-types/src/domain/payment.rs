use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::random_code;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[default]
    Payment,
    Refund,
    PartialRefund,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("amount must not be negative")]
    NegativeAmount,
    #[error("refund amount must be positive")]
    EmptyRefund,
    #[error("payment {0} cannot be refunded")]
    NotRefundable(String),
    #[error("refund of {requested} exceeds refundable balance {remaining}")]
    ExceedsBalance { requested: Decimal, remaining: Decimal },
}

/// Payment record as reported by a gateway. Nothing here talks to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub transaction_id: String,
    pub order_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub provider: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub transaction_type: TransactionType,
    pub gateway_transaction_id: String,
    pub gateway_response: serde_json::Value,
    pub gateway_fee: Decimal,
    pub failure_reason: String,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for [`Payment::record`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPayment {
    pub order_id: Uuid,
    pub transaction_id: String,
    pub provider: String,
    pub amount: Decimal,
    pub currency: Option<String>,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default)]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub gateway_transaction_id: String,
    #[serde(default)]
    pub gateway_response: serde_json::Value,
    #[serde(default)]
    pub gateway_fee: Decimal,
    #[serde(default)]
    pub failure_reason: String,
}

impl Payment {
    pub fn record(
        input: NewPayment,
        customer_id: Option<Uuid>,
        default_currency: &str,
    ) -> Result<Self, PaymentError> {
        if input.amount < Decimal::ZERO || input.gateway_fee < Decimal::ZERO {
            return Err(PaymentError::NegativeAmount);
        }
        let now = Utc::now();
        let processed_at = matches!(
            input.status,
            TransactionStatus::Completed | TransactionStatus::Failed
        )
        .then_some(now);
        Ok(Self {
            id: Uuid::new_v4(),
            transaction_id: input.transaction_id,
            order_id: input.order_id,
            customer_id,
            provider: input.provider,
            amount: input.amount,
            currency: input.currency.unwrap_or_else(|| default_currency.to_string()),
            status: input.status,
            transaction_type: input.transaction_type,
            gateway_transaction_id: input.gateway_transaction_id,
            gateway_response: input.gateway_response,
            gateway_fee: input.gateway_fee,
            failure_reason: input.failure_reason,
            processed_at,
            created_at: now,
        })
    }

    pub fn is_successful(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    pub fn can_be_refunded(&self) -> bool {
        self.is_successful() && self.transaction_type == TransactionType::Payment
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Refund {
    pub id: Uuid,
    pub refund_id: String,
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub reason: String,
    pub status: RefundStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    /// `already_refunded` is the sum of refunds previously recorded against
    /// `payment`.
    pub fn against(
        payment: &Payment,
        already_refunded: Decimal,
        amount: Decimal,
        reason: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        if !payment.can_be_refunded() {
            return Err(PaymentError::NotRefundable(payment.transaction_id.clone()));
        }
        if amount <= Decimal::ZERO {
            return Err(PaymentError::EmptyRefund);
        }
        let remaining = payment.amount - already_refunded;
        if amount > remaining {
            return Err(PaymentError::ExceedsBalance {
                requested: amount,
                remaining,
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            refund_id: format!("REF-{}", random_code(8)),
            payment_id: payment.id,
            order_id: payment.order_id,
            amount,
            reason: reason.into(),
            status: RefundStatus::Pending,
            processed_at: None,
            created_at: Utc::now(),
        })
    }

    pub fn is_full(&self, payment: &Payment, already_refunded: Decimal) -> bool {
        already_refunded + self.amount >= payment.amount
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    #[default]
    Pending,
    Processed,
    Failed,
    Ignored,
}

/// Raw gateway webhook kept for later inspection; never processed here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentWebhook {
    pub webhook_id: String,
    pub provider: String,
    pub event_type: String,
    pub data: serde_json::Value,
    pub status: WebhookStatus,
    pub error_message: String,
    pub attempts: u32,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PaymentWebhook {
    pub fn received(
        webhook_id: impl Into<String>,
        provider: impl Into<String>,
        event_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            webhook_id: webhook_id.into(),
            provider: provider.into(),
            event_type: event_type.into(),
            data,
            status: WebhookStatus::Pending,
            error_message: String::new(),
            attempts: 0,
            processed_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_payment(cents: i64) -> Payment {
        Payment::record(
            NewPayment {
                order_id: Uuid::new_v4(),
                transaction_id: "txn_1".into(),
                provider: "stripe".into(),
                amount: Decimal::new(cents, 2),
                currency: None,
                status: TransactionStatus::Completed,
                transaction_type: TransactionType::Payment,
                gateway_transaction_id: String::new(),
                gateway_response: serde_json::Value::Null,
                gateway_fee: Decimal::ZERO,
                failure_reason: String::new(),
            },
            None,
            "USD",
        )
        .unwrap()
    }

    #[test]
    fn record_sets_defaults() {
        let p = completed_payment(5320);
        assert_eq!(p.currency, "USD");
        assert!(p.processed_at.is_some());
        assert!(p.is_successful());
        assert!(p.can_be_refunded());
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut input = NewPayment {
            order_id: Uuid::new_v4(),
            transaction_id: "t".into(),
            provider: "paypal".into(),
            amount: Decimal::new(-1, 0),
            currency: Some("EUR".into()),
            status: TransactionStatus::Pending,
            transaction_type: TransactionType::Payment,
            gateway_transaction_id: String::new(),
            gateway_response: serde_json::Value::Null,
            gateway_fee: Decimal::ZERO,
            failure_reason: String::new(),
        };
        assert_eq!(
            Payment::record(input.clone(), None, "USD").unwrap_err(),
            PaymentError::NegativeAmount
        );
        input.amount = Decimal::ONE;
        let p = Payment::record(input, None, "USD").unwrap();
        assert_eq!(p.currency, "EUR");
        assert!(p.processed_at.is_none());
        assert!(!p.can_be_refunded());
    }

    #[test]
    fn refunds_respect_remaining_balance() {
        let payment = completed_payment(1000);
        let first = Refund::against(&payment, Decimal::ZERO, Decimal::new(400, 2), "damaged").unwrap();
        assert!(first.refund_id.starts_with("REF-"));
        assert_eq!(first.refund_id.len(), 12);
        assert!(!first.is_full(&payment, Decimal::ZERO));

        let too_much = Refund::against(&payment, Decimal::new(400, 2), Decimal::new(700, 2), "");
        assert!(matches!(too_much, Err(PaymentError::ExceedsBalance { .. })));

        let rest = Refund::against(&payment, Decimal::new(400, 2), Decimal::new(600, 2), "").unwrap();
        assert!(rest.is_full(&payment, Decimal::new(400, 2)));

        assert_eq!(
            Refund::against(&payment, Decimal::ZERO, Decimal::ZERO, "").unwrap_err(),
            PaymentError::EmptyRefund
        );
    }

    #[test]
    fn failed_payment_is_not_refundable() {
        let mut payment = completed_payment(1000);
        payment.status = TransactionStatus::Failed;
        assert!(matches!(
            Refund::against(&payment, Decimal::ZERO, Decimal::ONE, ""),
            Err(PaymentError::NotRefundable(_))
        ));
    }
}
