use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cart::{Cart, CartLine};
use super::pricing::{PricingConfig, Totals};

pub const ORDER_NUMBER_LEN: usize = 8;
pub const ORDER_HISTORY_PAGE_SIZE: u32 = 10;

const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random 8-character upper-case alphanumeric order number. Uniqueness is
/// left to the store.
pub fn generate_order_number() -> String {
    random_code(ORDER_NUMBER_LEN)
}

pub(crate) fn random_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ORDER_NUMBER_CHARSET[rng.random_range(0..ORDER_NUMBER_CHARSET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            other => Err(format!("unknown order status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    PartiallyPaid,
    Refunded,
    PartiallyRefunded,
    Failed,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: String,
    pub address_line_1: String,
    #[serde(default)]
    pub address_line_2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: String,
}

impl Address {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Multi-line postal form; blank parts are skipped.
    pub fn full_address(&self) -> String {
        let city_line = format!("{}, {} {}", self.city, self.state, self.postal_code);
        [
            self.full_name(),
            self.company.clone(),
            self.address_line_1.clone(),
            self.address_line_2.clone(),
            city_line,
            self.country.clone(),
        ]
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// Frozen copy of a cart line at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub variant_name: String,
    pub product_sku: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub total_price: Decimal,
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        let unit_price = line.unit_price();
        let sku = line
            .variant
            .as_ref()
            .and_then(|v| v.sku.clone())
            .or_else(|| line.product.sku.clone())
            .unwrap_or_default();
        Self {
            product_id: line.product.id,
            variant_id: line.variant_id(),
            product_name: line.product.name.clone(),
            variant_name: line.variant.as_ref().map(|v| v.name.clone()).unwrap_or_default(),
            product_sku: sku,
            unit_price,
            quantity: line.quantity,
            total_price: unit_price * Decimal::from(line.quantity),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusChange {
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub note: String,
    pub changed_at: DateTime<Utc>,
}

/// Customer-supplied details collected at checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutDetails {
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub billing_address: Option<Address>,
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub customer_email: String,
    pub customer_phone: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub billing_address: Option<Address>,
    pub shipping_address: Option<Address>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub currency: String,
    pub notes: String,
    pub applied_coupon: Option<AppliedCoupon>,
    pub tracking_number: String,
    pub tracking_url: String,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderLine>,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Freezes the cart and its pricing into a pending order. The cart itself
    /// is left untouched.
    pub fn snapshot(
        cart: &Cart,
        details: CheckoutDetails,
        pricing: &PricingConfig,
        coupon: Option<AppliedCoupon>,
    ) -> Result<Self, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        let email = details.email.trim().to_string();
        if !email.contains('@') {
            return Err(OrderError::InvalidEmail);
        }

        let items: Vec<OrderLine> = cart.lines.iter().map(OrderLine::from).collect();
        let subtotal = items.iter().map(|l| l.total_price).sum();
        let discount = coupon
            .as_ref()
            .map(|c| c.discount_amount)
            .unwrap_or(Decimal::ZERO);
        let Totals {
            subtotal,
            shipping_cost,
            tax_amount,
            discount_amount,
            total,
        } = pricing.quote(subtotal, discount);

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            order_number: generate_order_number(),
            customer_id: cart.owner.customer_id(),
            customer_email: email,
            customer_phone: details.phone,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            billing_address: details.billing_address,
            shipping_address: details.shipping_address,
            subtotal,
            tax_amount,
            shipping_cost,
            discount_amount,
            total_amount: total,
            currency: pricing.currency.clone(),
            notes: details.notes,
            applied_coupon: coupon,
            tracking_number: String::new(),
            tracking_url: String::new(),
            shipped_at: None,
            delivered_at: None,
            items,
            status_history: vec![StatusChange {
                previous_status: None,
                new_status: OrderStatus::Pending,
                note: "order placed".into(),
                changed_at: now,
            }],
            created_at: now,
            updated_at: now,
        })
    }

    pub fn regenerate_order_number(&mut self) {
        self.order_number = generate_order_number();
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn can_be_cancelled(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed) && !self.is_paid()
    }

    fn has_captured_payment(&self) -> bool {
        matches!(
            self.payment_status,
            PaymentStatus::Paid | PaymentStatus::PartiallyRefunded | PaymentStatus::Refunded
        )
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self.status, to) {
            (_, Cancelled) => self.can_be_cancelled(),
            (Cancelled | Refunded, Refunded) => false,
            (_, Refunded) => self.has_captured_payment(),
            (Pending, Confirmed)
            | (Confirmed, Processing)
            | (Processing, Shipped)
            | (Shipped, Delivered) => true,
            _ => false,
        }
    }

    pub fn transition(&mut self, to: OrderStatus, note: impl Into<String>) -> Result<(), OrderError> {
        if !self.can_transition_to(to) {
            return Err(OrderError::InvalidTransition {
                from: self.status.as_str().into(),
                to: to.as_str().into(),
            });
        }
        let now = Utc::now();
        match to {
            OrderStatus::Shipped => self.shipped_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            _ => {}
        }
        self.status_history.push(StatusChange {
            previous_status: Some(self.status),
            new_status: to,
            note: note.into(),
            changed_at: now,
        });
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_payment_status(&mut self, status: PaymentStatus) {
        self.payment_status = status;
        self.updated_at = Utc::now();
    }

    /// A failed attempt only counts while nothing has been captured; a late
    /// failure never downgrades a paid or refunded order. Returns whether
    /// the status changed.
    pub fn record_failed_payment(&mut self) -> bool {
        match self.payment_status {
            PaymentStatus::Pending => {
                self.set_payment_status(PaymentStatus::Failed);
                true
            }
            _ => false,
        }
    }

    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

/// Order history filters for one customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub page: u32,
}

impl OrderQuery {
    pub fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|s| s != order.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let needle = needle.to_lowercase();
                order.order_number.to_lowercase().contains(&needle)
                    || order.status.as_str().contains(&needle)
            }
            None => true,
        }
    }

    /// Newest first, ten per page.
    pub fn apply(&self, orders: Vec<Order>) -> super::catalog::Page<Order> {
        let mut matching: Vec<Order> = orders.into_iter().filter(|o| self.matches(o)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        super::catalog::Page::paginate(matching, self.page, ORDER_HISTORY_PAGE_SIZE)
    }
}
