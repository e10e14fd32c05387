use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_types::domain::cart::{Cart, Identity};
use shop_types::domain::coupon::Coupon;
use shop_types::domain::order::{Address, AppliedCoupon, CheckoutDetails, Order};
use shop_types::domain::pricing::{round_money, PricingConfig};
use shop_types::ports::address_repository::AddressRepository;
use shop_types::ports::cart_repository::CartRepository;
use shop_types::ports::coupon_repository::CouponRepository;
use shop_types::ports::order_repository::OrderRepository;
use shop_types::ports::{RepoError, ShopRepository};
use uuid::Uuid;

use super::identity::find_cart;
use crate::errors::AppError;

pub const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub details: CheckoutDetails,
    #[serde(default)]
    pub coupon_code: Option<String>,
    /// Saved address to copy in place of an inline `billing_address`.
    #[serde(default)]
    pub billing_address_id: Option<Uuid>,
    #[serde(default)]
    pub shipping_address_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CouponCheck {
    pub code: String,
    pub valid: bool,
    pub discount: Decimal,
}

pub struct CheckoutService<R: ShopRepository> {
    repo: Arc<R>,
    pricing: PricingConfig,
}

impl<R: ShopRepository> CheckoutService<R> {
    pub fn new(repo: Arc<R>, pricing: PricingConfig) -> Self {
        Self { repo, pricing }
    }

    /// Read-only coupon preview; counters are untouched.
    pub async fn validate_coupon(&self, code: &str, amount: Decimal) -> Result<CouponCheck, AppError> {
        if amount < Decimal::ZERO {
            return Err(AppError::BadRequest("amount must not be negative".into()));
        }
        let code = Coupon::normalize_code(code);
        let now = Utc::now();
        let check = match self.repo.get_coupon(&code).await? {
            Some(coupon) if coupon.is_valid(now) => CouponCheck {
                valid: true,
                discount: round_money(coupon.calculate_discount(amount, now)),
                code,
            },
            _ => CouponCheck {
                valid: false,
                discount: round_money(Decimal::ZERO),
                code,
            },
        };
        Ok(check)
    }

    /// Turns the caller's cart into a pending order, redeems the coupon in
    /// the same write, then empties the cart.
    #[tracing::instrument(skip(self, request), fields(coupon = ?request.coupon_code))]
    pub async fn checkout(&self, identity: &Identity, mut request: CheckoutRequest) -> Result<Order, AppError> {
        let mut cart = match find_cart(self.repo.as_ref(), identity).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(AppError::BadRequest("cart is empty".into())),
        };

        let unavailable: Vec<String> = cart.unavailable_lines().map(|l| l.display_name()).collect();
        if !unavailable.is_empty() {
            return Err(AppError::Conflict(format!(
                "no longer available: {}",
                unavailable.join(", ")
            )));
        }

        self.fill_saved_addresses(identity, &mut request).await?;

        let applied = match request.coupon_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(self.apply_coupon(code, &cart, identity).await?),
            _ => None,
        };

        let mut order = Order::snapshot(&cart, request.details, &self.pricing, applied)?;
        let order = self.place_with_fresh_number(&mut order).await?;
        tracing::info!(
            order_number = %order.order_number,
            total = %order.total_amount,
            items = order.total_items(),
            "order placed"
        );

        cart.clear();
        self.repo.save_cart(&cart).await?;
        Ok(order)
    }

    /// Copies referenced saved addresses into the checkout details. The order
    /// keeps the copy, so later edits to the book never reach it.
    async fn fill_saved_addresses(
        &self,
        identity: &Identity,
        request: &mut CheckoutRequest,
    ) -> Result<(), AppError> {
        let wanted = [
            ("billing", request.billing_address_id, &mut request.details.billing_address),
            ("shipping", request.shipping_address_id, &mut request.details.shipping_address),
        ];
        let mut book = None;
        for (kind, id, slot) in wanted {
            let Some(id) = id else { continue };
            if slot.is_some() {
                return Err(AppError::BadRequest(format!(
                    "send either {kind}_address or {kind}_address_id, not both"
                )));
            }
            let customer_id = identity.customer_id().ok_or_else(|| {
                AppError::Unauthorized("sign in to use saved addresses".into())
            })?;
            if book.is_none() {
                book = Some(self.repo.load_address_book(customer_id).await?);
            }
            let saved: Option<Address> = book
                .as_ref()
                .and_then(|b| b.get(id))
                .map(|a| a.address.clone());
            *slot = Some(saved.ok_or_else(|| AppError::NotFound(format!("address {id}")))?);
        }
        Ok(())
    }

    async fn apply_coupon(
        &self,
        code: &str,
        cart: &Cart,
        identity: &Identity,
    ) -> Result<AppliedCoupon, AppError> {
        let coupon = self
            .repo
            .get_coupon(code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("coupon {}", Coupon::normalize_code(code))))?;

        let now = Utc::now();
        let discount = coupon.calculate_discount(cart.subtotal(), now);
        if !coupon.is_valid(now) || discount <= Decimal::ZERO {
            tracing::warn!(code = %coupon.code, "coupon rejected");
            return Err(AppError::Conflict(format!(
                "coupon {} cannot be applied to this cart",
                coupon.code
            )));
        }

        if let (Some(limit), Some(customer_id)) =
            (coupon.usage_limit_per_customer, identity.customer_id())
        {
            let used = self.redemptions_by(customer_id, &coupon.code).await?;
            if used >= limit as usize {
                tracing::warn!(code = %coupon.code, %customer_id, used, "per-customer limit reached");
                return Err(AppError::Conflict(format!(
                    "coupon {} was already used",
                    coupon.code
                )));
            }
        }

        Ok(AppliedCoupon {
            code: coupon.code,
            discount_amount: discount,
        })
    }

    async fn redemptions_by(&self, customer_id: Uuid, code: &str) -> Result<usize, AppError> {
        let orders = self.repo.list_orders_for_customer(customer_id).await?;
        Ok(orders
            .iter()
            .filter(|o| o.applied_coupon.as_ref().is_some_and(|c| c.code == code))
            .count())
    }

    async fn place_with_fresh_number(&self, order: &mut Order) -> Result<Order, AppError> {
        for attempt in 1..=ORDER_NUMBER_ATTEMPTS {
            match self.repo.place_order(order.clone()).await {
                Ok(placed) => return Ok(placed),
                Err(RepoError::Duplicate(_)) => {
                    tracing::warn!(attempt, order_number = %order.order_number, "order number taken");
                    order.regenerate_order_number();
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "no free order number after {ORDER_NUMBER_ATTEMPTS} attempts"
        )))
    }
}
