use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::{Product, ProductVariant};

/// Who is asking for a cart. Passed explicitly into every cart operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    Authenticated { customer_id: Uuid },
    Anonymous { session_token: Option<String> },
}

impl Identity {
    pub fn customer_id(&self) -> Option<Uuid> {
        match self {
            Identity::Authenticated { customer_id } => Some(*customer_id),
            Identity::Anonymous { .. } => None,
        }
    }
}

/// Owner of a cart: exactly one of a customer or an anonymous session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CartOwner {
    Customer(Uuid),
    Session(String),
}

impl CartOwner {
    /// Storage key carrying the one-cart-per-owner uniqueness constraint.
    pub fn key(&self) -> String {
        match self {
            CartOwner::Customer(id) => format!("customer:{id}"),
            CartOwner::Session(token) => format!("session:{token}"),
        }
    }

    pub fn customer_id(&self) -> Option<Uuid> {
        match self {
            CartOwner::Customer(id) => Some(*id),
            CartOwner::Session(_) => None,
        }
    }

    pub fn session_key(&self) -> Option<&str> {
        match self {
            CartOwner::Customer(_) => None,
            CartOwner::Session(token) => Some(token),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("variant {variant_id} does not belong to product {product_id}")]
    VariantMismatch { product_id: Uuid, variant_id: Uuid },
    #[error("cart item {0} not found")]
    LineNotFound(Uuid),
}

/// A cart line. Only ids and the quantity are persisted; `product` and
/// `variant` are hydrated from the live catalog whenever the cart is read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub id: Uuid,
    pub product: Product,
    pub variant: Option<ProductVariant>,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    pub fn variant_id(&self) -> Option<Uuid> {
        self.variant.as_ref().map(|v| v.id)
    }

    pub fn is_for(&self, product_id: Uuid, variant_id: Option<Uuid>) -> bool {
        self.product.id == product_id && self.variant_id() == variant_id
    }

    pub fn unit_price(&self) -> Decimal {
        match &self.variant {
            Some(variant) => variant.effective_price(&self.product),
            None => self.product.price,
        }
    }

    pub fn total_price(&self) -> Decimal {
        self.unit_price() * Decimal::from(self.quantity)
    }

    pub fn is_available(&self) -> bool {
        if !self.product.is_active() {
            return false;
        }
        match &self.variant {
            Some(variant) => variant.is_active && variant.is_in_stock(),
            None => self.product.is_in_stock(),
        }
    }

    pub fn display_name(&self) -> String {
        match &self.variant {
            Some(variant) => format!("{} - {}", self.product.name, variant.name),
            None => self.product.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub id: Uuid,
    pub owner: CartOwner,
    pub is_active: bool,
    pub lines: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(owner: CartOwner) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            is_active: true,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds `quantity` of the product (or variant), merging into an existing
    /// line for the same pair.
    pub fn add_item(
        &mut self,
        product: &Product,
        variant: Option<&ProductVariant>,
        quantity: u32,
    ) -> Result<&CartLine, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if let Some(v) = variant {
            if product.variant(v.id).is_none() {
                return Err(CartError::VariantMismatch {
                    product_id: product.id,
                    variant_id: v.id,
                });
            }
        }

        let variant_id = variant.map(|v| v.id);
        let idx = match self.lines.iter().position(|l| l.is_for(product.id, variant_id)) {
            Some(idx) => {
                let line = &mut self.lines[idx];
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CartError::InvalidQuantity)?;
                line.product = product.clone();
                line.variant = variant.cloned();
                idx
            }
            None => {
                self.lines.push(CartLine {
                    id: Uuid::new_v4(),
                    product: product.clone(),
                    variant: variant.cloned(),
                    quantity,
                    added_at: Utc::now(),
                });
                self.lines.len() - 1
            }
        };
        self.touch();
        Ok(&self.lines[idx])
    }

    /// Returns false, leaving the cart untouched, when no such line exists.
    pub fn remove_item(&mut self, product_id: Uuid, variant_id: Option<Uuid>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.is_for(product_id, variant_id));
        let removed = self.lines.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        let removed = self.lines.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn set_line_quantity(&mut self, line_id: Uuid, quantity: u32) -> Result<&CartLine, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let idx = self
            .lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or(CartError::LineNotFound(line_id))?;
        self.lines[idx].quantity = quantity;
        self.touch();
        Ok(&self.lines[idx])
    }

    pub fn line(&self, line_id: Uuid) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.touch();
    }

    pub fn total_items(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::total_price).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn unavailable_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|l| !l.is_available())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::ProductStatus;

    fn product(price_cents: i64) -> Product {
        let mut p = Product::new("Widget", "widget", Decimal::new(price_cents, 2));
        p.status = ProductStatus::Active;
        p.stock_quantity = 10;
        p
    }

    fn cart() -> Cart {
        Cart::new(CartOwner::Session("abc".into()))
    }

    #[test]
    fn empty_cart_has_no_items() {
        let cart = cart();
        assert!(cart.is_empty());
        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.subtotal(), Decimal::ZERO);
    }

    #[test]
    fn adding_same_product_merges_quantities() {
        let mut cart = cart();
        let p = product(2000);
        cart.add_item(&p, None, 2).unwrap();
        let line = cart.add_item(&p, None, 3).unwrap();
        assert_eq!(line.quantity, 5);
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.total_items(), 5);
    }

    #[test]
    fn variants_get_their_own_lines_and_price_override() {
        let mut p = product(2000);
        let mut large = ProductVariant::new("Large");
        large.price = Some(Decimal::new(2500, 2));
        large.stock_quantity = 1;
        p.variants.push(large.clone());

        let mut cart = cart();
        cart.add_item(&p, None, 1).unwrap();
        cart.add_item(&p, Some(&large), 2).unwrap();
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.subtotal(), Decimal::new(7000, 2));
    }

    #[test]
    fn variant_without_override_uses_product_price() {
        let mut p = product(1200);
        let plain = ProductVariant::new("Blue");
        p.variants.push(plain.clone());
        let mut cart = cart();
        let line = cart.add_item(&p, Some(&plain), 1).unwrap();
        assert_eq!(line.unit_price(), Decimal::new(1200, 2));
    }

    #[test]
    fn zero_quantity_and_foreign_variant_are_rejected() {
        let p = product(1000);
        let stranger = ProductVariant::new("Other");
        let mut cart = cart();
        assert_eq!(cart.add_item(&p, None, 0).unwrap_err(), CartError::InvalidQuantity);
        assert!(matches!(
            cart.add_item(&p, Some(&stranger), 1),
            Err(CartError::VariantMismatch { .. })
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn subtotal_for_two_at_twenty() {
        let mut cart = cart();
        cart.add_item(&product(2000), None, 2).unwrap();
        assert_eq!(cart.subtotal(), Decimal::new(4000, 2));
    }

    #[test]
    fn removing_missing_line_leaves_cart_unchanged() {
        let mut cart = cart();
        let p = product(1000);
        cart.add_item(&p, None, 1).unwrap();
        let snapshot = cart.clone();
        assert!(!cart.remove_item(Uuid::new_v4(), None));
        assert!(!cart.remove_line(Uuid::new_v4()));
        assert_eq!(cart, snapshot);
        assert!(cart.remove_item(p.id, None));
        assert!(cart.is_empty());
    }

    #[test]
    fn set_quantity_validates() {
        let mut cart = cart();
        let id = cart.add_item(&product(1000), None, 1).unwrap().id;
        assert_eq!(cart.set_line_quantity(id, 0).unwrap_err(), CartError::InvalidQuantity);
        let missing = Uuid::new_v4();
        assert_eq!(
            cart.set_line_quantity(missing, 2).unwrap_err(),
            CartError::LineNotFound(missing)
        );
        assert_eq!(cart.set_line_quantity(id, 4).unwrap().quantity, 4);
    }

    #[test]
    fn availability_rules() {
        let mut p = product(1000);
        let mut cart = cart();
        cart.add_item(&p, None, 1).unwrap();
        assert!(cart.lines[0].is_available());

        p.stock_quantity = 0;
        cart.lines[0].product = p.clone();
        assert!(!cart.lines[0].is_available());

        p.track_inventory = false;
        cart.lines[0].product = p.clone();
        assert!(cart.lines[0].is_available());

        let mut v = ProductVariant::new("S");
        v.stock_quantity = 0;
        cart.lines[0].variant = Some(v.clone());
        assert!(!cart.lines[0].is_available());
        v.stock_quantity = 2;
        v.is_active = false;
        cart.lines[0].variant = Some(v);
        assert!(!cart.lines[0].is_available());

        p.status = ProductStatus::Inactive;
        cart.lines[0].product = p;
        cart.lines[0].variant = None;
        assert!(!cart.lines[0].is_available());
        assert_eq!(cart.unavailable_lines().count(), 1);
    }

    #[test]
    fn owner_keys_are_distinct() {
        let id = Uuid::new_v4();
        assert_eq!(CartOwner::Customer(id).key(), format!("customer:{id}"));
        assert_eq!(CartOwner::Session("t".into()).key(), "session:t");
        assert_eq!(CartOwner::Session("t".into()).customer_id(), None);
    }
}
