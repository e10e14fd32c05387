use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shop_types::domain::cart::{Cart, Identity};
use shop_types::domain::pricing::{round_money, PricingConfig, Totals};
use shop_types::ports::cart_repository::CartRepository;
use shop_types::ports::catalog_repository::CatalogRepository;
use shop_types::ports::ShopRepository;
use uuid::Uuid;

use super::identity::{find_cart, resolve_cart, Scoped};
use crate::errors::AppError;

/// Body returned by every cart mutation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CartSummary {
    pub message: String,
    pub cart_count: u64,
    pub cart_subtotal: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_total: Option<Decimal>,
}

impl CartSummary {
    fn of(cart: &Cart, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cart_count: cart.total_items(),
            cart_subtotal: round_money(cart.subtotal()),
            item_total: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CartDetail {
    pub cart: Cart,
    pub totals: Totals,
    pub unavailable_items: Vec<Uuid>,
}

pub struct CartService<R: ShopRepository> {
    repo: Arc<R>,
    pricing: PricingConfig,
}

impl<R: ShopRepository> CartService<R> {
    pub fn new(repo: Arc<R>, pricing: PricingConfig) -> Self {
        Self { repo, pricing }
    }

    #[tracing::instrument(skip(self))]
    pub async fn detail(&self, identity: &Identity) -> Result<Scoped<CartDetail>, AppError> {
        let scoped = resolve_cart(self.repo.as_ref(), identity).await?;
        Ok(scoped.map(|cart| {
            let totals = self.pricing.quote(cart.subtotal(), Decimal::ZERO);
            let unavailable_items = cart.unavailable_lines().map(|l| l.id).collect();
            CartDetail {
                cart,
                totals,
                unavailable_items,
            }
        }))
    }

    /// Item count for page chrome. Never creates a cart.
    pub async fn count(&self, identity: &Identity) -> Result<u64, AppError> {
        let cart = find_cart(self.repo.as_ref(), identity).await?;
        Ok(cart.map(|c| c.total_items()).unwrap_or(0))
    }

    #[tracing::instrument(skip(self))]
    pub async fn add(
        &self,
        identity: &Identity,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: u32,
    ) -> Result<Scoped<CartSummary>, AppError> {
        if quantity == 0 {
            return Err(AppError::BadRequest("quantity must be at least 1".into()));
        }
        let product = self
            .repo
            .get_product(product_id)
            .await?
            .filter(|p| p.is_active())
            .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
        let variant = match variant_id {
            Some(id) => Some(
                product
                    .variant(id)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound(format!("variant {id}")))?,
            ),
            None => None,
        };

        let Scoped {
            value: mut cart,
            minted_session,
        } = resolve_cart(self.repo.as_ref(), identity).await?;
        cart.add_item(&product, variant.as_ref(), quantity)?;
        let cart = self.repo.save_cart(&cart).await?;
        tracing::debug!(cart_id = %cart.id, %product_id, quantity, "item added");

        Ok(Scoped {
            value: CartSummary::of(&cart, format!("{} added to cart", product.name)),
            minted_session,
        })
    }

    /// Removes a line by id. A line outside this cart is `NotFound` and the
    /// cart is left as it was.
    #[tracing::instrument(skip(self))]
    pub async fn remove(
        &self,
        identity: &Identity,
        line_id: Uuid,
    ) -> Result<Scoped<CartSummary>, AppError> {
        let Scoped {
            value: mut cart,
            minted_session,
        } = resolve_cart(self.repo.as_ref(), identity).await?;
        if !cart.remove_line(line_id) {
            return Err(AppError::NotFound(format!("cart item {line_id}")));
        }
        let cart = self.repo.save_cart(&cart).await?;
        Ok(Scoped {
            value: CartSummary::of(&cart, "Item removed from cart"),
            minted_session,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        identity: &Identity,
        line_id: Uuid,
        quantity: u32,
    ) -> Result<Scoped<CartSummary>, AppError> {
        if quantity == 0 {
            return Err(AppError::BadRequest("quantity must be at least 1".into()));
        }
        let Scoped {
            value: mut cart,
            minted_session,
        } = resolve_cart(self.repo.as_ref(), identity).await?;
        cart.set_line_quantity(line_id, quantity)?;
        let cart = self.repo.save_cart(&cart).await?;

        let mut summary = CartSummary::of(&cart, "Cart updated");
        summary.item_total = cart.line(line_id).map(|l| round_money(l.total_price()));
        Ok(Scoped {
            value: summary,
            minted_session,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, identity: &Identity) -> Result<Scoped<CartSummary>, AppError> {
        let Scoped {
            value: mut cart,
            minted_session,
        } = resolve_cart(self.repo.as_ref(), identity).await?;
        cart.clear();
        let cart = self.repo.save_cart(&cart).await?;
        Ok(Scoped {
            value: CartSummary::of(&cart, "Cart cleared"),
            minted_session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shop_repo::memory::InMemoryRepo;
    use shop_types::domain::catalog::{Product, ProductStatus, ProductVariant};

    fn customer() -> Identity {
        Identity::Authenticated {
            customer_id: Uuid::new_v4(),
        }
    }

    async fn setup() -> (CartService<InMemoryRepo>, Product) {
        let repo = Arc::new(InMemoryRepo::new());
        let mut widget = Product::new("Widget", "widget", Decimal::new(2000, 2));
        widget.status = ProductStatus::Active;
        widget.stock_quantity = 10;
        let mut large = ProductVariant::new("Large");
        large.price = Some(Decimal::new(2500, 2));
        large.stock_quantity = 2;
        widget.variants.push(large);
        let widget = repo.upsert_product(widget).await.unwrap();
        (CartService::new(repo, PricingConfig::default()), widget)
    }

    #[tokio::test]
    async fn add_merges_and_reports_totals() {
        let (svc, widget) = setup().await;
        let me = customer();

        let first = svc.add(&me, widget.id, None, 1).await.unwrap();
        assert_eq!(first.value.message, "Widget added to cart");
        let second = svc.add(&me, widget.id, None, 1).await.unwrap();
        assert_eq!(second.value.cart_count, 2);
        assert_eq!(second.value.cart_subtotal.to_string(), "40.00");

        let detail = svc.detail(&me).await.unwrap().value;
        assert_eq!(detail.cart.lines.len(), 1);
        assert_eq!(detail.totals.tax_amount, Decimal::new(320, 2));
        assert_eq!(detail.totals.total, Decimal::new(5320, 2));
        assert!(detail.unavailable_items.is_empty());
    }

    #[tokio::test]
    async fn variant_lines_use_the_override_price() {
        let (svc, widget) = setup().await;
        let me = customer();
        let large = widget.variants[0].id;
        let summary = svc.add(&me, widget.id, Some(large), 2).await.unwrap().value;
        assert_eq!(summary.cart_subtotal, Decimal::new(5000, 2));

        let missing = svc.add(&me, widget.id, Some(Uuid::new_v4()), 1).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn anonymous_callers_get_a_session_once() {
        let (svc, widget) = setup().await;
        let anon = Identity::Anonymous { session_token: None };
        let added = svc.add(&anon, widget.id, None, 3).await.unwrap();
        let token = added.minted_session.expect("minted token");

        let returning = Identity::Anonymous {
            session_token: Some(token),
        };
        assert_eq!(svc.count(&returning).await.unwrap(), 3);
        let again = svc.add(&returning, widget.id, None, 1).await.unwrap();
        assert!(again.minted_session.is_none());
        assert_eq!(again.value.cart_count, 4);
    }

    #[tokio::test]
    async fn count_is_zero_without_a_cart() {
        let (svc, _) = setup().await;
        assert_eq!(svc.count(&customer()).await.unwrap(), 0);
        assert_eq!(
            svc.count(&Identity::Anonymous { session_token: None })
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn update_remove_and_clear() {
        let (svc, widget) = setup().await;
        let me = customer();
        svc.add(&me, widget.id, None, 1).await.unwrap();
        let line = svc.detail(&me).await.unwrap().value.cart.lines[0].id;

        let updated = svc.update(&me, line, 5).await.unwrap().value;
        assert_eq!(updated.cart_count, 5);
        assert_eq!(updated.item_total, Some(Decimal::new(10000, 2)));

        assert!(matches!(
            svc.update(&me, line, 0).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            svc.remove(&me, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(svc.count(&me).await.unwrap(), 5);

        let removed = svc.remove(&me, line).await.unwrap().value;
        assert_eq!(removed.cart_count, 0);

        svc.add(&me, widget.id, None, 2).await.unwrap();
        let cleared = svc.clear(&me).await.unwrap().value;
        assert_eq!(cleared.cart_count, 0);
        assert_eq!(cleared.cart_subtotal.to_string(), "0.00");
    }

    #[tokio::test]
    async fn inactive_or_unknown_products_cannot_be_added() {
        let (svc, mut widget) = setup().await;
        let me = customer();
        assert!(matches!(
            svc.add(&me, Uuid::new_v4(), None, 1).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.add(&me, widget.id, None, 0).await,
            Err(AppError::BadRequest(_))
        ));

        widget.status = ProductStatus::Inactive;
        svc.repo.upsert_product(widget.clone()).await.unwrap();
        assert!(matches!(
            svc.add(&me, widget.id, None, 1).await,
            Err(AppError::NotFound(_))
        ));
    }
}
