use std::sync::Arc;

use serde::Serialize;
use shop_types::domain::cart::Identity;
use shop_types::domain::catalog::Product;
use shop_types::domain::wishlist::{Wishlist, WishlistItem};
use shop_types::ports::catalog_repository::CatalogRepository;
use shop_types::ports::wishlist_repository::WishlistRepository;
use shop_types::ports::ShopRepository;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WishlistEntry {
    #[serde(flatten)]
    pub item: WishlistItem,
    pub product: Product,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WishlistView {
    pub id: Uuid,
    pub name: String,
    pub item_count: usize,
    pub items: Vec<WishlistEntry>,
}

/// Body returned by wishlist mutations.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WishlistChange {
    pub message: String,
    pub in_wishlist: bool,
    pub wishlist_count: usize,
}

pub struct WishlistService<R: ShopRepository> {
    repo: Arc<R>,
}

impl<R: ShopRepository> WishlistService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    fn customer(identity: &Identity) -> Result<Uuid, AppError> {
        identity
            .customer_id()
            .ok_or_else(|| AppError::Unauthorized("sign in to use the wishlist".into()))
    }

    /// Opening the wishlist creates it on first use.
    pub async fn view(&self, identity: &Identity) -> Result<WishlistView, AppError> {
        let customer_id = Self::customer(identity)?;
        let wishlist = self.repo.get_or_create_wishlist(customer_id).await?;
        self.hydrate(wishlist).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add(&self, identity: &Identity, product_id: Uuid) -> Result<WishlistChange, AppError> {
        let customer_id = Self::customer(identity)?;
        let product = match self.repo.get_product(product_id).await? {
            Some(p) if p.is_active() => p,
            _ => return Err(AppError::NotFound(format!("product {product_id}"))),
        };

        let mut wishlist = self.repo.get_or_create_wishlist(customer_id).await?;
        let message = if wishlist.add_item(product.id) {
            wishlist = self.repo.save_wishlist(&wishlist).await?;
            format!("{} added to wishlist", product.name)
        } else {
            format!("{} is already in your wishlist", product.name)
        };
        Ok(WishlistChange {
            message,
            in_wishlist: true,
            wishlist_count: wishlist.item_count(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, identity: &Identity, product_id: Uuid) -> Result<WishlistChange, AppError> {
        let customer_id = Self::customer(identity)?;
        let product = self
            .repo
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
        let mut wishlist = self
            .repo
            .find_wishlist(customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("wishlist".into()))?;

        let message = if wishlist.remove_item(product.id) {
            wishlist = self.repo.save_wishlist(&wishlist).await?;
            format!("{} removed from wishlist", product.name)
        } else {
            format!("{} was not in your wishlist", product.name)
        };
        Ok(WishlistChange {
            message,
            in_wishlist: false,
            wishlist_count: wishlist.item_count(),
        })
    }

    async fn hydrate(&self, wishlist: Wishlist) -> Result<WishlistView, AppError> {
        let mut items = Vec::with_capacity(wishlist.items.len());
        for item in wishlist.items.iter().cloned() {
            if let Some(product) = self.repo.get_product(item.product_id).await? {
                items.push(WishlistEntry { item, product });
            }
        }
        Ok(WishlistView {
            id: wishlist.id,
            name: wishlist.name.clone(),
            item_count: items.len(),
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shop_repo::memory::InMemoryRepo;
    use shop_types::domain::catalog::ProductStatus;

    async fn seeded() -> (Arc<InMemoryRepo>, WishlistService<InMemoryRepo>, Product) {
        let repo = Arc::new(InMemoryRepo::new());
        let mut vase = Product::new("Vase", "vase", Decimal::new(3000, 2));
        vase.status = ProductStatus::Active;
        let vase = repo.upsert_product(vase).await.unwrap();
        (repo.clone(), WishlistService::new(repo), vase)
    }

    fn customer() -> Identity {
        Identity::Authenticated {
            customer_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn add_is_idempotent_and_view_hydrates_products() {
        let (_, svc, vase) = seeded().await;
        let me = customer();

        let first = svc.add(&me, vase.id).await.unwrap();
        assert_eq!(first.message, "Vase added to wishlist");
        assert_eq!(first.wishlist_count, 1);
        let again = svc.add(&me, vase.id).await.unwrap();
        assert_eq!(again.message, "Vase is already in your wishlist");
        assert_eq!(again.wishlist_count, 1);

        let view = svc.view(&me).await.unwrap();
        assert_eq!(view.item_count, 1);
        assert_eq!(view.items[0].product.slug, "vase");
    }

    #[tokio::test]
    async fn remove_reports_missing_entries_without_failing() {
        let (_, svc, vase) = seeded().await;
        let me = customer();
        assert!(matches!(
            svc.remove(&me, vase.id).await,
            Err(AppError::NotFound(_))
        ));

        svc.add(&me, vase.id).await.unwrap();
        let removed = svc.remove(&me, vase.id).await.unwrap();
        assert_eq!(removed.message, "Vase removed from wishlist");
        assert!(!removed.in_wishlist);
        assert_eq!(removed.wishlist_count, 0);

        let again = svc.remove(&me, vase.id).await.unwrap();
        assert_eq!(again.message, "Vase was not in your wishlist");
    }

    #[tokio::test]
    async fn inactive_products_and_guests_are_refused() {
        let (repo, svc, _) = seeded().await;
        let mut draft = Product::new("Draft", "draft", Decimal::ONE);
        draft.status = ProductStatus::Draft;
        let draft = repo.upsert_product(draft).await.unwrap();

        assert!(matches!(
            svc.add(&customer(), draft.id).await,
            Err(AppError::NotFound(_))
        ));
        let guest = Identity::Anonymous {
            session_token: Some("abc".into()),
        };
        assert!(matches!(svc.view(&guest).await, Err(AppError::Unauthorized(_))));
        assert!(matches!(
            svc.add(&guest, draft.id).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
