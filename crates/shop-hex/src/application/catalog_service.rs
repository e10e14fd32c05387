use std::sync::Arc;

use serde::Serialize;
use shop_types::domain::catalog::{
    quick_search, related_products, Page, Product, ProductQuery, ProductVariant,
};
use shop_types::ports::catalog_repository::CatalogRepository;
use shop_types::ports::{RepoError, ShopRepository};

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub variants: Vec<ProductVariant>,
    pub related: Vec<Product>,
}

pub struct CatalogService<R: ShopRepository> {
    repo: Arc<R>,
}

impl<R: ShopRepository> CatalogService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, query: &ProductQuery) -> Result<Page<Product>, AppError> {
        let products = self.repo.list_products().await?;
        Ok(query.apply(products))
    }

    pub async fn search(&self, q: &str) -> Result<Vec<Product>, AppError> {
        let products = self.repo.list_products().await?;
        Ok(quick_search(products, q))
    }

    /// Active product by slug; counts as a view.
    #[tracing::instrument(skip(self))]
    pub async fn detail(&self, slug: &str) -> Result<ProductDetail, AppError> {
        let mut product = self
            .repo
            .get_product_by_slug(slug)
            .await?
            .filter(|p| p.is_active())
            .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

        self.repo.record_view(product.id).await?;
        product.view_count += 1;

        let related = related_products(&product, self.repo.list_products().await?);
        let variants = product.active_variants().cloned().collect();
        Ok(ProductDetail {
            product,
            variants,
            related,
        })
    }

    pub async fn upsert_product(&self, product: Product) -> Result<Product, AppError> {
        match self.repo.upsert_product(product).await {
            Ok(p) => Ok(p),
            Err(RepoError::Duplicate(what)) => Err(AppError::Conflict(format!("{what} already exists"))),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shop_repo::memory::InMemoryRepo;
    use shop_types::domain::catalog::{ProductSort, ProductStatus};

    fn product(name: &str, cents: i64, category: &str) -> Product {
        let mut p = Product::new(name, name.to_lowercase().replace(' ', "-"), Decimal::new(cents, 2));
        p.status = ProductStatus::Active;
        p.category = Some(category.into());
        p
    }

    async fn seeded() -> CatalogService<InMemoryRepo> {
        let svc = CatalogService::new(Arc::new(InMemoryRepo::new()));
        for p in [
            product("Blue Mug", 900, "kitchen"),
            product("Red Mug", 1100, "kitchen"),
            product("Teapot", 3500, "kitchen"),
            product("Desk Lamp", 4500, "office"),
        ] {
            svc.upsert_product(p).await.unwrap();
        }
        let mut hidden = product("Draft Mug", 500, "kitchen");
        hidden.status = ProductStatus::Draft;
        svc.upsert_product(hidden).await.unwrap();
        svc
    }

    #[tokio::test]
    async fn list_filters_and_sorts_active_products() {
        let svc = seeded().await;
        let page = svc
            .list(&ProductQuery {
                category: Some("kitchen".into()),
                sort: ProductSort::PriceHigh,
                ..Default::default()
            })
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Teapot", "Red Mug", "Blue Mug"]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn quick_search_needs_two_characters() {
        let svc = seeded().await;
        assert!(svc.search("m").await.unwrap().is_empty());
        assert_eq!(svc.search("mug").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn detail_counts_views_and_lists_related() {
        let svc = seeded().await;
        let detail = svc.detail("blue-mug").await.unwrap();
        assert_eq!(detail.product.view_count, 1);
        assert_eq!(detail.related.len(), 2);
        assert!(detail.related.iter().all(|p| p.name != "Blue Mug"));

        let again = svc.detail("blue-mug").await.unwrap();
        assert_eq!(again.product.view_count, 2);

        assert!(matches!(svc.detail("draft-mug").await, Err(AppError::NotFound(_))));
        assert!(matches!(svc.detail("nope").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_slugs_conflict() {
        let svc = seeded().await;
        let res = svc.upsert_product(product("Teapot", 100, "kitchen")).await;
        assert!(matches!(res, Err(AppError::Conflict(_))));
    }
}
