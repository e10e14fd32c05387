use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CATALOG_PAGE_SIZE: u32 = 12;
pub const RELATED_PRODUCTS_LIMIT: usize = 4;
pub const QUICK_SEARCH_LIMIT: usize = 10;
pub const QUICK_SEARCH_MIN_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Draft,
    Active,
    Inactive,
    OutOfStock,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "draft",
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ProductStatus::Draft),
            "active" => Ok(ProductStatus::Active),
            "inactive" => Ok(ProductStatus::Inactive),
            "out_of_stock" => Ok(ProductStatus::OutOfStock),
            other => Err(format!("unknown product status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductVariant {
    pub id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    /// Overrides the product price when set.
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub stock_quantity: i64,
    pub is_active: bool,
}

impl ProductVariant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            sku: None,
            price: None,
            compare_at_price: None,
            stock_quantity: 0,
            is_active: true,
        }
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    pub fn effective_price(&self, product: &Product) -> Decimal {
        self.price.unwrap_or(product.price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub short_description: String,
    /// Slug of the primary category.
    pub category: Option<String>,
    /// Additional category slugs the product is listed under.
    #[serde(default)]
    pub categories: Vec<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub track_inventory: bool,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub view_count: u64,
    pub sales_count: u64,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            name: name.into(),
            description: String::new(),
            short_description: String::new(),
            category: None,
            categories: Vec::new(),
            price,
            compare_at_price: None,
            sku: None,
            track_inventory: true,
            stock_quantity: 0,
            low_stock_threshold: 5,
            status: ProductStatus::Draft,
            is_featured: false,
            view_count: 0,
            sales_count: 0,
            variants: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    pub fn is_in_stock(&self) -> bool {
        !self.track_inventory || self.stock_quantity > 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.track_inventory && self.stock_quantity <= self.low_stock_threshold
    }

    /// Whole percentage saved relative to `compare_at_price`, 0 when not on sale.
    pub fn discount_percentage(&self) -> u32 {
        match self.compare_at_price {
            Some(compare) if compare > self.price && !compare.is_zero() => {
                let pct = (compare - self.price) / compare * Decimal::ONE_HUNDRED;
                pct.trunc().to_u32().unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn variant(&self, id: Uuid) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn active_variants(&self) -> impl Iterator<Item = &ProductVariant> {
        self.variants.iter().filter(|v| v.is_active)
    }

    pub fn in_category(&self, slug: &str) -> bool {
        self.category.as_deref() == Some(slug) || self.categories.iter().any(|c| c == slug)
    }

    fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.short_description.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Name,
    PriceLow,
    PriceHigh,
    Newest,
    Popular,
    Rating,
}

impl ProductSort {
    /// Unknown keys fall back to sorting by name.
    pub fn parse_lenient(key: &str) -> Self {
        match key {
            "price_low" => ProductSort::PriceLow,
            "price_high" => ProductSort::PriceHigh,
            "newest" => ProductSort::Newest,
            "popular" => ProductSort::Popular,
            "rating" => ProductSort::Rating,
            _ => ProductSort::Name,
        }
    }

    fn compare(&self, a: &Product, b: &Product) -> Ordering {
        match self {
            ProductSort::Name => a.name.cmp(&b.name),
            ProductSort::PriceLow => a.price.cmp(&b.price),
            ProductSort::PriceHigh => b.price.cmp(&a.price),
            ProductSort::Newest => b.created_at.cmp(&a.created_at),
            ProductSort::Popular => b.sales_count.cmp(&a.sales_count),
            // No ratings are collected; views stand in for them.
            ProductSort::Rating => b.view_count.cmp(&a.view_count),
        }
    }
}

/// Catalog listing filters. Only active products are ever listed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    pub page: u32,
}

impl ProductQuery {
    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_active() {
            return false;
        }
        if let Some(category) = self.category.as_deref() {
            if !product.in_category(category) {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            if !product.matches_text(search) {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| product.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| product.price > max) {
            return false;
        }
        true
    }

    pub fn apply(&self, products: Vec<Product>) -> Page<Product> {
        let mut matching: Vec<Product> = products.into_iter().filter(|p| self.matches(p)).collect();
        matching.sort_by(|a, b| self.sort.compare(a, b));
        Page::paginate(matching, self.page, CATALOG_PAGE_SIZE)
    }
}

/// Active products whose name or description contains `query`, capped for
/// type-ahead suggestions.
pub fn quick_search(products: Vec<Product>, query: &str) -> Vec<Product> {
    let query = query.trim();
    if query.chars().count() < QUICK_SEARCH_MIN_CHARS {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    let mut hits: Vec<Product> = products
        .into_iter()
        .filter(|p| p.is_active())
        .filter(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
        })
        .collect();
    hits.sort_by(by_name);
    hits.truncate(QUICK_SEARCH_LIMIT);
    hits
}

/// Up to four other active products sharing the primary category.
pub fn related_products(product: &Product, candidates: Vec<Product>) -> Vec<Product> {
    let mut related: Vec<Product> = candidates
        .into_iter()
        .filter(|p| p.id != product.id && p.is_active() && p.category == product.category)
        .collect();
    related.sort_by(by_name);
    related.truncate(RELATED_PRODUCTS_LIMIT);
    related
}

fn by_name(a: &Product, b: &Product) -> Ordering {
    a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Pages are 1-based; page 0 is treated as 1 and pages past the end are empty.
    pub fn paginate(items: Vec<T>, page: u32, per_page: u32) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = items.len();
        let total_pages = total.div_ceil(per_page as usize) as u32;
        let skip = (page as usize - 1) * per_page as usize;
        let items = items.into_iter().skip(skip).take(per_page as usize).collect();
        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}
