#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a repo feature: `memory` or `sqlite`.");

use async_trait::async_trait;
use shop_types::domain::cart::{Cart, CartOwner};
use shop_types::domain::catalog::Product;
use shop_types::domain::coupon::Coupon;
use shop_types::domain::customer::AddressBook;
use shop_types::domain::order::Order;
use shop_types::domain::payment::{Payment, PaymentWebhook, Refund};
use shop_types::domain::wishlist::Wishlist;
use shop_types::ports::address_repository::AddressRepository;
use shop_types::ports::cart_repository::CartRepository;
use shop_types::ports::catalog_repository::CatalogRepository;
use shop_types::ports::coupon_repository::CouponRepository;
use shop_types::ports::order_repository::OrderRepository;
use shop_types::ports::payment_repository::PaymentRepository;
use shop_types::ports::wishlist_repository::WishlistRepository;
use shop_types::ports::RepoError;
use uuid::Uuid;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub const DEFAULT_SQLITE_URL: &str = "sqlite://shop.db";

/// The backing store picked at startup.
pub enum Repo {
    #[cfg(feature = "memory")]
    Memory(memory::InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteRepo),
}

pub async fn build_repo(url: Option<&str>) -> anyhow::Result<Repo> {
    Repo::build_repo(url).await
}

impl Repo {
    /// With a database url and the `sqlite` feature, SQLite is used.
    /// Otherwise memory wins when compiled in.
    pub async fn build_repo(database_url: Option<&str>) -> anyhow::Result<Self> {
        match database_url {
            #[cfg(feature = "sqlite")]
            Some(url) => Ok(Self::Sqlite(sqlite::SqliteRepo::new(url).await?)),
            _ => Self::fallback().await,
        }
    }

    #[cfg(feature = "memory")]
    async fn fallback() -> anyhow::Result<Self> {
        Ok(Self::Memory(memory::InMemoryRepo::new()))
    }

    #[cfg(all(feature = "sqlite", not(feature = "memory")))]
    async fn fallback() -> anyhow::Result<Self> {
        Ok(Self::Sqlite(sqlite::SqliteRepo::new(DEFAULT_SQLITE_URL).await?))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            #[cfg(feature = "memory")]
            Repo::Memory(_) => "memory",
            #[cfg(feature = "sqlite")]
            Repo::Sqlite(_) => "sqlite",
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $repo:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "memory")]
            Repo::Memory($repo) => $call.await,
            #[cfg(feature = "sqlite")]
            Repo::Sqlite($repo) => $call.await,
        }
    };
}

#[async_trait]
impl CatalogRepository for Repo {
    async fn upsert_product(&self, product: Product) -> Result<Product, RepoError> {
        dispatch!(self, r => r.upsert_product(product))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        dispatch!(self, r => r.get_product(id))
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepoError> {
        dispatch!(self, r => r.get_product_by_slug(slug))
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        dispatch!(self, r => r.list_products())
    }

    async fn record_view(&self, id: Uuid) -> Result<(), RepoError> {
        dispatch!(self, r => r.record_view(id))
    }
}

#[async_trait]
impl CartRepository for Repo {
    async fn get_or_create_cart(&self, owner: &CartOwner) -> Result<Cart, RepoError> {
        dispatch!(self, r => r.get_or_create_cart(owner))
    }

    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, RepoError> {
        dispatch!(self, r => r.find_cart(owner))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<Cart, RepoError> {
        dispatch!(self, r => r.save_cart(cart))
    }
}

#[async_trait]
impl CouponRepository for Repo {
    async fn upsert_coupon(&self, coupon: Coupon) -> Result<Coupon, RepoError> {
        dispatch!(self, r => r.upsert_coupon(coupon))
    }

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>, RepoError> {
        dispatch!(self, r => r.get_coupon(code))
    }
}

#[async_trait]
impl OrderRepository for Repo {
    async fn place_order(&self, order: Order) -> Result<Order, RepoError> {
        dispatch!(self, r => r.place_order(order))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        dispatch!(self, r => r.get_order(id))
    }

    async fn get_order_by_number(&self, order_number: &str) -> Result<Option<Order>, RepoError> {
        dispatch!(self, r => r.get_order_by_number(order_number))
    }

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, RepoError> {
        dispatch!(self, r => r.list_orders_for_customer(customer_id))
    }

    async fn update_order(&self, order: Order) -> Result<Option<Order>, RepoError> {
        dispatch!(self, r => r.update_order(order))
    }
}

#[async_trait]
impl PaymentRepository for Repo {
    async fn create_payment(&self, payment: Payment) -> Result<Payment, RepoError> {
        dispatch!(self, r => r.create_payment(payment))
    }

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, RepoError> {
        dispatch!(self, r => r.get_payment(id))
    }

    async fn list_payments(&self, order_id: Uuid) -> Result<Vec<Payment>, RepoError> {
        dispatch!(self, r => r.list_payments(order_id))
    }

    async fn create_refund(&self, refund: Refund) -> Result<Refund, RepoError> {
        dispatch!(self, r => r.create_refund(refund))
    }

    async fn list_refunds(&self, payment_id: Uuid) -> Result<Vec<Refund>, RepoError> {
        dispatch!(self, r => r.list_refunds(payment_id))
    }

    async fn store_webhook(
        &self,
        webhook: PaymentWebhook,
    ) -> Result<(PaymentWebhook, bool), RepoError> {
        dispatch!(self, r => r.store_webhook(webhook))
    }
}

#[async_trait]
impl WishlistRepository for Repo {
    async fn get_or_create_wishlist(&self, customer_id: Uuid) -> Result<Wishlist, RepoError> {
        dispatch!(self, r => r.get_or_create_wishlist(customer_id))
    }

    async fn find_wishlist(&self, customer_id: Uuid) -> Result<Option<Wishlist>, RepoError> {
        dispatch!(self, r => r.find_wishlist(customer_id))
    }

    async fn save_wishlist(&self, wishlist: &Wishlist) -> Result<Wishlist, RepoError> {
        dispatch!(self, r => r.save_wishlist(wishlist))
    }
}

#[async_trait]
impl AddressRepository for Repo {
    async fn load_address_book(&self, customer_id: Uuid) -> Result<AddressBook, RepoError> {
        dispatch!(self, r => r.load_address_book(customer_id))
    }

    async fn save_address_book(&self, book: &AddressBook) -> Result<AddressBook, RepoError> {
        dispatch!(self, r => r.save_address_book(book))
    }
}
