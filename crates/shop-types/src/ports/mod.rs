pub mod address_repository;
pub mod cart_repository;
pub mod catalog_repository;
pub mod coupon_repository;
pub mod order_repository;
pub mod payment_repository;
pub mod wishlist_repository;

use address_repository::AddressRepository;
use cart_repository::CartRepository;
use catalog_repository::CatalogRepository;
use coupon_repository::CouponRepository;
use order_repository::OrderRepository;
use payment_repository::PaymentRepository;
use wishlist_repository::WishlistRepository;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("db error: {0}")]
    DbError(String),

    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("coupon {0} has no redemptions left")]
    CouponExhausted(String),
}

/// Everything the application layer needs from a single backing store.
pub trait ShopRepository:
    CatalogRepository
    + CartRepository
    + CouponRepository
    + OrderRepository
    + PaymentRepository
    + WishlistRepository
    + AddressRepository
{
}

impl<T> ShopRepository for T where
    T: CatalogRepository
        + CartRepository
        + CouponRepository
        + OrderRepository
        + PaymentRepository
        + WishlistRepository
        + AddressRepository
{
}
