pub mod address_service;
pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;
pub mod identity;
pub mod order_service;
pub mod payment_service;
pub mod wishlist_service;

use std::sync::Arc;

use shop_types::domain::pricing::PricingConfig;
use shop_types::ports::ShopRepository;

use address_service::AddressService;
use cart_service::CartService;
use catalog_service::CatalogService;
use checkout_service::CheckoutService;
use order_service::OrderService;
use payment_service::PaymentService;
use wishlist_service::WishlistService;

/// All storefront services over one shared store.
pub struct Storefront<R: ShopRepository> {
    pub catalog: CatalogService<R>,
    pub carts: CartService<R>,
    pub checkout: CheckoutService<R>,
    pub orders: OrderService<R>,
    pub payments: PaymentService<R>,
    pub wishlist: WishlistService<R>,
    pub addresses: AddressService<R>,
}

impl<R: ShopRepository> Storefront<R> {
    pub fn new(repo: Arc<R>, pricing: PricingConfig) -> Self {
        Self {
            catalog: CatalogService::new(repo.clone()),
            carts: CartService::new(repo.clone(), pricing.clone()),
            checkout: CheckoutService::new(repo.clone(), pricing),
            orders: OrderService::new(repo.clone()),
            payments: PaymentService::new(repo.clone()),
            wishlist: WishlistService::new(repo.clone()),
            addresses: AddressService::new(repo),
        }
    }
}
