use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shop_types::domain::cart::{Cart, CartLine, CartOwner};
use shop_types::domain::catalog::Product;
use shop_types::domain::coupon::Coupon;
use shop_types::domain::customer::{AddressBook, SavedAddress};
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
use std::sync::Arc;
use uuid::Uuid;

/// Cart as persisted: lines reference the catalog by id only.
#[derive(Clone)]
struct StoredCart {
    id: Uuid,
    owner: CartOwner,
    is_active: bool,
    lines: Vec<StoredLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone)]
struct StoredLine {
    id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: u32,
    added_at: DateTime<Utc>,
}

impl StoredCart {
    fn empty(owner: &CartOwner) -> Self {
        let cart = Cart::new(owner.clone());
        Self::from(&cart)
    }
}

impl From<&Cart> for StoredCart {
    fn from(cart: &Cart) -> Self {
        Self {
            id: cart.id,
            owner: cart.owner.clone(),
            is_active: cart.is_active,
            lines: cart
                .lines
                .iter()
                .map(|l| StoredLine {
                    id: l.id,
                    product_id: l.product.id,
                    variant_id: l.variant_id(),
                    quantity: l.quantity,
                    added_at: l.added_at,
                })
                .collect(),
            created_at: cart.created_at,
            updated_at: cart.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct InMemoryRepo {
    products: Arc<DashMap<Uuid, Product>>,
    carts: Arc<DashMap<String, StoredCart>>,
    coupons: Arc<DashMap<String, Coupon>>,
    orders: Arc<DashMap<Uuid, Order>>,
    order_numbers: Arc<DashMap<String, Uuid>>,
    payments: Arc<DashMap<Uuid, Payment>>,
    transaction_ids: Arc<DashMap<String, Uuid>>,
    refunds: Arc<DashMap<Uuid, Refund>>,
    webhooks: Arc<DashMap<String, PaymentWebhook>>,
    wishlists: Arc<DashMap<Uuid, Wishlist>>,
    addresses: Arc<DashMap<Uuid, Vec<SavedAddress>>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            products: Arc::new(DashMap::new()),
            carts: Arc::new(DashMap::new()),
            coupons: Arc::new(DashMap::new()),
            orders: Arc::new(DashMap::new()),
            order_numbers: Arc::new(DashMap::new()),
            payments: Arc::new(DashMap::new()),
            transaction_ids: Arc::new(DashMap::new()),
            refunds: Arc::new(DashMap::new()),
            webhooks: Arc::new(DashMap::new()),
            wishlists: Arc::new(DashMap::new()),
            addresses: Arc::new(DashMap::new()),
        }
    }

    /// Resolves line references against the live catalog. Lines whose
    /// product or variant has disappeared are dropped.
    fn hydrate(&self, stored: StoredCart) -> Cart {
        let lines = stored
            .lines
            .into_iter()
            .filter_map(|l| {
                let product = self.products.get(&l.product_id)?.clone();
                let variant = match l.variant_id {
                    Some(vid) => Some(product.variant(vid)?.clone()),
                    None => None,
                };
                Some(CartLine {
                    id: l.id,
                    product,
                    variant,
                    quantity: l.quantity,
                    added_at: l.added_at,
                })
            })
            .collect();
        Cart {
            id: stored.id,
            owner: stored.owner,
            is_active: stored.is_active,
            lines,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepo {
    async fn upsert_product(&self, product: Product) -> Result<Product, RepoError> {
        let slug_taken = self
            .products
            .iter()
            .any(|kv| kv.slug == product.slug && kv.id != product.id);
        if slug_taken {
            return Err(RepoError::Duplicate(format!("product slug {}", product.slug)));
        }
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        Ok(self.products.get(&id).map(|r| r.clone()))
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepoError> {
        Ok(self
            .products
            .iter()
            .find(|kv| kv.slug == slug)
            .map(|kv| kv.value().clone()))
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        Ok(self.products.iter().map(|kv| kv.value().clone()).collect())
    }

    async fn record_view(&self, id: Uuid) -> Result<(), RepoError> {
        if let Some(mut p) = self.products.get_mut(&id) {
            p.view_count += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl CartRepository for InMemoryRepo {
    async fn get_or_create_cart(&self, owner: &CartOwner) -> Result<Cart, RepoError> {
        let stored = self
            .carts
            .entry(owner.key())
            .or_insert_with(|| StoredCart::empty(owner))
            .clone();
        Ok(self.hydrate(stored))
    }

    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, RepoError> {
        let stored = self
            .carts
            .get(&owner.key())
            .filter(|c| c.is_active)
            .map(|c| c.clone());
        Ok(stored.map(|s| self.hydrate(s)))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<Cart, RepoError> {
        let stored = StoredCart::from(cart);
        self.carts.insert(cart.owner.key(), stored.clone());
        Ok(self.hydrate(stored))
    }
}

#[async_trait]
impl CouponRepository for InMemoryRepo {
    async fn upsert_coupon(&self, mut coupon: Coupon) -> Result<Coupon, RepoError> {
        coupon.code = Coupon::normalize_code(&coupon.code);
        self.coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(coupon)
    }

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>, RepoError> {
        Ok(self
            .coupons
            .get(&Coupon::normalize_code(code))
            .map(|c| c.clone()))
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepo {
    async fn place_order(&self, order: Order) -> Result<Order, RepoError> {
        match self.order_numbers.entry(order.order_number.clone()) {
            Entry::Occupied(_) => {
                return Err(RepoError::Duplicate(format!(
                    "order number {}",
                    order.order_number
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(order.id);
            }
        }

        if let Some(applied) = &order.applied_coupon {
            let redeemed = match self.coupons.get_mut(&applied.code) {
                Some(mut coupon) if !coupon.is_exhausted() => {
                    coupon.usage_count += 1;
                    true
                }
                _ => false,
            };
            if !redeemed {
                self.order_numbers.remove(&order.order_number);
                return Err(RepoError::CouponExhausted(applied.code.clone()));
            }
        }

        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        Ok(self.orders.get(&id).map(|r| r.clone()))
    }

    async fn get_order_by_number(&self, order_number: &str) -> Result<Option<Order>, RepoError> {
        let id = match self.order_numbers.get(order_number) {
            Some(id) => *id,
            None => return Ok(None),
        };
        self.get_order(id).await
    }

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, RepoError> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|kv| kv.customer_id == Some(customer_id))
            .map(|kv| kv.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order(&self, order: Order) -> Result<Option<Order>, RepoError> {
        if let Some(mut v) = self.orders.get_mut(&order.id) {
            *v = order.clone();
            return Ok(Some(order));
        }
        Ok(None)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryRepo {
    async fn create_payment(&self, payment: Payment) -> Result<Payment, RepoError> {
        match self.transaction_ids.entry(payment.transaction_id.clone()) {
            Entry::Occupied(_) => Err(RepoError::Duplicate(format!(
                "transaction {}",
                payment.transaction_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(payment.id);
                self.payments.insert(payment.id, payment.clone());
                Ok(payment)
            }
        }
    }

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, RepoError> {
        Ok(self.payments.get(&id).map(|r| r.clone()))
    }

    async fn list_payments(&self, order_id: Uuid) -> Result<Vec<Payment>, RepoError> {
        let mut payments: Vec<Payment> = self
            .payments
            .iter()
            .filter(|kv| kv.order_id == order_id)
            .map(|kv| kv.value().clone())
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn create_refund(&self, refund: Refund) -> Result<Refund, RepoError> {
        self.refunds.insert(refund.id, refund.clone());
        Ok(refund)
    }

    async fn list_refunds(&self, payment_id: Uuid) -> Result<Vec<Refund>, RepoError> {
        Ok(self
            .refunds
            .iter()
            .filter(|kv| kv.payment_id == payment_id)
            .map(|kv| kv.value().clone())
            .collect())
    }

    async fn store_webhook(
        &self,
        webhook: PaymentWebhook,
    ) -> Result<(PaymentWebhook, bool), RepoError> {
        match self.webhooks.entry(webhook.webhook_id.clone()) {
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(slot) => {
                slot.insert(webhook.clone());
                Ok((webhook, true))
            }
        }
    }
}

#[async_trait]
impl WishlistRepository for InMemoryRepo {
    async fn get_or_create_wishlist(&self, customer_id: Uuid) -> Result<Wishlist, RepoError> {
        Ok(self
            .wishlists
            .entry(customer_id)
            .or_insert_with(|| Wishlist::new(customer_id))
            .clone())
    }

    async fn find_wishlist(&self, customer_id: Uuid) -> Result<Option<Wishlist>, RepoError> {
        Ok(self.wishlists.get(&customer_id).map(|w| w.clone()))
    }

    async fn save_wishlist(&self, wishlist: &Wishlist) -> Result<Wishlist, RepoError> {
        if let Some(item) = wishlist
            .items
            .iter()
            .find(|i| !self.products.contains_key(&i.product_id))
        {
            return Err(RepoError::DbError(format!(
                "unknown product {}",
                item.product_id
            )));
        }
        self.wishlists.insert(wishlist.customer_id, wishlist.clone());
        Ok(wishlist.clone())
    }
}

#[async_trait]
impl AddressRepository for InMemoryRepo {
    async fn load_address_book(&self, customer_id: Uuid) -> Result<AddressBook, RepoError> {
        let addresses = self
            .addresses
            .get(&customer_id)
            .map(|a| a.clone())
            .unwrap_or_default();
        Ok(AddressBook::new(customer_id, addresses))
    }

    async fn save_address_book(&self, book: &AddressBook) -> Result<AddressBook, RepoError> {
        self.addresses
            .insert(book.customer_id, book.addresses.clone());
        Ok(book.clone())
    }
}
