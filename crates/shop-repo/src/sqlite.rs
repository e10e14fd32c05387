use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shop_types::domain::cart::{Cart, CartLine, CartOwner};
use shop_types::domain::catalog::Product;
use shop_types::domain::coupon::Coupon;
use shop_types::domain::customer::{AddressBook, AddressKind, SavedAddress};
use shop_types::domain::order::Order;
use shop_types::domain::payment::{Payment, PaymentWebhook, Refund};
use shop_types::domain::wishlist::{Wishlist, WishlistItem};
use shop_types::ports::address_repository::AddressRepository;
use shop_types::ports::cart_repository::CartRepository;
use shop_types::ports::catalog_repository::CatalogRepository;
use shop_types::ports::coupon_repository::CouponRepository;
use shop_types::ports::order_repository::OrderRepository;
use shop_types::ports::payment_repository::PaymentRepository;
use shop_types::ports::wishlist_repository::WishlistRepository;
use shop_types::ports::RepoError;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

pub struct SqliteRepo {
    pool: SqlitePool,
}

fn db_err(e: impl std::fmt::Display) -> RepoError {
    RepoError::DbError(e.to_string())
}

/// Maps unique-constraint failures to `Duplicate`, everything else to `DbError`.
fn write_err(what: String) -> impl FnOnce(sqlx::Error) -> RepoError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Duplicate(what),
        _ => db_err(e),
    }
}

/// Fixed-width timestamps so text ordering matches time ordering.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(db_err)?
        .with_timezone(&Utc))
}

fn parse_id(raw: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(raw).map_err(db_err)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, RepoError> {
    serde_json::to_string(value).map_err(db_err)
}

fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, RepoError> {
    serde_json::from_str(raw).map_err(db_err)
}

#[derive(FromRow)]
struct DbProduct {
    view_count: i64,
    data_json: String,
}

impl DbProduct {
    fn into_product(self) -> Result<Product, RepoError> {
        let mut product: Product = from_json(&self.data_json)?;
        // The column is authoritative; record_view only touches it.
        product.view_count = self.view_count.max(0) as u64;
        Ok(product)
    }
}

#[derive(FromRow)]
struct DbCart {
    id: String,
    customer_id: Option<String>,
    session_key: Option<String>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

#[derive(FromRow)]
struct DbCartLine {
    id: String,
    variant_key: String,
    quantity: i64,
    added_at: String,
    view_count: i64,
    data_json: String,
}

#[derive(FromRow)]
struct DbCoupon {
    usage_count: i64,
    data_json: String,
}

impl DbCoupon {
    fn into_coupon(self) -> Result<Coupon, RepoError> {
        let mut coupon: Coupon = from_json(&self.data_json)?;
        coupon.usage_count = self.usage_count.max(0) as u32;
        Ok(coupon)
    }
}

#[derive(FromRow)]
struct DbJson {
    data_json: String,
}

#[derive(FromRow)]
struct DbWishlist {
    id: String,
    customer_id: String,
    name: String,
    is_public: bool,
    created_at: String,
    updated_at: String,
}

#[derive(FromRow)]
struct DbWishlistItem {
    id: String,
    product_id: String,
    notes: String,
    added_at: String,
}

impl DbWishlistItem {
    fn into_item(self) -> Result<WishlistItem, RepoError> {
        Ok(WishlistItem {
            id: parse_id(&self.id)?,
            product_id: parse_id(&self.product_id)?,
            notes: self.notes,
            added_at: parse_ts(&self.added_at)?,
        })
    }
}

#[derive(FromRow)]
struct DbAddress {
    id: String,
    customer_id: String,
    kind: String,
    is_default: bool,
    is_active: bool,
    created_at: String,
    updated_at: String,
    data_json: String,
}

impl DbAddress {
    fn into_address(self) -> Result<SavedAddress, RepoError> {
        Ok(SavedAddress {
            id: parse_id(&self.id)?,
            customer_id: parse_id(&self.customer_id)?,
            kind: AddressKind::from_str(&self.kind).map_err(db_err)?,
            address: from_json(&self.data_json)?,
            is_default: self.is_default,
            is_active: self.is_active,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

const CART_COLUMNS: &str = "id, customer_id, session_key, is_active, created_at, updated_at";

impl SqliteRepo {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_create_shop.sql");
        for statement in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    async fn load_cart(&self, row: DbCart) -> Result<Cart, RepoError> {
        let owner = match (row.customer_id, row.session_key) {
            (Some(customer), _) => CartOwner::Customer(parse_id(&customer)?),
            (None, Some(session)) => CartOwner::Session(session),
            (None, None) => return Err(db_err(format!("cart {} has no owner", row.id))),
        };

        let line_rows: Vec<DbCartLine> = sqlx::query_as(
            "SELECT l.id, l.variant_key, l.quantity, l.added_at, p.view_count, p.data_json
             FROM cart_lines l JOIN products p ON p.id = l.product_id
             WHERE l.cart_id = ? ORDER BY l.added_at",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut lines = Vec::with_capacity(line_rows.len());
        for l in line_rows {
            let product = DbProduct {
                view_count: l.view_count,
                data_json: l.data_json,
            }
            .into_product()?;
            let variant = if l.variant_key.is_empty() {
                None
            } else {
                // A variant removed from the catalog takes its cart lines with it.
                match product.variant(parse_id(&l.variant_key)?) {
                    Some(v) => Some(v.clone()),
                    None => continue,
                }
            };
            lines.push(CartLine {
                id: parse_id(&l.id)?,
                product,
                variant,
                quantity: u32::try_from(l.quantity).map_err(db_err)?,
                added_at: parse_ts(&l.added_at)?,
            });
        }

        Ok(Cart {
            id: parse_id(&row.id)?,
            owner,
            is_active: row.is_active,
            lines,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }

    async fn wishlist_row(&self, customer_id: Uuid) -> Result<Option<DbWishlist>, RepoError> {
        sqlx::query_as(
            "SELECT id, customer_id, name, is_public, created_at, updated_at
             FROM wishlists WHERE customer_id = ?",
        )
        .bind(customer_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn load_wishlist(&self, row: DbWishlist) -> Result<Wishlist, RepoError> {
        let items: Vec<DbWishlistItem> = sqlx::query_as(
            "SELECT id, product_id, notes, added_at FROM wishlist_items
             WHERE wishlist_id = ? ORDER BY added_at",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Wishlist {
            id: parse_id(&row.id)?,
            customer_id: parse_id(&row.customer_id)?,
            name: row.name,
            is_public: row.is_public,
            items: items
                .into_iter()
                .map(DbWishlistItem::into_item)
                .collect::<Result<Vec<_>, _>>()?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }

    async fn cart_row(&self, owner: &CartOwner) -> Result<Option<DbCart>, RepoError> {
        sqlx::query_as(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE owner_key = ?"
        ))
        .bind(owner.key())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }
}

#[async_trait]
impl CatalogRepository for SqliteRepo {
    async fn upsert_product(&self, product: Product) -> Result<Product, RepoError> {
        // ON CONFLICT DO UPDATE rather than REPLACE: a REPLACE would cascade
        // into cart_lines.
        sqlx::query(
            "INSERT INTO products (id, slug, status, view_count, created_at, updated_at, data_json)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                slug = excluded.slug,
                status = excluded.status,
                view_count = excluded.view_count,
                updated_at = excluded.updated_at,
                data_json = excluded.data_json",
        )
        .bind(product.id.to_string())
        .bind(&product.slug)
        .bind(product.status.as_str())
        .bind(product.view_count as i64)
        .bind(ts(product.created_at))
        .bind(ts(product.updated_at))
        .bind(to_json(&product)?)
        .execute(&self.pool)
        .await
        .map_err(write_err(format!("product slug {}", product.slug)))?;
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        let row: Option<DbProduct> =
            sqlx::query_as("SELECT view_count, data_json FROM products WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbProduct::into_product).transpose()
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepoError> {
        let row: Option<DbProduct> =
            sqlx::query_as("SELECT view_count, data_json FROM products WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbProduct::into_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        let rows: Vec<DbProduct> =
            sqlx::query_as("SELECT view_count, data_json FROM products ORDER BY created_at")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        rows.into_iter()
            .map(DbProduct::into_product)
            .collect::<Result<Vec<_>, _>>()
    }

    async fn record_view(&self, id: Uuid) -> Result<(), RepoError> {
        sqlx::query("UPDATE products SET view_count = view_count + 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl CartRepository for SqliteRepo {
    async fn get_or_create_cart(&self, owner: &CartOwner) -> Result<Cart, RepoError> {
        let fresh = Cart::new(owner.clone());
        // The unique owner_key makes this a race-free upsert.
        sqlx::query(
            "INSERT OR IGNORE INTO carts (id, owner_key, customer_id, session_key, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(fresh.id.to_string())
        .bind(owner.key())
        .bind(owner.customer_id().map(|id| id.to_string()))
        .bind(owner.session_key())
        .bind(ts(fresh.created_at))
        .bind(ts(fresh.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row = self
            .cart_row(owner)
            .await?
            .ok_or_else(|| db_err(format!("cart for {} vanished", owner.key())))?;
        self.load_cart(row).await
    }

    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, RepoError> {
        match self.cart_row(owner).await? {
            Some(row) if row.is_active => Ok(Some(self.load_cart(row).await?)),
            _ => Ok(None),
        }
    }

    async fn save_cart(&self, cart: &Cart) -> Result<Cart, RepoError> {
        let cart_id = cart.id.to_string();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("UPDATE carts SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(cart.is_active)
            .bind(ts(cart.updated_at))
            .bind(&cart_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM cart_lines WHERE cart_id = ?")
            .bind(&cart_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for line in &cart.lines {
            sqlx::query(
                "INSERT INTO cart_lines (id, cart_id, product_id, variant_key, quantity, added_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(line.id.to_string())
            .bind(&cart_id)
            .bind(line.product.id.to_string())
            .bind(line.variant_id().map(|v| v.to_string()).unwrap_or_default())
            .bind(i64::from(line.quantity))
            .bind(ts(line.added_at))
            .execute(&mut *tx)
            .await
            .map_err(write_err(format!("cart line {}", line.display_name())))?;
        }

        tx.commit().await.map_err(db_err)?;

        let row = self
            .cart_row(&cart.owner)
            .await?
            .ok_or_else(|| db_err(format!("cart {} not found", cart.id)))?;
        self.load_cart(row).await
    }
}

#[async_trait]
impl CouponRepository for SqliteRepo {
    async fn upsert_coupon(&self, mut coupon: Coupon) -> Result<Coupon, RepoError> {
        coupon.code = Coupon::normalize_code(&coupon.code);
        sqlx::query(
            "INSERT INTO coupons (code, usage_limit, usage_count, data_json) VALUES (?, ?, ?, ?)
             ON CONFLICT(code) DO UPDATE SET
                usage_limit = excluded.usage_limit,
                usage_count = excluded.usage_count,
                data_json = excluded.data_json",
        )
        .bind(&coupon.code)
        .bind(coupon.usage_limit.map(i64::from))
        .bind(i64::from(coupon.usage_count))
        .bind(to_json(&coupon)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(coupon)
    }

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>, RepoError> {
        let row: Option<DbCoupon> =
            sqlx::query_as("SELECT usage_count, data_json FROM coupons WHERE code = ?")
                .bind(Coupon::normalize_code(code))
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(DbCoupon::into_coupon).transpose()
    }
}

#[async_trait]
impl OrderRepository for SqliteRepo {
    async fn place_order(&self, order: Order) -> Result<Order, RepoError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if let Some(applied) = &order.applied_coupon {
            let redeemed = sqlx::query(
                "UPDATE coupons SET usage_count = usage_count + 1
                 WHERE code = ? AND (usage_limit IS NULL OR usage_count < usage_limit)",
            )
            .bind(&applied.code)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            if redeemed.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                return Err(RepoError::CouponExhausted(applied.code.clone()));
            }
        }

        sqlx::query(
            "INSERT INTO orders (id, order_number, customer_id, status, payment_status, total_amount, created_at, updated_at, data_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.id.to_string())
        .bind(&order.order_number)
        .bind(order.customer_id.map(|id| id.to_string()))
        .bind(order.status.as_str())
        .bind(to_json(&order.payment_status)?)
        .bind(order.total_amount.to_string())
        .bind(ts(order.created_at))
        .bind(ts(order.updated_at))
        .bind(to_json(&order)?)
        .execute(&mut *tx)
        .await
        .map_err(write_err(format!("order number {}", order.order_number)))?;

        tx.commit().await.map_err(db_err)?;
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        let row: Option<DbJson> = sqlx::query_as("SELECT data_json FROM orders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| from_json(&r.data_json)).transpose()
    }

    async fn get_order_by_number(&self, order_number: &str) -> Result<Option<Order>, RepoError> {
        let row: Option<DbJson> =
            sqlx::query_as("SELECT data_json FROM orders WHERE order_number = ?")
                .bind(order_number)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        row.map(|r| from_json(&r.data_json)).transpose()
    }

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, RepoError> {
        let rows: Vec<DbJson> = sqlx::query_as(
            "SELECT data_json FROM orders WHERE customer_id = ? ORDER BY created_at DESC",
        )
        .bind(customer_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter()
            .map(|r| from_json(&r.data_json))
            .collect::<Result<Vec<_>, _>>()
    }

    async fn update_order(&self, order: Order) -> Result<Option<Order>, RepoError> {
        let updated = sqlx::query(
            "UPDATE orders SET status = ?, payment_status = ?, updated_at = ?, data_json = ? WHERE id = ?",
        )
        .bind(order.status.as_str())
        .bind(to_json(&order.payment_status)?)
        .bind(ts(order.updated_at))
        .bind(to_json(&order)?)
        .bind(order.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(order))
    }
}

#[async_trait]
impl PaymentRepository for SqliteRepo {
    async fn create_payment(&self, payment: Payment) -> Result<Payment, RepoError> {
        sqlx::query(
            "INSERT INTO payments (id, transaction_id, order_id, created_at, data_json) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(payment.id.to_string())
        .bind(&payment.transaction_id)
        .bind(payment.order_id.to_string())
        .bind(ts(payment.created_at))
        .bind(to_json(&payment)?)
        .execute(&self.pool)
        .await
        .map_err(write_err(format!("transaction {}", payment.transaction_id)))?;
        Ok(payment)
    }

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, RepoError> {
        let row: Option<DbJson> = sqlx::query_as("SELECT data_json FROM payments WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(|r| from_json(&r.data_json)).transpose()
    }

    async fn list_payments(&self, order_id: Uuid) -> Result<Vec<Payment>, RepoError> {
        let rows: Vec<DbJson> = sqlx::query_as(
            "SELECT data_json FROM payments WHERE order_id = ? ORDER BY created_at DESC",
        )
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter()
            .map(|r| from_json(&r.data_json))
            .collect::<Result<Vec<_>, _>>()
    }

    async fn create_refund(&self, refund: Refund) -> Result<Refund, RepoError> {
        sqlx::query(
            "INSERT INTO refunds (id, refund_id, payment_id, created_at, data_json) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(refund.id.to_string())
        .bind(&refund.refund_id)
        .bind(refund.payment_id.to_string())
        .bind(ts(refund.created_at))
        .bind(to_json(&refund)?)
        .execute(&self.pool)
        .await
        .map_err(write_err(format!("refund {}", refund.refund_id)))?;
        Ok(refund)
    }

    async fn list_refunds(&self, payment_id: Uuid) -> Result<Vec<Refund>, RepoError> {
        let rows: Vec<DbJson> = sqlx::query_as(
            "SELECT data_json FROM refunds WHERE payment_id = ? ORDER BY created_at",
        )
        .bind(payment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter()
            .map(|r| from_json(&r.data_json))
            .collect::<Result<Vec<_>, _>>()
    }

    async fn store_webhook(
        &self,
        webhook: PaymentWebhook,
    ) -> Result<(PaymentWebhook, bool), RepoError> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO payment_webhooks (webhook_id, provider, event_type, created_at, data_json)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&webhook.webhook_id)
        .bind(&webhook.provider)
        .bind(&webhook.event_type)
        .bind(ts(webhook.created_at))
        .bind(to_json(&webhook)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if inserted.rows_affected() > 0 {
            return Ok((webhook, true));
        }

        let row: DbJson =
            sqlx::query_as("SELECT data_json FROM payment_webhooks WHERE webhook_id = ?")
                .bind(&webhook.webhook_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;
        Ok((from_json(&row.data_json)?, false))
    }
}

#[async_trait]
impl WishlistRepository for SqliteRepo {
    async fn get_or_create_wishlist(&self, customer_id: Uuid) -> Result<Wishlist, RepoError> {
        let fresh = Wishlist::new(customer_id);
        sqlx::query(
            "INSERT OR IGNORE INTO wishlists (id, customer_id, name, is_public, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(fresh.id.to_string())
        .bind(customer_id.to_string())
        .bind(&fresh.name)
        .bind(fresh.is_public)
        .bind(ts(fresh.created_at))
        .bind(ts(fresh.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row = self
            .wishlist_row(customer_id)
            .await?
            .ok_or_else(|| db_err(format!("wishlist for {customer_id} vanished")))?;
        self.load_wishlist(row).await
    }

    async fn find_wishlist(&self, customer_id: Uuid) -> Result<Option<Wishlist>, RepoError> {
        match self.wishlist_row(customer_id).await? {
            Some(row) => Ok(Some(self.load_wishlist(row).await?)),
            None => Ok(None),
        }
    }

    async fn save_wishlist(&self, wishlist: &Wishlist) -> Result<Wishlist, RepoError> {
        let wishlist_id = wishlist.id.to_string();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("UPDATE wishlists SET name = ?, is_public = ?, updated_at = ? WHERE id = ?")
            .bind(&wishlist.name)
            .bind(wishlist.is_public)
            .bind(ts(wishlist.updated_at))
            .bind(&wishlist_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM wishlist_items WHERE wishlist_id = ?")
            .bind(&wishlist_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for item in &wishlist.items {
            sqlx::query(
                "INSERT INTO wishlist_items (id, wishlist_id, product_id, notes, added_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(item.id.to_string())
            .bind(&wishlist_id)
            .bind(item.product_id.to_string())
            .bind(&item.notes)
            .bind(ts(item.added_at))
            .execute(&mut *tx)
            .await
            .map_err(write_err(format!("wishlist product {}", item.product_id)))?;
        }
        tx.commit().await.map_err(db_err)?;

        self.find_wishlist(wishlist.customer_id)
            .await?
            .ok_or_else(|| db_err(format!("wishlist {wishlist_id} vanished")))
    }
}

#[async_trait]
impl AddressRepository for SqliteRepo {
    async fn load_address_book(&self, customer_id: Uuid) -> Result<AddressBook, RepoError> {
        let rows: Vec<DbAddress> = sqlx::query_as(
            "SELECT id, customer_id, kind, is_default, is_active, created_at, updated_at, data_json
             FROM addresses WHERE customer_id = ? ORDER BY created_at",
        )
        .bind(customer_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        let addresses = rows
            .into_iter()
            .map(DbAddress::into_address)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(AddressBook::new(customer_id, addresses))
    }

    async fn save_address_book(&self, book: &AddressBook) -> Result<AddressBook, RepoError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for a in &book.addresses {
            sqlx::query(
                "INSERT INTO addresses (id, customer_id, kind, is_default, is_active, created_at, updated_at, data_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    kind = excluded.kind,
                    is_default = excluded.is_default,
                    is_active = excluded.is_active,
                    updated_at = excluded.updated_at,
                    data_json = excluded.data_json",
            )
            .bind(a.id.to_string())
            .bind(book.customer_id.to_string())
            .bind(a.kind.as_str())
            .bind(a.is_default)
            .bind(a.is_active)
            .bind(ts(a.created_at))
            .bind(ts(a.updated_at))
            .bind(to_json(&a.address)?)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        self.load_address_book(book.customer_id).await
    }
}
